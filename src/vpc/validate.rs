use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;

use tf_provider::value::Value;
use tf_provider::{AttributePath, Diagnostics};

use crate::utils::WithValidate;

use super::state::AddressGroupState;

pub const MAX_ADDRESSES: usize = 20;

lazy_static! {
    static ref NAME_PATTERN: Regex =
        Regex::new(r"^[\u{4e00}-\u{9fa5}0-9a-zA-Z_.\-]*$").expect("invalid name pattern");
}

#[async_trait]
impl<'a> WithValidate for AddressGroupState<'a> {
    async fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        if let Value::Value(name) = &self.name {
            let len = name.chars().count();
            if !(1..=64).contains(&len) {
                diags.error(
                    "Invalid `name`",
                    format!("`name` must be between 1 and 64 characters long, but was {len}."),
                    attr_path.clone().attribute("name"),
                );
            }
            if !NAME_PATTERN.is_match(name) {
                diags.error(
                    "Invalid `name`",
                    "Only letters, digits, underscores (_), hyphens (-), and dot (.) are allowed.",
                    attr_path.clone().attribute("name"),
                );
            }
        }
        if let Value::Value(description) = &self.description {
            if description.chars().count() > 255 {
                diags.error(
                    "Invalid `description`",
                    "`description` cannot be longer than 255 characters.",
                    attr_path.clone().attribute("description"),
                );
            }
            if description.contains(&['<', '>'][..]) {
                diags.error(
                    "Invalid `description`",
                    "The angle brackets (< and >) are not allowed.",
                    attr_path.clone().attribute("description"),
                );
            }
        }
        if let Value::Value(version) = self.ip_version {
            if version != 4 && version != 6 {
                diags.error(
                    "Invalid `ip_version`",
                    format!("`ip_version` must be 4 or 6, but was {version}."),
                    attr_path.clone().attribute("ip_version"),
                );
            }
        }
        if let Value::Value(addresses) = &self.addresses {
            if addresses.len() > MAX_ADDRESSES {
                diags.error(
                    "Too many `addresses`",
                    format!(
                        "An address group holds at most {MAX_ADDRESSES} entries, but {} were given.",
                        addresses.len()
                    ),
                    attr_path.clone().attribute("addresses"),
                );
            }
            for address in addresses {
                if let Value::Value(address) = address {
                    if address.is_empty() {
                        diags.error_short(
                            "Elements of `addresses` cannot be empty",
                            attr_path.clone().attribute("addresses"),
                        );
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn errors(state: AddressGroupState<'_>) -> Vec<AttributePath> {
        let mut diags = Diagnostics::default();
        state.validate(&mut diags, AttributePath::root()).await;
        diags.errors.into_iter().map(|diag| diag.attribute).collect()
    }

    fn valid() -> AddressGroupState<'static> {
        AddressGroupState {
            name: Value::Value("group_01.web-中文".into()),
            addresses: Value::Value([Value::Value("192.168.0.0/24".into())].into()),
            ip_version: Value::Value(4),
            description: Value::Value("web servers".into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn accepts_valid() {
        assert!(errors(valid()).await.is_empty());
    }

    #[tokio::test]
    async fn rejects_names() {
        let long = "a".repeat(65);
        for name in ["", "with space", "semi;colon", long.as_str()] {
            let state = AddressGroupState {
                name: Value::Value(name.to_string().into()),
                ..valid()
            };
            assert_eq!(
                errors(state).await.first(),
                Some(&AttributePath::root().attribute("name")),
                "{name:?} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn rejects_descriptions() {
        let long = "d".repeat(256);
        for description in ["<script>", long.as_str()] {
            let state = AddressGroupState {
                description: Value::Value(description.to_string().into()),
                ..valid()
            };
            assert_eq!(
                errors(state).await,
                vec![AttributePath::root().attribute("description")]
            );
        }
    }

    #[tokio::test]
    async fn rejects_ip_version_and_too_many_addresses() {
        let state = AddressGroupState {
            ip_version: Value::Value(5),
            addresses: Value::Value(
                (0..21)
                    .map(|i| Value::Value(format!("10.0.0.{i}").into()))
                    .collect(),
            ),
            ..valid()
        };
        assert_eq!(
            errors(state).await,
            vec![
                AttributePath::root().attribute("ip_version"),
                AttributePath::root().attribute("addresses"),
            ]
        );
    }

    #[tokio::test]
    async fn unknown_values_are_not_checked() {
        let state = AddressGroupState {
            name: Value::Unknown,
            description: Value::Unknown,
            addresses: Value::Unknown,
            ..Default::default()
        };
        assert!(errors(state).await.is_empty());
    }
}
