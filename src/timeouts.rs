use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use tf_provider::schema::{Attribute, AttributeConstraint, AttributeType, Block, Description, NestedBlock};
use tf_provider::value::{Value, ValueString};
use tf_provider::{map, AttributePath, Diagnostics};

/// Durations written in the `timeouts` block, eg: `"30m"` or `"1h30m"`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct StateTimeouts<'a> {
    #[serde(borrow = "'a")]
    pub create: ValueString<'a>,
    pub update: ValueString<'a>,
    pub delete: ValueString<'a>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl Operation {
    fn name(self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DurationError {
    #[error("duration is empty")]
    Empty,
    #[error("invalid duration {0:?}")]
    Invalid(String),
    #[error("missing unit in duration {0:?}")]
    MissingUnit(String),
    #[error("unknown unit {unit:?} in duration {input:?}")]
    UnknownUnit { unit: String, input: String },
}

/// Parse a duration the way Go's `time.ParseDuration` does
///
/// Negative durations are rejected.
pub fn parse_duration(input: &str) -> Result<Duration, DurationError> {
    let s = input.trim();
    if s.is_empty() {
        return Err(DurationError::Empty);
    }
    let s = s.strip_prefix('+').unwrap_or(s);
    if s == "0" {
        return Ok(Duration::ZERO);
    }

    let invalid = || DurationError::Invalid(input.to_string());
    let mut total = 0f64;
    let mut rest = s;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let number = &rest[..number_len];
        if number.is_empty() || number == "." {
            return Err(invalid());
        }
        let number: f64 = number.parse().map_err(|_| invalid())?;
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let unit = &rest[..unit_len];
        rest = &rest[unit_len..];
        let nanos_per_unit = match unit {
            "" => return Err(DurationError::MissingUnit(input.to_string())),
            "ns" => 1.0,
            "us" | "µs" | "μs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            _ => {
                return Err(DurationError::UnknownUnit {
                    unit: unit.to_string(),
                    input: input.to_string(),
                })
            }
        };
        total += number * nanos_per_unit;
    }

    if total.is_finite() && total < u64::MAX as f64 {
        Ok(Duration::from_nanos(total.round() as u64))
    } else {
        Err(invalid())
    }
}

impl<'a> StateTimeouts<'a> {
    pub fn block() -> NestedBlock {
        let attribute = |op: &str| Attribute {
            attr_type: AttributeType::String,
            description: Description::plain(format!(
                "Maximum time to wait for the {op} operation (eg: 10m, 1h30m)"
            )),
            constraint: AttributeConstraint::Optional,
            ..Default::default()
        };
        NestedBlock::Optional(Block {
            attributes: map! {
                "create" => attribute("create"),
                "update" => attribute("update"),
                "delete" => attribute("delete"),
            },
            description: Description::plain("Operation timeouts"),
            ..Default::default()
        })
    }

    fn get(&self, op: Operation) -> &ValueString<'a> {
        match op {
            Operation::Create => &self.create,
            Operation::Update => &self.update,
            Operation::Delete => &self.delete,
        }
    }

    pub fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        for op in [Operation::Create, Operation::Update, Operation::Delete] {
            if let Value::Value(text) = self.get(op) {
                if let Err(err) = parse_duration(text) {
                    diags.error(
                        "Invalid timeout",
                        err.to_string(),
                        attr_path.clone().attribute(op.name()),
                    );
                }
            }
        }
    }
}

/// Timeout configured for `op`, or `default` when unset or unparsable
pub fn timeout(timeouts: &Value<StateTimeouts>, op: Operation, default: Duration) -> Duration {
    timeouts
        .as_ref_option()
        .and_then(|timeouts| timeouts.get(op).as_deref_option())
        .and_then(|text| parse_duration(text).ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn go_durations() {
        assert_eq!(parse_duration("30m"), Ok(Duration::from_secs(1800)));
        assert_eq!(parse_duration("1h30m"), Ok(Duration::from_secs(5400)));
        assert_eq!(parse_duration("45s"), Ok(Duration::from_secs(45)));
        assert_eq!(parse_duration("1.5h"), Ok(Duration::from_secs(5400)));
        assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
        assert_eq!(parse_duration("0"), Ok(Duration::ZERO));
    }

    #[test]
    fn invalid_durations() {
        assert_eq!(parse_duration(""), Err(DurationError::Empty));
        assert_eq!(
            parse_duration("10"),
            Err(DurationError::MissingUnit("10".to_string()))
        );
        assert!(matches!(
            parse_duration("3d"),
            Err(DurationError::UnknownUnit { .. })
        ));
        assert!(matches!(parse_duration("-5m"), Err(DurationError::Invalid(_))));
        assert!(matches!(parse_duration("m"), Err(DurationError::Invalid(_))));
    }

    #[test]
    fn timeout_defaults() {
        let default = Duration::from_secs(300);
        assert_eq!(timeout(&Value::Null, Operation::Create, default), default);

        let timeouts = Value::Value(StateTimeouts {
            create: Value::Value("1h".into()),
            delete: Value::Unknown,
            ..Default::default()
        });
        assert_eq!(
            timeout(&timeouts, Operation::Create, default),
            Duration::from_secs(3600)
        );
        assert_eq!(timeout(&timeouts, Operation::Update, default), default);
        assert_eq!(timeout(&timeouts, Operation::Delete, default), default);
    }

    #[test]
    fn validate_reports_attribute() {
        let timeouts = StateTimeouts {
            update: Value::Value("soon".into()),
            ..Default::default()
        };
        let mut diags = Diagnostics::default();
        timeouts.validate(&mut diags, AttributePath::new("timeouts").index(0));
        assert_eq!(diags.errors.len(), 1);
        assert_eq!(
            diags.errors[0].attribute,
            AttributePath::new("timeouts").index(0).attribute("update")
        );
    }
}
