use std::borrow::Cow;

use async_trait::async_trait;

use tf_provider::schema::Schema;
use tf_provider::value::{Value, ValueEmpty};
use tf_provider::{AttributePath, Diagnostics, Resource};

use crate::client::ServiceClient;
use crate::config::{Config, ProviderContext};
use crate::utils::{replace_on_change, set_strings, WithNormalize, WithSchema, WithValidate};

use super::api::{self, CreateAddressGroup, UpdateAddressGroup};
use super::state::{AddressGroupState, DEFAULT_IP_VERSION};

const SERVICE: &str = "vpc";

#[derive(Debug, Clone)]
pub struct VpcAddressGroupResource {
    context: ProviderContext,
}

impl VpcAddressGroupResource {
    pub fn new(context: ProviderContext) -> Self {
        Self { context }
    }
}

fn service_client<'c>(config: &'c Config, state: &'c AddressGroupState) -> (&'c str, ServiceClient) {
    let region = config.region(&state.region);
    (region, config.service_client(SERVICE, region))
}

/// Fields that changed between the prior and the planned state
fn update_body<'b>(
    prior: &'b AddressGroupState,
    planned: &'b AddressGroupState,
) -> UpdateAddressGroup<'b> {
    let mut body = UpdateAddressGroup::default();
    if prior.name != planned.name {
        body.name = planned.name.as_deref_option();
    }
    if prior.description != planned.description {
        body.description = Some(planned.description.as_deref_option().unwrap_or_default());
    }
    if prior.addresses != planned.addresses {
        body.ip_set = Some(set_strings(&planned.addresses).into_iter().collect());
    }
    body
}

impl VpcAddressGroupResource {
    /// Refresh `state` from the remote group
    ///
    /// Returns `false` if the group does not exist anymore.
    async fn refresh(
        &self,
        diags: &mut Diagnostics,
        config: &Config,
        state: &mut AddressGroupState<'_>,
    ) -> bool {
        let (region, client) = service_client(config, state);
        let region = region.to_string();
        let id = state.id.as_deref_option().unwrap_or_default().to_string();
        match api::show(&client, &id).await {
            Ok(group) => {
                state.apply(&region, group);
                true
            }
            Err(err) if err.is_not_found() => {
                tracing::info!(%id, "VPC address group is gone");
                false
            }
            Err(err) => {
                diags.root_error("Failed to read VPC address group", err.to_string());
                true
            }
        }
    }
}

#[async_trait]
impl Resource for VpcAddressGroupResource {
    type State<'a> = AddressGroupState<'a>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(AddressGroupState::schema())
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::State<'a>) -> Option<()> {
        config.validate(diags, AttributePath::root()).await;

        if diags.errors.is_empty() {
            Some(())
        } else {
            None
        }
    }

    async fn read<'a>(
        &self,
        diags: &mut Diagnostics,
        state: Self::State<'a>,
        private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let Some(config) = self.context.config(diags) else {
            return Some((state, private_state));
        };
        let mut state = state;
        if self.refresh(diags, config, &mut state).await {
            Some((state, private_state))
        } else {
            None
        }
    }

    async fn plan_create<'a>(
        &self,
        diags: &mut Diagnostics,
        proposed_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let config = self.context.config(diags)?;
        let mut state = proposed_state;
        state.normalize(diags);
        if state.region.is_null() {
            state.region = Value::Value(Cow::Owned(config.region.clone()));
        }

        Some((state, Default::default()))
    }

    async fn plan_update<'a>(
        &self,
        diags: &mut Diagnostics,
        prior_state: Self::State<'a>,
        proposed_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        prior_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>, Vec<AttributePath>)> {
        let mut state = proposed_state;
        state.normalize(diags);
        state.id = prior_state.id.clone();
        if state.region.is_null() {
            state.region = prior_state.region.clone();
        }

        let mut replace = Vec::new();
        replace_on_change(&mut replace, "region", &prior_state.region, &state.region);
        replace_on_change(
            &mut replace,
            "ip_version",
            &prior_state.ip_version,
            &state.ip_version,
        );

        Some((state, prior_private_state, replace))
    }

    async fn plan_destroy<'a>(
        &self,
        _diags: &mut Diagnostics,
        _prior_state: Self::State<'a>,
        prior_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<Self::PrivateState<'a>> {
        Some(prior_private_state)
    }

    async fn create<'a>(
        &self,
        diags: &mut Diagnostics,
        planned_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        planned_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let config = self.context.config(diags)?;
        let mut state = planned_state;
        let (_, client) = service_client(config, &state);

        let body = CreateAddressGroup {
            name: state.name.as_deref_option().unwrap_or_default(),
            ip_set: set_strings(&state.addresses).into_iter().collect(),
            ip_version: state.ip_version.unwrap_or(DEFAULT_IP_VERSION),
            description: state.description.as_deref_option(),
        };
        tracing::debug!(?body, "creating VPC address group");
        let group = match api::create(&client, &body).await {
            Ok(group) => group,
            Err(err) => {
                diags.root_error("Failed to create VPC address group", err.to_string());
                return None;
            }
        };

        state.id = Value::Value(Cow::Owned(group.id));
        if !self.refresh(diags, config, &mut state).await {
            diags.root_error_short("VPC address group disappeared right after its creation");
        }

        Some((state, planned_private_state))
    }

    async fn update<'a>(
        &self,
        diags: &mut Diagnostics,
        prior_state: Self::State<'a>,
        planned_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        planned_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let config = self.context.config(diags)?;
        let mut state = planned_state.clone();
        let (_, client) = service_client(config, &state);
        let id = state.id.as_deref_option().unwrap_or_default().to_string();

        let body = update_body(&prior_state, &planned_state);
        if !body.is_empty() {
            tracing::debug!(%id, ?body, "updating VPC address group");
            if let Err(err) = api::update(&client, &id, &body).await {
                diags.root_error("Failed to update VPC address group", err.to_string());
                return None;
            }
        }

        if !self.refresh(diags, config, &mut state).await {
            diags.root_error_short("VPC address group disappeared during its update");
            return None;
        }

        Some((state, planned_private_state))
    }

    async fn destroy<'a>(
        &self,
        diags: &mut Diagnostics,
        prior_state: Self::State<'a>,
        _planned_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<()> {
        let config = self.context.config(diags)?;
        let (_, client) = service_client(config, &prior_state);
        let id = prior_state.id.as_deref_option().unwrap_or_default();

        match api::delete(&client, id).await {
            Ok(()) => Some(()),
            Err(err) if err.is_not_found() => Some(()),
            Err(err) => {
                diags.root_error("Failed to delete VPC address group", err.to_string());
                None
            }
        }
    }

    async fn import<'a>(
        &self,
        _diags: &mut Diagnostics,
        id: String,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let state = AddressGroupState {
            id: Value::Value(Cow::Owned(id)),
            ..Default::default()
        };
        Some((state, Default::default()))
    }
}

#[cfg(test)]
mod tests {
    use mockito::{Matcher, Server};
    use serde_json::json;

    use crate::config::ProviderState;

    use super::*;

    fn context(endpoint: &str) -> ProviderContext {
        let state = ProviderState {
            region: Value::Value("cn-north-4".into()),
            project_id: Value::Value("p-1".into()),
            auth_token: Value::Value("token".into()),
            endpoints: Value::Value(
                [("vpc".into(), Value::Value(endpoint.to_string().into()))]
                    .into_iter()
                    .collect(),
            ),
            ..Default::default()
        };
        let mut diags = Diagnostics::default();
        let context = ProviderContext::default();
        let config = Config::new(&mut diags, &state, |_| None).unwrap();
        context.configure(&mut diags, config).unwrap();
        context
    }

    fn group(name: &str, description: Option<&str>) -> AddressGroupState<'static> {
        AddressGroupState {
            id: Value::Value("ag-1".into()),
            region: Value::Value("cn-north-4".into()),
            name: Value::Value(name.to_string().into()),
            addresses: Value::Value(
                [Value::Value("10.0.0.1".into()), Value::Value("10.0.1.0/24".into())].into(),
            ),
            ip_version: Value::Value(4),
            description: description.map(|d| Cow::Owned(d.to_string())).into(),
        }
    }

    #[test]
    fn update_sends_changed_fields() {
        let prior = group("web", Some("old"));

        let renamed = group("api", Some("old"));
        assert_eq!(
            update_body(&prior, &renamed),
            UpdateAddressGroup {
                name: Some("api"),
                ..Default::default()
            }
        );

        let cleared = group("web", None);
        assert_eq!(
            update_body(&prior, &cleared),
            UpdateAddressGroup {
                description: Some(""),
                ..Default::default()
            }
        );

        let mut readdressed = group("web", Some("old"));
        readdressed.addresses = Value::Value([Value::Value("10.0.2.0/24".into())].into());
        assert_eq!(
            update_body(&prior, &readdressed),
            UpdateAddressGroup {
                ip_set: Some(vec!["10.0.2.0/24"]),
                ..Default::default()
            }
        );

        assert!(update_body(&prior, &prior.clone()).is_empty());
    }

    #[tokio::test]
    async fn plan_update_replaces_on_ip_version() {
        let resource = VpcAddressGroupResource::new(ProviderContext::default());
        let mut diags = Diagnostics::default();
        let prior = group("web", None);
        let mut proposed = group("web", None);
        proposed.ip_version = Value::Value(6);

        let (_, _, replace) = resource
            .plan_update(
                &mut diags,
                prior.clone(),
                proposed,
                prior,
                Default::default(),
                Default::default(),
            )
            .await
            .unwrap();

        assert_eq!(replace, vec![AttributePath::new("ip_version")]);
    }

    #[tokio::test]
    async fn plan_create_keeps_unknown_region() {
        let resource = VpcAddressGroupResource::new(context("http://127.0.0.1:1"));
        let mut diags = Diagnostics::default();
        let mut proposed = group("web", None);
        proposed.id = Value::Null;
        proposed.region = Value::Unknown;

        let (state, _) = resource
            .plan_create(&mut diags, proposed.clone(), proposed, Default::default())
            .await
            .unwrap();
        assert_eq!(state.region, Value::Unknown);

        let mut proposed = group("web", None);
        proposed.region = Value::Null;
        let (state, _) = resource
            .plan_create(&mut diags, proposed.clone(), proposed, Default::default())
            .await
            .unwrap();
        assert_eq!(state.region, Value::Value("cn-north-4".into()));
    }

    #[tokio::test]
    async fn create_then_read() {
        let mut server = Server::new_async().await;
        let create = server
            .mock("POST", "/v3/p-1/vpc/address-groups")
            .match_header("x-auth-token", "token")
            .match_body(Matcher::Json(json!({
                "address_group": {
                    "name": "web",
                    "ip_set": ["10.0.0.1", "10.0.1.0/24"],
                    "ip_version": 4
                }
            })))
            .with_status(201)
            .with_body(r#"{"address_group": {"id": "ag-42", "name": "web"}}"#)
            .create_async()
            .await;
        let show = server
            .mock("GET", "/v3/p-1/vpc/address-groups/ag-42")
            .with_status(200)
            .with_body(
                json!({
                    "address_group": {
                        "id": "ag-42",
                        "name": "web",
                        "description": "",
                        "ip_set": ["10.0.0.1", "10.0.1.0/24"],
                        "ip_version": 4
                    }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let resource = VpcAddressGroupResource::new(context(&server.url()));
        let mut diags = Diagnostics::default();
        let mut planned = group("web", None);
        planned.id = Value::Unknown;

        let (state, _) = resource
            .create(
                &mut diags,
                planned.clone(),
                planned,
                Default::default(),
                Default::default(),
            )
            .await
            .unwrap();

        assert!(diags.errors.is_empty(), "{diags:?}");
        assert_eq!(state.id, Value::Value("ag-42".into()));
        assert_eq!(state.description, Value::Null);
        create.assert_async().await;
        show.assert_async().await;
    }

    #[tokio::test]
    async fn read_missing_group() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/v3/p-1/vpc/address-groups/ag-1")
            .with_status(404)
            .create_async()
            .await;

        let resource = VpcAddressGroupResource::new(context(&server.url()));
        let mut diags = Diagnostics::default();
        let result = resource
            .read(
                &mut diags,
                group("web", None),
                Default::default(),
                Default::default(),
            )
            .await;

        assert!(result.is_none());
        assert!(diags.errors.is_empty());
    }

    #[tokio::test]
    async fn delete_tolerates_missing_group() {
        let mut server = Server::new_async().await;
        let delete = server
            .mock("DELETE", "/v3/p-1/vpc/address-groups/ag-1")
            .with_status(404)
            .create_async()
            .await;

        let resource = VpcAddressGroupResource::new(context(&server.url()));
        let mut diags = Diagnostics::default();
        let result = resource
            .destroy(
                &mut diags,
                group("web", None),
                Default::default(),
                Default::default(),
            )
            .await;

        assert_eq!(result, Some(()));
        delete.assert_async().await;
    }

    #[tokio::test]
    async fn unconfigured_provider() {
        let resource = VpcAddressGroupResource::new(ProviderContext::default());
        let mut diags = Diagnostics::default();
        let result = resource
            .plan_create(
                &mut diags,
                group("web", None),
                group("web", None),
                Default::default(),
            )
            .await;

        assert!(result.is_none());
        assert_eq!(diags.errors[0].summary, "Provider is not configured");
    }
}
