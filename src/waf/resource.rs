use std::borrow::Cow;
use std::time::Duration;

use async_trait::async_trait;

use tf_provider::schema::Schema;
use tf_provider::value::{Value, ValueEmpty};
use tf_provider::{AttributePath, Diagnostics, Resource};

use crate::config::{Config, ProviderContext};
use crate::timeouts::{timeout, Operation};
use crate::utils::{replace_on_change, WithNormalize, WithSchema};
use crate::wait::Pacing;

use super::api::{self, CreateInstance, CHARGE_MODE_PAY_PER_USE};
use super::state::{DedicatedInstanceState, DEFAULT_CPU_ARCHITECTURE};

const SERVICE: &str = "waf";
const EPS_SERVICE: &str = "eps";
/// Enterprise project of resources that do not belong to any
const DEFAULT_ENTERPRISE_PROJECT: &str = "0";

pub const DEFAULT_CREATE_TIMEOUT: Duration = Duration::from_secs(30 * 60);
pub const DEFAULT_DELETE_TIMEOUT: Duration = Duration::from_secs(20 * 60);

#[derive(Debug, Clone)]
pub struct WafDedicatedInstanceResource {
    context: ProviderContext,
    pacing: Pacing,
}

impl WafDedicatedInstanceResource {
    pub fn new(context: ProviderContext) -> Self {
        Self {
            context,
            pacing: api::PACING,
        }
    }

    /// Override how often creations and deletions are polled
    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }
}

/// Split an import id of the form `<id>` or `<id>/<enterprise_project_id>`
pub(super) fn parse_import_id(id: &str) -> Result<(&str, Option<&str>), String> {
    let invalid = || {
        format!("invalid import id `{id}`, expected `<id>` or `<id>/<enterprise_project_id>`")
    };
    match id.split_once('/') {
        None if !id.is_empty() => Ok((id, None)),
        None => Err(invalid()),
        Some((instance, eps))
            if !instance.is_empty() && !eps.is_empty() && !eps.contains('/') =>
        {
            Ok((instance, Some(eps)))
        }
        Some(_) => Err(invalid()),
    }
}

/// Region, enterprise project and id of an instance state
fn location(config: &Config, state: &DedicatedInstanceState) -> (String, Option<String>, String) {
    (
        config.region(&state.region).to_string(),
        config
            .enterprise_project_id(&state.enterprise_project_id)
            .map(str::to_string),
        state.id.as_deref_option().unwrap_or_default().to_string(),
    )
}

impl WafDedicatedInstanceResource {
    /// Refresh `state` from the remote instance
    ///
    /// Returns `false` if the instance does not exist anymore.
    async fn refresh(
        &self,
        diags: &mut Diagnostics,
        config: &Config,
        state: &mut DedicatedInstanceState<'_>,
    ) -> bool {
        let (region, eps, id) = location(config, state);
        let client = config.service_client(SERVICE, &region);
        match api::show(&client, &id, eps.as_deref()).await {
            Ok(instance) => {
                state.apply(&region, instance);
                true
            }
            Err(err) if err.is_not_found() => {
                tracing::info!(%id, "WAF dedicated instance is gone");
                false
            }
            Err(err) => {
                diags.root_error("Failed to read WAF dedicated instance", err.to_string());
                true
            }
        }
    }
}

#[async_trait]
impl Resource for WafDedicatedInstanceResource {
    type State<'a> = DedicatedInstanceState<'a>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(DedicatedInstanceState::schema())
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::State<'a>) -> Option<()> {
        if let Value::Value(groups) = &config.security_group {
            if groups.is_empty() {
                diags.error_short(
                    "`security_group` cannot be empty",
                    AttributePath::new("security_group"),
                );
            }
        }
        if let Value::Value(name) = &config.name {
            if name.is_empty() {
                diags.error_short("`name` cannot be empty", AttributePath::new("name"));
            }
        }
        if let Value::Value(timeouts) = &config.timeouts {
            timeouts.validate(diags, AttributePath::new("timeouts").index(0));
        }

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
        state.unknown_computed();
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
        state.keep_computed(&prior_state);
        if state.region.is_null() {
            state.region = prior_state.region.clone();
        }

        let mut replace = Vec::new();
        let (prior, planned) = (&prior_state, &state);
        replace_on_change(&mut replace, "region", &prior.region, &planned.region);
        replace_on_change(
            &mut replace,
            "available_zone",
            &prior.available_zone,
            &planned.available_zone,
        );
        replace_on_change(
            &mut replace,
            "specification_code",
            &prior.specification_code,
            &planned.specification_code,
        );
        replace_on_change(&mut replace, "ecs_flavor", &prior.ecs_flavor, &planned.ecs_flavor);
        replace_on_change(&mut replace, "vpc_id", &prior.vpc_id, &planned.vpc_id);
        replace_on_change(&mut replace, "subnet_id", &prior.subnet_id, &planned.subnet_id);
        replace_on_change(
            &mut replace,
            "cpu_architecture",
            &prior.cpu_architecture,
            &planned.cpu_architecture,
        );
        replace_on_change(
            &mut replace,
            "security_group",
            &prior.security_group,
            &planned.security_group,
        );
        replace_on_change(&mut replace, "group_id", &prior.group_id, &planned.group_id);
        replace_on_change(&mut replace, "res_tenant", &prior.res_tenant, &planned.res_tenant);

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
        let (region, eps, _) = location(config, &state);
        let client = config.service_client(SERVICE, &region);
        let name = state.name.as_deref_option().unwrap_or_default().to_string();

        let created = {
            let body = CreateInstance {
                region: &region,
                chargemode: CHARGE_MODE_PAY_PER_USE,
                available_zone: state.available_zone.as_deref_option().unwrap_or_default(),
                arch: state
                    .cpu_architecture
                    .as_deref_option()
                    .unwrap_or(DEFAULT_CPU_ARCHITECTURE),
                instancename: &name,
                specification: state
                    .specification_code
                    .as_deref_option()
                    .unwrap_or_default(),
                cpu_flavor: state.ecs_flavor.as_deref_option().unwrap_or_default(),
                vpc_id: state.vpc_id.as_deref_option().unwrap_or_default(),
                subnet_id: state.subnet_id.as_deref_option().unwrap_or_default(),
                security_group: state
                    .security_group
                    .iter()
                    .flatten()
                    .filter_map(|group| group.as_deref_option())
                    .collect(),
                count: 1,
                pool_id: state.group_id.as_deref_option(),
                res_tenant: state.res_tenant.as_ref_option().copied(),
            };
            tracing::debug!(?body, "creating WAF dedicated instance");
            api::create(&client, eps.as_deref(), &body).await
        };
        let id = match created.map(|instances| instances.into_iter().next()) {
            Ok(Some(instance)) => instance.id,
            Ok(None) => {
                diags.root_error_short("No WAF dedicated instance was created");
                return None;
            }
            Err(err) => {
                diags.root_error("Failed to create WAF dedicated instance", err.to_string());
                return None;
            }
        };
        state.id = Value::Value(Cow::Owned(id.clone()));

        // From here on, the instance exists and must be kept in the state
        let conf = match api::create_conf(
            self.pacing,
            timeout(&state.timeouts, Operation::Create, DEFAULT_CREATE_TIMEOUT),
        ) {
            Ok(conf) => conf,
            Err(err) => {
                diags.root_error("Invalid wait configuration", err.to_string());
                state.null_computed();
                return Some((state, planned_private_state));
            }
        };
        if let Err(err) = api::wait_created(
            &client,
            &id,
            eps.as_deref(),
            &conf,
            self.context.cancellation_token(),
        )
        .await
        {
            diags.root_error(
                "Error waiting for WAF dedicated instance to be created",
                err.to_string(),
            );
            state.null_computed();
            return Some((state, planned_private_state));
        }

        if let Err(err) = api::rename(&client, &id, eps.as_deref(), &name).await {
            diags.root_error("Failed to rename WAF dedicated instance", err.to_string());
        }
        if !self.refresh(diags, config, &mut state).await {
            diags.root_error_short("WAF dedicated instance disappeared right after its creation");
        }
        state.null_computed();

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
        let mut state = planned_state;
        let (region, prior_eps, id) = location(config, &prior_state);
        let client = config.service_client(SERVICE, &region);

        if prior_state.name != state.name {
            let name = state.name.as_deref_option().unwrap_or_default();
            tracing::debug!(%id, name, "renaming WAF dedicated instance");
            if let Err(err) = api::rename(&client, &id, prior_eps.as_deref(), name).await {
                diags.root_error("Failed to rename WAF dedicated instance", err.to_string());
                return None;
            }
        }

        let target_eps = config
            .enterprise_project_id(&state.enterprise_project_id)
            .unwrap_or(DEFAULT_ENTERPRISE_PROJECT)
            .to_string();
        if prior_state.enterprise_project_id != state.enterprise_project_id
            && prior_eps.as_deref() != Some(target_eps.as_str())
        {
            tracing::debug!(%id, %target_eps, "migrating WAF dedicated instance");
            let eps_client = config.service_client(EPS_SERVICE, &region);
            if let Err(err) = api::migrate(&eps_client, &region, &target_eps, &id).await {
                diags.root_error(
                    "Failed to migrate WAF dedicated instance to another enterprise project",
                    err.to_string(),
                );
                return None;
            }
            if let Err(err) = api::show(&client, &id, Some(target_eps.as_str())).await {
                diags.root_error(
                    "WAF dedicated instance is not visible in its new enterprise project",
                    err.to_string(),
                );
                return None;
            }
        }

        if !self.refresh(diags, config, &mut state).await {
            diags.root_error_short("WAF dedicated instance disappeared during its update");
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
        let (region, eps, id) = location(config, &prior_state);
        let client = config.service_client(SERVICE, &region);

        match api::delete(&client, &id, eps.as_deref()).await {
            Ok(()) => (),
            Err(err) if err.is_not_found() => return Some(()),
            Err(err) => {
                diags.root_error("Failed to delete WAF dedicated instance", err.to_string());
                return None;
            }
        }

        let waited = match api::delete_conf(
            self.pacing,
            timeout(&prior_state.timeouts, Operation::Delete, DEFAULT_DELETE_TIMEOUT),
        ) {
            Ok(conf) => {
                api::wait_deleted(
                    &client,
                    &id,
                    eps.as_deref(),
                    &conf,
                    self.context.cancellation_token(),
                )
                .await
            }
            Err(err) => Err(err),
        };
        match waited {
            Ok(_) => Some(()),
            Err(err) => {
                diags.root_error(
                    "Error waiting for WAF dedicated instance to be deleted",
                    err.to_string(),
                );
                None
            }
        }
    }

    async fn import<'a>(
        &self,
        diags: &mut Diagnostics,
        id: String,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let (instance, eps) = match parse_import_id(&id) {
            Ok(parsed) => parsed,
            Err(err) => {
                diags.root_error("Invalid import id", err);
                return None;
            }
        };
        let state = DedicatedInstanceState {
            id: Value::Value(Cow::Owned(instance.to_string())),
            enterprise_project_id: eps.map(|eps| Cow::Owned(eps.to_string())).into(),
            ..Default::default()
        };
        Some((state, Default::default()))
    }
}
