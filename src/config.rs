use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;

use tf_provider::schema::{
    Attribute, AttributeConstraint, AttributeType, Block, Description, Schema,
};
use tf_provider::value::{Value, ValueBool, ValueMap, ValueNumber, ValueString};
use tf_provider::{map, AttributePath, Diagnostics};

use crate::client::ServiceClient;
use crate::utils::WithSchema;

pub const DEFAULT_CLOUD: &str = "myhuaweicloud.com";
pub const DEFAULT_REQUEST_TIMEOUT: i64 = 60;

/// Services whose endpoint is not regional
const GLOBAL_SERVICES: &[&str] = &["eps", "iam"];

/// Provider block, as written by the practitioner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProviderState<'a> {
    #[serde(borrow = "'a")]
    pub region: ValueString<'a>,
    pub project_id: ValueString<'a>,
    pub auth_token: ValueString<'a>,
    pub cloud: ValueString<'a>,
    pub endpoints: ValueMap<'a, ValueString<'a>>,
    pub enterprise_project_id: ValueString<'a>,
    pub insecure: ValueBool,
    pub request_timeout: ValueNumber,
}

impl<'a> WithSchema for ProviderState<'a> {
    fn schema() -> Schema {
        let string = |description: &str, sensitive: bool| Attribute {
            attr_type: AttributeType::String,
            description: Description::plain(description),
            constraint: AttributeConstraint::Optional,
            sensitive,
            ..Default::default()
        };
        Schema {
            version: 1,
            block: Block {
                version: 1,
                attributes: map! {
                    "region" => string("The region to manage resources in (env: HW_REGION_NAME)", false),
                    "project_id" => string("The project of the region (env: HW_PROJECT_ID)", false),
                    "auth_token" => string("IAM token used to authenticate requests (env: HW_AUTH_TOKEN)", true),
                    "cloud" => string("The cloud domain (env: HW_CLOUD, default: myhuaweicloud.com)", false),
                    "enterprise_project_id" => string(
                        "Default enterprise project of the resources (env: HW_ENTERPRISE_PROJECT_ID)",
                        false,
                    ),
                    "endpoints" => Attribute {
                        attr_type: AttributeType::Map(AttributeType::String.into()),
                        description: Description::plain("Custom endpoint per service name"),
                        constraint: AttributeConstraint::Optional,
                        ..Default::default()
                    },
                    "insecure" => Attribute {
                        attr_type: AttributeType::Bool,
                        description: Description::plain("Skip the verification of TLS certificates"),
                        constraint: AttributeConstraint::Optional,
                        ..Default::default()
                    },
                    "request_timeout" => Attribute {
                        attr_type: AttributeType::Number,
                        description: Description::plain("Timeout of a single HTTP request, in seconds"),
                        constraint: AttributeConstraint::Optional,
                        ..Default::default()
                    },
                },
                description: Description::plain("HuaweiCloud provider"),
                ..Default::default()
            },
        }
    }
}

/// Value of a setting, falling back to the environment when it is not set in the configuration
fn setting<'v, F>(value: &'v ValueString<'_>, var: &str, env: &F) -> ValueString<'v>
where
    F: Fn(&str) -> Option<String>,
{
    match value {
        Value::Value(value) if !value.is_empty() => Value::Value(value.as_ref().into()),
        Value::Unknown => Value::Unknown,
        _ => match env(var) {
            Some(value) if !value.is_empty() => Value::Value(value.into()),
            _ => Value::Null,
        },
    }
}

impl<'a> ProviderState<'a> {
    /// Check that the required settings can be resolved
    pub fn validate<F>(&self, diags: &mut Diagnostics, env: &F)
    where
        F: Fn(&str) -> Option<String>,
    {
        for (name, value, var) in [
            ("region", &self.region, "HW_REGION_NAME"),
            ("project_id", &self.project_id, "HW_PROJECT_ID"),
            ("auth_token", &self.auth_token, "HW_AUTH_TOKEN"),
        ] {
            if setting(value, var, env).is_null() {
                diags.error(
                    format!("Missing `{name}`"),
                    format!("`{name}` must be set in the provider block or through `{var}`"),
                    AttributePath::new(name),
                );
            }
        }
        if let Value::Value(timeout) = self.request_timeout {
            if timeout <= 0 {
                diags.error_short(
                    "`request_timeout` must be positive",
                    AttributePath::new("request_timeout"),
                );
            }
        }
        if let Value::Value(endpoints) = &self.endpoints {
            for (service, url) in endpoints {
                if let Value::Value(url) = url {
                    if !url.starts_with("http://") && !url.starts_with("https://") {
                        diags.error(
                            "Invalid endpoint",
                            format!("`{url}` is not an http(s) URL"),
                            AttributePath::new("endpoints").key(service.to_string()),
                        );
                    }
                }
            }
        }
    }
}

/// Resolved provider configuration, shared by every resource
#[derive(Debug, Clone)]
pub struct Config {
    pub region: String,
    pub project_id: String,
    pub cloud: String,
    pub enterprise_project_id: Option<String>,
    auth_token: Option<String>,
    endpoints: HashMap<String, String>,
    http: reqwest::Client,
}

impl Config {
    /// Resolve the configuration
    ///
    /// # Arguments
    ///
    /// * `diags` - Diagnostics to record missing or invalid settings
    /// * `state` - Provider block
    /// * `env` - Lookup of environment variables
    pub fn new<F>(diags: &mut Diagnostics, state: &ProviderState, env: F) -> Option<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        state.validate(diags, &env);
        if !diags.errors.is_empty() {
            return None;
        }

        let resolve = |value: &ValueString, var: &str| -> Option<String> {
            setting(value, var, &env)
                .as_deref_option()
                .map(str::to_string)
        };
        let region = resolve(&state.region, "HW_REGION_NAME")?;
        let project_id = resolve(&state.project_id, "HW_PROJECT_ID")?;
        let auth_token = resolve(&state.auth_token, "HW_AUTH_TOKEN");
        let cloud = resolve(&state.cloud, "HW_CLOUD").unwrap_or_else(|| DEFAULT_CLOUD.to_string());
        let enterprise_project_id =
            resolve(&state.enterprise_project_id, "HW_ENTERPRISE_PROJECT_ID");

        let endpoints = state
            .endpoints
            .iter()
            .flatten()
            .filter_map(|(service, url)| {
                Some((service.to_string(), url.as_deref_option()?.to_string()))
            })
            .collect();

        let request_timeout = state
            .request_timeout
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT)
            .max(1) as u64;
        let http = match reqwest::Client::builder()
            .danger_accept_invalid_certs(state.insecure.unwrap_or(false))
            .timeout(Duration::from_secs(request_timeout))
            .build()
        {
            Ok(http) => http,
            Err(err) => {
                diags.root_error("Unable to build the HTTP client", err.to_string());
                return None;
            }
        };

        tracing::debug!(%region, %project_id, %cloud, "provider configured");

        Some(Self {
            region,
            project_id,
            cloud,
            enterprise_project_id,
            auth_token,
            endpoints,
            http,
        })
    }

    /// Region of a resource, or the provider region when the resource does not set one
    pub fn region<'s>(&'s self, value: &'s ValueString<'_>) -> &'s str {
        match value.as_deref_option() {
            Some(region) if !region.is_empty() => region,
            _ => &self.region,
        }
    }

    /// Enterprise project of a resource, or the provider default
    pub fn enterprise_project_id<'s>(&'s self, value: &'s ValueString<'_>) -> Option<&'s str> {
        match value.as_deref_option() {
            Some(eps) if !eps.is_empty() => Some(eps),
            _ => self.enterprise_project_id.as_deref(),
        }
    }

    pub fn endpoint(&self, service: &str, region: &str) -> String {
        if let Some(endpoint) = self.endpoints.get(service) {
            endpoint.clone()
        } else if GLOBAL_SERVICES.contains(&service) {
            format!("https://{service}.{}/", self.cloud)
        } else {
            format!("https://{service}.{region}.{}/", self.cloud)
        }
    }

    pub fn service_client(&self, service: &str, region: &str) -> ServiceClient {
        ServiceClient::new(
            self.http.clone(),
            self.endpoint(service, region),
            self.project_id.clone(),
            self.auth_token.clone(),
        )
    }
}

/// Handle given to every resource at registration time
///
/// The configuration is only known once the provider is configured,
/// which happens after the resources are registered.
#[derive(Debug, Clone, Default)]
pub struct ProviderContext {
    config: Arc<OnceCell<Config>>,
    cancel: CancellationToken,
}

impl ProviderContext {
    pub fn configure(&self, diags: &mut Diagnostics, config: Config) -> Option<()> {
        if self.config.set(config).is_err() {
            diags.root_error_short("Provider is already configured");
            return None;
        }
        Some(())
    }

    pub fn config(&self, diags: &mut Diagnostics) -> Option<&Config> {
        let config = self.config.get();
        if config.is_none() {
            diags.root_error(
                "Provider is not configured",
                "The provider must be configured before managing resources",
            );
        }
        config
    }

    /// Token cancelled when the plugin shuts down
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }
}
