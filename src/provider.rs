use std::collections::HashMap;

use async_trait::async_trait;

use tf_provider::schema::Schema;
use tf_provider::value::ValueEmpty;
use tf_provider::{map, Diagnostics, DynamicDataSource, DynamicResource, Provider};
use tokio_util::sync::CancellationToken;

use crate::config::{Config, ProviderContext, ProviderState};
use crate::evs::EvsVolumesDataSource;
use crate::ims::ImsImageShareResource;
use crate::utils::WithSchema;
use crate::vpc::VpcAddressGroupResource;
use crate::waf::WafDedicatedInstanceResource;

fn env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

#[derive(Debug, Default, Clone)]
pub struct HuaweiCloudProvider {
    context: ProviderContext,
}

impl HuaweiCloudProvider {
    /// Token cancelling every pending wait of the resources
    pub fn cancellation_token(&self) -> &CancellationToken {
        self.context.cancellation_token()
    }
}

#[async_trait]
impl Provider for HuaweiCloudProvider {
    type Config<'a> = ProviderState<'a>;
    type MetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(ProviderState::schema())
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::Config<'a>) -> Option<()> {
        config.validate(diags, &env);

        if diags.errors.is_empty() {
            Some(())
        } else {
            None
        }
    }

    async fn configure<'a>(
        &self,
        diags: &mut Diagnostics,
        terraform_version: String,
        config: Self::Config<'a>,
    ) -> Option<()> {
        tracing::debug!(%terraform_version, "configuring provider");
        let config = Config::new(diags, &config, env)?;
        self.context.configure(diags, config)
    }

    fn get_resources(
        &self,
        _diags: &mut Diagnostics,
    ) -> Option<HashMap<String, Box<dyn DynamicResource>>> {
        Some(map! {
            "vpc_address_group" => VpcAddressGroupResource::new(self.context.clone()),
            "images_image_share" => ImsImageShareResource::new(self.context.clone()),
            "waf_dedicated_instance" => WafDedicatedInstanceResource::new(self.context.clone()),
        })
    }

    fn get_data_sources(
        &self,
        _diags: &mut Diagnostics,
    ) -> Option<HashMap<String, Box<dyn DynamicDataSource>>> {
        Some(map! {
            "evs_volumes" => EvsVolumesDataSource::new(self.context.clone()),
        })
    }
}
