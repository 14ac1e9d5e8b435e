use std::borrow::Cow;

use async_trait::async_trait;

use tf_provider::schema::Schema;
use tf_provider::value::{Value, ValueEmpty};
use tf_provider::{DataSource, Diagnostics};

use crate::config::ProviderContext;
use crate::utils::WithSchema;

use super::api::{self, ListVolumes, Volume};
use super::state::{VolumeState, VolumesState};

const SERVICE: &str = "evs";

#[derive(Debug, Clone)]
pub struct EvsVolumesDataSource {
    context: ProviderContext,
}

impl EvsVolumesDataSource {
    pub fn new(context: ProviderContext) -> Self {
        Self { context }
    }
}

/// Apply the filters the API does not support
fn select(volumes: Vec<Volume>, config: &VolumesState) -> Vec<Volume> {
    let server_id = config.server_id.as_deref_option();
    let tags = config.tags.as_ref_option();
    volumes
        .into_iter()
        .filter(|volume| server_id.map_or(true, |server_id| volume.attached_to(server_id)))
        .filter(|volume| {
            tags.map_or(true, |tags| {
                volume.has_tags(
                    tags.iter()
                        .filter_map(|(key, value)| Some((key.as_ref(), value.as_deref_option()?))),
                )
            })
        })
        .collect()
}

/// Identifier of a set of volumes: CRC32 (IEEE) of their ids, each followed by `-`
fn volumes_id(volumes: &[Volume]) -> String {
    let mut hasher = crc32fast::Hasher::new();
    for volume in volumes {
        hasher.update(volume.id.as_bytes());
        hasher.update(b"-");
    }
    hasher.finalize().to_string()
}

#[async_trait]
impl DataSource for EvsVolumesDataSource {
    type State<'a> = VolumesState<'a>;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(VolumesState::schema())
    }

    async fn read<'a>(
        &self,
        diags: &mut Diagnostics,
        config: Self::State<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<Self::State<'a>> {
        let provider = self.context.config(diags)?;
        let region = provider.region(&config.region).to_string();
        let client = provider.service_client(SERVICE, &region);
        let filters = ListVolumes {
            id: config.volume_id.as_deref_option(),
            name: config.name.as_deref_option(),
            availability_zone: config.availability_zone.as_deref_option(),
            volume_type_id: config.volume_type_id.as_deref_option(),
            status: config.status.as_deref_option(),
            enterprise_project_id: provider.enterprise_project_id(&config.enterprise_project_id),
        };

        let volumes = match api::list(&client, &filters).await {
            Ok(volumes) => select(volumes, &config),
            Err(err) => {
                diags.root_error("Failed to list EVS volumes", err.to_string());
                return None;
            }
        };
        tracing::debug!(%region, count = volumes.len(), "EVS volumes found");

        let mut state = config;
        state.region = Value::Value(Cow::Owned(region));
        state.id = Value::Value(Cow::Owned(volumes_id(&volumes)));
        state.volumes = Value::Value(
            volumes
                .into_iter()
                .map(|volume| Value::Value(VolumeState::from(volume)))
                .collect(),
        );

        Some(state)
    }
}
