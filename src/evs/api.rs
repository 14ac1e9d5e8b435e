use std::collections::{BTreeMap, HashSet};

use serde::Deserialize;

use crate::client::{ApiResult, ServiceClient};

const VOLUMES: &str = "v2/{project_id}/cloudvolumes/detail";
const PAGE_SIZE: usize = 1000;

pub const DEVICE_TYPE_SCSI: &str = "SCSI";
pub const DEVICE_TYPE_VBD: &str = "VBD";

#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
#[serde(default)]
pub struct Attachment {
    pub attachment_id: String,
    pub server_id: String,
    pub device: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
#[serde(default)]
pub struct Volume {
    pub id: String,
    pub name: String,
    pub status: String,
    pub size: i64,
    pub availability_zone: String,
    pub description: String,
    pub volume_type: String,
    /// `"true"` or `"false"`
    pub bootable: String,
    pub multiattach: bool,
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub attachments: Vec<Attachment>,
    pub tags: BTreeMap<String, String>,
    pub enterprise_project_id: String,
    pub service_type: String,
}

impl Volume {
    /// Volumes with SCSI passthrough are reported as `SCSI`, others as `VBD`
    pub fn device_type(&self) -> &'static str {
        let passthrough = match self.metadata.get("hw:passthrough") {
            Some(serde_json::Value::String(flag)) => flag == "true",
            Some(serde_json::Value::Bool(flag)) => *flag,
            _ => false,
        };
        if passthrough {
            DEVICE_TYPE_SCSI
        } else {
            DEVICE_TYPE_VBD
        }
    }

    pub fn is_bootable(&self) -> bool {
        self.bootable == "true"
    }

    pub fn attached_to(&self, server_id: &str) -> bool {
        self.attachments
            .iter()
            .any(|attachment| attachment.server_id == server_id)
    }

    /// Whether the volume carries all of `tags`
    pub fn has_tags<'t>(&self, mut tags: impl Iterator<Item = (&'t str, &'t str)>) -> bool {
        tags.all(|(key, value)| self.tags.get(key).is_some_and(|tag| tag == value))
    }
}

/// Server side filters of the volume listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ListVolumes<'b> {
    pub id: Option<&'b str>,
    pub name: Option<&'b str>,
    pub availability_zone: Option<&'b str>,
    pub volume_type_id: Option<&'b str>,
    pub status: Option<&'b str>,
    pub enterprise_project_id: Option<&'b str>,
}

#[derive(Debug, Deserialize)]
struct VolumePage {
    #[serde(default)]
    volumes: Vec<Volume>,
}

/// List all the volumes matching `filters`, page by page
pub async fn list(client: &ServiceClient, filters: &ListVolumes<'_>) -> ApiResult<Vec<Volume>> {
    let limit = PAGE_SIZE.to_string();
    let mut volumes = Vec::new();
    let mut seen = HashSet::new();
    let mut received = 0usize;
    loop {
        let offset = received.to_string();
        let query = [
            ("id", filters.id.unwrap_or_default()),
            ("name", filters.name.unwrap_or_default()),
            (
                "availability_zone",
                filters.availability_zone.unwrap_or_default(),
            ),
            ("volume_type_id", filters.volume_type_id.unwrap_or_default()),
            ("status", filters.status.unwrap_or_default()),
            (
                "enterprise_project_id",
                filters.enterprise_project_id.unwrap_or_default(),
            ),
            ("limit", limit.as_str()),
            ("offset", offset.as_str()),
        ];
        let page: VolumePage = client.get(VOLUMES, &query).await?;
        let count = page.volumes.len();
        let known = volumes.len();
        received += count;
        volumes.extend(
            page.volumes
                .into_iter()
                .filter(|volume| seen.insert(volume.id.clone())),
        );
        if count < PAGE_SIZE {
            return Ok(volumes);
        }
        // Backends ignoring `offset` keep returning the same page
        if volumes.len() == known {
            tracing::warn!(%offset, "volume page brought no new volume, listing stopped");
            return Ok(volumes);
        }
    }
}

#[cfg(test)]
mod tests {
    use mockito::{Matcher, Server};
    use serde_json::json;

    use super::*;

    fn volume(value: serde_json::Value) -> Volume {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn device_type_from_metadata() {
        assert_eq!(
            volume(json!({"metadata": {"hw:passthrough": "true"}})).device_type(),
            DEVICE_TYPE_SCSI
        );
        assert_eq!(
            volume(json!({"metadata": {"hw:passthrough": "false"}})).device_type(),
            DEVICE_TYPE_VBD
        );
        assert_eq!(volume(json!({})).device_type(), DEVICE_TYPE_VBD);
    }

    #[test]
    fn tag_matching() {
        let tagged = volume(json!({"tags": {"env": "prod", "team": "web"}}));
        assert!(tagged.has_tags([("env", "prod")].into_iter()));
        assert!(tagged.has_tags(std::iter::empty()));
        assert!(!tagged.has_tags([("env", "dev")].into_iter()));
        assert!(!tagged.has_tags([("owner", "web")].into_iter()));
    }

    #[tokio::test]
    async fn list_sends_filters() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/v2/p-1/cloudvolumes/detail")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("name".into(), "data".into()),
                Matcher::UrlEncoded("status".into(), "in-use".into()),
                Matcher::UrlEncoded("offset".into(), "0".into()),
            ]))
            .with_status(200)
            .with_body(
                json!({
                    "volumes": [
                        {"id": "v-1", "name": "data", "bootable": "false", "size": 100},
                        {"id": "v-2", "name": "data", "bootable": "true", "size": 40}
                    ]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = ServiceClient::new(reqwest::Client::new(), server.url(), "p-1", None);
        let volumes = list(
            &client,
            &ListVolumes {
                name: Some("data"),
                status: Some("in-use"),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(volumes.len(), 2);
        assert!(!volumes[0].is_bootable());
        assert!(volumes[1].is_bootable());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn listing_stops_when_offset_is_ignored() {
        let mut server = Server::new_async().await;
        let page: Vec<_> = (0..PAGE_SIZE)
            .map(|i| json!({"id": format!("v-{i}"), "bootable": "false"}))
            .collect();
        let mock = server
            .mock("GET", "/v2/p-1/cloudvolumes/detail")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(json!({ "volumes": page }).to_string())
            .expect(2)
            .create_async()
            .await;

        let client = ServiceClient::new(reqwest::Client::new(), server.url(), "p-1", None);
        let volumes = list(&client, &ListVolumes::default()).await.unwrap();

        assert_eq!(volumes.len(), PAGE_SIZE);
        assert_eq!(volumes[PAGE_SIZE - 1].id, "v-999");
        mock.assert_async().await;
    }
}
