use serde::{Deserialize, Serialize};

use crate::client::{ApiResult, ServiceClient};

const ADDRESS_GROUPS: &str = "v3/{project_id}/vpc/address-groups";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AddressGroup {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub ip_set: Vec<String>,
    #[serde(default = "default_ip_version")]
    pub ip_version: i64,
}

fn default_ip_version() -> i64 {
    4
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateAddressGroup<'b> {
    pub name: &'b str,
    pub ip_set: Vec<&'b str>,
    pub ip_version: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'b str>,
}

/// Fields to modify, the other ones are left untouched
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct UpdateAddressGroup<'b> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<&'b str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'b str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_set: Option<Vec<&'b str>>,
}

impl UpdateAddressGroup<'_> {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none() && self.ip_set.is_none()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope<T> {
    address_group: T,
}

pub async fn create(
    client: &ServiceClient,
    group: &CreateAddressGroup<'_>,
) -> ApiResult<AddressGroup> {
    let body = Envelope {
        address_group: group,
    };
    let response: Envelope<AddressGroup> = client.post(ADDRESS_GROUPS, &[], &body).await?;
    Ok(response.address_group)
}

pub async fn show(client: &ServiceClient, id: &str) -> ApiResult<AddressGroup> {
    let response: Envelope<AddressGroup> = client
        .get(&format!("{ADDRESS_GROUPS}/{id}"), &[])
        .await?;
    Ok(response.address_group)
}

pub async fn update(
    client: &ServiceClient,
    id: &str,
    group: &UpdateAddressGroup<'_>,
) -> ApiResult<AddressGroup> {
    let body = Envelope {
        address_group: group,
    };
    let response: Envelope<AddressGroup> = client
        .put(&format!("{ADDRESS_GROUPS}/{id}"), &[], &body)
        .await?;
    Ok(response.address_group)
}

pub async fn delete(client: &ServiceClient, id: &str) -> ApiResult<()> {
    client.delete(&format!("{ADDRESS_GROUPS}/{id}"), &[]).await
}
