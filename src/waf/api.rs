use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::client::{ApiError, ApiResult, ServiceClient};
use crate::wait::{Pacing, Refresh, StateChangeConf, WaitError};

const INSTANCES: &str = "v1/{project_id}/premium-waf/instance";

/// Pay-per-use charging mode
pub const CHARGE_MODE_PAY_PER_USE: i64 = 30;

pub const RUN_STATUS_CREATING: i64 = 0;
pub const RUN_STATUS_CREATED: i64 = 1;
pub const RUN_STATUS_DELETING: i64 = 2;
pub const RUN_STATUS_DELETED: i64 = 3;

/// Instances take minutes to build or tear down
pub const PACING: Pacing = Pacing::new(Duration::from_secs(5), Duration::from_secs(15));

pub const CREATING: &str = "Creating";
pub const CREATED: &str = "Created";
pub const DELETING: &str = "Deleting";
pub const DELETED: &str = "Deleted";

/// Label of an instance run status, as seen by the poller
pub fn run_status_label(run_status: i64) -> String {
    match run_status {
        RUN_STATUS_CREATING => CREATING.to_string(),
        RUN_STATUS_CREATED => CREATED.to_string(),
        RUN_STATUS_DELETING => DELETING.to_string(),
        RUN_STATUS_DELETED => DELETED.to_string(),
        other => format!("Unknown({other})"),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateInstance<'b> {
    pub region: &'b str,
    pub chargemode: i64,
    pub available_zone: &'b str,
    pub arch: &'b str,
    /// Prefix of the generated instance name
    pub instancename: &'b str,
    pub specification: &'b str,
    pub cpu_flavor: &'b str,
    pub vpc_id: &'b str,
    pub subnet_id: &'b str,
    pub security_group: Vec<&'b str>,
    pub count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool_id: Option<&'b str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub res_tenant: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatedInstance {
    pub id: String,
}

#[derive(Debug, Deserialize)]
struct CreateResponse {
    #[serde(default)]
    instances: Vec<CreatedInstance>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
#[serde(default)]
pub struct Instance {
    pub id: String,
    #[serde(rename = "instancename")]
    pub name: String,
    pub region: String,
    pub zone: String,
    pub arch: String,
    pub cpu_flavor: String,
    pub vpc_id: String,
    pub subnet_id: String,
    pub service_ip: String,
    pub security_group_ids: Vec<String>,
    #[serde(rename = "serverId")]
    pub server_id: String,
    #[serde(rename = "resourceSpecCode")]
    pub resource_spec_code: String,
    pub pool_id: String,
    pub run_status: i64,
    pub access_status: i64,
    pub upgradable: i64,
}

#[derive(Debug, Serialize)]
struct Rename<'b> {
    instancename: &'b str,
}

#[derive(Debug, Serialize)]
struct Migrate<'b> {
    project_id: &'b str,
    resource_type: &'b str,
    resource_id: &'b str,
    region_id: &'b str,
}

fn eps_query(enterprise_project_id: Option<&str>) -> [(&str, &str); 1] {
    [(
        "enterprise_project_id",
        enterprise_project_id.unwrap_or_default(),
    )]
}

pub async fn create(
    client: &ServiceClient,
    enterprise_project_id: Option<&str>,
    instance: &CreateInstance<'_>,
) -> ApiResult<Vec<CreatedInstance>> {
    let response: CreateResponse = client
        .post(INSTANCES, &eps_query(enterprise_project_id), instance)
        .await?;
    Ok(response.instances)
}

pub async fn show(
    client: &ServiceClient,
    id: &str,
    enterprise_project_id: Option<&str>,
) -> ApiResult<Instance> {
    client
        .get(
            &format!("{INSTANCES}/{id}"),
            &eps_query(enterprise_project_id),
        )
        .await
}

pub async fn rename(
    client: &ServiceClient,
    id: &str,
    enterprise_project_id: Option<&str>,
    name: &str,
) -> ApiResult<()> {
    client
        .send_empty(
            reqwest::Method::PUT,
            &format!("{INSTANCES}/{id}"),
            &eps_query(enterprise_project_id),
            Some(&Rename { instancename: name }),
        )
        .await
}

pub async fn delete(
    client: &ServiceClient,
    id: &str,
    enterprise_project_id: Option<&str>,
) -> ApiResult<()> {
    client
        .delete(
            &format!("{INSTANCES}/{id}"),
            &eps_query(enterprise_project_id),
        )
        .await
}

/// Move the instance to another enterprise project, through the EPS service
pub async fn migrate(
    eps_client: &ServiceClient,
    region: &str,
    target_enterprise_project_id: &str,
    id: &str,
) -> ApiResult<()> {
    let body = Migrate {
        project_id: eps_client.project_id(),
        resource_type: "waf-instance",
        resource_id: id,
        region_id: region,
    };
    eps_client
        .send_empty(
            reqwest::Method::POST,
            &format!("v1.0/enterprise-projects/{target_enterprise_project_id}/resources-migrate"),
            &[],
            Some(&body),
        )
        .await
}

pub fn create_conf(pacing: Pacing, timeout: Duration) -> Result<StateChangeConf, WaitError> {
    Ok(StateChangeConf::new([CREATING], [CREATED])?
        .with_pacing(pacing)
        .with_timeout(timeout))
}

pub fn delete_conf(pacing: Pacing, timeout: Duration) -> Result<StateChangeConf, WaitError> {
    Ok(StateChangeConf::new([DELETING], [DELETED])?
        .with_pacing(pacing)
        .with_timeout(timeout))
}

/// Wait for a new instance to be running
pub async fn wait_created(
    client: &ServiceClient,
    id: &str,
    enterprise_project_id: Option<&str>,
    conf: &StateChangeConf,
    cancel: &CancellationToken,
) -> Result<Instance, WaitError> {
    conf.wait(id, cancel, move || async move {
        let instance = show(client, id, enterprise_project_id).await?;
        let status = run_status_label(instance.run_status);
        Ok::<_, ApiError>(Refresh::status(instance, status))
    })
    .await
}

/// Wait for an instance to be deleted
///
/// An instance that cannot be found anymore is deleted: `None` is returned in that case.
pub async fn wait_deleted(
    client: &ServiceClient,
    id: &str,
    enterprise_project_id: Option<&str>,
    conf: &StateChangeConf,
    cancel: &CancellationToken,
) -> Result<Option<Instance>, WaitError> {
    conf.wait(id, cancel, move || async move {
        match show(client, id, enterprise_project_id).await {
            Ok(instance) => {
                let status = run_status_label(instance.run_status);
                Ok(Refresh::status(Some(instance), status))
            }
            Err(err) if err.is_not_found() => Ok(Refresh::status(None, DELETED)),
            Err(err) => Err(err),
        }
    })
    .await
}
