use std::sync::Mutex;
use std::time::Duration;

use reqwest::Method;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::client::{ApiError, ApiResult, ServiceClient};
use crate::wait::{Pacing, Refresh, StateChangeConf, WaitError};

const MEMBERS: &str = "v1/cloudimages/members";

pub const JOB_PENDING: [&str; 2] = ["INIT", "RUNNING"];
pub const JOB_TARGET: [&str; 1] = ["SUCCESS"];
const JOB_FAILED: &str = "FAIL";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct ImageMembers<'b> {
    images: [&'b str; 1],
    projects: &'b [&'b str],
}

#[derive(Debug, Deserialize)]
struct JobCreated {
    job_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Job {
    #[serde(default)]
    pub job_id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub fail_reason: Option<String>,
    #[serde(default)]
    pub error_code: Option<String>,
}

#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("job {job_id} failed: {reason}")]
    Failed { job_id: String, reason: String },
    #[error("error waiting for job {job_id}: {source}")]
    Wait {
        job_id: String,
        #[source]
        source: WaitError,
    },
}

pub const JOB_PACING: Pacing = Pacing::new(Duration::from_secs(1), Duration::from_secs(1));

/// Poll configuration of IMS jobs
pub fn job_conf(pacing: Pacing, timeout: Duration) -> Result<StateChangeConf, WaitError> {
    Ok(StateChangeConf::new(JOB_PENDING, JOB_TARGET)?
        .with_pacing(pacing)
        .with_timeout(timeout))
}

async fn members(
    client: &ServiceClient,
    method: Method,
    image_id: &str,
    projects: &[&str],
) -> ApiResult<String> {
    let body = ImageMembers {
        images: [image_id],
        projects,
    };
    let job: JobCreated = client.request(method, MEMBERS, &[], Some(&body)).await?;
    Ok(job.job_id)
}

/// Share an image with projects, returns the id of the sharing job
pub async fn share(client: &ServiceClient, image_id: &str, projects: &[&str]) -> ApiResult<String> {
    members(client, Method::POST, image_id, projects).await
}

/// Stop sharing an image with projects, returns the id of the job
pub async fn unshare(
    client: &ServiceClient,
    image_id: &str,
    projects: &[&str],
) -> ApiResult<String> {
    members(client, Method::DELETE, image_id, projects).await
}

pub async fn show_job(client: &ServiceClient, job_id: &str) -> ApiResult<Job> {
    client.get(&format!("v1/{{project_id}}/jobs/{job_id}"), &[]).await
}

/// Wait for a job to succeed
pub async fn wait_job(
    client: &ServiceClient,
    job_id: &str,
    conf: &StateChangeConf,
    cancel: &CancellationToken,
) -> Result<Job, JobError> {
    let failure = Mutex::new(None);
    let failure_reason = &failure;
    let result = conf
        .wait(job_id, cancel, move || async move {
            let job = show_job(client, job_id).await?;
            if job.status == JOB_FAILED {
                if let Ok(mut reason) = failure_reason.lock() {
                    *reason = job.fail_reason.clone().or_else(|| job.error_code.clone());
                }
            }
            let status = job.status.clone();
            Ok::<_, ApiError>(Refresh::status(job, status))
        })
        .await;

    match result {
        Ok(job) => Ok(job),
        Err(WaitError::UnexpectedState { status, .. }) if status == JOB_FAILED => {
            let reason = failure
                .into_inner()
                .ok()
                .flatten()
                .unwrap_or_else(|| "unknown reason".to_string());
            Err(JobError::Failed {
                job_id: job_id.to_string(),
                reason,
            })
        }
        Err(source) => Err(JobError::Wait {
            job_id: job_id.to_string(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use mockito::{Matcher, Server};
    use serde_json::json;

    use super::*;

    fn fast_conf() -> StateChangeConf {
        job_conf(JOB_PACING, Duration::from_secs(5))
            .unwrap()
            .with_delay(Duration::ZERO)
            .with_poll_interval(Duration::from_millis(10))
    }

    fn client(server: &Server) -> ServiceClient {
        ServiceClient::new(reqwest::Client::new(), server.url(), "p-1", None)
    }

    #[tokio::test]
    async fn share_returns_job() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/cloudimages/members")
            .match_body(Matcher::Json(json!({
                "images": ["img-1"],
                "projects": ["p-2", "p-3"]
            })))
            .with_status(200)
            .with_body(r#"{"job_id": "job-1"}"#)
            .create_async()
            .await;

        let job_id = share(&client(&server), "img-1", &["p-2", "p-3"])
            .await
            .unwrap();

        assert_eq!(job_id, "job-1");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn unshare_sends_delete_with_body() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("DELETE", "/v1/cloudimages/members")
            .match_body(Matcher::Json(json!({
                "images": ["img-1"],
                "projects": ["p-2"]
            })))
            .with_status(200)
            .with_body(r#"{"job_id": "job-2"}"#)
            .create_async()
            .await;

        let job_id = unshare(&client(&server), "img-1", &["p-2"]).await.unwrap();

        assert_eq!(job_id, "job-2");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn job_succeeds() {
        let mut server = Server::new_async().await;
        let running = server
            .mock("GET", "/v1/p-1/jobs/job-1")
            .with_status(200)
            .with_body(r#"{"job_id": "job-1", "status": "RUNNING"}"#)
            .expect(2)
            .create_async()
            .await;
        let success = server
            .mock("GET", "/v1/p-1/jobs/job-1")
            .with_status(200)
            .with_body(r#"{"job_id": "job-1", "status": "SUCCESS"}"#)
            .expect(1)
            .create_async()
            .await;

        let job = wait_job(
            &client(&server),
            "job-1",
            &fast_conf(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(job.status, "SUCCESS");
        running.assert_async().await;
        success.assert_async().await;
    }

    #[tokio::test]
    async fn job_fails_with_reason() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/v1/p-1/jobs/job-3")
            .with_status(200)
            .with_body(
                r#"{"job_id": "job-3", "status": "FAIL", "fail_reason": "image is not shareable"}"#,
            )
            .create_async()
            .await;

        let err = wait_job(
            &client(&server),
            "job-3",
            &fast_conf(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

        match err {
            JobError::Failed { job_id, reason } => {
                assert_eq!(job_id, "job-3");
                assert_eq!(reason, "image is not shareable");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn job_lookup_error_is_fatal() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/v1/p-1/jobs/job-4")
            .with_status(500)
            .with_body("internal error")
            .expect(1)
            .create_async()
            .await;

        let err = wait_job(
            &client(&server),
            "job-4",
            &fast_conf(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            JobError::Wait {
                source: WaitError::Fetch { .. },
                ..
            }
        ));
        mock.assert_async().await;
    }
}
