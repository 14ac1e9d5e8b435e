use std::borrow::Cow;
use std::time::Duration;

use async_trait::async_trait;

use tf_provider::schema::Schema;
use tf_provider::value::{Value, ValueEmpty};
use tf_provider::{AttributePath, Diagnostics, Resource};

use crate::client::ServiceClient;
use crate::config::ProviderContext;
use crate::timeouts::{timeout, Operation};
use crate::utils::{replace_on_change, set_strings, unknown_if_null, WithSchema};
use crate::wait::Pacing;

use super::api::{self, job_conf, JobError, JOB_PACING};
use super::state::ImageShareState;

const SERVICE: &str = "ims";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone)]
pub struct ImsImageShareResource {
    context: ProviderContext,
    pacing: Pacing,
}

impl ImsImageShareResource {
    pub fn new(context: ProviderContext) -> Self {
        Self {
            context,
            pacing: JOB_PACING,
        }
    }

    /// Override how often membership jobs are polled
    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }
}

/// Projects to share with, and projects to stop sharing with
fn membership_changes<'b>(
    prior: &'b ImageShareState,
    planned: &'b ImageShareState,
) -> (Vec<&'b str>, Vec<&'b str>) {
    let before = set_strings(&prior.target_project_ids);
    let after = set_strings(&planned.target_project_ids);
    (
        after.difference(&before).copied().collect(),
        before.difference(&after).copied().collect(),
    )
}

impl ImsImageShareResource {
    /// Add or remove members, and wait for the resulting job
    async fn members(
        &self,
        client: &ServiceClient,
        share: bool,
        image_id: &str,
        projects: &[&str],
        timeout: Duration,
    ) -> Result<(), JobError> {
        let job_id = if share {
            api::share(client, image_id, projects).await?
        } else {
            api::unshare(client, image_id, projects).await?
        };
        tracing::debug!(image_id, %job_id, share, "waiting for IMS membership job");

        let conf = job_conf(self.pacing, timeout).map_err(|source| JobError::Wait {
            job_id: job_id.clone(),
            source,
        })?;
        api::wait_job(
            client,
            &job_id,
            &conf,
            self.context.cancellation_token(),
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl Resource for ImsImageShareResource {
    type State<'a> = ImageShareState<'a>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(ImageShareState::schema())
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::State<'a>) -> Option<()> {
        if let Value::Value(image_id) = &config.source_image_id {
            if image_id.is_empty() {
                diags.error_short(
                    "`source_image_id` cannot be empty",
                    AttributePath::new("source_image_id"),
                );
            }
        }
        if let Value::Value(projects) = &config.target_project_ids {
            if projects.is_empty() {
                diags.error_short(
                    "`target_project_ids` cannot be empty",
                    AttributePath::new("target_project_ids"),
                );
            }
            if projects.iter().any(|project| project.is_null()) {
                diags.error_short(
                    "Elements of `target_project_ids` cannot be null",
                    AttributePath::new("target_project_ids"),
                );
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

    /// Memberships cannot be listed per image, the state is kept as is
    async fn read<'a>(
        &self,
        _diags: &mut Diagnostics,
        state: Self::State<'a>,
        private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        Some((state, private_state))
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
        state.id = state.source_image_id.clone();
        unknown_if_null(&mut state.id);
        if state.region.is_null() {
            state.region = Value::Value(Cow::Owned(config.region.clone()));
        }

        Some((state, Default::default()))
    }

    async fn plan_update<'a>(
        &self,
        _diags: &mut Diagnostics,
        prior_state: Self::State<'a>,
        proposed_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        prior_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>, Vec<AttributePath>)> {
        let mut state = proposed_state;
        if state.region.is_null() {
            state.region = prior_state.region.clone();
        }
        state.id = state.source_image_id.clone();
        unknown_if_null(&mut state.id);

        let mut replace = Vec::new();
        replace_on_change(&mut replace, "region", &prior_state.region, &state.region);
        replace_on_change(
            &mut replace,
            "source_image_id",
            &prior_state.source_image_id,
            &state.source_image_id,
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
        let region = config.region(&state.region);
        let client = config.service_client(SERVICE, region);
        let image_id = state.source_image_id.as_deref_option().unwrap_or_default();
        let projects: Vec<&str> = set_strings(&state.target_project_ids).into_iter().collect();

        if let Err(err) = self
            .members(
                &client,
                true,
                image_id,
                &projects,
                timeout(&state.timeouts, Operation::Create, DEFAULT_TIMEOUT),
            )
            .await
        {
            diags.root_error("Failed to share IMS image", err.to_string());
            return None;
        }

        state.region = Value::Value(Cow::Owned(region.to_string()));
        state.id = state.source_image_id.clone();
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
        let client = config.service_client(SERVICE, config.region(&planned_state.region));
        let image_id = planned_state
            .source_image_id
            .as_deref_option()
            .unwrap_or_default();

        let timeout = timeout(&planned_state.timeouts, Operation::Update, DEFAULT_TIMEOUT);
        let (share, unshare) = membership_changes(&prior_state, &planned_state);
        if !share.is_empty() {
            if let Err(err) = self
                .members(&client, true, image_id, &share, timeout)
                .await
            {
                diags.root_error("Failed to share IMS image", err.to_string());
                return None;
            }
        }
        if !unshare.is_empty() {
            if let Err(err) = self
                .members(&client, false, image_id, &unshare, timeout)
                .await
            {
                diags.root_error("Failed to unshare IMS image", err.to_string());
                return None;
            }
        }

        Some((planned_state, planned_private_state))
    }

    async fn destroy<'a>(
        &self,
        diags: &mut Diagnostics,
        prior_state: Self::State<'a>,
        _planned_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<()> {
        let config = self.context.config(diags)?;
        let client = config.service_client(SERVICE, config.region(&prior_state.region));
        let image_id = prior_state
            .source_image_id
            .as_deref_option()
            .unwrap_or_default();
        let projects: Vec<&str> = set_strings(&prior_state.target_project_ids)
            .into_iter()
            .collect();
        if projects.is_empty() {
            return Some(());
        }

        match self
            .members(
                &client,
                false,
                image_id,
                &projects,
                timeout(&prior_state.timeouts, Operation::Delete, DEFAULT_TIMEOUT),
            )
            .await
        {
            Ok(()) => Some(()),
            Err(err) => {
                diags.root_error("Failed to unshare IMS image", err.to_string());
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use mockito::{Matcher, Mock, Server};
    use serde_json::json;

    use crate::config::{Config, ProviderState};
    use crate::timeouts::StateTimeouts;

    use super::*;

    fn context(endpoint: &str) -> ProviderContext {
        let state = ProviderState {
            region: Value::Value("cn-north-4".into()),
            project_id: Value::Value("p-1".into()),
            auth_token: Value::Value("token".into()),
            endpoints: Value::Value(
                [("ims".into(), Value::Value(endpoint.to_string().into()))]
                    .into_iter()
                    .collect(),
            ),
            ..Default::default()
        };
        let context = ProviderContext::default();
        let mut diags = Diagnostics::default();
        let config = Config::new(&mut diags, &state, |_| None).unwrap();
        context.configure(&mut diags, config).unwrap();
        context
    }

    fn fast() -> Pacing {
        Pacing::new(Duration::ZERO, Duration::from_millis(10))
    }

    async fn job(server: &mut Server, job_id: &str) -> Mock {
        server
            .mock("GET", format!("/v1/p-1/jobs/{job_id}").as_str())
            .with_status(200)
            .with_body(json!({"job_id": job_id, "status": "SUCCESS"}).to_string())
            .create_async()
            .await
    }

    fn share_state(projects: &[&'static str]) -> ImageShareState<'static> {
        ImageShareState {
            id: Value::Value("img-1".into()),
            region: Value::Value("cn-north-4".into()),
            source_image_id: Value::Value("img-1".into()),
            target_project_ids: Value::Value(
                projects
                    .iter()
                    .map(|project| Value::Value(Cow::Borrowed(*project)))
                    .collect(),
            ),
            timeouts: Value::Null,
        }
    }

    #[test]
    fn membership_diff() {
        let prior = share_state(&["p-1", "p-2"]);
        let planned = share_state(&["p-2", "p-3"]);
        assert_eq!(
            membership_changes(&prior, &planned),
            (vec!["p-3"], vec!["p-1"])
        );
        assert_eq!(
            membership_changes(&prior, &prior.clone()),
            (vec![], vec![])
        );
    }

    #[tokio::test]
    async fn invalid_timeouts_are_rejected() {
        let resource = ImsImageShareResource::new(ProviderContext::default());
        let mut state = share_state(&["p-1"]);
        state.timeouts = Value::Value(StateTimeouts {
            create: Value::Value("ten minutes".into()),
            ..Default::default()
        });
        let mut diags = Diagnostics::default();

        assert!(resource.validate(&mut diags, state).await.is_none());
        assert_eq!(
            diags.errors[0].attribute,
            AttributePath::new("timeouts").index(0).attribute("create")
        );
    }

    #[tokio::test]
    async fn plan_update_replaces_on_source_image() {
        let resource = ImsImageShareResource::new(ProviderContext::default());
        let prior = share_state(&["p-1"]);
        let mut proposed = share_state(&["p-1"]);
        proposed.source_image_id = Value::Value("img-2".into());
        let mut diags = Diagnostics::default();

        let (state, _, replace) = resource
            .plan_update(
                &mut diags,
                prior.clone(),
                proposed.clone(),
                proposed,
                Default::default(),
                Default::default(),
            )
            .await
            .unwrap();

        assert_eq!(replace, vec![AttributePath::new("source_image_id")]);
        assert_eq!(state.id, Value::Value("img-2".into()));
    }

    #[tokio::test]
    async fn create_shares_and_waits() {
        let mut server = Server::new_async().await;
        let share = server
            .mock("POST", "/v1/cloudimages/members")
            .match_body(Matcher::Json(json!({
                "images": ["img-1"],
                "projects": ["p-2"]
            })))
            .with_status(200)
            .with_body(r#"{"job_id": "job-9"}"#)
            .create_async()
            .await;
        let share_job = job(&mut server, "job-9").await;

        let resource = ImsImageShareResource::new(context(&server.url())).with_pacing(fast());
        let mut diags = Diagnostics::default();
        let mut planned = share_state(&["p-2"]);
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
        assert_eq!(state.id, Value::Value("img-1".into()));
        share.assert_async().await;
        share_job.assert_async().await;
    }

    #[tokio::test]
    async fn plan_keeps_unknown_region() {
        let resource = ImsImageShareResource::new(context("http://127.0.0.1:1"));
        let mut proposed = share_state(&["p-1"]);
        proposed.region = Value::Unknown;
        let mut diags = Diagnostics::default();

        let (state, _) = resource
            .plan_create(
                &mut diags,
                proposed.clone(),
                proposed.clone(),
                Default::default(),
            )
            .await
            .unwrap();
        assert_eq!(state.region, Value::Unknown);

        let (state, _, _) = resource
            .plan_update(
                &mut diags,
                share_state(&["p-1"]),
                proposed.clone(),
                proposed,
                Default::default(),
                Default::default(),
            )
            .await
            .unwrap();
        assert_eq!(state.region, Value::Unknown);
    }

    #[tokio::test]
    async fn update_shares_and_unshares() {
        let mut server = Server::new_async().await;
        let share = server
            .mock("POST", "/v1/cloudimages/members")
            .match_body(Matcher::Json(json!({
                "images": ["img-1"],
                "projects": ["p-3"]
            })))
            .with_status(200)
            .with_body(r#"{"job_id": "job-a"}"#)
            .create_async()
            .await;
        let unshare = server
            .mock("DELETE", "/v1/cloudimages/members")
            .match_body(Matcher::Json(json!({
                "images": ["img-1"],
                "projects": ["p-1"]
            })))
            .with_status(200)
            .with_body(r#"{"job_id": "job-b"}"#)
            .create_async()
            .await;
        let share_job = job(&mut server, "job-a").await;
        let unshare_job = job(&mut server, "job-b").await;

        let resource = ImsImageShareResource::new(context(&server.url())).with_pacing(fast());
        let mut planned = share_state(&["p-2", "p-3"]);
        // Membership changes are bound by the update timeout only
        planned.timeouts = Value::Value(StateTimeouts {
            create: Value::Value("0s".into()),
            update: Value::Value("1m".into()),
            delete: Value::Value("0s".into()),
        });
        let mut diags = Diagnostics::default();

        let (state, _) = resource
            .update(
                &mut diags,
                share_state(&["p-1", "p-2"]),
                planned.clone(),
                planned,
                Default::default(),
                Default::default(),
            )
            .await
            .unwrap();

        assert!(diags.errors.is_empty(), "{diags:?}");
        assert_eq!(state.target_project_ids, share_state(&["p-2", "p-3"]).target_project_ids);
        share.assert_async().await;
        unshare.assert_async().await;
        share_job.assert_async().await;
        unshare_job.assert_async().await;
    }

    #[tokio::test]
    async fn destroy_unshares_all_projects() {
        let mut server = Server::new_async().await;
        let unshare = server
            .mock("DELETE", "/v1/cloudimages/members")
            .match_body(Matcher::Json(json!({
                "images": ["img-1"],
                "projects": ["p-1", "p-2"]
            })))
            .with_status(200)
            .with_body(r#"{"job_id": "job-c"}"#)
            .create_async()
            .await;
        let unshare_job = job(&mut server, "job-c").await;

        let resource = ImsImageShareResource::new(context(&server.url())).with_pacing(fast());
        let mut diags = Diagnostics::default();

        let result = resource
            .destroy(
                &mut diags,
                share_state(&["p-1", "p-2"]),
                Default::default(),
                Default::default(),
            )
            .await;

        assert_eq!(result, Some(()));
        assert!(diags.errors.is_empty(), "{diags:?}");
        unshare.assert_async().await;
        unshare_job.assert_async().await;
    }
}
