// This file is part of the terraform-provider-huaweicloud project
//
// Copyright (C) ANEO, 2024-2024. All rights reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License")
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Polling of asynchronous cloud operations
//!
//! Most HuaweiCloud APIs return as soon as a request has been accepted, and the actual work
//! (provisioning an instance, running a background job) happens afterwards.
//! [`StateChangeConf`] bridges this to the synchronous CRUD contract of Terraform:
//! it probes the remote status until it reaches one of the target labels.

use std::collections::BTreeSet;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::{sleep, sleep_until, Instant};
use tokio_util::sync::CancellationToken;

/// Result of a single probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Refresh<T> {
    /// The remote entity reported a status
    Status { payload: T, status: String },
    /// The probe could not observe the status, but polling should go on
    Retry { reason: String },
}

impl<T> Refresh<T> {
    pub fn status<S: Into<String>>(payload: T, status: S) -> Self {
        Self::Status {
            payload,
            status: status.into(),
        }
    }
}

/// Reasons a wait can fail
#[derive(Debug, Error)]
pub enum WaitError {
    #[error("pending and target states overlap: {0:?}")]
    InvalidConfig(Vec<String>),

    #[error("error while refreshing the state of {id} (last state: {}): {message}", fmt_last(.last_status))]
    Fetch {
        id: String,
        last_status: Option<String>,
        message: String,
    },

    #[error("unexpected state '{status}' for {id}, wanted target '{}'", .expected.join(", "))]
    UnexpectedState {
        id: String,
        status: String,
        expected: Vec<String>,
    },

    #[error("timeout while waiting for {id} to become '{}' (last state: {}, timeout: {timeout:?})", .expected.join(", "), fmt_last(.last_status))]
    Timeout {
        id: String,
        last_status: Option<String>,
        expected: Vec<String>,
        timeout: Duration,
    },

    #[error("cancelled while waiting for {id} (last state: {})", fmt_last(.last_status))]
    Cancelled {
        id: String,
        last_status: Option<String>,
    },
}

fn fmt_last(last: &Option<String>) -> &str {
    last.as_deref().unwrap_or("none")
}

impl WaitError {
    /// Last status observed before the failure, if any
    pub fn last_status(&self) -> Option<&str> {
        match self {
            WaitError::Fetch { last_status, .. }
            | WaitError::Timeout { last_status, .. }
            | WaitError::Cancelled { last_status, .. } => last_status.as_deref(),
            WaitError::UnexpectedState { status, .. } => Some(status),
            WaitError::InvalidConfig(_) => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, WaitError::Timeout { .. } | WaitError::Cancelled { .. })
    }
}

/// Initial delay and interval between two probes of a wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    pub delay: Duration,
    pub poll_interval: Duration,
}

impl Pacing {
    pub const fn new(delay: Duration, poll_interval: Duration) -> Self {
        Self {
            delay,
            poll_interval,
        }
    }
}

/// Configuration of a single wait
///
/// A configuration only lives for the duration of one [`StateChangeConf::wait`] call:
/// nothing is kept between calls, and concurrent waits share no state.
#[derive(Debug, Clone)]
pub struct StateChangeConf {
    pending: BTreeSet<String>,
    target: BTreeSet<String>,
    delay: Duration,
    poll_interval: Duration,
    timeout: Duration,
    continuous_target_occurence: u32,
}

impl StateChangeConf {
    /// Create a configuration waiting for any `target` label while the status is in `pending`
    ///
    /// Defaults: no initial delay, 10s between probes, 5 minutes timeout.
    pub fn new<P, T, S>(pending: P, target: T) -> Result<Self, WaitError>
    where
        P: IntoIterator<Item = S>,
        T: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let pending: BTreeSet<String> = pending.into_iter().map(Into::into).collect();
        let target: BTreeSet<String> = target.into_iter().map(Into::into).collect();

        let overlap: Vec<String> = pending.intersection(&target).cloned().collect();
        if !overlap.is_empty() {
            return Err(WaitError::InvalidConfig(overlap));
        }
        if target.is_empty() {
            return Err(WaitError::InvalidConfig(Vec::new()));
        }

        Ok(Self {
            pending,
            target,
            delay: Duration::ZERO,
            poll_interval: Duration::from_secs(10),
            timeout: Duration::from_secs(300),
            continuous_target_occurence: 1,
        })
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_pacing(self, pacing: Pacing) -> Self {
        self.with_delay(pacing.delay)
            .with_poll_interval(pacing.poll_interval)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Number of consecutive probes that must report a target state (at least 1)
    pub fn with_continuous_target_occurence(mut self, occurences: u32) -> Self {
        self.continuous_target_occurence = occurences.max(1);
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn expected(&self) -> Vec<String> {
        self.target.iter().cloned().collect()
    }

    /// Probe `refresh` until a target state is reached
    ///
    /// # Arguments
    ///
    /// * `id` - Opaque identifier of the remote entity, used in errors and logs
    /// * `cancel` - Cancellation signal of the surrounding call
    /// * `refresh` - Probe returning the current status of the entity
    ///
    /// # Remarks
    ///
    /// A status that is neither pending nor target stops the wait immediately.
    /// An error returned by `refresh` is fatal; probes that want to tolerate transient
    /// failures must return [`Refresh::Retry`] instead.
    /// Both sleeps and probes are raced against the deadline and the cancellation token.
    pub async fn wait<T, E, F, Fut>(
        &self,
        id: &str,
        cancel: &CancellationToken,
        mut refresh: F,
    ) -> Result<T, WaitError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Refresh<T>, E>>,
        E: Display,
    {
        let deadline = Instant::now() + self.timeout;
        let mut last_status: Option<String> = None;
        let mut target_occurence = 0;
        let mut attempt = 0u32;
        let mut delay = self.delay;

        loop {
            if !delay.is_zero() {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(self.cancelled(id, last_status)),
                    _ = sleep_until(deadline) => return Err(self.timed_out(id, last_status)),
                    _ = sleep(delay) => {}
                }
            }
            delay = self.poll_interval;

            attempt += 1;
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(self.cancelled(id, last_status)),
                _ = sleep_until(deadline) => return Err(self.timed_out(id, last_status)),
                outcome = refresh() => outcome,
            };

            match outcome {
                Err(err) => {
                    return Err(WaitError::Fetch {
                        id: id.to_string(),
                        last_status,
                        message: err.to_string(),
                    });
                }
                Ok(Refresh::Retry { reason }) => {
                    tracing::debug!(id, attempt, reason = %reason, "state refresh will be retried");
                    target_occurence = 0;
                }
                Ok(Refresh::Status { payload, status }) => {
                    tracing::debug!(id, attempt, status = %status, "refreshed state");
                    if self.target.contains(&status) {
                        target_occurence += 1;
                        if target_occurence >= self.continuous_target_occurence {
                            return Ok(payload);
                        }
                    } else if self.pending.contains(&status) {
                        target_occurence = 0;
                    } else {
                        return Err(WaitError::UnexpectedState {
                            id: id.to_string(),
                            status,
                            expected: self.expected(),
                        });
                    }
                    last_status = Some(status);
                }
            }
        }
    }

    fn timed_out(&self, id: &str, last_status: Option<String>) -> WaitError {
        WaitError::Timeout {
            id: id.to_string(),
            last_status,
            expected: self.expected(),
            timeout: self.timeout,
        }
    }

    fn cancelled(&self, id: &str, last_status: Option<String>) -> WaitError {
        WaitError::Cancelled {
            id: id.to_string(),
            last_status,
        }
    }
}
