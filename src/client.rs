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

//! HTTP client for HuaweiCloud service endpoints

use reqwest::{Method, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

/// Errors returned by [`ServiceClient`]
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{method} {url} failed: {source}")]
    Transport {
        method: Method,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{method} {url}: resource not found")]
    NotFound {
        method: Method,
        url: String,
        body: String,
    },

    #[error("{method} {url} returned {status}: {body}")]
    Status {
        method: Method,
        url: String,
        status: u16,
        body: String,
    },

    #[error("unable to decode the response of {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound { .. })
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Client bound to the endpoint of a single service in a single region
#[derive(Debug, Clone)]
pub struct ServiceClient {
    http: reqwest::Client,
    endpoint: String,
    project_id: String,
    token: Option<String>,
}

impl ServiceClient {
    /// Create a client
    ///
    /// # Arguments
    ///
    /// * `http` - Shared HTTP client (connection pool, TLS and timeout settings)
    /// * `endpoint` - Base URL of the service, a trailing `/` is added if missing
    /// * `project_id` - Project substituted in `{project_id}` path placeholders
    /// * `token` - IAM token sent in the `X-Auth-Token` header
    pub fn new(
        http: reqwest::Client,
        endpoint: impl Into<String>,
        project_id: impl Into<String>,
        token: Option<String>,
    ) -> Self {
        let mut endpoint = endpoint.into();
        if !endpoint.ends_with('/') {
            endpoint.push('/');
        }
        Self {
            http,
            endpoint,
            project_id: project_id.into(),
            token,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Full URL of `path`, relative to the endpoint
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}{}",
            self.endpoint,
            path.trim_start_matches('/')
                .replace("{project_id}", &self.project_id)
        )
    }

    /// Send a request and return the raw body of a successful response
    pub async fn send<B>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&B>,
    ) -> ApiResult<String>
    where
        B: Serialize + ?Sized,
    {
        let url = self.url(path);
        let mut request = self.http.request(method.clone(), &url);
        if let Some(token) = &self.token {
            request = request
                .header("X-Auth-Token", token)
                .header("X-Project-Id", &self.project_id);
        }
        let query: Vec<_> = query.iter().filter(|(_, v)| !v.is_empty()).collect();
        if !query.is_empty() {
            request = request.query(&query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        tracing::debug!(%method, %url, "sending request");
        let transport = |source| ApiError::Transport {
            method: method.clone(),
            url: url.clone(),
            source,
        };
        let response = request.send().await.map_err(transport)?;
        let status = response.status();
        let text = response.text().await.map_err(transport)?;

        if status.is_success() {
            Ok(text)
        } else if status == StatusCode::NOT_FOUND {
            Err(ApiError::NotFound {
                method,
                url,
                body: text,
            })
        } else {
            Err(ApiError::Status {
                method,
                url,
                status: status.as_u16(),
                body: text,
            })
        }
    }

    /// Send a request and decode the JSON body of a successful response
    pub async fn request<B, R>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&B>,
    ) -> ApiResult<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let text = self.send(method, path, query, body).await?;
        let text = if text.trim().is_empty() { "null" } else { &text };
        serde_json::from_str(text).map_err(|source| ApiError::Decode {
            url: self.url(path),
            source,
        })
    }

    pub async fn get<R: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> ApiResult<R> {
        self.request::<(), R>(Method::GET, path, query, None).await
    }

    pub async fn post<B, R>(&self, path: &str, query: &[(&str, &str)], body: &B) -> ApiResult<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        self.request(Method::POST, path, query, Some(body)).await
    }

    pub async fn put<B, R>(&self, path: &str, query: &[(&str, &str)], body: &B) -> ApiResult<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        self.request(Method::PUT, path, query, Some(body)).await
    }

    /// Send a request, discarding the body of a successful response
    pub async fn send_empty<B>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&B>,
    ) -> ApiResult<()>
    where
        B: Serialize + ?Sized,
    {
        self.send(method, path, query, body).await.map(|_| ())
    }

    pub async fn delete(&self, path: &str, query: &[(&str, &str)]) -> ApiResult<()> {
        self.send_empty::<()>(Method::DELETE, path, query, None)
            .await
    }
}
