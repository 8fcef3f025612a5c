//! REST client for the serverless compute surface.
//!
//! Spawns named functions of a deployed compute application using
//! [`reqwest`]. Spawning is asynchronous on the remote side: a 2xx response
//! means the call was queued, not that it finished.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::backend::{ComputeBackend, ComputeError, ComputeRequest};

/// HTTP client for one compute application.
pub struct ComputeApi {
    client: reqwest::Client,
    api_url: String,
    app: String,
}

/// Response returned by the spawn endpoint.
#[derive(Debug, Deserialize)]
pub struct SpawnResponse {
    /// Server-assigned identifier of the queued call, when provided.
    #[serde(default)]
    pub call_id: Option<String>,
}

impl ComputeApi {
    /// Create a client for `app` hosted at `api_url` (e.g. `http://host:8001`).
    ///
    /// `timeout` bounds a single spawn request, not the computation.
    pub fn new(api_url: String, app: String, timeout: Duration) -> Result<Self, ComputeError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, api_url, app))
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, api_url: String, app: String) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            app,
        }
    }

    /// URL of the spawn endpoint for `function`.
    pub fn spawn_url(&self, function: &str) -> String {
        format!(
            "{}/apps/{}/functions/{}/spawn",
            self.api_url, self.app, function
        )
    }

    /// Queue `request` on the compute surface.
    pub async fn spawn_function(
        &self,
        request: &ComputeRequest,
    ) -> Result<SpawnResponse, ComputeError> {
        let response = self
            .client
            .post(self.spawn_url(&request.function))
            .json(request)
            .send()
            .await?;

        let response = Self::ensure_success(response).await?;
        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(SpawnResponse { call_id: None });
        }
        Ok(serde_json::from_str(&body).unwrap_or(SpawnResponse { call_id: None }))
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or a [`ComputeError::ApiError`]
    /// containing the status and body text on failure.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ComputeError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ComputeError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl ComputeBackend for ComputeApi {
    async fn spawn(&self, request: &ComputeRequest) -> Result<(), ComputeError> {
        let spawned = self.spawn_function(request).await?;
        tracing::info!(
            job_id = %request.job_id,
            function = %request.function,
            call_id = spawned.call_id.as_deref().unwrap_or("-"),
            "Compute function spawned",
        );
        Ok(())
    }
}
