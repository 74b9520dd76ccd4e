//! JSON-over-HTTP client for the remote execution platform.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::errors::BenchError;
use crate::platform::{BuildStatus, Platform, RunHandle};
use crate::types::{FileTree, RunRequest};

pub struct HttpPlatform {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    retry_on_resource_exhaustion: bool,
}

#[derive(Deserialize)]
struct Created {
    id: String,
}

#[derive(Deserialize)]
struct BuildBody {
    status: BuildStatus,
}

#[derive(Deserialize)]
struct BatchBody {
    runs: Vec<RunHandle>,
}

impl HttpPlatform {
    /// Every request, body included, is abandoned after `request_timeout`.
    pub fn new(base_url: &str, token: Option<String>, request_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            retry_on_resource_exhaustion: true,
        })
    }

    /// Whether submitted batches ask the platform to retry runs that could
    /// not obtain resources.
    pub fn with_resource_retry(mut self, enabled: bool) -> Self {
        self.retry_on_resource_exhaustion = enabled;
        self
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let rb = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        match &self.token {
            Some(token) => rb.bearer_auth(token),
            None => rb,
        }
    }

    async fn send(&self, operation: &'static str, rb: RequestBuilder) -> Result<Response> {
        let response = rb
            .send()
            .await
            .with_context(|| format!("Platform request '{operation}' could not be sent"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BenchError::Platform {
                operation,
                status: status.as_u16(),
                body,
            }
            .into());
        }

        tracing::debug!(operation, status = status.as_u16(), "platform request ok");
        Ok(response)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        rb: RequestBuilder,
    ) -> Result<T> {
        let response = self.send(operation, rb).await?;
        response
            .json::<T>()
            .await
            .with_context(|| format!("Platform response to '{operation}' was not the expected JSON"))
    }
}

#[async_trait]
impl Platform for HttpPlatform {
    async fn create_task(&self, name: &str) -> Result<String> {
        let rb = self
            .request(Method::POST, "/tasks")
            .json(&json!({ "name": name }));
        let created: Created = self.send_json("create task", rb).await?;
        Ok(created.id)
    }

    async fn publish_version(
        &self,
        task_id: &str,
        label: &str,
        files: &FileTree,
    ) -> Result<String> {
        let rb = self
            .request(Method::POST, &format!("/tasks/{task_id}/versions"))
            .json(&json!({ "label": label, "files": files }));
        let created: Created = self.send_json("publish version", rb).await?;
        Ok(created.id)
    }

    async fn start_build(&self, task_id: &str, version_id: &str) -> Result<String> {
        let rb = self
            .request(Method::POST, &format!("/tasks/{task_id}/builds"))
            .json(&json!({ "versionId": version_id }));
        let created: Created = self.send_json("start build", rb).await?;
        Ok(created.id)
    }

    async fn build_status(&self, build_id: &str) -> Result<BuildStatus> {
        let rb = self.request(Method::GET, &format!("/builds/{build_id}"));
        let body: BuildBody = self.send_json("build status", rb).await?;
        Ok(body.status)
    }

    async fn submit_batch(&self, task_id: &str, runs: &[RunRequest]) -> Result<String> {
        let rb = self
            .request(Method::POST, &format!("/tasks/{task_id}/batches"))
            .json(&json!({
                "runs": runs,
                "retryOnResourceExhaustion": self.retry_on_resource_exhaustion,
            }));
        let created: Created = self.send_json("submit batch", rb).await?;
        Ok(created.id)
    }

    async fn batch_status(&self, batch_id: &str) -> Result<Vec<RunHandle>> {
        let rb = self.request(Method::GET, &format!("/batches/{batch_id}"));
        let body: BatchBody = self.send_json("batch status", rb).await?;
        Ok(body.runs)
    }

    async fn cancel_batch(&self, batch_id: &str) -> Result<()> {
        let rb = self.request(Method::POST, &format!("/batches/{batch_id}/cancel"));
        self.send("cancel batch", rb).await?;
        Ok(())
    }

    async fn fetch_log(&self, run_id: &str) -> Result<String> {
        let rb = self.request(Method::GET, &format!("/runs/{run_id}/logs"));
        let response = self.send("fetch log", rb).await?;
        response
            .text()
            .await
            .with_context(|| format!("Failed to read log body for run {run_id}"))
    }

    async fn delete_task(&self, task_id: &str) -> Result<()> {
        let rb = self.request(Method::DELETE, &format!("/tasks/{task_id}"));
        self.send("delete task", rb).await?;
        Ok(())
    }
}
