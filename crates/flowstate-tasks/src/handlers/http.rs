//! JSON-over-HTTP task handler.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use crate::error::TaskError;
use crate::invoker::TaskHandler;

/// Task handler that POSTs the parameter document as JSON to a fixed
/// endpoint and returns the JSON response body.
///
/// Whether the endpoint completes the operation before responding (`.sync`
/// semantics) or merely accepts it is the endpoint's contract; the handler
/// returns when the HTTP exchange does.
pub struct HttpHandler {
    resource: String,
    url: String,
    client: reqwest::Client,
}

impl HttpHandler {
    /// Create a handler for `resource` targeting `url`.
    pub fn new(resource: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            url: url.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Create a handler whose HTTP exchanges are bounded by `timeout`.
    pub fn with_timeout(
        resource: impl Into<String>,
        url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, TaskError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            resource: resource.into(),
            url: url.into(),
            client,
        })
    }
}

#[async_trait]
impl TaskHandler for HttpHandler {
    fn resource(&self) -> &str {
        &self.resource
    }

    async fn call(&self, params: &Value) -> Result<Value, TaskError> {
        tracing::debug!(resource = %self.resource, url = %self.url, "POST task parameters");

        let response = self.client.post(&self.url).json(params).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TaskError::Http(format!("{}: {}", status, body)));
        }

        let output = response.json().await?;
        Ok(output)
    }
}

impl std::fmt::Debug for HttpHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpHandler")
            .field("resource", &self.resource)
            .field("url", &self.url)
            .finish()
    }
}
