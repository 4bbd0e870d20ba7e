//! HTTP client for the Portainer REST API.

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

use crate::error::{Error, Result};
use crate::portainer::types::{Stack, StackFile};
use crate::portainer::ControlPlane;
use crate::VERSION;

/// Header Portainer reads API keys from.
const API_KEY_HEADER: &str = "X-API-Key";

/// User agent string for API requests.
fn user_agent() -> String {
    format!("portainer-mcp/{} (rust)", VERSION)
}

/// API client for Portainer.
#[derive(Debug, Clone)]
pub struct PortainerClient {
    client: Client,
    base_url: String,
    api_key: String,
    timeout: Duration,
}

impl PortainerClient {
    /// Create a new API client. Every call is bounded by `timeout`.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent())
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            timeout,
        })
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Make an authenticated GET request and decode the JSON body.
    async fn get<R: DeserializeOwned>(&self, path: &str) -> Result<R> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        debug!("GET {}", url);

        self.bounded(async {
            let response = self
                .client
                .get(&url)
                .header(API_KEY_HEADER, &self.api_key)
                .send()
                .await?;

            Self::handle_response(response).await
        })
        .await
    }

    /// Handle API response, extracting errors.
    async fn handle_response<R: DeserializeOwned>(response: Response) -> Result<R> {
        let status = response.status();

        if !status.is_success() {
            let status_text = status.canonical_reason().unwrap_or("Unknown");
            let body = response.text().await.unwrap_or_default();
            return Err(Error::api(status.as_u16(), status_text, body));
        }

        Ok(response.json().await?)
    }

    /// Apply the call timeout, folding reqwest's own timeout into the same error.
    async fn bounded<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        let millis = self.timeout.as_millis() as u64;
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Err(Error::Http(e))) if e.is_timeout() => Err(Error::Timeout { millis }),
            Ok(result) => result,
            Err(_) => Err(Error::Timeout { millis }),
        }
    }
}

#[async_trait]
impl ControlPlane for PortainerClient {
    async fn list_stacks(&self) -> Result<Vec<Stack>> {
        self.get("api/stacks").await
    }

    async fn get_stack_file(&self, stack_id: i64) -> Result<Option<String>> {
        let file: StackFile = self.get(&format!("api/stacks/{}/file", stack_id)).await?;
        Ok(file.into_content())
    }
}
