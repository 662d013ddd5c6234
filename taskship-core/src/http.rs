//! Production [`WebClient`] backed by `reqwest`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CACHE_CONTROL, PRAGMA};
use reqwest::Client;

use crate::contract::{ApiError, WebClient};

pub struct ReqwestWebClient {
    client: Client,
    probe_timeout: Duration,
    post_timeout: Duration,
}

impl ReqwestWebClient {
    pub fn new() -> Result<Self, ApiError> {
        Self::with_timeouts(Duration::from_secs(20), Duration::from_secs(60))
    }

    pub fn with_timeouts(probe_timeout: Duration, post_timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .user_agent(concat!("taskship/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            probe_timeout,
            post_timeout,
        })
    }
}

#[async_trait]
impl WebClient for ReqwestWebClient {
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, ApiError> {
        let response = self
            .client
            .get(url)
            .timeout(self.probe_timeout)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn probe(&self, url: &str) -> Result<u16, ApiError> {
        let response = self
            .client
            .get(url)
            .header(CACHE_CONTROL, "no-cache")
            .header(PRAGMA, "no-cache")
            .timeout(self.probe_timeout)
            .send()
            .await?;
        Ok(response.status().as_u16())
    }

    async fn post_json(&self, url: &str, body: &serde_json::Value) -> Result<u16, ApiError> {
        let response = self
            .client
            .post(url)
            .json(body)
            .timeout(self.post_timeout)
            .send()
            .await?;
        let status = response.status().as_u16();
        if status != 200 {
            let text = response.text().await.unwrap_or_default();
            tracing::debug!(url, status, body = %text, "Non-200 response to POST");
        }
        Ok(status)
    }
}
