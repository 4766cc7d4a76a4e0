use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::app::{NexaError, Result};
use crate::fetcher::{FetchError, Fetcher};

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_USER_AGENT: &str = "nexa/1.0";

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        Self::with_options(Duration::from_secs(DEFAULT_TIMEOUT_SECS), DEFAULT_USER_AGENT)
    }

    pub fn with_options(timeout: Duration, user_agent: &str) -> Result<Self> {
        // Connections are never kept idle, so no two fetches share one.
        let client = Client::builder()
            .timeout(timeout)
            .gzip(true)
            .brotli(true)
            .user_agent(user_agent)
            .pool_max_idle_per_host(0)
            .build()
            .map_err(|e| NexaError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> std::result::Result<Vec<u8>, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::BadStatus(status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        Ok(body.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builds_with_defaults() {
        assert!(HttpFetcher::new().is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_host_is_network_error() {
        let fetcher =
            HttpFetcher::with_options(Duration::from_millis(500), DEFAULT_USER_AGENT).unwrap();
        // Port 9 on loopback: connection refused or timeout, never a status.
        let err = fetcher.fetch("http://127.0.0.1:9/rss").await.unwrap_err();
        assert!(matches!(err, FetchError::Network(_)));
    }

    #[tokio::test]
    async fn test_invalid_url_is_network_error() {
        let fetcher = HttpFetcher::new().unwrap();
        let err = fetcher.fetch("not a url").await.unwrap_err();
        assert!(matches!(err, FetchError::Network(_)));
    }
}
