pub mod http_fetcher;

use async_trait::async_trait;
use thiserror::Error;

pub use http_fetcher::HttpFetcher;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Transport failure, including the overall request timeout.
    #[error("network error: {0}")]
    Network(String),

    #[error("unexpected status code: {0}")]
    BadStatus(u16),
}

/// Retrieves one remote document. Implementations do not retry.
#[async_trait]
pub trait Fetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}
