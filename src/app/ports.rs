use crate::error::FetchError;
use async_trait::async_trait;

#[async_trait]
pub trait HttpClientPort: Send + Sync {
    /// GET `url` with the given extra headers. `Err` only for transport
    /// failures; any HTTP status comes back in `HttpGetResult`.
    async fn get(&self, url: &str, headers: &[(&str, &str)]) -> Result<HttpGetResult, String>;
}

#[derive(Clone, Debug)]
pub struct HttpGetResult {
    pub status: u16,
    pub body: String,
}

impl HttpGetResult {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Fetches a page and returns the structured data embedded in it.
///
/// Implementations do not retry; a failure is reported once and the caller
/// decides whether it is fatal.
#[async_trait]
pub trait PayloadExtractor: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<serde_json::Value, FetchError>;
}
