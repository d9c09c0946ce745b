//! Fetching uploaded panel artwork back for composition.
//!
//! Composition is pure over bytes, so the coordinator resolves panel
//! URLs through this seam first. The mock fetcher keeps mock mode and
//! tests off the network.

/// Errors fetching artwork bytes.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Fetch request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Fetch returned HTTP {status}")]
    Status { status: u16 },
}

/// Resolve an artwork URL to image bytes.
#[async_trait::async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// Plain HTTP fetcher.
#[derive(Debug, Default)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl ImageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }
}

/// Returns the same synthesised PNG for every URL.
#[derive(Debug, Default)]
pub struct MockFetcher;

impl MockFetcher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl ImageFetcher for MockFetcher {
    async fn fetch(&self, _url: &str) -> Result<Vec<u8>, FetchError> {
        Ok(kapow_imagegen::placeholder_png(256, 256))
    }
}
