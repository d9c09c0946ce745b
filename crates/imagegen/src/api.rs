//! REST client for the external image generation service.
//!
//! The service is poll-based: `POST /generations` queues a request and
//! returns an id, `GET /generations/{id}` reports progress and, once
//! complete, the result image URLs.

use serde::{Deserialize, Serialize};

/// Generation request payload.
///
/// `context_ids` name earlier panels whose artwork should condition
/// this generation; the service may ignore them.
#[derive(Debug, Clone, Serialize)]
pub struct SubmitRequest {
    pub prompt: String,
    pub width: u32,
    pub height: u32,
    pub seed: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub context_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct SubmitResponse {
    /// Server-assigned identifier for the queued generation.
    pub id: String,
}

/// Lifecycle states reported by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GenerationStatus {
    Pending,
    Processing,
    Complete,
    Failed,
    /// Forward compatibility: unknown states keep the poll loop alive.
    #[serde(other)]
    Unknown,
}

impl GenerationStatus {
    /// Whether the poll loop should keep waiting on this state.
    pub fn is_in_flight(self) -> bool {
        !matches!(self, GenerationStatus::Complete | GenerationStatus::Failed)
    }
}

#[derive(Debug, Deserialize)]
pub struct StatusResponse {
    pub status: GenerationStatus,
    /// Result image URLs, present once `status` is `COMPLETE`.
    #[serde(default)]
    pub images: Vec<String>,
    /// Service-reported failure reason, present when `status` is `FAILED`.
    #[serde(default)]
    pub error: Option<String>,
}

/// Errors from the image service REST layer.
#[derive(Debug, thiserror::Error)]
pub enum ImageApiError {
    /// The HTTP request itself failed (network, DNS, TLS).
    #[error("Image service request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The service returned a non-2xx status code.
    #[error("Image service error ({status}): {body}")]
    Api { status: u16, body: String },
}

impl ImageApiError {
    /// Whether the service asked us to back off (HTTP 429).
    pub fn is_rate_limited(&self) -> bool {
        match self {
            ImageApiError::Api { status, .. } => *status == 429,
            ImageApiError::Request(e) => e.status().map(|s| s.as_u16()) == Some(429),
        }
    }
}

/// HTTP client for one image service endpoint.
#[derive(Debug, Clone)]
pub struct ImageServiceApi {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl ImageServiceApi {
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            api_key,
        }
    }

    pub async fn submit(&self, request: &SubmitRequest) -> Result<SubmitResponse, ImageApiError> {
        let response = self
            .client
            .post(format!("{}/generations", self.base_url))
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    pub async fn status(&self, generation_id: &str) -> Result<StatusResponse, ImageApiError> {
        let response = self
            .client
            .get(format!("{}/generations/{generation_id}", self.base_url))
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    /// Fetch finished artwork bytes. Result URLs may live on a separate
    /// CDN host, so no auth header is attached.
    pub async fn download(&self, url: &str) -> Result<Vec<u8>, ImageApiError> {
        let response = self.client.get(url).send().await?;
        let response = Self::ensure_success(response).await?;
        Ok(response.bytes().await?.to_vec())
    }

    // ---- private helpers ----

    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ImageApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ImageApiError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ImageApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}

#[async_trait::async_trait]
impl crate::ImageService for ImageServiceApi {
    async fn submit(&self, request: &SubmitRequest) -> Result<String, ImageApiError> {
        Ok(ImageServiceApi::submit(self, request).await?.id)
    }

    async fn status(&self, generation_id: &str) -> Result<StatusResponse, ImageApiError> {
        ImageServiceApi::status(self, generation_id).await
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, ImageApiError> {
        ImageServiceApi::download(self, url).await
    }
}
