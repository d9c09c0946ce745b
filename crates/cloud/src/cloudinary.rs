//! Cloudinary upload client.
//!
//! Uses the signed upload endpoint
//! (`POST /v1_1/{cloud_name}/image/upload`) with a SHA-256 signature.
//! Uploads always set `overwrite=true` so the same public id stays
//! idempotent across regenerations.

use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::{CloudError, ObjectStore};

/// Signed-upload client for one Cloudinary account.
#[derive(Debug, Clone)]
pub struct CloudinaryStore {
    client: reqwest::Client,
    upload_url: String,
    api_key: String,
    api_secret: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(default)]
    secure_url: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

impl CloudinaryStore {
    pub fn new(cloud_name: &str, api_key: String, api_secret: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            upload_url: format!("https://api.cloudinary.com/v1_1/{cloud_name}/image/upload"),
            api_key,
            api_secret,
        }
    }

    /// Override the endpoint base; test hook for pointing at a local
    /// mock server.
    pub fn with_upload_url(mut self, upload_url: String) -> Self {
        self.upload_url = upload_url;
        self
    }

    /// Signature over the alphabetically ordered upload parameters, as
    /// Cloudinary's signed-upload protocol requires.
    fn signature(&self, public_id: &str, timestamp: i64) -> String {
        let to_sign = format!(
            "overwrite=true&public_id={public_id}&timestamp={timestamp}{}",
            self.api_secret
        );
        let digest = Sha256::digest(to_sign.as_bytes());
        digest.iter().map(|b| format!("{b:02x}")).collect()
    }
}

#[async_trait::async_trait]
impl ObjectStore for CloudinaryStore {
    async fn upload(&self, bytes: Vec<u8>, public_id: &str) -> Result<String, CloudError> {
        let timestamp = chrono::Utc::now().timestamp();
        let signature = self.signature(public_id, timestamp);

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(bytes).file_name(format!("{public_id}.png")),
            )
            .text("public_id", public_id.to_string())
            .text("timestamp", timestamp.to_string())
            .text("overwrite", "true")
            .text("api_key", self.api_key.clone())
            .text("signature", signature)
            .text("signature_algorithm", "sha256");

        let response = self
            .client
            .post(&self.upload_url)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(CloudError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: UploadResponse = response.json().await?;
        let url = parsed
            .secure_url
            .or(parsed.url)
            .ok_or(CloudError::MissingUrl)?;

        tracing::info!(public_id, url = %url, "Asset uploaded");
        Ok(url)
    }
}
