//! Object storage for generated artwork.
//!
//! The pipeline only needs one operation: push bytes under a
//! deterministic public id and get back a public URL. Re-uploading the
//! same public id overwrites, which is what makes panel regeneration
//! idempotent at the storage layer.

use std::sync::Mutex;

pub mod cloudinary;

pub use cloudinary::CloudinaryStore;

/// Errors from the object storage layer.
#[derive(Debug, thiserror::Error)]
pub enum CloudError {
    /// The HTTP request itself failed (network, DNS, TLS).
    #[error("Upload request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The storage API returned a non-2xx status code.
    #[error("Storage API error ({status}): {body}")]
    Api { status: u16, body: String },

    /// A 2xx response without the expected URL field.
    #[error("Storage response missing URL")]
    MissingUrl,
}

/// Write-through object storage, idempotent by public id.
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload image bytes under `public_id`, returning the public URL.
    async fn upload(&self, bytes: Vec<u8>, public_id: &str) -> Result<String, CloudError>;
}

/// In-memory store used by mock mode and tests. Returns deterministic
/// URLs and records every upload.
#[derive(Debug, Default)]
pub struct MockStore {
    uploads: Mutex<Vec<(String, usize)>>,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(public_id, byte_len)` pairs in upload order.
    pub fn uploads(&self) -> Vec<(String, usize)> {
        self.uploads.lock().expect("mock store lock").clone()
    }
}

#[async_trait::async_trait]
impl ObjectStore for MockStore {
    async fn upload(&self, bytes: Vec<u8>, public_id: &str) -> Result<String, CloudError> {
        self.uploads
            .lock()
            .expect("mock store lock")
            .push((public_id.to_string(), bytes.len()));
        Ok(format!("mock://storage/{public_id}.png"))
    }
}
