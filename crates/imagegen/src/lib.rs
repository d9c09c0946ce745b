//! Panel artwork generation.
//!
//! [`api`] is the thin REST client for the external image service;
//! [`generator`] drives the per-panel submit/poll/download/upload state
//! machine and the sequential batch loop. The [`ImageService`] trait
//! seams the real client from the mock used in mock mode and tests.

pub mod api;
pub mod generator;

use api::{ImageApiError, StatusResponse, SubmitRequest};

pub use api::{GenerationStatus, ImageServiceApi};
pub use generator::{
    parse_selection, GeneratorConfig, PanelBatchResult, PanelFailure, PanelGenerator,
    PanelSelection,
};

/// The external image generation service, reduced to the three calls
/// the panel state machine needs.
#[async_trait::async_trait]
pub trait ImageService: Send + Sync {
    /// Submit a generation request; returns the service's generation id.
    async fn submit(&self, request: &SubmitRequest) -> Result<String, ImageApiError>;

    /// Query the status of a previously submitted generation.
    async fn status(&self, generation_id: &str) -> Result<StatusResponse, ImageApiError>;

    /// Fetch finished artwork bytes from a result URL.
    async fn download(&self, url: &str) -> Result<Vec<u8>, ImageApiError>;
}

/// Mock image service: completes instantly with fixture URLs and
/// synthesised PNG bytes. Used when `MOCK_GENERATION` is on.
#[derive(Debug, Default)]
pub struct MockImageService {
    counter: std::sync::atomic::AtomicU64,
}

impl MockImageService {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl ImageService for MockImageService {
    async fn submit(&self, request: &SubmitRequest) -> Result<String, ImageApiError> {
        let n = self
            .counter
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        tracing::debug!(seed = request.seed, "Mock generation submitted");
        Ok(format!("mock-gen-{n}"))
    }

    async fn status(&self, generation_id: &str) -> Result<StatusResponse, ImageApiError> {
        Ok(StatusResponse {
            status: GenerationStatus::Complete,
            images: vec![format!("mock://generated/{generation_id}.png")],
            error: None,
        })
    }

    async fn download(&self, _url: &str) -> Result<Vec<u8>, ImageApiError> {
        Ok(placeholder_png(64, 64))
    }
}

/// A small flat-grey PNG, used as mock artwork.
pub fn placeholder_png(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba([200, 200, 200, 255]));
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(
            &mut std::io::Cursor::new(&mut bytes),
            image::ImageFormat::Png,
        )
        .expect("in-memory png encode");
    bytes
}
