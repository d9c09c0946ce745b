//! Pipeline orchestration: story structuring, panel generation,
//! dialogue, composition, and the coordinator that orders them.

pub mod coordinator;
pub mod dialogue;
pub mod fetch;
pub mod structurer;

pub use coordinator::{ComicRequest, ComicResult, PageRef, Pipeline, RegenResult};
pub use fetch::{HttpFetcher, ImageFetcher, MockFetcher};

use kapow_compose::ComposeError;
use kapow_store::StoreError;

/// Pipeline-level failures. Stage-internal recoverable problems (a
/// failed panel, a dropped dialogue line) are accumulated in results
/// instead of raised here.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Bad request-level configuration; rejected before any stage runs.
    #[error("Invalid request: {0}")]
    Config(String),

    /// The project document could not be read or written.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Page composition failed fatally.
    #[error(transparent)]
    Compose(#[from] ComposeError),

    /// The pipeline cannot produce any pages.
    #[error("Pipeline failed: {0}")]
    Fatal(String),

    /// The request was cancelled; distinct from failure. Whatever
    /// project state was valid has been persisted.
    #[error("Request cancelled")]
    Cancelled,
}
