//! Page composition: panel artwork plus lettering onto page canvases.
//!
//! Composition is a pure function of the project, the layout template
//! and a map of already-fetched panel bytes: [`composer`] computes
//! pixel placement, [`svg`] serialises the page to an SVG document, and
//! [`raster`] renders it to PNG bytes. Nothing in this crate touches
//! the network.

pub mod composer;
pub mod raster;
pub mod style;
mod svg;

pub use composer::{compose_page, compose_pages, PageImage, PanelImages};

/// Errors from page composition.
#[derive(Debug, thiserror::Error)]
pub enum ComposeError {
    /// A layout slot names a panel the project does not contain. This
    /// is a broken template/story pairing and aborts composition.
    #[error("Layout slot references unknown panel {panel_id}")]
    UnknownPanel { panel_id: String },

    /// The page canvas could not be allocated.
    #[error("Canvas allocation failed: {0}")]
    Canvas(String),

    /// SVG parsing or rendering failed.
    #[error("Rasterisation failed: {0}")]
    Raster(String),
}
