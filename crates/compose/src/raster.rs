//! SVG to PNG rendering.
//!
//! Parses with `usvg` and renders with `resvg` into a `tiny-skia`
//! pixmap. The system font database is loaded once per process;
//! identical SVG input renders to identical pixels.

use std::sync::{Arc, OnceLock};

use crate::ComposeError;

fn fontdb() -> Arc<usvg::fontdb::Database> {
    static DB: OnceLock<Arc<usvg::fontdb::Database>> = OnceLock::new();
    DB.get_or_init(|| {
        let mut db = usvg::fontdb::Database::new();
        db.load_system_fonts();
        tracing::debug!(faces = db.len(), "Font database loaded");
        Arc::new(db)
    })
    .clone()
}

/// Render an SVG document to PNG bytes at the given pixel size.
pub fn render_svg(document: &str, width: u32, height: u32) -> Result<Vec<u8>, ComposeError> {
    if width == 0 || height == 0 {
        return Err(ComposeError::Canvas(format!(
            "invalid canvas size {width}x{height}"
        )));
    }

    let mut options = usvg::Options::default();
    options.fontdb = fontdb();
    let tree = usvg::Tree::from_str(document, &options)
        .map_err(|e| ComposeError::Raster(format!("svg parse: {e}")))?;

    let mut pixmap = resvg::tiny_skia::Pixmap::new(width, height)
        .ok_or_else(|| ComposeError::Canvas(format!("failed to allocate {width}x{height} pixmap")))?;

    let size = tree.size();
    let sx = width as f32 / size.width();
    let sy = height as f32 / size.height();
    let transform = resvg::tiny_skia::Transform::from_scale(sx, sy);
    resvg::render(&tree, transform, &mut pixmap.as_mut());

    encode_png(&pixmap, width, height)
}

/// Demultiply the pixmap's premultiplied RGBA and encode it as PNG.
fn encode_png(
    pixmap: &resvg::tiny_skia::Pixmap,
    width: u32,
    height: u32,
) -> Result<Vec<u8>, ComposeError> {
    let mut rgba = Vec::with_capacity((width * height * 4) as usize);
    for pixel in pixmap.pixels() {
        let c = pixel.demultiply();
        rgba.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
    }

    let img = image::RgbaImage::from_raw(width, height, rgba)
        .ok_or_else(|| ComposeError::Raster("pixmap size mismatch".to_string()))?;

    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(
            &mut std::io::Cursor::new(&mut bytes),
            image::ImageFormat::Png,
        )
        .map_err(|e| ComposeError::Raster(format!("png encode: {e}")))?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="40" height="30" viewBox="0 0 40 30"><rect x="0" y="0" width="40" height="30" fill="#ffffff"/><rect x="5" y="5" width="10" height="10" fill="#ff0000"/></svg>"##;

    #[test]
    fn renders_a_decodable_png_of_the_right_size() {
        let bytes = render_svg(DOC, 40, 30).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!(decoded.width(), 40);
        assert_eq!(decoded.height(), 30);
    }

    #[test]
    fn rendering_is_deterministic() {
        assert_eq!(render_svg(DOC, 40, 30).unwrap(), render_svg(DOC, 40, 30).unwrap());
    }

    #[test]
    fn malformed_svg_is_an_error_not_a_panic() {
        assert!(render_svg("<svg", 10, 10).is_err());
    }

    #[test]
    fn zero_size_canvas_is_rejected() {
        assert!(render_svg(DOC, 0, 10).is_err());
    }
}
