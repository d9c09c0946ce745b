//! Pixel-exact page assembly.
//!
//! For each slot of a page layout: compute the panel box from the
//! fractional placement rules, attach the fetched artwork (or a
//! placeholder when it is missing), then lay the panel's lettering out
//! at panel-relative coordinates. The result is a [`PageScene`] that
//! [`crate::svg`] and [`crate::raster`] turn into PNG bytes.

use std::collections::HashMap;

use kapow_core::layout::{
    clamp_panel_dim, parse_size, LayoutSlot, LayoutTemplate, PageLayout, SlotAlign, PAGE_HEIGHT,
    PAGE_MARGIN, PAGE_WIDTH,
};
use kapow_core::project::{Panel, Project};
use kapow_core::types::PanelId;

use crate::style::{style_for, TextRole};
use crate::{raster, svg, ComposeError};

/// Already-fetched artwork bytes, keyed by panel id. Panels absent from
/// the map compose as placeholders.
pub type PanelImages = HashMap<PanelId, Vec<u8>>;

/// One composed page.
#[derive(Debug, Clone)]
pub struct PageImage {
    pub page_number: u32,
    pub bytes: Vec<u8>,
    pub mime: &'static str,
}

/// A panel box resolved to absolute page pixels.
#[derive(Debug, Clone)]
pub(crate) struct PlacedPanel {
    pub panel_id: PanelId,
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
    /// PNG/JPEG/WebP bytes; `None` draws the labelled placeholder box.
    pub image: Option<Vec<u8>>,
}

/// One block of lettering in absolute page pixels. `x` is the centre
/// of the block, `y` the baseline of its first line.
#[derive(Debug, Clone)]
pub(crate) struct PlacedText {
    pub role: TextRole,
    pub lines: Vec<String>,
    pub x: f64,
    pub y: f64,
    pub font_size: f64,
}

/// Everything needed to draw one page.
#[derive(Debug, Clone)]
pub(crate) struct PageScene {
    pub width: u32,
    pub height: u32,
    pub panels: Vec<PlacedPanel>,
    pub texts: Vec<PlacedText>,
}

/// Compute the absolute panel box for a slot.
///
/// Vertical: `y = margin + slot.y * usable_h`, `h = slot.h * usable_h`.
/// Horizontal: width from the slot's aspect ratio, anchored per the
/// slot alignment, shifted by `offset_x * usable_w`.
pub(crate) fn place_slot(slot: &LayoutSlot) -> (f64, f64, f64, f64) {
    let usable_w = f64::from(PAGE_WIDTH - 2 * PAGE_MARGIN);
    let usable_h = f64::from(PAGE_HEIGHT - 2 * PAGE_MARGIN);
    let margin = f64::from(PAGE_MARGIN);

    let y = margin + slot.y * usable_h;
    let box_h = slot.h * usable_h;

    let aspect = match parse_size(slot.size) {
        Some((w, h)) => w / h,
        None => {
            tracing::warn!(size = slot.size, "Unparsable slot size, assuming square");
            1.0
        }
    };
    let box_w = box_h * aspect;

    let mut x = match slot.align {
        SlotAlign::Left => margin,
        SlotAlign::Right => f64::from(PAGE_WIDTH) - margin - box_w,
        SlotAlign::Center => margin + (usable_w - box_w) / 2.0,
    };
    x += slot.offset_x * usable_w;

    (x, y, box_w, box_h)
}

/// Greedy word wrap to a character budget derived from the box width.
pub(crate) fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(8);
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if current.is_empty() {
            current = word.to_string();
        } else if current.chars().count() + 1 + word.chars().count() <= max_chars {
            current.push(' ');
            current.push_str(word);
        } else {
            lines.push(std::mem::take(&mut current));
            current = word.to_string();
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

fn text_block(
    role: TextRole,
    content: &str,
    box_x: f64,
    box_y: f64,
    box_w: f64,
    box_h: f64,
    rel_x: f64,
    rel_y: f64,
) -> PlacedText {
    let style = style_for(role);
    let font_size = (style.size_frac * box_h).max(10.0);
    // Average glyph width for a bold sans is roughly 0.6em.
    let max_chars = (box_w * 0.9 / (font_size * 0.6)) as usize;
    PlacedText {
        role,
        lines: wrap_text(content, max_chars),
        x: box_x + rel_x * box_w,
        y: box_y + rel_y * box_h,
        font_size,
    }
}

/// Lay out the lettering for one placed panel.
fn panel_texts(panel: &Panel, x: f64, y: f64, w: f64, h: f64) -> Vec<PlacedText> {
    let mut texts = Vec::new();

    if let Some(title) = panel.title.as_deref().filter(|t| !t.is_empty()) {
        // Cover title sits in the top-centre zone.
        texts.push(text_block(TextRole::Title, title, x, y, w, h, 0.5, 0.10));
    }

    if let Some(narration) = panel.narration.as_deref().filter(|n| !n.is_empty()) {
        texts.push(text_block(
            TextRole::Narration,
            narration,
            x,
            y,
            w,
            h,
            0.5,
            0.08,
        ));
    }

    for (i, line) in panel.dialogue.iter().enumerate() {
        let rel_y = 0.80 + 0.10 * i as f64;
        texts.push(text_block(
            TextRole::Dialogue,
            &line.text,
            x,
            y,
            w,
            h,
            0.5,
            rel_y.min(0.95),
        ));
    }

    texts
}

/// Build the scene for one page. Fails only on a slot that names a
/// panel the project does not contain.
pub(crate) fn build_scene(
    project: &Project,
    page: &PageLayout,
    images: &PanelImages,
) -> Result<PageScene, ComposeError> {
    let mut panels = Vec::new();
    let mut texts = Vec::new();

    for slot in &page.slots {
        let panel = project
            .panel(&slot.panel_id)
            .ok_or_else(|| ComposeError::UnknownPanel {
                panel_id: slot.panel_id.clone(),
            })?;

        // Generation dimensions are validated here; placement itself
        // uses the slot's aspect ratio.
        clamp_panel_dim(&panel.id, "width", panel.width);
        clamp_panel_dim(&panel.id, "height", panel.height);

        let (x, y, w, h) = place_slot(slot);

        let image = images.get(&panel.id).cloned();
        if image.is_none() {
            tracing::warn!(
                page = page.page_number,
                panel_id = %panel.id,
                "No artwork for panel, drawing placeholder",
            );
        }

        panels.push(PlacedPanel {
            panel_id: panel.id.clone(),
            x,
            y,
            w,
            h,
            image,
        });
        texts.extend(panel_texts(panel, x, y, w, h));
    }

    Ok(PageScene {
        width: PAGE_WIDTH,
        height: PAGE_HEIGHT,
        panels,
        texts,
    })
}

/// Compose one page to PNG bytes.
pub fn compose_page(
    project: &Project,
    page: &PageLayout,
    images: &PanelImages,
) -> Result<PageImage, ComposeError> {
    let scene = build_scene(project, page, images)?;
    let document = svg::scene_to_svg(&scene);
    let bytes = raster::render_svg(&document, scene.width, scene.height)?;

    tracing::debug!(
        page = page.page_number,
        panels = scene.panels.len(),
        bytes = bytes.len(),
        "Page composed",
    );
    Ok(PageImage {
        page_number: page.page_number,
        bytes,
        mime: "image/png",
    })
}

/// Compose every page of the template, in page order.
pub fn compose_pages(
    project: &Project,
    template: &LayoutTemplate,
    images: &PanelImages,
) -> Result<Vec<PageImage>, ComposeError> {
    template
        .pages
        .iter()
        .map(|page| compose_page(project, page, images))
        .collect()
}
