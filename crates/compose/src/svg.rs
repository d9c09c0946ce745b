//! Serialise a [`PageScene`] to an SVG document.
//!
//! Panel artwork is embedded as base64 `data:` URIs, lettering as
//! `<text>` elements with `paint-order="stroke"` so outlines draw
//! behind the letterforms. Shadows are an offset dark copy of the
//! text, not an SVG filter.

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine as _;
use std::fmt::Write as _;

use crate::composer::{PageScene, PlacedPanel, PlacedText};
use crate::style::style_for;

/// Line spacing as a multiple of the font size.
const LINE_HEIGHT: f64 = 1.15;
/// Panel border width in pixels.
const BORDER_WIDTH: f64 = 2.0;

/// Sniff the mime type of image bytes for the data URI. Defaults to
/// PNG, which is what both the image service and placeholders emit.
fn image_mime(bytes: &[u8]) -> &'static str {
    if bytes.len() >= 3 && bytes[0..3] == [0xFF, 0xD8, 0xFF] {
        "image/jpeg"
    } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        "image/webp"
    } else {
        "image/png"
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

fn push_panel(doc: &mut String, panel: &PlacedPanel) {
    match &panel.image {
        Some(bytes) => {
            let _ = write!(
                doc,
                r#"<image x="{x:.2}" y="{y:.2}" width="{w:.2}" height="{h:.2}" preserveAspectRatio="none" xlink:href="data:{mime};base64,{data}"/>"#,
                x = panel.x,
                y = panel.y,
                w = panel.w,
                h = panel.h,
                mime = image_mime(bytes),
                data = B64.encode(bytes),
            );
        }
        None => {
            // Placeholder: flat grey box with the panel id centred in it.
            let _ = write!(
                doc,
                r##"<rect x="{x:.2}" y="{y:.2}" width="{w:.2}" height="{h:.2}" fill="#e0e0e0"/>"##,
                x = panel.x,
                y = panel.y,
                w = panel.w,
                h = panel.h,
            );
            let _ = write!(
                doc,
                r##"<text x="{x:.2}" y="{y:.2}" font-family="sans-serif" font-size="24" fill="#808080" text-anchor="middle">{label}</text>"##,
                x = panel.x + panel.w / 2.0,
                y = panel.y + panel.h / 2.0,
                label = escape(&panel.panel_id),
            );
        }
    }

    let _ = write!(
        doc,
        r##"<rect x="{x:.2}" y="{y:.2}" width="{w:.2}" height="{h:.2}" fill="none" stroke="#000000" stroke-width="{bw}"/>"##,
        x = panel.x,
        y = panel.y,
        w = panel.w,
        h = panel.h,
        bw = BORDER_WIDTH,
    );
}

fn push_text_element(
    doc: &mut String,
    text: &PlacedText,
    dx: f64,
    dy: f64,
    fill: &str,
    opacity: Option<f64>,
    stroke: Option<(&str, f64)>,
) {
    let style = style_for(text.role);
    let stroke_attrs = match stroke {
        Some((colour, width)) => {
            format!(r#" stroke="{colour}" stroke-width="{width:.1}" paint-order="stroke""#)
        }
        None => String::new(),
    };
    let opacity_attr = match opacity {
        Some(o) => format!(r#" opacity="{o:.2}""#),
        None => String::new(),
    };
    let _ = write!(
        doc,
        r#"<text x="{x:.2}" y="{y:.2}" font-family="{family}" font-weight="{weight}" font-size="{size:.2}" fill="{fill}"{opacity}{stroke} text-anchor="middle">"#,
        x = text.x + dx,
        y = text.y + dy,
        family = style.font_family,
        weight = style.font_weight,
        size = text.font_size,
        fill = fill,
        opacity = opacity_attr,
        stroke = stroke_attrs,
    );
    for (i, line) in text.lines.iter().enumerate() {
        let line_dy = if i == 0 {
            0.0
        } else {
            text.font_size * LINE_HEIGHT
        };
        let _ = write!(
            doc,
            r#"<tspan x="{x:.2}" dy="{dy:.2}">{content}</tspan>"#,
            x = text.x + dx,
            dy = line_dy,
            content = escape(line),
        );
    }
    doc.push_str("</text>");
}

fn push_text(doc: &mut String, text: &PlacedText) {
    let style = style_for(text.role);
    if style.shadow {
        let offset = (text.font_size * 0.04).max(1.5);
        push_text_element(doc, text, offset, offset, "#000000", Some(0.55), None);
    }
    push_text_element(
        doc,
        text,
        0.0,
        0.0,
        style.fill,
        None,
        Some((style.stroke, style.stroke_width)),
    );
}

/// Serialise the whole page.
pub(crate) fn scene_to_svg(scene: &PageScene) -> String {
    let mut doc = String::new();
    let _ = write!(
        doc,
        r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
        w = scene.width,
        h = scene.height,
    );
    let _ = write!(
        doc,
        r##"<rect x="0" y="0" width="{w}" height="{h}" fill="#ffffff"/>"##,
        w = scene.width,
        h = scene.height,
    );

    for panel in &scene.panels {
        push_panel(&mut doc, panel);
    }
    for text in &scene.texts {
        push_text(&mut doc, text);
    }

    doc.push_str("</svg>");
    doc
}
