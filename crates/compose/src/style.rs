//! The fixed text style table.
//!
//! The composer is a pure function of these values: font sizes are
//! fractions of the panel box height, colours and strokes are fixed per
//! role. Comic lettering draws the stroke behind the fill
//! (`paint-order: stroke`) so outlines never eat into the letterforms.

/// What a piece of overlay text is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextRole {
    /// Cover title, top-centre of the cover panel.
    Title,
    /// Caption box text.
    Narration,
    /// Spoken lines.
    Dialogue,
    /// Sound effects.
    Sfx,
}

/// Visual parameters for one text role.
#[derive(Debug, Clone, Copy)]
pub struct TextStyle {
    pub font_family: &'static str,
    pub font_weight: &'static str,
    /// Font size as a fraction of the panel box height.
    pub size_frac: f64,
    pub fill: &'static str,
    pub stroke: &'static str,
    /// Stroke width in pixels at full panel scale.
    pub stroke_width: f64,
    pub shadow: bool,
}

/// Authoritative style table.
pub fn style_for(role: TextRole) -> TextStyle {
    match role {
        TextRole::Title => TextStyle {
            font_family: "sans-serif",
            font_weight: "bold",
            size_frac: 0.075,
            fill: "#ffffff",
            stroke: "#000000",
            stroke_width: 6.0,
            shadow: true,
        },
        TextRole::Narration => TextStyle {
            font_family: "sans-serif",
            font_weight: "bold",
            size_frac: 0.04,
            fill: "#ffffff",
            stroke: "#000000",
            stroke_width: 2.0,
            shadow: true,
        },
        TextRole::Dialogue => TextStyle {
            font_family: "sans-serif",
            font_weight: "bold",
            size_frac: 0.035,
            fill: "#000000",
            stroke: "#ffffff",
            stroke_width: 1.0,
            shadow: false,
        },
        TextRole::Sfx => TextStyle {
            font_family: "Impact, sans-serif",
            font_weight: "bold",
            size_frac: 0.06,
            fill: "#d0021b",
            stroke: "#ffffff",
            stroke_width: 3.0,
            shadow: true,
        },
    }
}
