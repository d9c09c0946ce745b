//! Static page layout templates.
//!
//! A layout template is a page-indexed list of panel slots with
//! fractional placement. Templates are selected by the clamped page
//! count; they are built-in and never persisted. Every slot names a
//! panel id that the story structurer is guaranteed to create (the
//! template never references more panels than the fallback story
//! produces for the same page count — see [`fallback_panel_count`]).

use crate::types::{panel_id, PanelId};

/// Page canvas width in pixels.
pub const PAGE_WIDTH: u32 = 1200;
/// Page canvas height in pixels.
pub const PAGE_HEIGHT: u32 = 1600;
/// Page margin in pixels, applied on all four sides.
pub const PAGE_MARGIN: u32 = 40;

/// Panel generation dimensions must fall inside this range on each axis.
pub const MIN_PANEL_DIM: u32 = 100;
pub const MAX_PANEL_DIM: u32 = 2000;

pub const MIN_PAGE_COUNT: u32 = 1;
pub const MAX_PAGE_COUNT: u32 = 6;
pub const DEFAULT_PAGE_COUNT: u32 = 3;

/// Generation size labels, `"WxH"`.
const COVER: &str = "896x1152";
const WIDE: &str = "1216x832";
const TALL: &str = "832x1216";

/// Horizontal anchoring of a slot inside the usable page area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotAlign {
    Left,
    Center,
    Right,
}

/// One panel placement on a page. `y` and `h` are fractions of the
/// usable (margin-inset) page height; `offset_x` is a fraction of the
/// usable width added after alignment.
#[derive(Debug, Clone)]
pub struct LayoutSlot {
    pub panel_id: PanelId,
    /// Generation size label `"WxH"`; only its aspect ratio matters for
    /// placement.
    pub size: &'static str,
    pub y: f64,
    pub h: f64,
    pub align: SlotAlign,
    pub offset_x: f64,
}

/// All slots for one page.
#[derive(Debug, Clone)]
pub struct PageLayout {
    /// 1-based page number.
    pub page_number: u32,
    pub slots: Vec<LayoutSlot>,
}

/// The full template for a comic of a given page count.
#[derive(Debug, Clone)]
pub struct LayoutTemplate {
    pub page_count: u32,
    pub pages: Vec<PageLayout>,
}

impl LayoutTemplate {
    /// Every panel id referenced by any slot, in reading order.
    pub fn panel_ids(&self) -> Vec<PanelId> {
        self.pages
            .iter()
            .flat_map(|p| p.slots.iter().map(|s| s.panel_id.clone()))
            .collect()
    }
}

/// Clamp a requested page count into the supported range, warning when
/// the request is adjusted. `None` selects the default.
pub fn clamp_page_count(requested: Option<u32>) -> u32 {
    let Some(n) = requested else {
        return DEFAULT_PAGE_COUNT;
    };
    let clamped = n.clamp(MIN_PAGE_COUNT, MAX_PAGE_COUNT);
    if clamped != n {
        tracing::warn!(requested = n, clamped, "Page count outside supported range");
    }
    clamped
}

/// Number of panels each page's scene contributes to the story.
pub fn panels_per_page(page_count: u32) -> u32 {
    6u32.div_ceil(page_count.max(1))
}

/// Total panel count produced by the structurer (and by the fallback
/// story): `page_count * ceil(6 / page_count)`.
pub fn fallback_panel_count(page_count: u32) -> u32 {
    page_count * panels_per_page(page_count)
}

/// Parse a `"WxH"` size label into `(w, h)`.
pub fn parse_size(size: &str) -> Option<(f64, f64)> {
    let (w, h) = size.split_once('x')?;
    let w: f64 = w.trim().parse().ok()?;
    let h: f64 = h.trim().parse().ok()?;
    if w > 0.0 && h > 0.0 {
        Some((w, h))
    } else {
        None
    }
}

fn slot(number: u32, size: &'static str, y: f64, h: f64, align: SlotAlign, offset_x: f64) -> LayoutSlot {
    LayoutSlot {
        panel_id: panel_id(number),
        size,
        y,
        h,
        align,
        offset_x,
    }
}

/// The cover page: one near-full-height centred panel.
fn cover_page() -> Vec<LayoutSlot> {
    vec![slot(1, COVER, 0.02, 0.94, SlotAlign::Center, 0.0)]
}

/// A wide strip over two staggered panels.
fn triple_page(first: u32) -> Vec<LayoutSlot> {
    vec![
        slot(first, WIDE, 0.0, 0.32, SlotAlign::Center, 0.0),
        slot(first + 1, TALL, 0.34, 0.32, SlotAlign::Left, 0.02),
        slot(first + 2, WIDE, 0.68, 0.32, SlotAlign::Right, -0.02),
    ]
}

/// Two stacked wide panels.
fn double_page(first: u32) -> Vec<LayoutSlot> {
    vec![
        slot(first, WIDE, 0.0, 0.48, SlotAlign::Center, 0.0),
        slot(first + 1, WIDE, 0.52, 0.48, SlotAlign::Center, 0.0),
    ]
}

/// Four stacked wide panels.
fn quad_page(first: u32) -> Vec<LayoutSlot> {
    vec![
        slot(first, WIDE, 0.0, 0.22, SlotAlign::Left, 0.0),
        slot(first + 1, WIDE, 0.26, 0.22, SlotAlign::Right, 0.0),
        slot(first + 2, WIDE, 0.52, 0.22, SlotAlign::Left, 0.0),
        slot(first + 3, WIDE, 0.78, 0.22, SlotAlign::Center, 0.0),
    ]
}

/// One full-page panel.
fn single_page(number: u32) -> Vec<LayoutSlot> {
    vec![slot(number, TALL, 0.0, 1.0, SlotAlign::Center, 0.0)]
}

/// Select the built-in layout template for a (clamped) page count.
pub fn layout_for(page_count: u32) -> LayoutTemplate {
    let page_count = page_count.clamp(MIN_PAGE_COUNT, MAX_PAGE_COUNT);

    let page_slots: Vec<Vec<LayoutSlot>> = match page_count {
        1 => vec![cover_page()],
        2 => vec![cover_page(), quad_page(2)],
        3 => vec![cover_page(), triple_page(2), double_page(5)],
        4 => vec![cover_page(), triple_page(2), double_page(5), double_page(7)],
        5 => vec![
            cover_page(),
            triple_page(2),
            double_page(5),
            double_page(7),
            double_page(9),
        ],
        _ => {
            let mut pages = vec![cover_page()];
            pages.extend((2..=6).map(single_page));
            pages
        }
    };

    LayoutTemplate {
        page_count,
        pages: page_slots
            .into_iter()
            .enumerate()
            .map(|(i, slots)| PageLayout {
                page_number: i as u32 + 1,
                slots,
            })
            .collect(),
    }
}

/// Clamp a panel generation dimension into the supported range, warning
/// when the stored value is out of bounds.
pub fn clamp_panel_dim(panel_id: &str, axis: &str, value: u32) -> u32 {
    let clamped = value.clamp(MIN_PANEL_DIM, MAX_PANEL_DIM);
    if clamped != value {
        tracing::warn!(panel_id, axis, value, clamped, "Panel dimension out of range");
    }
    clamped
}
