//! Shared identifier aliases and naming helpers.
//!
//! Panel and character ids are plain strings in the persisted document
//! (`panel1`, `char_3`), so the helpers here are the single place where
//! the naming convention lives.

/// Project documents are keyed by a UUID string.
pub type ProjectId = String;

/// Stable panel identifier (`panel1`, `panel2`, ...). `panel1` is the cover.
pub type PanelId = String;

/// Stable character identifier (`char_1`, `char_2`, ...).
pub type CharacterId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Build the panel id for a 1-based panel number.
pub fn panel_id(number: u32) -> PanelId {
    format!("panel{number}")
}

/// Build the character id for a 1-based character number.
pub fn char_id(number: u32) -> CharacterId {
    format!("char_{number}")
}

/// Parse the 1-based panel number out of a panel id.
///
/// Returns `None` for anything that is not `panel<digits>` with a
/// positive number.
pub fn panel_number(id: &str) -> Option<u32> {
    let digits = id.strip_prefix("panel")?;
    if digits.is_empty() {
        return None;
    }
    let number: u32 = digits.parse().ok()?;
    if number == 0 {
        None
    } else {
        Some(number)
    }
}
