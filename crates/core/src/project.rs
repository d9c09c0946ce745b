//! The project document: the single source of truth that every pipeline
//! stage reads and writes.
//!
//! Field names follow the persisted document format (`pages`,
//! `cloudinaryUrl`, ...). Unknown keys are preserved through the
//! flattened `extra` maps so that documents written by newer stages
//! round-trip through older code.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::layout::DEFAULT_PAGE_COUNT;
use crate::types::{CharacterId, PanelId, ProjectId, Timestamp};

/// Project lifecycle states, written to `Project.status`.
pub const STATUS_CREATED: &str = "created";
pub const STATUS_STRUCTURED: &str = "structured";
pub const STATUS_GENERATING: &str = "generating";
pub const STATUS_GENERATED: &str = "generated";
pub const STATUS_COMPOSED: &str = "composed";
pub const STATUS_CANCELLED: &str = "cancelled";

/// Title written onto the cover when dialogue generation omits one.
pub const DEFAULT_COVER_TITLE: &str = "Untitled Comic";

/// The evolving comic document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Project {
    pub id: ProjectId,
    pub title: String,
    pub genre: String,
    pub style: String,
    /// Page count of the active layout template.
    pub pages: u32,
    pub target_audience: String,
    pub user_prompt: String,
    pub status: String,
    #[serde(default = "chrono::Utc::now")]
    pub created_at: Timestamp,
    #[serde(default)]
    pub characters: Vec<Character>,
    #[serde(default)]
    pub panels: Vec<Panel>,
    /// Set when the dialogue stage ran but produced nothing usable.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub dialogue_failed: bool,
    /// Unknown document keys, preserved verbatim.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

/// A character introduced by the story structurer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Character {
    pub id: CharacterId,
    pub name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

/// One artwork cell. `panel1` is the cover: it carries the comic title
/// and never dialogue or narration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Panel {
    pub id: PanelId,
    pub prompt: String,
    pub width: u32,
    pub height: u32,
    /// Zero-based page this panel belongs to.
    #[serde(default)]
    pub page_index: u32,
    /// Earlier panels supplied to the image model for continuity.
    /// Advisory: must only name panels with a lower index.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub context_panel_ids: Vec<PanelId>,
    /// Public URL of the uploaded artwork. Non-empty means the panel is
    /// complete and will not be regenerated implicitly.
    #[serde(rename = "cloudinaryUrl", default, skip_serializing_if = "Option::is_none")]
    pub cloudinary_url: Option<String>,
    /// Seed of the most recent generation attempt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub dialogue: Vec<DialogueLine>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narration: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

/// One spoken line inside a panel. `speaker` must name an existing
/// character id; lines with unknown speakers are dropped at merge time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DialogueLine {
    pub speaker: CharacterId,
    pub text: String,
}

impl Project {
    /// Fresh document in the `created` state. Genre, style, audience
    /// and page count carry neutral defaults until the request fills
    /// them in.
    pub fn new(id: ProjectId, user_prompt: impl Into<String>) -> Self {
        Self {
            id,
            title: String::new(),
            genre: "adventure".to_string(),
            style: "cinematic".to_string(),
            pages: DEFAULT_PAGE_COUNT,
            target_audience: "general".to_string(),
            user_prompt: user_prompt.into(),
            status: STATUS_CREATED.to_string(),
            created_at: chrono::Utc::now(),
            characters: Vec::new(),
            panels: Vec::new(),
            dialogue_failed: false,
            extra: BTreeMap::new(),
        }
    }

    /// The set of valid speaker ids for dialogue normalisation.
    pub fn character_ids(&self) -> HashSet<&str> {
        self.characters.iter().map(|c| c.id.as_str()).collect()
    }

    pub fn panel(&self, id: &str) -> Option<&Panel> {
        self.panels.iter().find(|p| p.id == id)
    }

    pub fn panel_mut(&mut self, id: &str) -> Option<&mut Panel> {
        self.panels.iter_mut().find(|p| p.id == id)
    }
}

impl Panel {
    /// Bare panel with no artwork or lettering yet.
    pub fn new(id: PanelId, prompt: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            id,
            prompt: prompt.into(),
            width,
            height,
            page_index: 0,
            context_panel_ids: Vec::new(),
            cloudinary_url: None,
            seed: None,
            title: None,
            dialogue: Vec::new(),
            narration: None,
            extra: BTreeMap::new(),
        }
    }

    /// A panel is complete once its uploaded URL is set and non-empty.
    pub fn is_complete(&self) -> bool {
        self.cloudinary_url.as_deref().is_some_and(|u| !u.is_empty())
    }

    /// Whether this panel is the cover (`panel1`).
    pub fn is_cover(&self) -> bool {
        self.id == "panel1"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn panel(id: &str) -> Panel {
        Panel::new(id.to_string(), "a test panel", 832, 1216)
    }

    #[test]
    fn empty_url_is_not_complete() {
        let mut p = panel("panel2");
        assert!(!p.is_complete());
        p.cloudinary_url = Some(String::new());
        assert!(!p.is_complete());
        p.cloudinary_url = Some("https://example.test/panel_2.png".into());
        assert!(p.is_complete());
    }

    #[test]
    fn only_panel1_is_the_cover() {
        assert!(panel("panel1").is_cover());
        assert!(!panel("panel10").is_cover());
    }

    #[test]
    fn unknown_panel_keys_round_trip() {
        let yaml = concat!(
            "id: panel3\n",
            "prompt: a rooftop chase\n",
            "width: 832\n",
            "height: 1216\n",
            "cloudinaryUrl: https://example.test/p3.png\n",
            "futureField: kept\n",
        );
        let p: Panel = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(p.extra.get("futureField").unwrap().as_str(), Some("kept"));

        let out = serde_yaml::to_string(&p).unwrap();
        assert!(out.contains("futureField: kept"));
        assert!(out.contains("cloudinaryUrl:"));
    }
}
