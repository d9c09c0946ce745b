//! Dialogue generator: one LLM call lettering every panel at once.
//!
//! The reply is dug out of the text with the tolerant extractor, then
//! normalised hard before it touches the project: unknown speakers are
//! dropped, the cover rule is enforced, lines are truncated, and a
//! panel never keeps both dialogue and narration. When nothing usable
//! comes back the project keeps its pre-call dialogue fields and only
//! the `dialogue_failed` flag flips.

use serde::Deserialize;

use kapow_core::project::{DialogueLine, Project, DEFAULT_COVER_TITLE};
use kapow_core::prompts::dialogue_prompt;
use kapow_llm::extract::extract_json_array;
use kapow_llm::ChatClient;

const SYSTEM_PROMPT: &str =
    "You are a comic book letterer and dialogue writer. You respond with strict JSON only.";

/// Longest dialogue line, in words.
pub const MAX_LINE_WORDS: usize = 14;
/// Most dialogue lines per panel.
pub const MAX_LINES_PER_PANEL: usize = 2;

/// Per-panel lettering as returned by the model.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelDialogue {
    pub panel_id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub dialogue: Vec<RawLine>,
    #[serde(default)]
    pub narration: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawLine {
    pub speaker: String,
    pub text: String,
}

/// Outcome of the dialogue stage.
#[derive(Debug)]
pub struct DialogueOutcome {
    pub success: bool,
    /// Warnings worth surfacing to the caller (dropped speakers, etc.).
    pub warnings: Vec<String>,
}

/// Parse the model reply into per-panel lettering. Individually
/// malformed array entries are skipped, not fatal.
pub fn parse_reply(reply: &str) -> Option<Vec<PanelDialogue>> {
    let array = extract_json_array(reply)?;
    let items: Vec<PanelDialogue> = array
        .as_array()?
        .iter()
        .filter_map(|item| match serde_json::from_value(item.clone()) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                tracing::warn!(error = %e, "Skipping malformed dialogue entry");
                None
            }
        })
        .collect();
    if items.is_empty() {
        None
    } else {
        Some(items)
    }
}

/// Cut a line down to the word budget.
pub fn truncate_words(text: &str, max_words: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() <= max_words {
        words.join(" ")
    } else {
        words[..max_words].join(" ")
    }
}

/// Apply every normalisation rule against the project, returning the
/// mergeable items and human-readable warnings.
pub fn normalise(project: &Project, items: Vec<PanelDialogue>) -> (Vec<PanelDialogue>, Vec<String>) {
    let known_speakers = project.character_ids();
    let mut warnings = Vec::new();
    let mut out = Vec::new();

    for mut item in items {
        if project.panel(&item.panel_id).is_none() {
            warnings.push(format!("dialogue for unknown panel {}", item.panel_id));
            tracing::warn!(panel_id = %item.panel_id, "Dialogue for unknown panel, dropping");
            continue;
        }

        // Unknown speakers are dropped, never fabricated.
        item.dialogue.retain(|line| {
            if known_speakers.contains(line.speaker.as_str()) {
                true
            } else {
                warnings.push(format!(
                    "unknown speaker {} in {}",
                    line.speaker, item.panel_id
                ));
                tracing::warn!(
                    panel_id = %item.panel_id,
                    speaker = %line.speaker,
                    "Unknown speaker, dropping line",
                );
                false
            }
        });

        item.dialogue.truncate(MAX_LINES_PER_PANEL);
        for line in &mut item.dialogue {
            line.text = truncate_words(&line.text, MAX_LINE_WORDS);
        }
        item.narration = item
            .narration
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());

        if item.panel_id == "panel1" {
            // Cover rule: a title, no dialogue, no narration.
            let existing = project
                .panel("panel1")
                .and_then(|p| p.title.clone())
                .filter(|t| !t.is_empty());
            item.title = item
                .title
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .or(existing)
                .or_else(|| Some(DEFAULT_COVER_TITLE.to_string()));
            item.dialogue.clear();
            item.narration = None;
        } else {
            item.title = None;
            // Dialogue XOR narration: dialogue wins.
            if !item.dialogue.is_empty() && item.narration.is_some() {
                tracing::warn!(panel_id = %item.panel_id, "Panel has dialogue and narration, dropping narration");
                item.narration = None;
            }
        }

        out.push(item);
    }

    (out, warnings)
}

/// Merge normalised lettering into the project by panel id. Dialogue
/// fields are replaced wholesale; everything else on the panel is
/// preserved.
pub fn merge(project: &mut Project, items: Vec<PanelDialogue>) {
    for item in items {
        let Some(panel) = project.panel_mut(&item.panel_id) else {
            continue;
        };
        panel.title = item.title;
        panel.dialogue = item
            .dialogue
            .into_iter()
            .map(|line| DialogueLine {
                speaker: line.speaker,
                text: line.text,
            })
            .collect();
        panel.narration = item.narration;
    }
}

/// Deterministic lettering used when no LLM is configured (mock mode):
/// the cover keeps its title, odd panels get a narration beat, even
/// panels a single line from the first character.
fn mock_items(project: &Project) -> Vec<PanelDialogue> {
    let speaker = project
        .characters
        .first()
        .map(|c| c.id.clone())
        .unwrap_or_else(|| "char_1".to_string());

    project
        .panels
        .iter()
        .enumerate()
        .map(|(i, panel)| {
            if i == 0 {
                PanelDialogue {
                    panel_id: panel.id.clone(),
                    title: panel.title.clone(),
                    dialogue: Vec::new(),
                    narration: None,
                }
            } else if i % 2 == 1 {
                PanelDialogue {
                    panel_id: panel.id.clone(),
                    title: None,
                    dialogue: Vec::new(),
                    narration: Some(format!("The story continues on {}.", panel.id)),
                }
            } else {
                PanelDialogue {
                    panel_id: panel.id.clone(),
                    title: None,
                    dialogue: vec![RawLine {
                        speaker: speaker.clone(),
                        text: "Keep moving.".to_string(),
                    }],
                    narration: None,
                }
            }
        })
        .collect()
}

/// Run the dialogue stage.
pub async fn run(llm: Option<&ChatClient>, project: &mut Project) -> DialogueOutcome {
    let items = match llm {
        Some(client) => match client.chat(SYSTEM_PROMPT, &dialogue_prompt(project)).await {
            Ok(reply) => parse_reply(&reply),
            Err(e) => {
                tracing::warn!(error = %e, "Dialogue LLM call failed");
                None
            }
        },
        None => Some(mock_items(project)),
    };

    let Some(items) = items else {
        tracing::warn!(project_id = %project.id, "Dialogue generation failed, keeping prior text");
        project.dialogue_failed = true;
        return DialogueOutcome {
            success: false,
            warnings: vec!["dialogue generation failed".to_string()],
        };
    };

    let (items, warnings) = normalise(project, items);
    merge(project, items);
    project.dialogue_failed = false;

    tracing::info!(
        project_id = %project.id,
        warnings = warnings.len(),
        "Dialogue merged",
    );
    DialogueOutcome {
        success: true,
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kapow_core::project::{Character, Panel, STATUS_STRUCTURED};

    fn character(id: &str, name: &str, description: &str) -> Character {
        Character {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            references: Vec::new(),
            extra: Default::default(),
        }
    }

    fn project() -> Project {
        let mut p = Project::new("p-test".to_string(), "test");
        p.title = "Red Dust".to_string();
        p.status = STATUS_STRUCTURED.to_string();
        p.characters = vec![
            character("char_1", "Ada", "an astronaut"),
            character("char_2", "Hol", "a hologram"),
        ];
        p.panels = (1..=3)
            .map(|n| {
                let mut panel = Panel::new(format!("panel{n}"), format!("panel {n}"), 832, 1216);
                panel.title = (n == 1).then(|| "Red Dust".to_string());
                panel
            })
            .collect();
        p
    }

    fn item(panel_id: &str, lines: &[(&str, &str)], narration: Option<&str>) -> PanelDialogue {
        PanelDialogue {
            panel_id: panel_id.to_string(),
            title: None,
            dialogue: lines
                .iter()
                .map(|(speaker, text)| RawLine {
                    speaker: speaker.to_string(),
                    text: text.to_string(),
                })
                .collect(),
            narration: narration.map(str::to_string),
        }
    }

    // -- Parsing --

    #[test]
    fn parses_a_fenced_reply() {
        let reply = "Here you go!\n```json\n[{\"panelId\": \"panel2\", \"dialogue\": [{\"speaker\": \"char_1\", \"text\": \"Hi\"}]}]\n```";
        let items = parse_reply(reply).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].panel_id, "panel2");
    }

    #[test]
    fn prose_replies_fail_cleanly() {
        assert!(parse_reply("Sure! Here you go: panel one says hello").is_none());
    }

    #[test]
    fn malformed_entries_are_skipped_not_fatal() {
        let reply = r#"[{"panelId": "panel2"}, {"bogus": true}]"#;
        let items = parse_reply(reply).unwrap();
        assert_eq!(items.len(), 1);
    }

    // -- Normalisation --

    #[test]
    fn unknown_speakers_are_dropped_with_a_warning() {
        let p = project();
        let (items, warnings) = normalise(
            &p,
            vec![item(
                "panel3",
                &[("char_99", "I do not exist"), ("char_1", "But I do")],
                None,
            )],
        );
        assert_eq!(items[0].dialogue.len(), 1);
        assert_eq!(items[0].dialogue[0].speaker, "char_1");
        assert!(warnings.iter().any(|w| w.contains("char_99")));
    }

    #[test]
    fn cover_rule_is_enforced() {
        let p = project();
        let mut cover = item("panel1", &[("char_1", "this must go")], Some("and this"));
        cover.title = Some("  ".to_string()); // blank title from the model
        let (items, _) = normalise(&p, vec![cover]);

        assert_eq!(items[0].title.as_deref(), Some("Red Dust"));
        assert!(items[0].dialogue.is_empty());
        assert!(items[0].narration.is_none());
    }

    #[test]
    fn cover_title_defaults_when_nothing_else_exists() {
        let mut p = project();
        p.panels[0].title = None;
        let (items, _) = normalise(&p, vec![item("panel1", &[], None)]);
        assert_eq!(items[0].title.as_deref(), Some(DEFAULT_COVER_TITLE));
    }

    #[test]
    fn long_lines_are_truncated_to_fourteen_words() {
        let p = project();
        let long = "one two three four five six seven eight nine ten eleven twelve thirteen fourteen fifteen sixteen";
        let (items, _) = normalise(&p, vec![item("panel2", &[("char_1", long)], None)]);
        assert_eq!(items[0].dialogue[0].text.split_whitespace().count(), 14);
    }

    #[test]
    fn at_most_two_lines_per_panel() {
        let p = project();
        let (items, _) = normalise(
            &p,
            vec![item(
                "panel2",
                &[("char_1", "a"), ("char_2", "b"), ("char_1", "c")],
                None,
            )],
        );
        assert_eq!(items[0].dialogue.len(), MAX_LINES_PER_PANEL);
    }

    #[test]
    fn dialogue_beats_narration() {
        let p = project();
        let (items, _) = normalise(
            &p,
            vec![item("panel2", &[("char_1", "hi")], Some("meanwhile..."))],
        );
        assert!(items[0].narration.is_none());
        assert_eq!(items[0].dialogue.len(), 1);
    }

    #[test]
    fn narration_survives_alone() {
        let p = project();
        let (items, _) = normalise(&p, vec![item("panel2", &[], Some("meanwhile..."))]);
        assert_eq!(items[0].narration.as_deref(), Some("meanwhile..."));
    }

    #[test]
    fn unknown_panels_are_dropped() {
        let p = project();
        let (items, warnings) = normalise(&p, vec![item("panel99", &[], None)]);
        assert!(items.is_empty());
        assert!(warnings.iter().any(|w| w.contains("panel99")));
    }

    // -- Merge --

    #[test]
    fn merge_replaces_rather_than_appends() {
        let mut p = project();
        p.panels[1].dialogue = vec![DialogueLine {
            speaker: "char_1".to_string(),
            text: "old line".to_string(),
        }];

        let (items, _) = normalise(&p, vec![item("panel2", &[("char_2", "new line")], None)]);
        merge(&mut p, items);

        assert_eq!(p.panels[1].dialogue.len(), 1);
        assert_eq!(p.panels[1].dialogue[0].text, "new line");
        assert_eq!(p.panels[1].dialogue[0].speaker, "char_2");
    }

    #[test]
    fn merge_preserves_non_dialogue_fields() {
        let mut p = project();
        p.panels[1].cloudinary_url = Some("https://cdn.example.test/keep.png".to_string());
        p.panels[1].seed = Some(42);

        let (items, _) = normalise(&p, vec![item("panel2", &[("char_1", "hi")], None)]);
        merge(&mut p, items);

        assert_eq!(
            p.panels[1].cloudinary_url.as_deref(),
            Some("https://cdn.example.test/keep.png")
        );
        assert_eq!(p.panels[1].seed, Some(42));
    }

    // -- Stage --

    #[tokio::test]
    async fn mock_lettering_satisfies_the_cover_invariant() {
        let mut p = project();
        let outcome = run(None, &mut p).await;

        assert!(outcome.success);
        assert!(!p.dialogue_failed);
        let cover = &p.panels[0];
        assert!(cover.title.as_deref().is_some_and(|t| !t.is_empty()));
        assert!(cover.dialogue.is_empty());
        assert!(cover.narration.is_none());
        // Every dialogue line everywhere names a known character.
        let ids = p.character_ids();
        for panel in &p.panels {
            for line in &panel.dialogue {
                assert!(ids.contains(line.speaker.as_str()));
            }
        }
    }
}
