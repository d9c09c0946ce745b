//! Story structurer: expands the request into characters and panels.
//!
//! The LLM is asked for a structured outline; whatever comes back is
//! normalised until the output guarantee holds: exactly
//! `page_count * ceil(6 / page_count)` panels, `panel1` first with the
//! cover title set, every prompt non-empty, characters with stable
//! `char_N` ids. On any model failure the deterministic fallback
//! outline is transcribed instead.

use kapow_core::layout::{fallback_panel_count, layout_for, panels_per_page};
use kapow_core::project::{Character, Panel, Project, STATUS_STRUCTURED};
use kapow_core::prompts::{
    fallback_outline, panel_prompt, story_prompt, StoryOutline, StoryRequest,
};
use kapow_core::types::{char_id, panel_id, panel_number, PanelId};
use kapow_llm::extract::extract_json;
use kapow_llm::ChatClient;

const SYSTEM_PROMPT: &str =
    "You are a comic book writer and story architect. You respond with strict JSON only.";

/// Default generation dimensions for panels beyond the layout budget.
const DEFAULT_PANEL_SIZE: (u32, u32) = (832, 1216);

/// Parse the LLM reply into an outline, if possible.
pub fn parse_outline(reply: &str) -> Option<StoryOutline> {
    let value = extract_json(reply)?;
    match serde_json::from_value::<StoryOutline>(value) {
        Ok(outline) if !outline.title.trim().is_empty() => Some(outline),
        Ok(_) => {
            tracing::warn!("Story outline has an empty title, discarding");
            None
        }
        Err(e) => {
            tracing::warn!(error = %e, "Story outline JSON has the wrong shape");
            None
        }
    }
}

/// Keep only context references that point at strictly earlier panels,
/// so the conditioning graph stays a DAG in panel index order.
pub fn validate_context_ids(own_index: u32, context: Vec<PanelId>) -> Vec<PanelId> {
    context
        .into_iter()
        .filter(|id| match panel_number(id) {
            Some(n) if n <= own_index => true,
            _ => {
                tracing::warn!(
                    panel = %panel_id(own_index + 1),
                    context = %id,
                    "Dropping forward or invalid context reference",
                );
                false
            }
        })
        .collect()
}

/// Transcribe an outline into the project's characters and panels.
///
/// Pure except for warnings; always satisfies the structurer output
/// guarantee regardless of how malformed the outline is.
pub fn transcribe_outline(project: &mut Project, outline: &StoryOutline, req: &StoryRequest) {
    let total = fallback_panel_count(req.page_count) as usize;
    let per_page = panels_per_page(req.page_count) as usize;

    // -- Title --
    let title = outline.title.trim();
    project.title = if title.is_empty() {
        kapow_core::prompts::FALLBACK_TITLE.to_string()
    } else {
        title.to_string()
    };

    // -- Characters: stable char_N ids by insertion order --
    let mut characters: Vec<Character> = outline
        .character_notes
        .iter()
        .filter(|note| !note.name.trim().is_empty())
        .enumerate()
        .map(|(i, note)| Character {
            id: char_id(i as u32 + 1),
            name: note.name.trim().to_string(),
            description: note.description.trim().to_string(),
            references: Vec::new(),
            extra: Default::default(),
        })
        .collect();
    if characters.is_empty() {
        characters.push(Character {
            id: char_id(1),
            name: "The Protagonist".to_string(),
            description: format!("The central figure of: {}", req.prompt),
            references: Vec::new(),
            extra: Default::default(),
        });
    }
    project.characters = characters;

    // -- Panel descriptions: flatten, then pad or truncate to the
    //    exact budget so every layout slot resolves --
    let mut descriptions: Vec<String> = outline
        .scenes
        .iter()
        .flat_map(|scene| scene.panels.iter())
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
        .collect();
    if descriptions.len() != total {
        tracing::warn!(
            got = descriptions.len(),
            expected = total,
            "Outline panel count mismatch, adjusting",
        );
    }
    descriptions.truncate(total);
    while descriptions.len() < total {
        let n = descriptions.len() + 1;
        descriptions.push(format!(
            "Panel {n} of {total}: {prompt}, {style} style, {genre} mood",
            prompt = req.prompt,
            style = req.style,
            genre = req.genre,
        ));
    }

    // Generation dimensions come from the layout slot where one exists.
    let template = layout_for(req.page_count);
    let slot_sizes: std::collections::HashMap<PanelId, (u32, u32)> = template
        .pages
        .iter()
        .flat_map(|page| page.slots.iter())
        .filter_map(|slot| {
            kapow_core::layout::parse_size(slot.size)
                .map(|(w, h)| (slot.panel_id.clone(), (w as u32, h as u32)))
        })
        .collect();

    let cover_title = project.title.clone();
    project.panels = descriptions
        .iter()
        .enumerate()
        .map(|(i, description)| {
            let number = i as u32 + 1;
            let id = panel_id(number);
            let is_cover = i == 0;
            let (width, height) = slot_sizes.get(&id).copied().unwrap_or(DEFAULT_PANEL_SIZE);
            let mut panel = Panel::new(
                id,
                panel_prompt(description, &req.style, &req.genre, is_cover),
                width,
                height,
            );
            panel.page_index = (i / per_page) as u32;
            if is_cover {
                // The cover carries the comic title from the start so a
                // later dialogue failure still leaves a titled cover.
                panel.title = Some(cover_title.clone());
            } else {
                panel.context_panel_ids =
                    validate_context_ids(i as u32, vec![panel_id(number - 1)]);
            }
            panel
        })
        .collect();

    project.status = STATUS_STRUCTURED.to_string();
}

/// Run the structurer stage: LLM call with deterministic fallback.
pub async fn run(llm: Option<&ChatClient>, project: &mut Project, req: &StoryRequest) {
    let outline = match llm {
        Some(client) => match client.chat(SYSTEM_PROMPT, &story_prompt(req)).await {
            Ok(reply) => match parse_outline(&reply) {
                Some(outline) => outline,
                None => {
                    tracing::warn!("Unparsable story outline, using fallback story");
                    fallback_outline(req)
                }
            },
            Err(e) => {
                tracing::warn!(error = %e, "Story LLM call failed, using fallback story");
                fallback_outline(req)
            }
        },
        None => fallback_outline(req),
    };

    transcribe_outline(project, &outline, req);
    tracing::info!(
        project_id = %project.id,
        title = %project.title,
        characters = project.characters.len(),
        panels = project.panels.len(),
        "Story structured",
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use kapow_core::project::STATUS_CREATED;

    fn request(page_count: u32) -> StoryRequest {
        StoryRequest {
            prompt: "a mars astronaut meets a hologram".to_string(),
            genre: "sci-fi".to_string(),
            style: "cinematic".to_string(),
            tone: "hopeful".to_string(),
            target_audience: "general".to_string(),
            page_count,
        }
    }

    fn empty_project() -> Project {
        let p = Project::new("p-test".to_string(), "a mars astronaut meets a hologram");
        assert_eq!(p.status, STATUS_CREATED);
        p
    }

    #[test]
    fn fallback_transcription_satisfies_the_output_guarantee() {
        for page_count in 1..=6 {
            let req = request(page_count);
            let mut project = empty_project();
            transcribe_outline(&mut project, &fallback_outline(&req), &req);

            assert_eq!(
                project.panels.len() as u32,
                fallback_panel_count(page_count)
            );
            assert_eq!(project.panels[0].id, "panel1");
            assert!(project.panels.iter().all(|p| !p.prompt.is_empty()));
            assert!(!project.characters.is_empty());
        }
    }

    #[test]
    fn character_ids_follow_insertion_order() {
        let reply = r#"{
            "title": "Red Dust",
            "characterNotes": [
                {"name": "Ada", "description": "an astronaut"},
                {"name": "Hol", "description": "a hologram"}
            ],
            "scenes": [{"description": "s", "panels": ["a", "b"]}]
        }"#;
        let outline = parse_outline(reply).unwrap();
        let req = request(3);
        let mut project = empty_project();
        transcribe_outline(&mut project, &outline, &req);

        assert_eq!(project.characters[0].id, "char_1");
        assert_eq!(project.characters[0].name, "Ada");
        assert_eq!(project.characters[1].id, "char_2");
    }

    #[test]
    fn short_outlines_are_padded_to_the_budget() {
        let outline = parse_outline(r#"{"title": "T", "scenes": [{"panels": ["only one"]}]}"#)
            .unwrap();
        let req = request(3);
        let mut project = empty_project();
        transcribe_outline(&mut project, &outline, &req);
        assert_eq!(project.panels.len(), 6);
    }

    #[test]
    fn oversized_outlines_are_truncated_to_the_budget() {
        let panels: Vec<String> = (0..40).map(|i| format!("\"p{i}\"")).collect();
        let reply = format!(
            r#"{{"title": "T", "scenes": [{{"panels": [{}]}}]}}"#,
            panels.join(",")
        );
        let req = request(3);
        let mut project = empty_project();
        transcribe_outline(&mut project, &parse_outline(&reply).unwrap(), &req);
        assert_eq!(project.panels.len(), 6);
    }

    #[test]
    fn cover_panel_gets_the_title_and_no_context() {
        let req = request(3);
        let mut project = empty_project();
        transcribe_outline(&mut project, &fallback_outline(&req), &req);

        let cover = &project.panels[0];
        assert_eq!(cover.title.as_deref(), Some("Generated Story"));
        assert!(cover.context_panel_ids.is_empty());
        assert!(cover.prompt.contains("cover art"));
    }

    #[test]
    fn context_references_only_point_backwards() {
        let req = request(3);
        let mut project = empty_project();
        transcribe_outline(&mut project, &fallback_outline(&req), &req);

        for (i, panel) in project.panels.iter().enumerate() {
            for ctx in &panel.context_panel_ids {
                let n = panel_number(ctx).unwrap();
                assert!(n as usize <= i, "{} references {}", panel.id, ctx);
            }
        }
    }

    #[test]
    fn forward_context_references_are_dropped() {
        let cleaned = validate_context_ids(
            2,
            vec![
                "panel1".to_string(),
                "panel4".to_string(),
                "bogus".to_string(),
            ],
        );
        assert_eq!(cleaned, vec!["panel1"]);
    }

    #[test]
    fn unparsable_replies_are_rejected() {
        assert!(parse_outline("Sure! Here's your story: once upon a time").is_none());
        assert!(parse_outline(r#"{"scenes": []}"#).is_none()); // missing title
        assert!(parse_outline(r#"{"title": "   "}"#).is_none());
    }

    #[test]
    fn panel_dimensions_come_from_the_layout() {
        let req = request(3);
        let mut project = empty_project();
        transcribe_outline(&mut project, &fallback_outline(&req), &req);

        // Cover slot is 896x1152 in every template.
        assert_eq!(project.panels[0].width, 896);
        assert_eq!(project.panels[0].height, 1152);
    }
}
