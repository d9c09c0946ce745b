//! Prompt builder: pure transformations from a story request into the
//! text sent to the language model, plus the deterministic fallback
//! used when the model fails.

use serde::Deserialize;

use crate::layout::{fallback_panel_count, panels_per_page};
use crate::project::Project;

/// Genres the config surface recognises. Unknown values warn but pass
/// through unchanged.
pub const GENRES: &[&str] = &[
    "adventure",
    "fantasy",
    "sci-fi",
    "mystery",
    "horror",
    "comedy",
    "drama",
    "action",
    "romance",
    "superhero",
    "noir",
    "western",
];

pub const STYLES: &[&str] = &[
    "cinematic",
    "anime",
    "manga",
    "western",
    "realistic",
    "cartoon",
    "noir",
    "fantasy",
    "sci-fi",
    "horror",
    "watercolor",
    "sketch",
];

pub const AUDIENCES: &[&str] = &[
    "children",
    "teen",
    "young-adult",
    "adult",
    "general",
    "family",
];

/// Title used by the deterministic fallback story.
pub const FALLBACK_TITLE: &str = "Generated Story";

/// Normalise a config value against a known vocabulary, warning on
/// unknown entries without rejecting them.
pub fn vocab_or_warn(kind: &str, value: &str, allowed: &[&str]) -> String {
    let normalised = value.trim().to_lowercase();
    if !allowed.contains(&normalised.as_str()) {
        tracing::warn!(kind, value = %value, "Unrecognised config value");
    }
    normalised
}

/// The incoming story request, after HTTP-level validation.
#[derive(Debug, Clone)]
pub struct StoryRequest {
    pub prompt: String,
    pub genre: String,
    pub style: String,
    pub tone: String,
    pub target_audience: String,
    /// Already clamped to the supported range.
    pub page_count: u32,
}

/// The structured story the LLM is asked to return, parsed tolerantly:
/// every field besides `title` may be missing.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryOutline {
    pub title: String,
    #[serde(default)]
    pub synopsis: String,
    #[serde(default)]
    pub theme: String,
    #[serde(default)]
    pub scenes: Vec<SceneOutline>,
    #[serde(default)]
    pub character_notes: Vec<CharacterNote>,
    #[serde(default)]
    pub visual_style: String,
}

/// One scene (= one page) of the outline.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneOutline {
    #[serde(default)]
    pub description: String,
    /// Per-panel visual descriptions for this scene.
    #[serde(default)]
    pub panels: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterNote {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Build the story structuring prompt for the LLM.
pub fn story_prompt(req: &StoryRequest) -> String {
    let scenes = req.page_count;
    let per_page = panels_per_page(req.page_count);
    format!(
        r#"You are a comic book writer. Expand the premise below into a short {genre} comic for a {audience} audience, drawn in a {style} style with a {tone} tone.

Respond with a single JSON object and nothing else:
{{
  "title": "...",
  "synopsis": "...",
  "theme": "...",
  "visualStyle": "...",
  "characterNotes": [{{"name": "...", "description": "..."}}],
  "scenes": [{{"description": "...", "panels": ["...", "..."]}}]
}}

Rules:
- Exactly {scenes} scenes, one per page, each with exactly {per_page} panel descriptions.
- The very first panel of the first scene is the cover illustration: one striking image that sells the whole story.
- Panel descriptions are purely visual: setting, characters present, action, framing. No dialogue.
- Keep characters consistent across panels (appearance, clothing, hair).
- 2 to 4 characters total.

Premise:
{prompt}
"#,
        genre = req.genre,
        audience = req.target_audience,
        style = req.style,
        tone = req.tone,
        scenes = scenes,
        per_page = per_page,
        prompt = req.prompt,
    )
}

/// Deterministic fallback outline, used whenever the LLM call fails or
/// returns something unparsable. Produces exactly
/// `page_count * ceil(6 / page_count)` placeholder panels.
pub fn fallback_outline(req: &StoryRequest) -> StoryOutline {
    let per_page = panels_per_page(req.page_count) as usize;
    let total = fallback_panel_count(req.page_count);

    let scenes = (0..req.page_count)
        .map(|page| SceneOutline {
            description: format!("Scene {} of the story: {}", page + 1, req.prompt),
            panels: (0..per_page)
                .map(|i| {
                    let n = page as usize * per_page + i + 1;
                    format!(
                        "Panel {n} of {total}: {prompt}, {style} style, {genre} mood",
                        prompt = req.prompt,
                        style = req.style,
                        genre = req.genre,
                    )
                })
                .collect(),
        })
        .collect();

    StoryOutline {
        title: FALLBACK_TITLE.to_string(),
        synopsis: req.prompt.clone(),
        theme: req.genre.clone(),
        scenes,
        character_notes: vec![CharacterNote {
            name: "The Protagonist".to_string(),
            description: format!("The central figure of: {}", req.prompt),
        }],
        visual_style: req.style.clone(),
    }
}

/// Build the final image-model prompt for one panel.
pub fn panel_prompt(description: &str, style: &str, genre: &str, is_cover: bool) -> String {
    if is_cover {
        format!(
            "Comic book cover art, {style} style, {genre} genre. {description}. \
             Dramatic composition, no text, no speech bubbles, no watermarks."
        )
    } else {
        format!(
            "Comic book panel, {style} style, {genre} genre. {description}. \
             Clean line art, consistent characters, no text, no speech bubbles."
        )
    }
}

/// Build the dialogue generation prompt from the structured project.
pub fn dialogue_prompt(project: &Project) -> String {
    let mut roster = String::new();
    for c in &project.characters {
        roster.push_str(&format!("- {} ({}): {}\n", c.id, c.name, c.description));
    }

    let mut panels = String::new();
    for p in &project.panels {
        panels.push_str(&format!("- {}: {}\n", p.id, p.prompt));
    }

    format!(
        r#"You are lettering a {genre} comic titled "{title}" with a {tone} tone. Story: {synopsis}

Characters (use the id as the speaker):
{roster}
Panels, in order:
{panels}
Respond with a single JSON array and nothing else, one object per panel, in panel order:
[{{"panelId": "panel1", "title": "..." , "dialogue": [{{"speaker": "char_1", "text": "..."}}], "narration": null}}]

Rules:
- panel1 is the cover: give it a punchy title, an empty dialogue array and null narration.
- Every other panel: either 1-2 short dialogue lines OR one line of narration, never both.
- Dialogue lines are at most 14 words. Speakers must be character ids from the roster.
- Narration is a single evocative sentence.
"#,
        genre = project.genre,
        title = project.title,
        tone = project
            .extra
            .get("tone")
            .and_then(|v| v.as_str())
            .unwrap_or("balanced"),
        synopsis = project.user_prompt,
        roster = roster,
        panels = panels,
    )
}
