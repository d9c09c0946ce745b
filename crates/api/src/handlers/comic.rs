//! Handlers for the comic generation surface.
//!
//! Routes:
//! - `POST /generate-comic`     — run the full pipeline
//! - `POST /regenerate-panels`  — selectively regenerate named panels

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use kapow_pipeline::ComicRequest;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateComicBody {
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub art_style: Option<String>,
    #[serde(default)]
    pub page_count: Option<u32>,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub tone: Option<String>,
    #[serde(default)]
    pub target_audience: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PageEntry {
    pub page: u32,
    pub url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateComicResponse {
    pub project_id: String,
    pub pages: Vec<PageEntry>,
    pub errors: Vec<String>,
}

/// POST /generate-comic
///
/// Validates the prompt, then runs the full pipeline. Partial panel
/// failures still produce a 200 with the failed panels listed under
/// `errors`; only a run with no pages at all is a 500.
pub async fn generate_comic(
    State(state): State<AppState>,
    Json(body): Json<GenerateComicBody>,
) -> AppResult<impl IntoResponse> {
    let prompt = body
        .prompt
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .ok_or_else(|| AppError::BadRequest("prompt is required".to_string()))?
        .to_string();

    let cancel = state.shutdown.child_token();
    let result = state
        .pipeline
        .generate_comic(
            ComicRequest {
                prompt,
                genre: body.genre,
                art_style: body.art_style,
                tone: body.tone,
                target_audience: body.target_audience,
                page_count: body.page_count,
            },
            &cancel,
        )
        .await?;

    Ok(Json(GenerateComicResponse {
        project_id: result.project_id,
        pages: result
            .pages
            .into_iter()
            .map(|p| PageEntry {
                page: p.page,
                url: p.url,
            })
            .collect(),
        errors: result.errors,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegeneratePanelsBody {
    #[serde(default)]
    pub panel_ids: Option<String>,
    /// Optional; the most recently saved project is used when absent.
    #[serde(default)]
    pub project_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegeneratePanelsResponse {
    pub success: bool,
    pub total_requested: usize,
    pub successful_panels: usize,
    pub failed_panel_ids: Vec<String>,
    pub skipped_panel_ids: Vec<String>,
    /// Panel id -> freshly uploaded URL.
    pub source_map: std::collections::BTreeMap<String, String>,
}

/// POST /regenerate-panels
///
/// Accepts a comma-separated id list (`"panel4,panel7"`). Unknown ids
/// are skipped, not fatal; zero resolvable ids yields
/// `success: false` without touching the project.
pub async fn regenerate_panels(
    State(state): State<AppState>,
    Json(body): Json<RegeneratePanelsBody>,
) -> AppResult<impl IntoResponse> {
    let raw_ids = body
        .panel_ids
        .as_deref()
        .map(str::trim)
        .filter(|ids| !ids.is_empty())
        .ok_or_else(|| AppError::BadRequest("panelIds is required".to_string()))?;

    let cancel = state.shutdown.child_token();
    let result = state
        .pipeline
        .regenerate_panels(body.project_id, raw_ids, &cancel)
        .await?;

    Ok(Json(RegeneratePanelsResponse {
        success: result.success,
        total_requested: result.total_requested,
        successful_panels: result.successful_panels,
        failed_panel_ids: result.failed_panel_ids,
        skipped_panel_ids: result.skipped_panel_ids,
        source_map: result.source_map,
    }))
}
