//! Project document read access.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;

use crate::error::AppResult;
use crate::state::AppState;

/// GET /projects/{id}
///
/// Returns the stored project document as JSON.
pub async fn get_project(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let project = state.pipeline.store().load(&id).await?;
    Ok(Json(project))
}
