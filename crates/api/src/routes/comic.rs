use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{comic, project};
use crate::state::AppState;

/// Mount the comic generation routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/generate-comic", post(comic::generate_comic))
        .route("/regenerate-panels", post(comic::regenerate_panels))
        .route("/projects/{id}", get(project::get_project))
}
