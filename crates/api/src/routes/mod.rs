//! Route table. The comic surface lives at the root, matching the
//! public API contract.

pub mod comic;
pub mod health;

use axum::Router;

use crate::state::AppState;

/// All application routes.
pub fn app_routes() -> Router<AppState> {
    Router::new().merge(health::router()).merge(comic::router())
}
