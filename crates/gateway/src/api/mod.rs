pub mod admin;
pub mod audit;
mod common;
pub mod presence;
pub mod stats;
pub mod watchlist;

use axum::routing::{delete, get, post};
use axum::Router;

use crate::state::AppState;

/// Build the full API router. Every `/api/*` route here is public — the
/// roster/audit API names no authentication surface, since the dashboard
/// is a public static consumer.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/health", get(admin::health))
        .route("/api/openapi.json", get(admin::openapi_spec))
        .route("/api/watchlist", get(watchlist::list).post(watchlist::add))
        .route("/api/watchlist/:cid", delete(watchlist::remove))
        .route("/api/audit/:scope", get(audit::get_scope))
        .route("/api/audit/run", post(audit::run_manual))
        .route("/api/presence", get(presence::get_presence))
        .route("/api/stats", get(stats::get_stats))
}
