//! `GET /api/stats`: aggregate counts from watchlist, active job, and
//! partial results.

use axum::extract::State;
use axum::response::{IntoResponse, Json, Response};
use rosterwatch_domain::schema::{
    key_audit_partial, Job, OnlineStateMap, PartialResult, Scope, WatchlistEntry, KEY_AUDIT_JOB,
    KEY_ONLINE_STATE, KEY_WATCHLIST,
};

use super::common::load_store;
use crate::state::AppState;

pub async fn get_stats(State(state): State<AppState>) -> Response {
    let store = match load_store(&state).await {
        Ok(s) => s,
        Err(e) => return e,
    };

    let entries: Vec<WatchlistEntry> = store.get_typed(KEY_WATCHLIST).unwrap_or_default().unwrap_or_default();
    let online: OnlineStateMap = store.get_typed(KEY_ONLINE_STATE).unwrap_or_default().unwrap_or_default();
    let online_count = entries
        .iter()
        .filter(|e| online.get(e.cid.as_str()).map(|s| s.online).unwrap_or(false))
        .count();

    let job: Option<Job> = store.get_typed(KEY_AUDIT_JOB).unwrap_or_default();
    let active_job = job.as_ref().map(|j| {
        serde_json::json!({
            "scope": j.scope.to_string(),
            "cursor": j.cursor,
            "total": j.total,
        })
    });

    let visiting: Vec<PartialResult> = store
        .get_typed(&key_audit_partial(Scope::Visiting))
        .unwrap_or_default()
        .unwrap_or_default();
    let local: Vec<PartialResult> = store
        .get_typed(&key_audit_partial(Scope::Local))
        .unwrap_or_default()
        .unwrap_or_default();
    let flagged_count = visiting.iter().chain(local.iter()).filter(|p| p.flagged).count();

    Json(serde_json::json!({
        "totalWatchlist": entries.len(),
        "totalOnline": online_count,
        "activeJob": active_job,
        "totalFlagged": flagged_count,
    }))
    .into_response()
}
