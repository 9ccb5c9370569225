//! `GET /api/audit/:scope`, `POST /api/audit/run`.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{TimeZone, Utc};
use rosterwatch_domain::schema::{
    key_audit_partial, key_membermeta, Job, MemberMetaEntry, PartialResult, Scope, WatchlistEntry,
    KEY_AUDIT_JOB, KEY_WATCHLIST,
};

use super::common::{api_error, error_response, load_store};
use crate::state::AppState;

fn parse_scope(raw: &str) -> Option<Scope> {
    match raw {
        "visiting" => Some(Scope::Visiting),
        "local" => Some(Scope::Local),
        _ => None,
    }
}

fn rfc3339(epoch_s: i64) -> Option<String> {
    Utc.timestamp_opt(epoch_s, 0).single().map(|t| t.to_rfc3339())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /api/audit/:scope
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn get_scope(State(state): State<AppState>, Path(raw_scope): Path<String>) -> Response {
    let Some(scope) = parse_scope(&raw_scope) else {
        return api_error(StatusCode::BAD_REQUEST, "Invalid scope");
    };

    let store = match load_store(&state).await {
        Ok(s) => s,
        Err(e) => return e,
    };

    let job: Option<Job> = store.get_typed(KEY_AUDIT_JOB).ok().flatten();
    let names: std::collections::HashMap<String, String> = store
        .get_typed::<Vec<WatchlistEntry>>(KEY_WATCHLIST)
        .ok()
        .flatten()
        .unwrap_or_default()
        .into_iter()
        .map(|entry| {
            let name = store
                .get_typed::<MemberMetaEntry>(&key_membermeta(&entry.cid))
                .ok()
                .flatten()
                .and_then(|m| m.name)
                .unwrap_or_else(|| format!("Controller {}", entry.cid));
            (entry.cid.as_str().to_string(), name)
        })
        .collect();

    let active = match &job {
        Some(j) if j.scope == scope => {
            let progress = if j.total == 0 { 100 } else { (j.cursor * 100 / j.total).min(100) };
            vec![serde_json::json!({
                "id": format!("audit_job_{scope}"),
                "type": scope.to_string(),
                "status": "active",
                "progress": progress,
                "ticksRemaining": j.total.saturating_sub(j.cursor),
                "startedAt": rfc3339(j.created_at),
                "completedAt": serde_json::Value::Null,
            })]
        }
        _ => vec![],
    };

    let partials: Vec<PartialResult> = store
        .get_typed(&key_audit_partial(scope))
        .ok()
        .flatten()
        .unwrap_or_default();

    let completed: Vec<_> = partials
        .iter()
        .map(|p| {
            let name = names
                .get(p.cid.as_str())
                .cloned()
                .unwrap_or_else(|| format!("Controller {}", p.cid));
            serde_json::json!({
                "id": format!("audit_{}", p.cid),
                "cid": p.cid.as_str(),
                "name": name,
                "type": scope.to_string(),
                "status": "completed",
                "hoursLogged": p.hours,
                "ticksRemaining": 0,
                "startedAt": rfc3339(p.computed_at),
                "completedAt": rfc3339(p.computed_at),
            })
        })
        .collect();

    let average_hours = if partials.is_empty() {
        0.0
    } else {
        partials.iter().map(|p| p.hours).sum::<f64>() / partials.len() as f64
    };
    let total_active = active.len();
    let total_completed = completed.len();

    Json(serde_json::json!({
        "active": active,
        "completed": completed,
        "stats": {
            "totalActive": total_active,
            "totalCompleted": total_completed,
            "averageHours": average_hours,
        }
    }))
    .into_response()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /api/audit/run
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn run_manual(State(state): State<AppState>) -> Response {
    let mut store = match load_store(&state).await {
        Ok(s) => s,
        Err(e) => return e,
    };

    if store.get(KEY_AUDIT_JOB).is_some() {
        return api_error(StatusCode::CONFLICT, "A job is already active");
    }

    let entries: Vec<WatchlistEntry> = store.get_typed(KEY_WATCHLIST).ok().flatten().unwrap_or_default();
    let mut cids: Vec<_> = entries.into_iter().map(|e| e.cid).collect();
    cids.sort_by_key(|c| c.numeric());

    let job = rosterwatch_engine::job::new_job(Scope::Visiting, cids, Utc::now().timestamp());
    if store.set_typed(KEY_AUDIT_JOB, &job).is_err() {
        return api_error(StatusCode::INTERNAL_SERVER_ERROR, "internal error");
    }
    store.del(&key_audit_partial(Scope::Visiting));

    if let Err(e) = store.flush("manual audit run", &state.config.budget).await {
        return error_response(e);
    }

    Json(serde_json::json!({ "success": true, "total": job.total })).into_response()
}
