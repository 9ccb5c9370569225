//! `GET/POST /api/watchlist`, `DELETE /api/watchlist/:cid`.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use chrono::{TimeZone, Utc};
use rosterwatch_domain::schema::{
    key_membermeta, MemberMetaEntry, OnlineStateMap, WatchlistEntry, KEY_ONLINE_STATE, KEY_WATCHLIST,
};
use rosterwatch_domain::{Cid, Error};
use serde::Deserialize;

use super::common::{api_error, error_response, load_store};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct AddRequest {
    cid: serde_json::Value,
}

fn parse_cid(raw: &serde_json::Value) -> Result<Cid, Error> {
    let as_str = match raw {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        _ => return Err(Error::ClientInput("Invalid CID format".into())),
    };
    Cid::parse(&as_str)
}

fn display_name<T: rosterwatch_store::ContentStoreTransport>(
    store: &rosterwatch_store::Store<T>,
    cid: &Cid,
) -> String {
    store
        .get_typed::<MemberMetaEntry>(&key_membermeta(cid))
        .ok()
        .flatten()
        .and_then(|m| m.name)
        .unwrap_or_else(|| format!("Controller {cid}"))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /api/watchlist
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn list(State(state): State<AppState>) -> Response {
    let store = match load_store(&state).await {
        Ok(s) => s,
        Err(e) => return e,
    };

    let entries: Vec<WatchlistEntry> = store.get_typed(KEY_WATCHLIST).unwrap_or_default().unwrap_or_default();
    let online: OnlineStateMap = store.get_typed(KEY_ONLINE_STATE).unwrap_or_default().unwrap_or_default();

    let users: Vec<_> = entries
        .into_iter()
        .map(|entry| {
            let is_online = online.get(entry.cid.as_str()).map(|s| s.online).unwrap_or(false);
            serde_json::json!({
                "cid": entry.cid.as_str(),
                "name": display_name(&store, &entry.cid),
                "addedAt": Utc.timestamp_opt(entry.added_at, 0).single().map(|t| t.to_rfc3339()),
                "isOnline": is_online,
            })
        })
        .collect();

    Json(serde_json::json!({ "users": users })).into_response()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /api/watchlist
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn add(State(state): State<AppState>, Json(body): Json<AddRequest>) -> Response {
    let cid = match parse_cid(&body.cid) {
        Ok(cid) => cid,
        Err(e) => return error_response(e),
    };

    let mut store = match load_store(&state).await {
        Ok(s) => s,
        Err(e) => return e,
    };

    let mut entries: Vec<WatchlistEntry> = store.get_typed(KEY_WATCHLIST).unwrap_or_default().unwrap_or_default();
    if entries.iter().any(|e| e.cid == cid) {
        return api_error(StatusCode::CONFLICT, "Already on watchlist");
    }

    match state.feed.member_exists(&cid).await {
        Ok(false) => return api_error(StatusCode::NOT_FOUND, "Unknown controller"),
        Err(e) => {
            tracing::warn!(error = %e, %cid, "member existence check failed");
            return api_error(StatusCode::INTERNAL_SERVER_ERROR, "internal error");
        }
        Ok(true) => {}
    }

    let added_at = Utc::now().timestamp();
    entries.push(WatchlistEntry { cid: cid.clone(), added_at });
    entries.sort_by_key(|e| e.cid.numeric());
    if store.set_typed(KEY_WATCHLIST, &entries).is_err() {
        return api_error(StatusCode::INTERNAL_SERVER_ERROR, "internal error");
    }

    let name = display_name(&store, &cid);
    if let Err(e) = store.flush("watchlist add", &state.config.budget).await {
        return error_response(e);
    }

    Json(serde_json::json!({
        "success": true,
        "user": {
            "cid": cid.as_str(),
            "name": name,
            "addedAt": Utc.timestamp_opt(added_at, 0).single().map(|t| t.to_rfc3339()),
        }
    }))
    .into_response()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// DELETE /api/watchlist/:cid
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn remove(State(state): State<AppState>, Path(raw_cid): Path<String>) -> Response {
    let cid = match Cid::parse(&raw_cid) {
        Ok(cid) => cid,
        Err(e) => return error_response(e),
    };

    let mut store = match load_store(&state).await {
        Ok(s) => s,
        Err(e) => return e,
    };

    let mut entries: Vec<WatchlistEntry> = store.get_typed(KEY_WATCHLIST).unwrap_or_default().unwrap_or_default();
    let before = entries.len();
    entries.retain(|e| e.cid != cid);
    if entries.len() == before {
        return api_error(StatusCode::NOT_FOUND, "Not on watchlist");
    }

    if store.set_typed(KEY_WATCHLIST, &entries).is_err() {
        return api_error(StatusCode::INTERNAL_SERVER_ERROR, "internal error");
    }
    if let Err(e) = store.flush("watchlist remove", &state.config.budget).await {
        return error_response(e);
    }

    Json(serde_json::json!({ "success": true })).into_response()
}
