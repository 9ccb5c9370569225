//! `GET /api/presence`: watchlist controllers currently online.

use axum::extract::State;
use axum::response::{IntoResponse, Json, Response};
use rosterwatch_domain::schema::{OnlineStateMap, WatchlistEntry, KEY_ONLINE_STATE, KEY_WATCHLIST};

use super::common::load_store;
use crate::state::AppState;

pub async fn get_presence(State(state): State<AppState>) -> Response {
    let store = match load_store(&state).await {
        Ok(s) => s,
        Err(e) => return e,
    };

    let entries: Vec<WatchlistEntry> = store.get_typed(KEY_WATCHLIST).unwrap_or_default().unwrap_or_default();
    let online: OnlineStateMap = store.get_typed(KEY_ONLINE_STATE).unwrap_or_default().unwrap_or_default();

    let result: Vec<_> = entries
        .into_iter()
        .filter_map(|entry| {
            let state = online.get(entry.cid.as_str())?;
            if !state.online {
                return None;
            }
            Some(serde_json::json!({
                "cid": entry.cid.as_str(),
                "callsign": state.last_info.callsign,
                "frequency": state.last_info.frequency,
                "name": state.last_info.name,
                "since": state.last_change,
            }))
        })
        .collect();

    Json(serde_json::json!({ "online": result })).into_response()
}
