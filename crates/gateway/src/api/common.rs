//! Shared handler helpers.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use rosterwatch_domain::Error;
use rosterwatch_store::Store;

use crate::state::AppState;

/// Build a standardized JSON error response: `{ "error": "<message>" }`.
pub(crate) fn api_error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

/// Map an engine/store `Error` to the HTTP status it should surface as.
pub(crate) fn error_response(error: Error) -> Response {
    match error {
        Error::ClientInput(msg) => api_error(StatusCode::BAD_REQUEST, msg),
        Error::NotFound(msg) => api_error(StatusCode::NOT_FOUND, msg),
        Error::Conflict(msg) => api_error(StatusCode::CONFLICT, msg),
        other => {
            tracing::error!(error = %other, "unhandled error in API handler");
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
        }
    }
}

/// Construct and load a fresh request-scoped store over the shared transport.
pub(crate) async fn load_store(
    state: &AppState,
) -> Result<Store<std::sync::Arc<dyn rosterwatch_store::ContentStoreTransport>>, Response> {
    let mut store = Store::new(state.transport.clone());
    store.load().await.map_err(error_response)?;
    Ok(store)
}
