//! Health and OpenAPI introspection endpoints.

use axum::response::{IntoResponse, Json};

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn openapi_spec() -> impl IntoResponse {
    use axum::http::header;

    let spec = serde_json::json!({
        "openapi": "3.0.3",
        "info": {
            "title": "rosterwatch API",
            "version": env!("CARGO_PKG_VERSION"),
            "description": "Controller roster audit gateway — watchlist, audit progress, and presence for the dashboard."
        },
        "servers": [{ "url": "/", "description": "Current host" }],
        "components": {
            "schemas": {
                "Error": {
                    "type": "object",
                    "properties": { "error": { "type": "string" } }
                }
            }
        },
        "paths": {
            "/api/health": {
                "get": { "summary": "Liveness probe", "tags": ["Admin"], "responses": { "200": { "description": "ok" } } }
            },
            "/api/watchlist": {
                "get": { "summary": "List watchlist", "tags": ["Watchlist"], "responses": { "200": { "description": "Watchlist users" } } },
                "post": { "summary": "Add a controller to the watchlist", "tags": ["Watchlist"], "requestBody": { "required": true, "content": { "application/json": { "schema": { "type": "object", "required": ["cid"], "properties": { "cid": { "type": "string" } } } } } }, "responses": { "200": { "description": "Added" }, "400": { "description": "Invalid CID" }, "404": { "description": "Unknown controller" }, "409": { "description": "Already on watchlist" } } }
            },
            "/api/watchlist/{cid}": {
                "delete": { "summary": "Remove a controller from the watchlist", "tags": ["Watchlist"], "parameters": [{ "name": "cid", "in": "path", "required": true, "schema": { "type": "string" } }], "responses": { "200": { "description": "Removed" }, "404": { "description": "Not on watchlist" } } }
            },
            "/api/audit/{scope}": {
                "get": { "summary": "Audit progress for a scope", "tags": ["Audit"], "parameters": [{ "name": "scope", "in": "path", "required": true, "schema": { "type": "string", "enum": ["visiting", "local"] } }], "responses": { "200": { "description": "Active and completed audit entries" } } }
            },
            "/api/audit/run": {
                "post": { "summary": "Manually enqueue an audit job", "tags": ["Audit"], "responses": { "200": { "description": "Job enqueued" }, "409": { "description": "A job is already active" } } }
            },
            "/api/presence": {
                "get": { "summary": "Watchlist controllers currently online", "tags": ["Presence"], "responses": { "200": { "description": "Online controllers" } } }
            },
            "/api/stats": {
                "get": { "summary": "Aggregate roster/audit counts", "tags": ["Stats"], "responses": { "200": { "description": "Stats object" } } }
            }
        },
        "tags": [
            { "name": "Admin", "description": "Liveness and introspection" },
            { "name": "Watchlist", "description": "Roster membership" },
            { "name": "Audit", "description": "Controlling-hours audit progress" },
            { "name": "Presence", "description": "Live online/offline state" },
            { "name": "Stats", "description": "Aggregate counts" }
        ]
    });

    ([(header::CONTENT_TYPE, "application/json")], Json(spec))
}
