// =============================================================================
// REST API Endpoints — Axum 0.7
// =============================================================================
//
// Pull surface for the dashboard:
//   GET /api/technical-data      latest snapshot (placeholder before cycle 1)
//   GET /api/v1/technical-data   same, versioned path
//   GET /api/v1/health           pipeline status and last cycle report
//   GET /ws, /api/v1/ws          WebSocket push feed (see `ws`)
//
// Anything else is served from the static directory. CORS is permissive: the
// data is public and read-only.
// =============================================================================

use std::sync::Arc;

use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::debug;

use crate::api::ws::ws_handler;
use crate::app_state::AppState;

// =============================================================================
// Router construction
// =============================================================================

/// Build the full router with CORS middleware, static files and shared state.
pub fn router(state: Arc<AppState>, static_dir: &str) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // ── Pull ────────────────────────────────────────────────────
        .route("/api/technical-data", get(technical_data))
        .route("/api/v1/technical-data", get(technical_data))
        .route("/api/v1/health", get(health))
        // ── Push ────────────────────────────────────────────────────
        .route("/ws", get(ws_handler))
        .route("/api/v1/ws", get(ws_handler))
        // ── Static dashboard ────────────────────────────────────────
        .fallback_service(ServeDir::new(static_dir))
        // ── Middleware & State ───────────────────────────────────────
        .layer(cors)
        .with_state(state)
}

// =============================================================================
// Handlers
// =============================================================================

async fn technical_data(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let data = state.technical_data();
    debug!(price = %data.current_price, "technical data served");
    Json(data)
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.health())
}
