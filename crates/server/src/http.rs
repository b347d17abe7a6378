//! HTTP endpoints.

use axum::{
    extract::{Path, State},
    http::{HeaderValue, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use kopibot_core::{EngineError, OutletRegistry, ProductIndex, TurnRequest};

use crate::state::AppState;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let cors = build_cors_layer(&state.settings.server.cors_origins);

    Router::new()
        // The single core turn endpoint.
        .route("/api/chat", post(chat))
        // Health and readiness.
        .route("/health", get(health))
        .route("/ready", get(ready))
        // Administrative endpoints; outside the core turn path.
        .route("/api/sessions", get(list_sessions))
        .route("/api/sessions/:id", get(session_debug))
        .route("/admin/reload-index", post(reload_index))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::new()
            .allow_methods([Method::GET, Method::POST])
            .allow_headers(Any);
    }

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "invalid CORS origin ignored");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(parsed)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any)
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// POST /api/chat
async fn chat(
    State(state): State<AppState>,
    Json(request): Json<TurnRequest>,
) -> impl IntoResponse {
    match state.engine.process(request).await {
        Ok(response) => (StatusCode::OK, Json(serde_json::json!(response))).into_response(),
        Err(EngineError::InvalidInput(message)) => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!(ErrorBody { error: message })),
        )
            .into_response(),
        Err(error) => {
            tracing::error!(error = %error, "unexpected engine error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!(ErrorBody {
                    error: "internal error".to_string()
                })),
            )
                .into_response()
        }
    }
}

/// GET /health
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// GET /ready
async fn ready(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ready",
        "products": state.products.all().len(),
        "outlets": state.outlets.all().len(),
        "sessions": state.engine.session_count(),
    }))
}

/// GET /api/sessions
async fn list_sessions(State(state): State<AppState>) -> Json<serde_json::Value> {
    let sessions = state.engine.session_ids();
    Json(serde_json::json!({
        "count": sessions.len(),
        "sessions": sessions,
    }))
}

/// GET /api/sessions/:id
async fn session_debug(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    state
        .engine
        .session_debug(&id)
        .await
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

/// POST /admin/reload-index
async fn reload_index(State(state): State<AppState>) -> impl IntoResponse {
    match state.reload_catalogues() {
        Ok((products, outlets)) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "reloaded",
                "products": products,
                "outlets": outlets,
            })),
        )
            .into_response(),
        Err(error) => {
            tracing::error!(error = %error, "catalogue reload failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!(ErrorBody {
                    error: "reload failed".to_string()
                })),
            )
                .into_response()
        }
    }
}
