use axum::Router;
use axum::extract::State;
use axum::routing::{get, post};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api;
use crate::state::SharedState;

/// Build the main application router with all routes.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/status", get(status))
        .route("/api/tools", get(api::list_tools))
        .route("/api/sessions", get(api::list_sessions))
        .route(
            "/api/sessions/{id}",
            get(api::get_session).delete(api::delete_session),
        )
        .route("/api/sessions/{id}/turns", post(api::run_turn))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        // The hosting UI is served from its own origin.
        .layer(CorsLayer::permissive())
}

async fn health() -> &'static str {
    "ok"
}

async fn status(State(state): State<SharedState>) -> axum::Json<serde_json::Value> {
    let providers: Vec<serde_json::Value> = state
        .runtime
        .health_check_all()
        .await
        .unwrap_or_default()
        .into_iter()
        .map(|(id, healthy)| json!({ "id": id, "healthy": healthy }))
        .collect();

    axum::Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.started_at.elapsed().as_secs(),
        "default_provider": state.runtime.default_provider_id(),
        "providers": providers,
        "tools": state.runtime.tools().len(),
    }))
}
