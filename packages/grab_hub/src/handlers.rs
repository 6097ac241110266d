use axum::{
    Json,
    extract::{State, WebSocketUpgrade},
    response::IntoResponse,
};

use crate::AppState;
use crate::hub::session::handle_hub_session;
use crate::metrics;

/// WebSocket upgrade into the hub session handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| {
        handle_hub_session(
            socket,
            state.exchange,
            state.registry,
            state.hub_config,
            state.metrics,
        )
    })
}

/// Health check endpoint - returns server status
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.metrics.snapshot();
    let subscriptions = state.registry.active_count().await as u64;

    let status = if snapshot.traffic.serialize_failures == 0 {
        "healthy"
    } else {
        "degraded"
    };

    Json(metrics::HealthStatus {
        status: status.to_string(),
        sessions: snapshot.sessions.active,
        subscriptions,
        uptime_secs: snapshot.uptime_secs,
    })
}

/// Liveness probe - returns 200 if the server is running
pub async fn health_live_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "alive" }))
}

/// Metrics endpoint - returns detailed server metrics
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.metrics.snapshot())
}
