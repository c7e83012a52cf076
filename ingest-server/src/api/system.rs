//! Queue and system introspection

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use shared::jobs::QueueName;

use crate::state::AppState;

/// `GET /queue/status` — per-queue depths plus recent failures.
pub async fn queue_status(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)> {
    let depths = state.queue_depths().await.map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": e.to_string() })),
        )
    })?;

    let mut failures = serde_json::Map::new();
    for &queue in QueueName::ALL {
        if let Ok(recent) = state.queue.recent_failures(queue, 10).await {
            failures.insert(queue.to_string(), serde_json::json!(recent));
        }
    }

    Ok(Json(serde_json::json!({
        "queues": depths,
        "recent_failures": failures,
    })))
}

/// `GET /system/info`
pub async fn system_info(State(state): State<AppState>) -> Json<serde_json::Value> {
    let uptime_secs = (shared::util::now_millis() - state.started_at) / 1000;
    let workers = state.queue.worker_heartbeats().await.unwrap_or_default();
    Json(serde_json::json!({
        "service": "ingest-server",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": uptime_secs,
        "cluster_enabled": state.config.cluster_enabled,
        "cluster_workers": state.config.cluster_workers,
        "workers": workers,
    }))
}
