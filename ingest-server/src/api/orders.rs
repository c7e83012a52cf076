//! Manual collection trigger and order lookup

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use shared::IngestError;

use crate::state::{AppState, CollectOutcome};

/// `POST /order/collect/{shop_id}`
pub async fn collect_orders(
    State(state): State<AppState>,
    Path(shop_id): Path<String>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)> {
    match state.collect_orders_for(&shop_id).await {
        Ok(CollectOutcome::Queued) => Ok(Json(serde_json::json!({
            "queued": true,
        }))),
        Ok(CollectOutcome::AlreadyQueued) => Ok(Json(serde_json::json!({
            "queued": false,
            "reason": "already queued",
        }))),
        Ok(CollectOutcome::Completed(stats)) => Ok(Json(serde_json::json!({
            "queued": false,
            "stats": stats,
        }))),
        Err(e) => Err(error_response(e)),
    }
}

/// `GET /order/{id}` — by internal UUID or marketplace order number.
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)> {
    match state.get_order(&id).await {
        Ok(Some(order)) => Ok(Json(serde_json::json!(order))),
        Ok(None) => Err((
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "order not found" })),
        )),
        Err(e) => Err(error_response(e)),
    }
}

fn error_response(e: IngestError) -> (StatusCode, Json<serde_json::Value>) {
    let status = match &e {
        IngestError::Config(_) => StatusCode::NOT_FOUND,
        IngestError::Data(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    tracing::error!("Operator request failed: {e}");
    (status, Json(serde_json::json!({ "error": e.to_string() })))
}
