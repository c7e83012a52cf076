//! Operator HTTP surface

pub mod health;
pub mod orders;
pub mod system;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// Create the operator router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/queue/status", get(system::queue_status))
        .route("/system/info", get(system::system_info))
        .route("/order/collect/{shop_id}", post(orders::collect_orders))
        .route("/order/{id}", get(orders::get_order))
        .with_state(state)
}
