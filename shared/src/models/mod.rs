//! Domain model types

pub mod order;
pub mod shop;
pub mod stats;

pub use order::{
    ActionStatus, FulfillmentFlag, HistoryUpsert, ItemUpsert, LogisticRow, LogisticUpsert,
    OrderItemRow, OrderRow, OrderUpsert, OrderWithLogistic, PLATFORM_SHOPEE,
};
pub use shop::{Company, Shop};
pub use stats::CollectStats;
