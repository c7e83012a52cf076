//! Queue job names and payloads
//!
//! A job's name selects the worker handler; its payload is the serialized
//! struct below. Dedup keys keep at most one live job per shop per queue.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The four logical queues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QueueName {
    OrderCollection,
    OrderDetail,
    ShipmentInfo,
    Inventory,
}

impl QueueName {
    pub const ALL: &'static [QueueName] = &[
        Self::OrderCollection,
        Self::OrderDetail,
        Self::ShipmentInfo,
        Self::Inventory,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OrderCollection => "order-collection",
            Self::OrderDetail => "order-detail",
            Self::ShipmentInfo => "shipment-info",
            Self::Inventory => "inventory",
        }
    }
}

impl std::fmt::Display for QueueName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Job names ──

pub const JOB_COLLECT_SHOP_ORDERS: &str = "collect-shop-orders";
pub const JOB_MANUAL_ORDER_COLLECT: &str = "manual-order-collect";
pub const JOB_PROCESS_ORDER_DETAILS: &str = "process-order-details";
pub const JOB_PROCESS_SHIPMENT_INFO: &str = "process-shipment-info";
pub const JOB_UPDATE_INVENTORY: &str = "update-inventory";

// ── Payloads ──

/// Scheduled per-shop collection pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectShopOrders {
    /// Internal shop key
    pub shop_key: Uuid,
    /// Marketplace shop id, for fallback resolution when the key is stale
    pub shop_id: i64,
}

impl CollectShopOrders {
    /// Dedup key: one live collection job per shop.
    pub fn dedup_key(&self) -> String {
        format!("collect-shop-orders:{}", self.shop_id)
    }
}

/// Decomposed detail-processing stage for a batch of order numbers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessOrderDetails {
    pub shop_key: Uuid,
    pub shop_id: i64,
    pub order_sns: Vec<String>,
}

/// Decomposed shipment reconciliation stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessShipmentInfo {
    pub shop_key: Uuid,
    pub shop_id: i64,
}

/// Optional inventory refresh stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateInventory {
    pub shop_key: Uuid,
    pub shop_id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_name_wire_form() {
        assert_eq!(QueueName::OrderCollection.as_str(), "order-collection");
        let json = serde_json::to_string(&QueueName::ShipmentInfo).unwrap();
        assert_eq!(json, "\"shipment-info\"");
    }

    #[test]
    fn test_dedup_key_is_per_shop() {
        let a = CollectShopOrders {
            shop_key: Uuid::new_v4(),
            shop_id: 111,
        };
        let b = CollectShopOrders {
            shop_key: Uuid::new_v4(),
            shop_id: 111,
        };
        assert_eq!(a.dedup_key(), b.dedup_key());
    }
}
