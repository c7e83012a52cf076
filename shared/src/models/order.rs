//! Order, logistic and line-item types
//!
//! `*Row` structs mirror the persisted tables; `*Upsert` structs are the
//! normalized shapes the collector hands to the repository.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Platform tag stored on every order row.
pub const PLATFORM_SHOPEE: &str = "shopee";

/// `other_status` default; no secondary workflow state derived yet.
pub const OTHER_STATUS_NONE: &str = "NONE";

// ============================================================================
// Status enums
// ============================================================================

/// Internal workflow state derived from the raw marketplace status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionStatus {
    ReadyToPrint,
    Exported,
    RequestCancel,
    Order,
}

impl ActionStatus {
    /// Explicit mapping table. Unknown statuses fall back to `Order`;
    /// the caller logs the fallback.
    pub fn from_order_status(status: &str) -> Self {
        match status {
            "READY_TO_SHIP" => Self::ReadyToPrint,
            "SHIPPED" => Self::Exported,
            "CANCELLED" => Self::RequestCancel,
            _ => Self::Order,
        }
    }

    /// Whether the raw status has an explicit mapping row.
    pub fn is_mapped(status: &str) -> bool {
        matches!(status, "READY_TO_SHIP" | "SHIPPED" | "CANCELLED")
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReadyToPrint => "READY_TO_PRINT",
            Self::Exported => "EXPORTED",
            Self::RequestCancel => "REQUEST_CANCEL",
            Self::Order => "ORDER",
        }
    }
}

impl std::fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Marketplace statuses in which a tracking number may already exist.
pub const TRACKABLE_STATUSES: &[&str] = &["PROCESSED", "SHIPPED", "COMPLETED"];

/// Whether an order in `status` may have a tracking number upstream.
pub fn status_may_have_tracking(status: &str) -> bool {
    TRACKABLE_STATUSES.contains(&status)
}

/// Who fulfills the order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FulfillmentFlag {
    Seller,
    Shopee,
}

impl FulfillmentFlag {
    /// Normalize the wire value. Anything that is not marketplace
    /// fulfillment is seller fulfillment.
    pub fn from_wire(flag: Option<&str>) -> Self {
        match flag {
            Some("fulfilled_by_shopee") => Self::Shopee,
            _ => Self::Seller,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Seller => "SELLER",
            Self::Shopee => "SHOPEE",
        }
    }
}

impl std::fmt::Display for FulfillmentFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Persisted rows
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct OrderRow {
    pub id: Uuid,
    pub platform: String,
    pub order_num: String,
    /// Raw marketplace status
    pub status: String,
    pub action_status: String,
    pub other_status: String,
    pub country: Option<String>,
    pub currency: Option<String>,
    pub order_time: Option<i64>,
    pub pay_time: Option<i64>,
    pub ship_by_time: Option<i64>,
    pub total_amount: Option<f64>,
    pub company_id: Uuid,
    /// Marketplace shop id
    pub shop_id: i64,
    pub fulfillment_flag: String,
    pub cancel_by: Option<String>,
    pub cancel_reason: Option<String>,
    pub message_to_seller: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// One logistic row per order (`toms_order_id` UNIQUE). Inserted even when
/// no shipping data exists yet so item foreign keys resolve.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct LogisticRow {
    pub id: Uuid,
    pub toms_order_id: Uuid,
    /// Carrier name
    pub name: Option<String>,
    pub tracking_no: Option<String>,
    pub estimated_shipping_fee: Option<f64>,
    pub actual_shipping_fee: Option<f64>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct OrderItemRow {
    pub id: Uuid,
    pub item_id: i64,
    pub sku: String,
    pub promo_sku: Option<String>,
    pub name: String,
    pub variation: Option<String>,
    pub price: f64,
    pub original_price: Option<f64>,
    pub quantity: i32,
    pub weight: f64,
    pub item_index: i32,
    /// Denormalized mirror of the order's logistic tracking number
    pub tracking_no: Option<String>,
    pub image_url: Option<String>,
    pub toms_order_id: Uuid,
    pub toms_logistic_id: Uuid,
    pub toms_item_id: Uuid,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Order joined to its logistic row, for the operator read path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderWithLogistic {
    pub order: OrderRow,
    pub logistic: Option<LogisticRow>,
    pub items: Vec<OrderItemRow>,
}

// ============================================================================
// Normalized upsert shapes (collector → repository)
// ============================================================================

/// Everything the repository needs to upsert one order transactionally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderUpsert {
    pub order_sn: String,
    pub status: String,
    pub country: Option<String>,
    pub currency: Option<String>,
    /// Epoch millis
    pub order_time: Option<i64>,
    pub pay_time: Option<i64>,
    pub ship_by_time: Option<i64>,
    pub total_amount: Option<f64>,
    pub fulfillment_flag: FulfillmentFlag,
    pub cancel_by: Option<String>,
    pub cancel_reason: Option<String>,
    pub message_to_seller: Option<String>,
    pub logistic: LogisticUpsert,
    pub items: Vec<ItemUpsert>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub histories: Vec<HistoryUpsert>,
}

/// Shipping metadata derived from a detail record. `tracking_no` is never a
/// package number; it arrives only from tracking reconciliation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogisticUpsert {
    pub carrier_name: Option<String>,
    pub tracking_no: Option<String>,
    pub estimated_shipping_fee: Option<f64>,
    pub actual_shipping_fee: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemUpsert {
    pub item_id: i64,
    pub sku: String,
    pub promo_sku: Option<String>,
    pub name: String,
    pub variation: Option<String>,
    pub price: f64,
    pub original_price: Option<f64>,
    pub quantity: i32,
    pub weight: f64,
    pub image_url: Option<String>,
}

/// One tracking event. Deduplicated on
/// (logistic id, tracking_no, event_time, status).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryUpsert {
    pub tracking_no: String,
    /// Epoch millis
    pub event_time: i64,
    pub location: Option<String>,
    pub status: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_status_mapping_table() {
        assert_eq!(
            ActionStatus::from_order_status("READY_TO_SHIP"),
            ActionStatus::ReadyToPrint
        );
        assert_eq!(
            ActionStatus::from_order_status("SHIPPED"),
            ActionStatus::Exported
        );
        assert_eq!(
            ActionStatus::from_order_status("CANCELLED"),
            ActionStatus::RequestCancel
        );
        assert_eq!(
            ActionStatus::from_order_status("UNPAID"),
            ActionStatus::Order
        );
        assert!(!ActionStatus::is_mapped("UNPAID"));
    }

    #[test]
    fn test_fulfillment_flag_normalization() {
        assert_eq!(
            FulfillmentFlag::from_wire(Some("fulfilled_by_cb_seller")),
            FulfillmentFlag::Seller
        );
        assert_eq!(
            FulfillmentFlag::from_wire(Some("fulfilled_by_shopee")),
            FulfillmentFlag::Shopee
        );
        assert_eq!(FulfillmentFlag::from_wire(None), FulfillmentFlag::Seller);
    }

    #[test]
    fn test_trackable_statuses() {
        assert!(status_may_have_tracking("PROCESSED"));
        assert!(status_may_have_tracking("SHIPPED"));
        assert!(status_may_have_tracking("COMPLETED"));
        assert!(!status_may_have_tracking("READY_TO_SHIP"));
    }
}
