//! Wire DTOs for the v2 endpoints
//!
//! Marketplace fields are frequently absent or zero; everything optional is
//! `#[serde(default)]` so a sparse response still decodes.

use serde::{Deserialize, Serialize};

// ============================================================================
// Auth
// ============================================================================

/// `POST /api/v2/auth/token/get` and `POST /api/v2/auth/access_token/get`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    /// Validity in seconds from grant
    pub expire_in: i64,
}

// ============================================================================
// Order list
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderListResponse {
    #[serde(default)]
    pub more: bool,
    #[serde(default)]
    pub next_cursor: String,
    /// Absent when the window is empty
    #[serde(default)]
    pub order_list: Option<Vec<OrderListItem>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderListItem {
    pub order_sn: String,
    #[serde(default)]
    pub order_status: Option<String>,
}

// ============================================================================
// Order detail
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderDetailResponse {
    #[serde(default)]
    pub order_list: Vec<OrderDetail>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderDetail {
    pub order_sn: String,
    #[serde(default)]
    pub order_status: String,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    /// Epoch seconds
    #[serde(default)]
    pub create_time: Option<i64>,
    #[serde(default)]
    pub update_time: Option<i64>,
    #[serde(default)]
    pub pay_time: Option<i64>,
    #[serde(default)]
    pub ship_by_date: Option<i64>,
    #[serde(default)]
    pub days_to_ship: Option<i32>,
    #[serde(default)]
    pub total_amount: Option<f64>,
    #[serde(default)]
    pub estimated_shipping_fee: Option<f64>,
    #[serde(default)]
    pub actual_shipping_fee: Option<f64>,
    /// Top-level carrier; second in the §priority chain
    #[serde(default)]
    pub shipping_carrier: Option<String>,
    #[serde(default)]
    pub checkout_shipping_carrier: Option<String>,
    #[serde(default)]
    pub fulfillment_flag: Option<String>,
    #[serde(default)]
    pub message_to_seller: Option<String>,
    #[serde(default)]
    pub cancel_by: Option<String>,
    #[serde(default)]
    pub cancel_reason: Option<String>,
    #[serde(default)]
    pub buyer_username: Option<String>,
    #[serde(default)]
    pub item_list: Vec<OrderItemDetail>,
    #[serde(default)]
    pub package_list: Vec<PackageInfo>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderItemDetail {
    pub item_id: i64,
    #[serde(default)]
    pub item_name: String,
    #[serde(default)]
    pub item_sku: Option<String>,
    #[serde(default)]
    pub model_sku: Option<String>,
    #[serde(default)]
    pub model_name: Option<String>,
    #[serde(default)]
    pub model_original_price: Option<f64>,
    #[serde(default)]
    pub model_discounted_price: Option<f64>,
    #[serde(default)]
    pub model_quantity_purchased: Option<i32>,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub promotion_id: Option<i64>,
    #[serde(default)]
    pub image_info: Option<ImageInfo>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageInfo {
    #[serde(default)]
    pub image_url: Option<String>,
}

/// `package_number` is a package identifier, not a tracking number.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PackageInfo {
    #[serde(default)]
    pub package_number: Option<String>,
    #[serde(default)]
    pub shipping_carrier: Option<String>,
    #[serde(default)]
    pub logistics_status: Option<String>,
}

impl OrderDetail {
    /// Carrier priority: first package's carrier, then the top-level one,
    /// then the checkout carrier.
    pub fn derive_carrier(&self) -> Option<String> {
        self.package_list
            .first()
            .and_then(|p| non_empty(p.shipping_carrier.as_deref()))
            .or_else(|| non_empty(self.shipping_carrier.as_deref()))
            .or_else(|| non_empty(self.checkout_shipping_carrier.as_deref()))
    }
}

// ============================================================================
// Shipment list
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShipmentListResponse {
    #[serde(default)]
    pub more: bool,
    #[serde(default)]
    pub next_cursor: String,
    #[serde(default)]
    pub shipment_list: Vec<ShipmentOrder>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipmentOrder {
    pub order_sn: String,
    #[serde(default)]
    pub package_number: Option<String>,
}

// ============================================================================
// Tracking
// ============================================================================

/// `GET /api/v2/logistics/get_tracking_number`, keyed by `order_sn`,
/// flattened over the carrier name variants different marketplace regions
/// return.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackingNumberResponse {
    #[serde(default)]
    pub tracking_number: Option<String>,
    #[serde(default)]
    pub first_mile_tracking_number: Option<String>,
    #[serde(default)]
    pub last_mile_tracking_number: Option<String>,
    #[serde(default)]
    pub plp_number: Option<String>,
    #[serde(default)]
    pub shipping_provider_name: Option<String>,
    #[serde(default)]
    pub logistic_name: Option<String>,
    #[serde(default)]
    pub carrier_name: Option<String>,
    #[serde(default)]
    pub shipping_provider: Option<String>,
    #[serde(default)]
    pub carrier: Option<String>,
    #[serde(default)]
    pub logistics_channel: Option<String>,
}

impl TrackingNumberResponse {
    /// Tracking-number priority chain.
    pub fn derive_tracking_number(&self) -> Option<String> {
        non_empty(self.tracking_number.as_deref())
            .or_else(|| non_empty(self.first_mile_tracking_number.as_deref()))
            .or_else(|| non_empty(self.last_mile_tracking_number.as_deref()))
            .or_else(|| non_empty(self.plp_number.as_deref()))
    }

    /// Carrier-name priority chain.
    pub fn derive_carrier(&self) -> Option<String> {
        non_empty(self.shipping_provider_name.as_deref())
            .or_else(|| non_empty(self.logistic_name.as_deref()))
            .or_else(|| non_empty(self.carrier_name.as_deref()))
            .or_else(|| non_empty(self.shipping_provider.as_deref()))
            .or_else(|| non_empty(self.carrier.as_deref()))
            .or_else(|| non_empty(self.logistics_channel.as_deref()))
    }
}

/// `GET /api/v2/logistics/get_tracking_info`, keyed by a known
/// `tracking_number`: the carrier's event history for one package.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackingInfoResponse {
    #[serde(default)]
    pub order_sn: Option<String>,
    #[serde(default)]
    pub tracking_number: Option<String>,
    #[serde(default)]
    pub tracking_info: Vec<TrackingEvent>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackingEvent {
    /// Epoch seconds
    #[serde(default)]
    pub update_time: Option<i64>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub logistics_status: Option<String>,
}

fn non_empty(s: Option<&str>) -> Option<String> {
    match s {
        Some(v) if !v.trim().is_empty() => Some(v.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detail_carrier_priority() {
        let mut detail = OrderDetail {
            shipping_carrier: Some("Top Carrier".into()),
            checkout_shipping_carrier: Some("Checkout Carrier".into()),
            ..Default::default()
        };
        assert_eq!(detail.derive_carrier().as_deref(), Some("Top Carrier"));

        detail.package_list.push(PackageInfo {
            package_number: Some("PKG001".into()),
            shipping_carrier: Some("Package Carrier".into()),
            logistics_status: None,
        });
        assert_eq!(detail.derive_carrier().as_deref(), Some("Package Carrier"));

        detail.package_list[0].shipping_carrier = None;
        detail.shipping_carrier = None;
        assert_eq!(detail.derive_carrier().as_deref(), Some("Checkout Carrier"));
    }

    #[test]
    fn test_tracking_number_priority() {
        let mut resp = TrackingNumberResponse {
            first_mile_tracking_number: Some("FM1".into()),
            plp_number: Some("PLP1".into()),
            ..Default::default()
        };
        assert_eq!(resp.derive_tracking_number().as_deref(), Some("FM1"));

        resp.tracking_number = Some("TN1".into());
        assert_eq!(resp.derive_tracking_number().as_deref(), Some("TN1"));

        resp.tracking_number = Some("  ".into());
        assert_eq!(resp.derive_tracking_number().as_deref(), Some("FM1"));

        resp.first_mile_tracking_number = None;
        assert_eq!(resp.derive_tracking_number().as_deref(), Some("PLP1"));
    }

    #[test]
    fn test_carrier_priority_chain() {
        let resp = TrackingNumberResponse {
            logistic_name: Some("Logistic".into()),
            carrier: Some("Carrier".into()),
            ..Default::default()
        };
        assert_eq!(resp.derive_carrier().as_deref(), Some("Logistic"));
    }

    #[test]
    fn test_sparse_response_decodes() {
        let detail: OrderDetail =
            serde_json::from_str(r#"{"order_sn":"250515ABC"}"#).unwrap();
        assert_eq!(detail.order_sn, "250515ABC");
        assert!(detail.item_list.is_empty());
        assert!(detail.derive_carrier().is_none());
    }
}
