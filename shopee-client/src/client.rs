//! Signed request execution and endpoint wrappers

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::config::ShopeeConfig;
use crate::error::{ClientError, ClientResult};
use crate::sign::Signer;
use crate::types::*;

/// Default page size for list endpoints (marketplace maximum).
pub const PAGE_SIZE: i32 = 100;

/// The fixed optional-field list for `get_order_detail`.
const DETAIL_OPTIONAL_FIELDS: &str = "item_list,package_list,shipping_carrier,fulfillment_flag,\
recipient_address,buyer_username,total_amount,pay_time,actual_shipping_fee,estimated_shipping_fee,\
cancel_by,cancel_reason,message_to_seller,checkout_shipping_carrier";

/// Client for one partner identity against one host.
#[derive(Debug, Clone)]
pub struct ShopeeClient {
    http: reqwest::Client,
    config: ShopeeConfig,
    signer: Signer,
}

impl ShopeeClient {
    pub fn new(config: ShopeeConfig) -> ClientResult<Self> {
        if config.partner_key.is_empty() {
            return Err(ClientError::Config("partner_key is empty".into()));
        }
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ClientError::Config(e.to_string()))?;
        let signer = Signer::new(config.partner_id, config.partner_key.clone());
        Ok(Self {
            http,
            config,
            signer,
        })
    }

    pub fn partner_id(&self) -> i64 {
        self.config.partner_id
    }

    // ========================================================================
    // Core request
    // ========================================================================

    /// Issue one signed request.
    ///
    /// GET merges `params` into the query string; POST sends `body` as JSON
    /// with only the common params in the query string. The response
    /// envelope's `response` field is decoded into `T` (the whole body when
    /// the endpoint returns top-level fields, as the auth endpoints do).
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, String)],
        body: Option<serde_json::Value>,
        access_token: Option<&str>,
        shop_id: Option<i64>,
    ) -> ClientResult<T> {
        let path = if path.starts_with("/api/v2") {
            path.to_string()
        } else {
            format!("/api/v2{path}")
        };

        let timestamp = chrono::Utc::now().timestamp();
        let sign = self.signer.sign(&path, timestamp, access_token, shop_id)?;

        let mut query: Vec<(&str, String)> = vec![
            ("partner_id", self.config.partner_id.to_string()),
            ("timestamp", timestamp.to_string()),
            ("sign", sign),
        ];
        if let Some(token) = access_token {
            query.push(("access_token", token.to_string()));
        }
        if let Some(id) = shop_id {
            query.push(("shop_id", id.to_string()));
        }
        if method == Method::GET {
            query.extend(params.iter().map(|(k, v)| (*k, v.clone())));
        }

        let url = format!("{}{}", self.config.host(), path);
        let mut req = self
            .http
            .request(method.clone(), &url)
            .query(&query)
            .header("Content-Type", "application/json");
        if method == Method::POST {
            req = req.json(&body.unwrap_or_else(|| json!({})));
        }

        let resp = req.send().await?;
        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            return Err(ClientError::Http {
                status: status.as_u16(),
                body: truncate(&text, 300),
            });
        }

        let mut value: serde_json::Value = serde_json::from_str(&text)?;
        if let Some(code) = value.get("error").and_then(|v| v.as_str()) {
            if !code.is_empty() {
                let message = value
                    .get("message")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string();
                return Err(ClientError::Api {
                    code: code.to_string(),
                    message,
                });
            }
        }

        let has_response = value.get("response").is_some_and(|r| !r.is_null());
        let payload = if has_response {
            value["response"].take()
        } else {
            value
        };
        Ok(serde_json::from_value(payload)?)
    }

    // ========================================================================
    // Auth
    // ========================================================================

    /// Exchange an authorization code for the first token pair.
    pub async fn get_access_token(&self, code: &str, shop_id: i64) -> ClientResult<TokenResponse> {
        let body = json!({
            "code": code,
            "partner_id": self.config.partner_id,
            "shop_id": shop_id,
        });
        self.request(Method::POST, "/auth/token/get", &[], Some(body), None, None)
            .await
            .map_err(|e| match e {
                ClientError::Api { code, message } => {
                    ClientError::Token(format!("[{code}] {message}"))
                }
                other => other,
            })
    }

    /// Trade a refresh token for a fresh token pair.
    pub async fn refresh_access_token(
        &self,
        refresh_token: &str,
        shop_id: i64,
    ) -> ClientResult<TokenResponse> {
        let body = json!({
            "refresh_token": refresh_token,
            "partner_id": self.config.partner_id,
            "shop_id": shop_id,
        });
        self.request(
            Method::POST,
            "/auth/access_token/get",
            &[],
            Some(body),
            None,
            None,
        )
        .await
        .map_err(|e| match e {
            ClientError::Api { code, message } => ClientError::Token(format!("[{code}] {message}")),
            other => other,
        })
    }

    // ========================================================================
    // Orders
    // ========================================================================

    /// One page of the order list for an update-time window (epoch seconds).
    pub async fn get_order_list(
        &self,
        access_token: &str,
        shop_id: i64,
        time_from: i64,
        time_to: i64,
        cursor: &str,
    ) -> ClientResult<OrderListResponse> {
        let params = [
            ("time_range_field", "update_time".to_string()),
            ("time_from", time_from.to_string()),
            ("time_to", time_to.to_string()),
            ("page_size", PAGE_SIZE.to_string()),
            ("cursor", cursor.to_string()),
            ("response_optional_fields", "order_status".to_string()),
        ];
        self.request(
            Method::GET,
            "/order/get_order_list",
            &params,
            None,
            Some(access_token),
            Some(shop_id),
        )
        .await
    }

    /// The full order list, following the cursor until exhausted.
    pub async fn get_order_list_all(
        &self,
        access_token: &str,
        shop_id: i64,
        time_from: i64,
        time_to: i64,
    ) -> ClientResult<Vec<OrderListItem>> {
        let mut all = Vec::new();
        let mut cursor = String::new();
        loop {
            let page = self
                .get_order_list(access_token, shop_id, time_from, time_to, &cursor)
                .await?;
            if let Some(items) = page.order_list {
                all.extend(items);
            }
            if !page.more || page.next_cursor.is_empty() {
                break;
            }
            cursor = page.next_cursor;
        }
        Ok(all)
    }

    /// Details for up to 50 orders per call.
    pub async fn get_order_detail(
        &self,
        access_token: &str,
        shop_id: i64,
        order_sns: &[String],
    ) -> ClientResult<OrderDetailResponse> {
        let params = [
            ("order_sn_list", order_sns.join(",")),
            (
                "response_optional_fields",
                DETAIL_OPTIONAL_FIELDS.to_string(),
            ),
        ];
        self.request(
            Method::GET,
            "/order/get_order_detail",
            &params,
            None,
            Some(access_token),
            Some(shop_id),
        )
        .await
    }

    /// One page of the shipment list.
    pub async fn get_shipment_list(
        &self,
        access_token: &str,
        shop_id: i64,
        cursor: &str,
    ) -> ClientResult<ShipmentListResponse> {
        let params = [
            ("page_size", PAGE_SIZE.to_string()),
            ("cursor", cursor.to_string()),
        ];
        self.request(
            Method::GET,
            "/order/get_shipment_list",
            &params,
            None,
            Some(access_token),
            Some(shop_id),
        )
        .await
    }

    // ========================================================================
    // Logistics
    // ========================================================================

    /// Carrier-assigned tracking number (and carrier name variants) for one
    /// order. This is the reconciliation lookup: keyed by `order_sn`, it is
    /// how an order without a tracking number gets one.
    pub async fn get_tracking_number(
        &self,
        access_token: &str,
        shop_id: i64,
        order_sn: &str,
        package_number: Option<&str>,
    ) -> ClientResult<TrackingNumberResponse> {
        let mut params = vec![
            ("order_sn", order_sn.to_string()),
            (
                "response_optional_fields",
                "plp_number,first_mile_tracking_number,last_mile_tracking_number".to_string(),
            ),
        ];
        if let Some(pkg) = package_number {
            params.push(("package_number", pkg.to_string()));
        }
        self.request(
            Method::GET,
            "/logistics/get_tracking_number",
            &params,
            None,
            Some(access_token),
            Some(shop_id),
        )
        .await
    }

    /// Detailed event history for a known tracking number.
    pub async fn get_tracking_info(
        &self,
        access_token: &str,
        shop_id: i64,
        tracking_number: &str,
    ) -> ClientResult<TrackingInfoResponse> {
        let params = [("tracking_number", tracking_number.to_string())];
        self.request(
            Method::GET,
            "/logistics/get_tracking_info",
            &params,
            None,
            Some(access_token),
            Some(shop_id),
        )
        .await
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let mut end = max;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &s[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detail_optional_fields_complete() {
        for field in [
            "item_list",
            "package_list",
            "shipping_carrier",
            "fulfillment_flag",
            "recipient_address",
            "buyer_username",
            "total_amount",
            "pay_time",
            "actual_shipping_fee",
            "cancel_by",
            "cancel_reason",
        ] {
            assert!(
                DETAIL_OPTIONAL_FIELDS.contains(field),
                "missing optional field {field}"
            );
        }
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("short", 300), "short");
        let long = "ä".repeat(400);
        let cut = truncate(&long, 301);
        assert!(cut.len() <= 305);
        assert!(cut.ends_with('…'));
    }
}
