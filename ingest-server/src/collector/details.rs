//! Detail-record projection
//!
//! Maps one marketplace detail record into the normalized upsert shape.
//! Pure functions; all network and storage stays in the orchestrator.

use shared::models::order::{FulfillmentFlag, ItemUpsert, LogisticUpsert, OrderUpsert};
use shared::util::opt_secs_to_millis;
use shopee_client::types::{OrderDetail, OrderItemDetail};

/// Project a detail record into the repository's upsert shape.
///
/// Shipping carrier follows the package → top-level → checkout priority;
/// `tracking_no` is left empty here — tracking numbers only arrive through
/// reconciliation, never from the detail record's package numbers.
pub fn map_detail(detail: &OrderDetail) -> OrderUpsert {
    OrderUpsert {
        order_sn: detail.order_sn.clone(),
        status: detail.order_status.clone(),
        country: detail.region.clone(),
        currency: detail.currency.clone(),
        order_time: opt_secs_to_millis(detail.create_time),
        pay_time: opt_secs_to_millis(detail.pay_time),
        ship_by_time: opt_secs_to_millis(detail.ship_by_date),
        total_amount: detail.total_amount,
        fulfillment_flag: FulfillmentFlag::from_wire(detail.fulfillment_flag.as_deref()),
        cancel_by: detail.cancel_by.clone(),
        cancel_reason: detail.cancel_reason.clone(),
        message_to_seller: detail.message_to_seller.clone(),
        logistic: LogisticUpsert {
            carrier_name: detail.derive_carrier(),
            tracking_no: None,
            estimated_shipping_fee: detail.estimated_shipping_fee,
            actual_shipping_fee: detail.actual_shipping_fee,
        },
        items: detail.item_list.iter().map(map_item).collect(),
        histories: vec![],
    }
}

fn map_item(item: &OrderItemDetail) -> ItemUpsert {
    let sku = match item.model_sku.as_deref() {
        Some(sku) if !sku.trim().is_empty() => sku.to_string(),
        _ => format!("shopee-{}", item.item_id),
    };
    ItemUpsert {
        item_id: item.item_id,
        sku,
        promo_sku: item.item_sku.clone().filter(|s| !s.is_empty()),
        name: item.item_name.clone(),
        variation: item.model_name.clone().filter(|s| !s.is_empty()),
        price: item
            .model_discounted_price
            .or(item.model_original_price)
            .unwrap_or(0.0),
        original_price: item.model_original_price,
        quantity: item.model_quantity_purchased.unwrap_or(0),
        weight: item.weight.unwrap_or(0.0),
        image_url: item
            .image_info
            .as_ref()
            .and_then(|i| i.image_url.clone())
            .filter(|s| !s.is_empty()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shopee_client::types::{ImageInfo, PackageInfo};

    fn item(item_id: i64, model_sku: Option<&str>) -> OrderItemDetail {
        OrderItemDetail {
            item_id,
            item_name: "Widget".into(),
            model_sku: model_sku.map(String::from),
            model_discounted_price: Some(1000.0),
            model_quantity_purchased: Some(2),
            ..Default::default()
        }
    }

    #[test]
    fn test_synthetic_sku_when_model_sku_absent() {
        let mapped = map_item(&item(42, None));
        assert_eq!(mapped.sku, "shopee-42");

        let mapped = map_item(&item(42, Some("  ")));
        assert_eq!(mapped.sku, "shopee-42");

        let mapped = map_item(&item(42, Some("S1")));
        assert_eq!(mapped.sku, "S1");
    }

    #[test]
    fn test_weight_defaults_to_zero() {
        assert_eq!(map_item(&item(1, Some("S1"))).weight, 0.0);
    }

    #[test]
    fn test_image_url_carried_when_present() {
        let mut raw = item(1, Some("S1"));
        raw.image_info = Some(ImageInfo {
            image_url: Some("https://cf.example/img.jpg".into()),
        });
        assert_eq!(
            map_item(&raw).image_url.as_deref(),
            Some("https://cf.example/img.jpg")
        );
    }

    #[test]
    fn test_detail_times_converted_to_millis() {
        let detail = OrderDetail {
            order_sn: "250515ABC".into(),
            order_status: "READY_TO_SHIP".into(),
            create_time: Some(1_747_267_200),
            pay_time: Some(0),
            ..Default::default()
        };
        let upsert = map_detail(&detail);
        assert_eq!(upsert.order_time, Some(1_747_267_200_000));
        assert_eq!(upsert.pay_time, None);
        assert!(upsert.logistic.tracking_no.is_none());
    }

    #[test]
    fn test_package_number_never_becomes_tracking() {
        let detail = OrderDetail {
            order_sn: "250515ABC".into(),
            order_status: "PROCESSED".into(),
            package_list: vec![PackageInfo {
                package_number: Some("PKG123456".into()),
                shipping_carrier: Some("Standard Express".into()),
                logistics_status: None,
            }],
            ..Default::default()
        };
        let upsert = map_detail(&detail);
        assert_eq!(
            upsert.logistic.carrier_name.as_deref(),
            Some("Standard Express")
        );
        assert!(upsert.logistic.tracking_no.is_none());
    }

    #[test]
    fn test_fulfillment_flag_normalized() {
        let mut detail = OrderDetail {
            order_sn: "X".into(),
            fulfillment_flag: Some("fulfilled_by_shopee".into()),
            ..Default::default()
        };
        assert_eq!(
            map_detail(&detail).fulfillment_flag,
            FulfillmentFlag::Shopee
        );
        detail.fulfillment_flag = Some("fulfilled_by_cb_seller".into());
        assert_eq!(
            map_detail(&detail).fulfillment_flag,
            FulfillmentFlag::Seller
        );
    }
}
