//! Order repository — transactional upsert across the four order tables
//!
//! The upsert runs strictly inside the caller's transaction: order row,
//! exactly one logistic row per order, deduplicated logistic histories,
//! wholesale-rewritten items. Any failure rolls back the whole order.

use shared::models::order::{
    status_may_have_tracking, ActionStatus, HistoryUpsert, LogisticRow, OrderItemRow, OrderRow,
    OrderUpsert, OrderWithLogistic, OTHER_STATUS_NONE, PLATFORM_SHOPEE,
};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::BoxError;

const ORDER_COLUMNS: &str = "id, platform, order_num, status, action_status, other_status, \
country, currency, order_time, pay_time, ship_by_time, total_amount, company_id, shop_id, \
fulfillment_flag, cancel_by, cancel_reason, message_to_seller, created_at, updated_at";

const ITEM_COLUMNS: &str = "id, item_id, sku, promo_sku, name, variation, price, original_price, \
quantity, weight, item_index, tracking_no, image_url, toms_order_id, toms_logistic_id, \
toms_item_id, created_at, updated_at";

// ============================================================================
// Upsert protocol
// ============================================================================

/// Upsert one order and its children inside `tx`. Returns the order's UUID.
pub async fn upsert_order(
    tx: &mut Transaction<'_, Postgres>,
    upsert: &OrderUpsert,
    company_id: Uuid,
    shop_id: i64,
) -> Result<Uuid, BoxError> {
    let now = shared::util::now_millis();

    // 1. Resolve the surrogate id by functional key.
    let existing: Option<(Uuid,)> =
        sqlx::query_as("SELECT id FROM toms_order WHERE platform = $1 AND order_num = $2")
            .bind(PLATFORM_SHOPEE)
            .bind(&upsert.order_sn)
            .fetch_optional(&mut **tx)
            .await?;
    let order_id = existing.map(|(id,)| id).unwrap_or_else(Uuid::new_v4);

    let action_status = ActionStatus::from_order_status(&upsert.status);
    if !ActionStatus::is_mapped(&upsert.status) && upsert.status != "UNPAID" {
        tracing::warn!(
            order_sn = %upsert.order_sn,
            status = %upsert.status,
            "Unmapped order status, falling back to ORDER"
        );
    }

    // 2. Order row. The conflict target is the surrogate id resolved above.
    sqlx::query(
        r#"
        INSERT INTO toms_order (
            id, platform, order_num, status, action_status, other_status,
            country, currency, order_time, pay_time, ship_by_time, total_amount,
            company_id, shop_id, fulfillment_flag, cancel_by, cancel_reason,
            message_to_seller, created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12,
                $13, $14, $15, $16, $17, $18, $19, $19)
        ON CONFLICT (id) DO UPDATE SET
            status = EXCLUDED.status,
            action_status = EXCLUDED.action_status,
            other_status = EXCLUDED.other_status,
            ship_by_time = EXCLUDED.ship_by_time,
            total_amount = EXCLUDED.total_amount,
            cancel_by = EXCLUDED.cancel_by,
            cancel_reason = EXCLUDED.cancel_reason,
            fulfillment_flag = EXCLUDED.fulfillment_flag,
            message_to_seller = EXCLUDED.message_to_seller,
            updated_at = EXCLUDED.updated_at
        "#,
    )
    .bind(order_id)
    .bind(PLATFORM_SHOPEE)
    .bind(&upsert.order_sn)
    .bind(&upsert.status)
    .bind(action_status.as_str())
    .bind(OTHER_STATUS_NONE)
    .bind(&upsert.country)
    .bind(&upsert.currency)
    .bind(upsert.order_time)
    .bind(upsert.pay_time)
    .bind(upsert.ship_by_time)
    .bind(upsert.total_amount)
    .bind(company_id)
    .bind(shop_id)
    .bind(upsert.fulfillment_flag.as_str())
    .bind(&upsert.cancel_by)
    .bind(&upsert.cancel_reason)
    .bind(&upsert.message_to_seller)
    .bind(now)
    .execute(&mut **tx)
    .await?;

    // 3. Logistic row — exactly one per order, synthetic when shipping data
    //    is not yet available.
    let existing_logistic: Option<(Uuid, Option<String>)> =
        sqlx::query_as("SELECT id, tracking_no FROM toms_logistic WHERE toms_order_id = $1")
            .bind(order_id)
            .fetch_optional(&mut **tx)
            .await?;

    let new_tracking = non_empty(upsert.logistic.tracking_no.as_deref());
    let (logistic_id, effective_tracking) = match existing_logistic {
        Some((logistic_id, current_tracking)) => {
            let effective = new_tracking.or(current_tracking);
            sqlx::query(
                r#"
                UPDATE toms_logistic SET
                    name = COALESCE(NULLIF($1, ''), name),
                    tracking_no = $2,
                    estimated_shipping_fee = COALESCE($3, estimated_shipping_fee),
                    actual_shipping_fee = COALESCE($4, actual_shipping_fee),
                    updated_at = $5
                WHERE id = $6
                "#,
            )
            .bind(&upsert.logistic.carrier_name)
            .bind(&effective)
            .bind(upsert.logistic.estimated_shipping_fee)
            .bind(upsert.logistic.actual_shipping_fee)
            .bind(now)
            .bind(logistic_id)
            .execute(&mut **tx)
            .await?;
            (logistic_id, effective)
        }
        None => {
            let logistic_id = Uuid::new_v4();
            sqlx::query(
                r#"
                INSERT INTO toms_logistic (
                    id, toms_order_id, name, tracking_no,
                    estimated_shipping_fee, actual_shipping_fee, created_at, updated_at
                )
                VALUES ($1, $2, NULLIF($3, ''), $4, $5, $6, $7, $7)
                "#,
            )
            .bind(logistic_id)
            .bind(order_id)
            .bind(upsert.logistic.carrier_name.as_deref().unwrap_or(""))
            .bind(&new_tracking)
            .bind(upsert.logistic.estimated_shipping_fee)
            .bind(upsert.logistic.actual_shipping_fee)
            .bind(now)
            .execute(&mut **tx)
            .await?;
            (logistic_id, new_tracking)
        }
    };

    // 4. Histories, keyed by (logistic, tracking, event time, status).
    insert_histories(tx, logistic_id, &upsert.histories).await?;

    // 5. Items are rewritten wholesale, positional order preserved.
    sqlx::query("DELETE FROM toms_order_item WHERE toms_order_id = $1")
        .bind(order_id)
        .execute(&mut **tx)
        .await?;

    for (index, item) in upsert.items.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO toms_order_item (
                id, item_id, sku, promo_sku, name, variation, price, original_price,
                quantity, weight, item_index, tracking_no, image_url,
                toms_order_id, toms_logistic_id, toms_item_id, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13,
                    $14, $15, $16, $17, $17)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(item.item_id)
        .bind(&item.sku)
        .bind(&item.promo_sku)
        .bind(&item.name)
        .bind(&item.variation)
        .bind(item.price)
        .bind(item.original_price)
        .bind(item.quantity)
        .bind(item.weight)
        .bind(index as i32)
        .bind(&effective_tracking)
        .bind(&item.image_url)
        .bind(order_id)
        .bind(logistic_id)
        .bind(Uuid::new_v4())
        .bind(now)
        .execute(&mut **tx)
        .await?;
    }

    Ok(order_id)
}

async fn insert_histories(
    tx: &mut Transaction<'_, Postgres>,
    logistic_id: Uuid,
    histories: &[HistoryUpsert],
) -> Result<(), BoxError> {
    let now = shared::util::now_millis();
    for history in histories {
        sqlx::query(
            r#"
            INSERT INTO toms_logistic_history (
                id, toms_logistic_id, tracking_no, event_time, location, status,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            ON CONFLICT (toms_logistic_id, tracking_no, event_time, status)
            DO UPDATE SET location = EXCLUDED.location, updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(logistic_id)
        .bind(&history.tracking_no)
        .bind(history.event_time)
        .bind(&history.location)
        .bind(&history.status)
        .bind(now)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

// ============================================================================
// Tracking reconciliation writes
// ============================================================================

/// One reconciliation write for one order.
#[derive(Debug, Clone)]
pub struct TrackingUpdate {
    pub order_id: Uuid,
    pub tracking_no: String,
    pub carrier_name: Option<String>,
    /// Transition the order to SHIPPED as part of the write
    pub mark_shipped: bool,
    pub histories: Vec<HistoryUpsert>,
}

/// Apply a tracking update atomically: logistic, item mirrors, optional
/// status transition, histories. Never overwrites a non-empty carrier name
/// with NULL.
pub async fn apply_tracking_update(pool: &PgPool, update: &TrackingUpdate) -> Result<(), BoxError> {
    let now = shared::util::now_millis();
    let mut tx = pool.begin().await?;

    let logistic_id: Option<(Uuid,)> = sqlx::query_as(
        "UPDATE toms_logistic SET tracking_no = $1, name = COALESCE(NULLIF($2, ''), name), \
         updated_at = $3 WHERE toms_order_id = $4 RETURNING id",
    )
    .bind(&update.tracking_no)
    .bind(update.carrier_name.as_deref().unwrap_or(""))
    .bind(now)
    .bind(update.order_id)
    .fetch_optional(&mut *tx)
    .await?;

    let Some((logistic_id,)) = logistic_id else {
        tx.rollback().await?;
        return Err(format!("No logistic row for order {}", update.order_id).into());
    };

    sqlx::query(
        "UPDATE toms_order_item SET tracking_no = $1, updated_at = $2 WHERE toms_order_id = $3",
    )
    .bind(&update.tracking_no)
    .bind(now)
    .bind(update.order_id)
    .execute(&mut *tx)
    .await?;

    if update.mark_shipped {
        sqlx::query(
            "UPDATE toms_order SET status = 'SHIPPED', action_status = $1, updated_at = $2 \
             WHERE id = $3 AND status NOT IN ('SHIPPED', 'COMPLETED')",
        )
        .bind(ActionStatus::Exported.as_str())
        .bind(now)
        .bind(update.order_id)
        .execute(&mut *tx)
        .await?;
    }

    insert_histories(&mut tx, logistic_id, &update.histories).await?;

    tx.commit().await?;
    Ok(())
}

/// Carrier-only fixup write; same preservation rule.
pub async fn update_carrier(pool: &PgPool, order_id: Uuid, carrier: &str) -> Result<(), BoxError> {
    sqlx::query(
        "UPDATE toms_logistic SET name = COALESCE(NULLIF($1, ''), name), updated_at = $2 \
         WHERE toms_order_id = $3",
    )
    .bind(carrier)
    .bind(shared::util::now_millis())
    .bind(order_id)
    .execute(pool)
    .await?;
    Ok(())
}

// ============================================================================
// Reconciliation reads
// ============================================================================

/// An order eligible for tracking reconciliation.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ReconcileCandidate {
    pub id: Uuid,
    pub order_num: String,
    pub status: String,
    pub tracking_no: Option<String>,
}

/// Persisted orders from this run whose status indicates a tracking number
/// may exist upstream.
pub async fn list_reconcile_candidates(
    pool: &PgPool,
    shop_id: i64,
    order_sns: &[String],
) -> Result<Vec<ReconcileCandidate>, BoxError> {
    if order_sns.is_empty() {
        return Ok(vec![]);
    }
    let statuses: Vec<String> = shared::models::order::TRACKABLE_STATUSES
        .iter()
        .map(|s| s.to_string())
        .collect();
    let rows: Vec<ReconcileCandidate> = sqlx::query_as(
        r#"
        SELECT o.id, o.order_num, o.status, l.tracking_no
        FROM toms_order o
        LEFT JOIN toms_logistic l ON l.toms_order_id = o.id
        WHERE o.platform = $1 AND o.shop_id = $2
          AND o.order_num = ANY($3) AND o.status = ANY($4)
        ORDER BY o.order_num
        "#,
    )
    .bind(PLATFORM_SHOPEE)
    .bind(shop_id)
    .bind(order_sns)
    .bind(&statuses)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Whether `status` still needs the SHIPPED transition on tracking arrival.
pub fn needs_shipped_transition(status: &str) -> bool {
    status_may_have_tracking(status) && status != "SHIPPED" && status != "COMPLETED"
}

/// An order with one shipping field present and the other missing.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct IncompleteLogistic {
    pub order_id: Uuid,
    pub order_num: String,
}

/// Orders with a tracking number but no carrier name (cap `limit`).
pub async fn find_tracking_without_carrier(
    pool: &PgPool,
    shop_id: i64,
    limit: i64,
) -> Result<Vec<IncompleteLogistic>, BoxError> {
    let rows: Vec<IncompleteLogistic> = sqlx::query_as(
        r#"
        SELECT o.id AS order_id, o.order_num
        FROM toms_order o
        JOIN toms_logistic l ON l.toms_order_id = o.id
        WHERE o.platform = $1 AND o.shop_id = $2
          AND l.tracking_no IS NOT NULL AND l.tracking_no <> ''
          AND (l.name IS NULL OR l.name = '')
        ORDER BY o.updated_at DESC
        LIMIT $3
        "#,
    )
    .bind(PLATFORM_SHOPEE)
    .bind(shop_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Orders with a carrier name but no tracking number (cap `limit`).
pub async fn find_carrier_without_tracking(
    pool: &PgPool,
    shop_id: i64,
    limit: i64,
) -> Result<Vec<IncompleteLogistic>, BoxError> {
    let rows: Vec<IncompleteLogistic> = sqlx::query_as(
        r#"
        SELECT o.id AS order_id, o.order_num
        FROM toms_order o
        JOIN toms_logistic l ON l.toms_order_id = o.id
        WHERE o.platform = $1 AND o.shop_id = $2
          AND l.name IS NOT NULL AND l.name <> ''
          AND (l.tracking_no IS NULL OR l.tracking_no = '')
        ORDER BY o.updated_at DESC
        LIMIT $3
        "#,
    )
    .bind(PLATFORM_SHOPEE)
    .bind(shop_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

// ============================================================================
// Operator reads
// ============================================================================

/// Fetch one order (by UUID or marketplace order number) with its logistic
/// row and items.
pub async fn get_order(pool: &PgPool, id_or_sn: &str) -> Result<Option<OrderWithLogistic>, BoxError> {
    let order: Option<OrderRow> = match id_or_sn.parse::<Uuid>() {
        Ok(id) => {
            sqlx::query_as(&format!("SELECT {ORDER_COLUMNS} FROM toms_order WHERE id = $1"))
                .bind(id)
                .fetch_optional(pool)
                .await?
        }
        Err(_) => {
            sqlx::query_as(&format!(
                "SELECT {ORDER_COLUMNS} FROM toms_order WHERE platform = $1 AND order_num = $2"
            ))
            .bind(PLATFORM_SHOPEE)
            .bind(id_or_sn)
            .fetch_optional(pool)
            .await?
        }
    };

    let Some(order) = order else {
        return Ok(None);
    };

    let logistic: Option<LogisticRow> = sqlx::query_as(
        "SELECT id, toms_order_id, name, tracking_no, estimated_shipping_fee, \
         actual_shipping_fee, created_at, updated_at \
         FROM toms_logistic WHERE toms_order_id = $1",
    )
    .bind(order.id)
    .fetch_optional(pool)
    .await?;

    let items: Vec<OrderItemRow> = sqlx::query_as(&format!(
        "SELECT {ITEM_COLUMNS} FROM toms_order_item WHERE toms_order_id = $1 ORDER BY item_index"
    ))
    .bind(order.id)
    .fetch_all(pool)
    .await?;

    Ok(Some(OrderWithLogistic {
        order,
        logistic,
        items,
    }))
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
    fn test_needs_shipped_transition() {
        assert!(needs_shipped_transition("PROCESSED"));
        assert!(!needs_shipped_transition("SHIPPED"));
        assert!(!needs_shipped_transition("COMPLETED"));
        assert!(!needs_shipped_transition("READY_TO_SHIP"));
    }
}
