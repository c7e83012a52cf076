//! Per-shop ingestion orchestrator
//!
//! One invocation runs the full pipeline for one shop:
//! validate → window → list → details → persist → tracking → fixups.
//! Sequential per shop; parallelism across shops comes from the queue.

pub mod details;
pub mod tracking;

use shared::models::{CollectStats, Company, Shop};
use shared::{IngestError, IngestResult};
use shopee_client::types::OrderListItem;
use shopee_client::{ShopeeClient, ShopeeConfig};
use sqlx::PgPool;
use uuid::Uuid;

use crate::config::Config;
use crate::db;
use crate::db::orders::TrackingUpdate;
use crate::token::TokenManager;

/// Initial delay for the order-list retry.
const LIST_RETRY_INITIAL_MS: u64 = 1000;
/// Pacing between detail batches and between tracking lookups.
const RATE_LIMIT_PAUSE_MS: u64 = 500;
/// Per-lookup budget during tracking reconciliation.
const TRACKING_TIMEOUT_SECS: u64 = 15;
/// Tracking writes are flushed in sub-batches of this size.
const TRACKING_SAVE_BATCH: usize = 10;
/// Row cap per incomplete-logistic shape in the fixup pass.
const INCOMPLETE_LIMIT: i64 = 20;

/// The per-shop pipeline and its knobs.
#[derive(Clone)]
pub struct Collector {
    pool: PgPool,
    tokens: TokenManager,
    api_url: Option<String>,
    process_sandbox: bool,
    default_partner_id: i64,
    default_partner_key: String,
    max_retry: u32,
    batch_size: usize,
}

/// A validated shop cycle: fresh token, resolved company, bound client.
struct ShopCycle {
    shop: Shop,
    company_id: Uuid,
    client: ShopeeClient,
    access_token: String,
}

impl Collector {
    pub fn new(pool: PgPool, config: &Config) -> Self {
        Self {
            tokens: TokenManager::new(pool.clone()),
            pool,
            api_url: config.shopee_api_url.clone(),
            process_sandbox: config.shopee_is_sandbox,
            default_partner_id: config.shopee_partner_id,
            default_partner_key: config.shopee_partner_key.clone(),
            max_retry: config.max_retry_count,
            batch_size: config.order_batch_size.max(1),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Resolve a shop by internal key, falling back to marketplace id.
    pub async fn resolve_shop(&self, shop_key: Uuid, shop_id: i64) -> IngestResult<Shop> {
        if let Some(shop) = db::shops::get_shop(&self.pool, shop_key)
            .await
            .map_err(|e| IngestError::Storage(e.to_string()))?
        {
            return Ok(shop);
        }
        db::shops::get_shop_by_marketplace_id(&self.pool, shop_id)
            .await
            .map_err(|e| IngestError::Storage(e.to_string()))?
            .ok_or_else(|| IngestError::Config(format!("Shop {shop_id} not found")))
    }

    /// Run the full pipeline for one shop.
    pub async fn collect_for_shop(
        &self,
        shop_key: Uuid,
        shop_id: i64,
    ) -> IngestResult<CollectStats> {
        // Step A — validate the shop and its company binding.
        let shop = self.resolve_shop(shop_key, shop_id).await?;
        let cycle = self.open_cycle(shop).await?;
        let shop_id = cycle.shop.shop_id;

        // Step B — poll window in epoch seconds.
        let window = TimeWindow::for_shop(&cycle.shop);

        // Step C — list orders, with bounded in-step retry.
        let listed = self.list_orders_with_retry(&cycle, &window).await?;

        let mut stats = CollectStats {
            total: listed.len() as u32,
            ..Default::default()
        };
        if listed.is_empty() {
            tracing::info!(shop_id, "No orders in window");
            return Ok(stats);
        }

        let order_sns: Vec<String> = listed.into_iter().map(|o| o.order_sn).collect();

        // Step D — detail fan-out and transactional persistence.
        self.process_order_details(&cycle, &order_sns, &mut stats)
            .await?;

        // Step E — tracking reconciliation for freshly persisted orders.
        let persisted = stats.order_sns.clone();
        self.reconcile_tracking(&cycle, &persisted).await;

        // Step F — fix rows with one shipping field missing.
        self.fix_incomplete(&cycle).await;

        tracing::info!(
            shop_id,
            total = stats.total,
            success = stats.success,
            failed = stats.failed,
            "Shop collection finished"
        );
        Ok(stats)
    }

    /// Decomposed Step D for the `order-detail` queue.
    pub async fn process_details_for_shop(
        &self,
        shop_key: Uuid,
        shop_id: i64,
        order_sns: &[String],
    ) -> IngestResult<CollectStats> {
        let shop = self.resolve_shop(shop_key, shop_id).await?;
        let cycle = self.open_cycle(shop).await?;
        let mut stats = CollectStats {
            total: order_sns.len() as u32,
            ..Default::default()
        };
        self.process_order_details(&cycle, order_sns, &mut stats)
            .await?;
        Ok(stats)
    }

    /// Decomposed shipment stage: walk the shipment list and reconcile
    /// tracking for every listed order.
    pub async fn process_shipments_for_shop(
        &self,
        shop_key: Uuid,
        shop_id: i64,
    ) -> IngestResult<u32> {
        let shop = self.resolve_shop(shop_key, shop_id).await?;
        let cycle = self.open_cycle(shop).await?;

        let mut order_sns = Vec::new();
        let mut cursor = String::new();
        loop {
            let page = cycle
                .client
                .get_shipment_list(&cycle.access_token, cycle.shop.shop_id, &cursor)
                .await
                .map_err(IngestError::from)?;
            order_sns.extend(page.shipment_list.into_iter().map(|s| s.order_sn));
            if !page.more || page.next_cursor.is_empty() {
                break;
            }
            cursor = page.next_cursor;
        }

        let count = order_sns.len() as u32;
        self.reconcile_tracking(&cycle, &order_sns).await;
        Ok(count)
    }

    // ========================================================================
    // Cycle setup (Step A)
    // ========================================================================

    async fn open_cycle(&self, shop: Shop) -> IngestResult<ShopCycle> {
        if !shop.is_active || shop.is_deleted {
            return Err(IngestError::Config(format!(
                "Shop {} is not an active platform binding",
                shop.shop_id
            )));
        }

        let (_, company) = db::shops::get_shop_with_company(&self.pool, shop.id)
            .await
            .map_err(|e| IngestError::Storage(e.to_string()))?
            .ok_or_else(|| IngestError::Config(format!("Shop {} vanished", shop.shop_id)))?;

        let company: Company = company.ok_or_else(|| {
            IngestError::Config(format!("Shop {} has no company binding", shop.shop_id))
        })?;
        if company.is_deleted {
            return Err(IngestError::Config(format!(
                "Company {} is deleted",
                company.id
            )));
        }

        // Company sandbox column wins over the process flag.
        let sandbox = company.effective_sandbox(self.process_sandbox);
        let client = self.client_for(&shop, sandbox)?;

        let shop = self.tokens.ensure_fresh(&client, shop).await?;
        let access_token = shop
            .access_token
            .clone()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                IngestError::Token(format!("Shop {} has no access token", shop.shop_id))
            })?;

        Ok(ShopCycle {
            shop,
            company_id: company.id,
            client,
            access_token,
        })
    }

    fn client_for(&self, shop: &Shop, sandbox: bool) -> IngestResult<ShopeeClient> {
        let (partner_id, partner_key) = if shop.partner_key.is_empty() {
            (self.default_partner_id, self.default_partner_key.clone())
        } else {
            (shop.partner_id, shop.partner_key.clone())
        };
        if partner_key.is_empty() {
            return Err(IngestError::Config(format!(
                "Shop {} has no partner key",
                shop.shop_id
            )));
        }
        let mut cfg = ShopeeConfig::new(partner_id, partner_key, sandbox);
        cfg.base_url = self.api_url.clone();
        ShopeeClient::new(cfg).map_err(|e| IngestError::Config(e.to_string()))
    }

    // ========================================================================
    // Step C — list with retry
    // ========================================================================

    async fn list_orders_with_retry(
        &self,
        cycle: &ShopCycle,
        window: &TimeWindow,
    ) -> IngestResult<Vec<OrderListItem>> {
        let mut attempt = 0u32;
        loop {
            match cycle
                .client
                .get_order_list_all(
                    &cycle.access_token,
                    cycle.shop.shop_id,
                    window.from,
                    window.to,
                )
                .await
            {
                Ok(list) => return Ok(list),
                Err(e) if e.is_retriable() && attempt < self.max_retry => {
                    let delay = LIST_RETRY_INITIAL_MS << attempt;
                    tracing::warn!(
                        shop_id = cycle.shop.shop_id,
                        attempt = attempt + 1,
                        max_retry = self.max_retry,
                        delay_ms = delay,
                        "Order list failed, retrying: {e}"
                    );
                    tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    // ========================================================================
    // Step D — detail batches, one transaction per order
    // ========================================================================

    async fn process_order_details(
        &self,
        cycle: &ShopCycle,
        order_sns: &[String],
        stats: &mut CollectStats,
    ) -> IngestResult<()> {
        for (batch_index, batch) in order_sns.chunks(self.batch_size).enumerate() {
            if batch_index > 0 {
                tokio::time::sleep(std::time::Duration::from_millis(RATE_LIMIT_PAUSE_MS)).await;
            }

            let response = cycle
                .client
                .get_order_detail(&cycle.access_token, cycle.shop.shop_id, batch)
                .await
                .map_err(IngestError::from)?;

            for detail in &response.order_list {
                if detail.order_sn.is_empty() {
                    tracing::warn!(
                        shop_id = cycle.shop.shop_id,
                        "Detail record without order_sn, skipping"
                    );
                    stats.record_failure();
                    continue;
                }

                let upsert = details::map_detail(detail);
                let result = async {
                    let mut tx = self.pool.begin().await?;
                    db::orders::upsert_order(&mut tx, &upsert, cycle.company_id, cycle.shop.shop_id)
                        .await
                        .map_err(|e| IngestError::Storage(e.to_string()))?;
                    tx.commit().await?;
                    Ok::<(), IngestError>(())
                }
                .await;

                match result {
                    Ok(()) => stats.record_success(upsert.order_sn.as_str()),
                    Err(e) => {
                        tracing::error!(
                            shop_id = cycle.shop.shop_id,
                            order_sn = %upsert.order_sn,
                            step = "upsert",
                            "Order upsert failed: {e}"
                        );
                        stats.record_failure();
                    }
                }
            }
        }
        Ok(())
    }

    // ========================================================================
    // Step E — tracking reconciliation
    // ========================================================================

    /// Look up tracking for persisted orders that may have one upstream and
    /// write the changed values. Per-order failures are logged and skipped.
    async fn reconcile_tracking(&self, cycle: &ShopCycle, order_sns: &[String]) {
        let candidates = match db::orders::list_reconcile_candidates(
            &self.pool,
            cycle.shop.shop_id,
            order_sns,
        )
        .await
        {
            Ok(rows) => rows,
            Err(e) => {
                tracing::error!(
                    shop_id = cycle.shop.shop_id,
                    step = "reconcile",
                    "Failed to load reconcile candidates: {e}"
                );
                return;
            }
        };

        let mut pending: Vec<TrackingUpdate> = Vec::new();
        for (index, candidate) in candidates.iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(std::time::Duration::from_millis(RATE_LIMIT_PAUSE_MS)).await;
            }

            let lookup = tokio::time::timeout(
                std::time::Duration::from_secs(TRACKING_TIMEOUT_SECS),
                cycle.client.get_tracking_number(
                    &cycle.access_token,
                    cycle.shop.shop_id,
                    &candidate.order_num,
                    None,
                ),
            )
            .await;

            match lookup {
                Ok(Ok(resp)) => {
                    if let Some(mut update) = tracking::decide_update(candidate, &resp) {
                        update.histories = self.fetch_histories(cycle, &update.tracking_no).await;
                        pending.push(update);
                    }
                }
                Ok(Err(e)) => {
                    tracing::warn!(
                        shop_id = cycle.shop.shop_id,
                        order_sn = %candidate.order_num,
                        step = "reconcile",
                        "Tracking lookup failed: {e}"
                    );
                }
                Err(_) => {
                    tracing::warn!(
                        shop_id = cycle.shop.shop_id,
                        order_sn = %candidate.order_num,
                        step = "reconcile",
                        "Tracking lookup timed out after {TRACKING_TIMEOUT_SECS}s"
                    );
                }
            }

            if pending.len() >= TRACKING_SAVE_BATCH {
                self.flush_tracking_updates(cycle.shop.shop_id, &mut pending)
                    .await;
            }
        }
        self.flush_tracking_updates(cycle.shop.shop_id, &mut pending)
            .await;
    }

    /// Detailed event history for a freshly obtained tracking number.
    /// Best-effort: a failed or slow lookup just yields no history rows.
    async fn fetch_histories(
        &self,
        cycle: &ShopCycle,
        tracking_no: &str,
    ) -> Vec<shared::models::order::HistoryUpsert> {
        let lookup = tokio::time::timeout(
            std::time::Duration::from_secs(TRACKING_TIMEOUT_SECS),
            cycle
                .client
                .get_tracking_info(&cycle.access_token, cycle.shop.shop_id, tracking_no),
        )
        .await;

        match lookup {
            Ok(Ok(info)) => tracking::histories_from(&info, tracking_no),
            Ok(Err(e)) => {
                tracing::warn!(
                    shop_id = cycle.shop.shop_id,
                    tracking_no,
                    step = "reconcile",
                    "Tracking history lookup failed: {e}"
                );
                vec![]
            }
            Err(_) => {
                tracing::warn!(
                    shop_id = cycle.shop.shop_id,
                    tracking_no,
                    step = "reconcile",
                    "Tracking history lookup timed out after {TRACKING_TIMEOUT_SECS}s"
                );
                vec![]
            }
        }
    }

    async fn flush_tracking_updates(&self, shop_id: i64, pending: &mut Vec<TrackingUpdate>) {
        for update in pending.drain(..) {
            if let Err(e) = db::orders::apply_tracking_update(&self.pool, &update).await {
                tracing::error!(
                    shop_id,
                    order_id = %update.order_id,
                    step = "reconcile",
                    "Tracking update failed: {e}"
                );
            }
        }
    }

    // ========================================================================
    // Step F — incomplete-row fixups
    // ========================================================================

    async fn fix_incomplete(&self, cycle: &ShopCycle) {
        // Tracking present, carrier missing: the detail record knows the
        // carrier.
        match db::orders::find_tracking_without_carrier(
            &self.pool,
            cycle.shop.shop_id,
            INCOMPLETE_LIMIT,
        )
        .await
        {
            Ok(rows) if !rows.is_empty() => {
                let sns: Vec<String> = rows.iter().map(|r| r.order_num.clone()).collect();
                match cycle
                    .client
                    .get_order_detail(&cycle.access_token, cycle.shop.shop_id, &sns)
                    .await
                {
                    Ok(response) => {
                        for detail in &response.order_list {
                            let Some(carrier) = detail.derive_carrier() else {
                                continue;
                            };
                            let Some(row) = rows.iter().find(|r| r.order_num == detail.order_sn)
                            else {
                                continue;
                            };
                            if let Err(e) =
                                db::orders::update_carrier(&self.pool, row.order_id, &carrier)
                                    .await
                            {
                                tracing::warn!(
                                    shop_id = cycle.shop.shop_id,
                                    order_sn = %detail.order_sn,
                                    step = "fixup",
                                    "Carrier fixup failed: {e}"
                                );
                            }
                        }
                    }
                    Err(e) => {
                        tracing::warn!(
                            shop_id = cycle.shop.shop_id,
                            step = "fixup",
                            "Detail re-pull failed: {e}"
                        );
                    }
                }
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(
                    shop_id = cycle.shop.shop_id,
                    step = "fixup",
                    "Incomplete-carrier query failed: {e}"
                );
            }
        }

        // Carrier present, tracking missing: tracking info is authoritative.
        match db::orders::find_carrier_without_tracking(
            &self.pool,
            cycle.shop.shop_id,
            INCOMPLETE_LIMIT,
        )
        .await
        {
            Ok(rows) => {
                let sns: Vec<String> = rows.iter().map(|r| r.order_num.clone()).collect();
                self.reconcile_tracking(cycle, &sns).await;
            }
            Err(e) => {
                tracing::warn!(
                    shop_id = cycle.shop.shop_id,
                    step = "fixup",
                    "Incomplete-tracking query failed: {e}"
                );
            }
        }
    }
}

// ============================================================================
// Time window (Step B)
// ============================================================================

/// Poll window in epoch seconds, `update_time` range field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub from: i64,
    pub to: i64,
}

impl TimeWindow {
    /// `[now − poll window, now + 24 h]`; the lookback defaults to one hour.
    pub fn for_shop(shop: &Shop) -> Self {
        Self::at(shared::util::now_secs(), shop.poll_window_minutes())
    }

    fn at(now_secs: i64, lookback_minutes: i64) -> Self {
        Self {
            from: now_secs - lookback_minutes * 60,
            to: now_secs + 24 * 3600,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_default_lookback() {
        let w = TimeWindow::at(1_747_267_200, 60);
        assert_eq!(w.from, 1_747_267_200 - 3600);
        assert_eq!(w.to, 1_747_267_200 + 86_400);
        assert!(w.from <= w.to);
    }

    #[test]
    fn test_window_configurable_lookback() {
        let w = TimeWindow::at(1_747_267_200, 1440);
        assert_eq!(w.from, 1_747_267_200 - 86_400);
    }
}
