//! Order collection scheduler
//!
//! Cron-driven fan-out: one `collect-shop-orders` job per active shop per
//! tick, single-flight guarded. In cluster mode the scheduler only
//! enqueues; in direct mode it runs the orchestrator inline, which is the
//! queue-of-capacity-1 equivalent and persists identically.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use cron::Schedule;
use shared::jobs::{CollectShopOrders, QueueName, JOB_COLLECT_SHOP_ORDERS};
use sqlx::PgPool;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::collector::Collector;
use crate::db;
use crate::queue::{EnqueueOutcome, Job, JobQueue};

/// Fallback cadence when the configured expression does not parse.
const DEFAULT_CRON: &str = "*/10 * * * *";

pub struct OrderScheduler {
    pool: PgPool,
    queue: JobQueue,
    collector: Arc<Collector>,
    schedule: Schedule,
    cluster_enabled: bool,
    sandbox: bool,
    job_attempts: u32,
    is_running: AtomicBool,
    /// Marketplace shop id → tick start millis, for the shops currently
    /// being worked in direct mode.
    current_jobs: Mutex<HashMap<i64, i64>>,
    shutdown: CancellationToken,
}

impl OrderScheduler {
    pub fn new(
        pool: PgPool,
        queue: JobQueue,
        collector: Arc<Collector>,
        cron_expression: &str,
        cluster_enabled: bool,
        sandbox: bool,
        job_attempts: u32,
        shutdown: CancellationToken,
    ) -> Self {
        let schedule = parse_schedule(cron_expression).unwrap_or_else(|| {
            tracing::warn!(
                expression = cron_expression,
                "Invalid cron expression, falling back to {DEFAULT_CRON}"
            );
            parse_schedule(DEFAULT_CRON).expect("default cron expression parses")
        });
        Self {
            pool,
            queue,
            collector,
            schedule,
            cluster_enabled,
            sandbox,
            job_attempts: job_attempts.max(1),
            is_running: AtomicBool::new(false),
            current_jobs: Mutex::new(HashMap::new()),
            shutdown,
        }
    }

    /// Main loop: one immediate pass, then cron ticks until shutdown.
    pub async fn run(self) {
        tracing::info!(cluster = self.cluster_enabled, "Order scheduler started");

        self.tick().await;

        loop {
            let Some(wait) = self.duration_until_next_tick() else {
                tracing::error!("Cron schedule yields no upcoming time, scheduler stopping");
                return;
            };
            tracing::debug!(secs = wait.as_secs(), "Next collection tick scheduled");

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = self.shutdown.cancelled() => {
                    tracing::info!("Order scheduler received shutdown signal");
                    return;
                }
            }
            self.tick().await;
        }
    }

    /// One fan-out pass. Skipped entirely while a previous pass is running.
    async fn tick(&self) {
        if self.is_running.swap(true, Ordering::SeqCst) {
            tracing::warn!("Previous collection pass still running, skipping tick");
            return;
        }

        let shops = match db::shops::load_active_shops(&self.pool, self.sandbox).await {
            Ok(shops) => shops,
            Err(e) => {
                tracing::error!("Failed to load active shops: {e}");
                self.is_running.store(false, Ordering::SeqCst);
                return;
            }
        };
        tracing::info!(shops = shops.len(), "Collection pass starting");

        for shop in shops {
            if self.shutdown.is_cancelled() {
                break;
            }
            let payload = CollectShopOrders {
                shop_key: shop.id,
                shop_id: shop.shop_id,
            };

            if self.cluster_enabled {
                let job = Job::new(
                    QueueName::OrderCollection,
                    JOB_COLLECT_SHOP_ORDERS,
                    match serde_json::to_value(&payload) {
                        Ok(v) => v,
                        Err(e) => {
                            tracing::error!(shop_id = shop.shop_id, "Payload serialization: {e}");
                            continue;
                        }
                    },
                )
                .with_dedup_key(payload.dedup_key())
                .with_max_attempts(self.job_attempts);

                match self.queue.enqueue(job, 0).await {
                    Ok(EnqueueOutcome::Enqueued) => {
                        tracing::debug!(shop_id = shop.shop_id, "Collection job enqueued");
                    }
                    Ok(EnqueueOutcome::Deduplicated) => {
                        tracing::debug!(shop_id = shop.shop_id, "Collection job already queued");
                    }
                    Err(e) => {
                        tracing::error!(shop_id = shop.shop_id, "Enqueue failed: {e}");
                    }
                }
            } else {
                self.collect_inline(shop.id, shop.shop_id).await;
            }
        }

        self.is_running.store(false, Ordering::SeqCst);
    }

    /// Direct mode: run the orchestrator here, one shop at a time.
    async fn collect_inline(&self, shop_key: uuid::Uuid, shop_id: i64) {
        {
            let mut current = self.current_jobs.lock().unwrap();
            if current.contains_key(&shop_id) {
                tracing::warn!(shop_id, "Shop already being collected, skipping");
                return;
            }
            current.insert(shop_id, shared::util::now_millis());
        }

        let result = self.collector.collect_for_shop(shop_key, shop_id).await;
        self.current_jobs.lock().unwrap().remove(&shop_id);

        match result {
            Ok(stats) => {
                tracing::info!(
                    shop_id,
                    total = stats.total,
                    success = stats.success,
                    failed = stats.failed,
                    "Direct collection finished"
                );
            }
            Err(e) => {
                tracing::error!(shop_id, "Direct collection failed: {e}");
            }
        }
    }

    fn duration_until_next_tick(&self) -> Option<std::time::Duration> {
        let next = self.schedule.upcoming(chrono::Utc).next()?;
        let wait = next - chrono::Utc::now();
        Some(wait.to_std().unwrap_or(std::time::Duration::from_secs(1)))
    }
}

/// Parse a cron expression, promoting the common 5-field form to the
/// 6-field (with seconds) form the parser expects.
fn parse_schedule(expression: &str) -> Option<Schedule> {
    let normalized = if expression.split_whitespace().count() == 5 {
        format!("0 {expression}")
    } else {
        expression.to_string()
    };
    Schedule::from_str(&normalized).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_five_field_expression_promoted() {
        let schedule = parse_schedule("*/10 * * * *").unwrap();
        let next = schedule.upcoming(chrono::Utc).next().unwrap();
        assert_eq!(next.timestamp() % 600, 0);
    }

    #[test]
    fn test_six_field_expression_accepted() {
        assert!(parse_schedule("0 */5 * * * *").is_some());
    }

    #[test]
    fn test_invalid_expression_rejected() {
        assert!(parse_schedule("not a cron").is_none());
        assert!(parse_schedule("99 99 * * *").is_none());
    }
}
