//! Application state
//!
//! Explicitly constructed collaborators, passed to the scheduler, worker
//! and HTTP layer at start-up. The operator HTTP surface is thin glue over
//! the methods here.

use std::sync::Arc;

use shared::jobs::{CollectShopOrders, QueueName, JOB_MANUAL_ORDER_COLLECT};
use shared::models::{CollectStats, OrderWithLogistic, Shop};
use shared::{IngestError, IngestResult};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use crate::collector::Collector;
use crate::config::Config;
use crate::db;
use crate::queue::{EnqueueOutcome, Job, JobQueue, QueueDepth};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub queue: JobQueue,
    pub collector: Arc<Collector>,
    pub config: Config,
    /// Unix millis at process start
    pub started_at: i64,
}

/// What a manual collection request did.
#[derive(Debug)]
pub enum CollectOutcome {
    /// Cluster mode: job enqueued for a worker.
    Queued,
    /// Cluster mode: an identical job was already live.
    AlreadyQueued,
    /// Direct mode: ran to completion.
    Completed(CollectStats),
}

impl AppState {
    /// Connect the pool, run migrations, open the queue.
    pub async fn new(config: &Config) -> Result<Self, BoxError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.db_pool_size)
            .connect(&config.database_url())
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;

        let queue = JobQueue::new(&config.redis_url())?;
        let collector = Arc::new(Collector::new(pool.clone(), config));

        Ok(Self {
            pool,
            queue,
            collector,
            config: config.clone(),
            started_at: shared::util::now_millis(),
        })
    }

    /// Resolve a shop reference: internal UUID first, marketplace id second.
    async fn resolve_shop_ref(&self, shop_ref: &str) -> IngestResult<Shop> {
        if let Ok(key) = shop_ref.parse::<Uuid>() {
            if let Some(shop) = db::shops::get_shop(&self.pool, key)
                .await
                .map_err(|e| IngestError::Storage(e.to_string()))?
            {
                return Ok(shop);
            }
        }
        if let Ok(shop_id) = shop_ref.parse::<i64>() {
            if let Some(shop) = db::shops::get_shop_by_marketplace_id(&self.pool, shop_id)
                .await
                .map_err(|e| IngestError::Storage(e.to_string()))?
            {
                return Ok(shop);
            }
        }
        Err(IngestError::Config(format!("Shop {shop_ref} not found")))
    }

    /// Trigger collection for one shop. Enqueues (high priority) in cluster
    /// mode, runs inline in direct mode.
    pub async fn collect_orders_for(&self, shop_ref: &str) -> IngestResult<CollectOutcome> {
        let shop = self.resolve_shop_ref(shop_ref).await?;
        let payload = CollectShopOrders {
            shop_key: shop.id,
            shop_id: shop.shop_id,
        };

        if self.config.cluster_enabled {
            let job = Job::new(
                QueueName::OrderCollection,
                JOB_MANUAL_ORDER_COLLECT,
                serde_json::to_value(&payload)
                    .map_err(|e| IngestError::Data(e.to_string()))?,
            )
            .with_dedup_key(payload.dedup_key())
            .with_priority(1);

            return match self.queue.enqueue(job, 0).await {
                Ok(EnqueueOutcome::Enqueued) => Ok(CollectOutcome::Queued),
                Ok(EnqueueOutcome::Deduplicated) => Ok(CollectOutcome::AlreadyQueued),
                Err(e) => Err(IngestError::Storage(e.to_string())),
            };
        }

        let stats = self
            .collector
            .collect_for_shop(shop.id, shop.shop_id)
            .await?;
        Ok(CollectOutcome::Completed(stats))
    }

    /// Depth snapshot across all queues.
    pub async fn queue_depths(&self) -> IngestResult<Vec<QueueDepth>> {
        self.queue
            .depths()
            .await
            .map_err(|e| IngestError::Storage(e.to_string()))
    }

    /// One order with logistic and items, by UUID or order number.
    pub async fn get_order(&self, id_or_sn: &str) -> IngestResult<Option<OrderWithLogistic>> {
        db::orders::get_order(&self.pool, id_or_sn)
            .await
            .map_err(|e| IngestError::Storage(e.to_string()))
    }
}
