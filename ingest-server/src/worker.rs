//! Worker runtime
//!
//! Consumes the four queues with bounded concurrency, dispatching each job
//! to its registered handler. Publishes a heartbeat every 10 s and re-queues
//! stalled jobs. Handler failures propagate so the queue records the
//! attempt.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use shared::jobs::{
    CollectShopOrders, ProcessOrderDetails, ProcessShipmentInfo, QueueName,
    JOB_COLLECT_SHOP_ORDERS, JOB_MANUAL_ORDER_COLLECT, JOB_PROCESS_ORDER_DETAILS,
    JOB_PROCESS_SHIPMENT_INFO, JOB_UPDATE_INVENTORY,
};
use shared::{IngestError, IngestResult};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::collector::Collector;
use crate::queue::{FailOutcome, Job, JobQueue};

/// Heartbeat cadence.
const HEARTBEAT_SECS: u64 = 10;
/// Stall sweep cadence.
const STALL_SWEEP_SECS: u64 = 60;
/// Idle poll pause when a queue is empty.
const POLL_PAUSE_MS: u64 = 500;

/// One job handler per job name.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: &Job) -> IngestResult<()>;
}

/// Worker status, as published in the heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    ProcessingOrders,
    ProcessingDetails,
    ProcessingShipment,
    UpdatingInventory,
}

impl WorkerState {
    fn for_job(name: &str) -> Self {
        match name {
            JOB_COLLECT_SHOP_ORDERS | JOB_MANUAL_ORDER_COLLECT => Self::ProcessingOrders,
            JOB_PROCESS_ORDER_DETAILS => Self::ProcessingDetails,
            JOB_PROCESS_SHIPMENT_INFO => Self::ProcessingShipment,
            JOB_UPDATE_INVENTORY => Self::UpdatingInventory,
            _ => Self::Idle,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::ProcessingOrders => "processing-orders",
            Self::ProcessingDetails => "processing-details",
            Self::ProcessingShipment => "processing-shipment",
            Self::UpdatingInventory => "updating-inventory",
        }
    }
}

/// The worker: handler registry plus consumer loops.
pub struct Worker {
    id: String,
    queue: JobQueue,
    handlers: HashMap<&'static str, Arc<dyn JobHandler>>,
    concurrency: usize,
    active_jobs: Arc<AtomicUsize>,
    status: Arc<Mutex<WorkerState>>,
    shutdown: CancellationToken,
}

impl Worker {
    pub fn new(
        queue: JobQueue,
        collector: Arc<Collector>,
        concurrency: usize,
        shutdown: CancellationToken,
    ) -> Self {
        let collect: Arc<dyn JobHandler> = Arc::new(CollectOrdersHandler {
            collector: collector.clone(),
        });
        let mut handlers: HashMap<&'static str, Arc<dyn JobHandler>> = HashMap::new();
        handlers.insert(JOB_COLLECT_SHOP_ORDERS, collect.clone());
        handlers.insert(JOB_MANUAL_ORDER_COLLECT, collect);
        handlers.insert(
            JOB_PROCESS_ORDER_DETAILS,
            Arc::new(OrderDetailsHandler {
                collector: collector.clone(),
            }),
        );
        handlers.insert(
            JOB_PROCESS_SHIPMENT_INFO,
            Arc::new(ShipmentInfoHandler { collector }),
        );
        handlers.insert(JOB_UPDATE_INVENTORY, Arc::new(InventoryHandler));

        Self {
            id: Uuid::new_v4().to_string(),
            queue,
            handlers,
            concurrency: concurrency.max(1),
            active_jobs: Arc::new(AtomicUsize::new(0)),
            status: Arc::new(Mutex::new(WorkerState::Idle)),
            shutdown,
        }
    }

    /// Run consumer loops for every queue plus heartbeat and stall sweeps.
    /// Returns once shutdown is requested and in-flight handlers drained.
    pub async fn run(self) {
        tracing::info!(worker_id = %self.id, concurrency = self.concurrency, "Worker started");

        let heartbeat = tokio::spawn(Self::heartbeat_loop(
            self.queue.clone(),
            self.id.clone(),
            self.status.clone(),
            self.active_jobs.clone(),
            self.shutdown.clone(),
        ));
        let sweeper = tokio::spawn(Self::stall_sweep_loop(
            self.queue.clone(),
            self.shutdown.clone(),
        ));

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut consumers = Vec::new();
        for &queue_name in QueueName::ALL {
            consumers.push(tokio::spawn(Self::consume_loop(
                self.queue.clone(),
                queue_name,
                self.handlers.clone(),
                semaphore.clone(),
                self.active_jobs.clone(),
                self.status.clone(),
                self.shutdown.clone(),
            )));
        }

        for consumer in consumers {
            let _ = consumer.await;
        }
        // Drain: every permit back means every in-flight handler returned.
        let _ = semaphore.acquire_many(self.concurrency as u32).await;
        let _ = heartbeat.await;
        let _ = sweeper.await;
        tracing::info!(worker_id = %self.id, "Worker stopped");
    }

    async fn consume_loop(
        queue: JobQueue,
        queue_name: QueueName,
        handlers: HashMap<&'static str, Arc<dyn JobHandler>>,
        semaphore: Arc<Semaphore>,
        active_jobs: Arc<AtomicUsize>,
        status: Arc<Mutex<WorkerState>>,
        shutdown: CancellationToken,
    ) {
        loop {
            if shutdown.is_cancelled() {
                return;
            }

            let permit = tokio::select! {
                permit = semaphore.clone().acquire_owned() => match permit {
                    Ok(p) => p,
                    Err(_) => return,
                },
                _ = shutdown.cancelled() => return,
            };

            let popped = match queue.pop_ready(queue_name).await {
                Ok(Some(popped)) => popped,
                Ok(None) => {
                    drop(permit);
                    tokio::select! {
                        _ = tokio::time::sleep(std::time::Duration::from_millis(POLL_PAUSE_MS)) => {}
                        _ = shutdown.cancelled() => return,
                    }
                    continue;
                }
                Err(e) => {
                    drop(permit);
                    tracing::error!(queue = %queue_name, "Queue pop failed: {e}");
                    tokio::select! {
                        _ = tokio::time::sleep(std::time::Duration::from_secs(1)) => {}
                        _ = shutdown.cancelled() => return,
                    }
                    continue;
                }
            };

            let Some(handler) = handlers.get(popped.job.name.as_str()).cloned() else {
                tracing::error!(job = %popped.job.name, "No handler registered");
                let _ = queue.fail(&popped, "no handler registered").await;
                drop(permit);
                continue;
            };

            let queue = queue.clone();
            let active_jobs = active_jobs.clone();
            let status = status.clone();
            tokio::spawn(async move {
                let _permit = permit;
                active_jobs.fetch_add(1, Ordering::SeqCst);
                *status.lock().unwrap() = WorkerState::for_job(&popped.job.name);

                let result = handler.handle(&popped.job).await;
                match result {
                    Ok(()) => {
                        if let Err(e) = queue.complete(&popped).await {
                            tracing::error!(job = %popped.job.id, "Failed to record completion: {e}");
                        }
                    }
                    Err(e) => {
                        tracing::error!(
                            job = %popped.job.name,
                            job_id = %popped.job.id,
                            attempt = popped.job.attempts_made + 1,
                            "Job failed: {e}"
                        );
                        match queue.fail(&popped, &e.to_string()).await {
                            Ok(FailOutcome::Requeued { delay_ms }) => {
                                tracing::info!(job = %popped.job.name, delay_ms, "Job re-scheduled");
                            }
                            Ok(FailOutcome::Exhausted) => {
                                tracing::warn!(job = %popped.job.name, "Job attempts exhausted");
                            }
                            Err(e) => {
                                tracing::error!(job = %popped.job.id, "Failed to record failure: {e}");
                            }
                        }
                    }
                }

                if active_jobs.fetch_sub(1, Ordering::SeqCst) == 1 {
                    *status.lock().unwrap() = WorkerState::Idle;
                }
            });
        }
    }

    async fn heartbeat_loop(
        queue: JobQueue,
        worker_id: String,
        status: Arc<Mutex<WorkerState>>,
        active_jobs: Arc<AtomicUsize>,
        shutdown: CancellationToken,
    ) {
        let mut interval =
            tokio::time::interval(std::time::Duration::from_secs(HEARTBEAT_SECS));
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let state = *status.lock().unwrap();
                    let active = active_jobs.load(Ordering::SeqCst);
                    if let Err(e) = queue
                        .publish_heartbeat(&worker_id, state.as_str(), active)
                        .await
                    {
                        tracing::warn!("Heartbeat publish failed: {e}");
                    }
                }
                _ = shutdown.cancelled() => return,
            }
        }
    }

    async fn stall_sweep_loop(queue: JobQueue, shutdown: CancellationToken) {
        let mut interval =
            tokio::time::interval(std::time::Duration::from_secs(STALL_SWEEP_SECS));
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    for &queue_name in QueueName::ALL {
                        match queue.requeue_stalled(queue_name).await {
                            Ok(0) => {}
                            Ok(n) => tracing::warn!(queue = %queue_name, stalled = n, "Re-queued stalled jobs"),
                            Err(e) => tracing::error!(queue = %queue_name, "Stall sweep failed: {e}"),
                        }
                    }
                }
                _ = shutdown.cancelled() => return,
            }
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

struct CollectOrdersHandler {
    collector: Arc<Collector>,
}

#[async_trait]
impl JobHandler for CollectOrdersHandler {
    async fn handle(&self, job: &Job) -> IngestResult<()> {
        let payload: CollectShopOrders = serde_json::from_value(job.payload.clone())
            .map_err(|e| IngestError::Data(format!("Bad job payload: {e}")))?;
        let stats = self
            .collector
            .collect_for_shop(payload.shop_key, payload.shop_id)
            .await?;
        tracing::info!(
            shop_id = payload.shop_id,
            total = stats.total,
            success = stats.success,
            failed = stats.failed,
            "Collection job done"
        );
        Ok(())
    }
}

struct OrderDetailsHandler {
    collector: Arc<Collector>,
}

#[async_trait]
impl JobHandler for OrderDetailsHandler {
    async fn handle(&self, job: &Job) -> IngestResult<()> {
        let payload: ProcessOrderDetails = serde_json::from_value(job.payload.clone())
            .map_err(|e| IngestError::Data(format!("Bad job payload: {e}")))?;
        self.collector
            .process_details_for_shop(payload.shop_key, payload.shop_id, &payload.order_sns)
            .await?;
        Ok(())
    }
}

struct ShipmentInfoHandler {
    collector: Arc<Collector>,
}

#[async_trait]
impl JobHandler for ShipmentInfoHandler {
    async fn handle(&self, job: &Job) -> IngestResult<()> {
        let payload: ProcessShipmentInfo = serde_json::from_value(job.payload.clone())
            .map_err(|e| IngestError::Data(format!("Bad job payload: {e}")))?;
        let count = self
            .collector
            .process_shipments_for_shop(payload.shop_key, payload.shop_id)
            .await?;
        tracing::info!(shop_id = payload.shop_id, orders = count, "Shipment pass done");
        Ok(())
    }
}

/// Stock writes are out of scope; the handler only acknowledges the job so
/// the queue stays drained.
struct InventoryHandler;

#[async_trait]
impl JobHandler for InventoryHandler {
    async fn handle(&self, job: &Job) -> IngestResult<()> {
        tracing::debug!(job_id = %job.id, "Inventory update acknowledged");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_state_for_job() {
        assert_eq!(
            WorkerState::for_job(JOB_COLLECT_SHOP_ORDERS),
            WorkerState::ProcessingOrders
        );
        assert_eq!(
            WorkerState::for_job(JOB_MANUAL_ORDER_COLLECT),
            WorkerState::ProcessingOrders
        );
        assert_eq!(
            WorkerState::for_job(JOB_PROCESS_SHIPMENT_INFO),
            WorkerState::ProcessingShipment
        );
        assert_eq!(WorkerState::for_job("unknown"), WorkerState::Idle);
    }

    #[test]
    fn test_heartbeat_status_strings() {
        assert_eq!(WorkerState::Idle.as_str(), "idle");
        assert_eq!(WorkerState::ProcessingDetails.as_str(), "processing-details");
        assert_eq!(WorkerState::UpdatingInventory.as_str(), "updating-inventory");
    }
}
