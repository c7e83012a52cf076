//! Redis-backed job queues
//!
//! Four logical queues share one Redis connection. Each queue is a pending
//! ZSET (score = readiness millis + priority tie-break), a processing ZSET
//! (score = stall deadline), a dedup SET and two capped result lists.

pub mod job;

use redis::{aio::MultiplexedConnection, AsyncCommands};
use serde::Serialize;
use shared::jobs::QueueName;

pub use job::Job;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Keys live under this prefix.
const NAMESPACE: &str = "ingest";
/// Completed/failed retention per queue.
const RETENTION: isize = 100;
/// A popped job must complete within this budget or it is re-queued as
/// stalled.
const STALL_TIMEOUT_MS: i64 = 10 * 60 * 1000;

/// Outcome of an enqueue.
#[derive(Debug, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Enqueued,
    /// A live job with the same dedup key already exists.
    Deduplicated,
}

/// Outcome of recording a failure.
#[derive(Debug, PartialEq, Eq)]
pub enum FailOutcome {
    /// Re-scheduled with backoff.
    Requeued { delay_ms: u64 },
    /// Attempt budget exhausted; recorded in the failed list.
    Exhausted,
}

/// A job popped for processing; `raw` is the exact member string needed to
/// release it from the processing set.
#[derive(Debug)]
pub struct PoppedJob {
    pub job: Job,
    raw: String,
}

/// Depth snapshot for one queue.
#[derive(Debug, Clone, Serialize)]
pub struct QueueDepth {
    pub queue: String,
    pub pending: u64,
    pub processing: u64,
    pub completed: u64,
    pub failed: u64,
}

/// Handle to the queue backend. Cheap to clone.
#[derive(Clone)]
pub struct JobQueue {
    client: redis::Client,
}

impl JobQueue {
    pub fn new(redis_url: &str) -> Result<Self, BoxError> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self { client })
    }

    async fn conn(&self) -> Result<MultiplexedConnection, BoxError> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }

    fn pending_key(queue: QueueName) -> String {
        format!("{NAMESPACE}:{queue}:pending")
    }
    fn processing_key(queue: QueueName) -> String {
        format!("{NAMESPACE}:{queue}:processing")
    }
    fn dedup_key(queue: QueueName) -> String {
        format!("{NAMESPACE}:{queue}:dedup")
    }
    fn completed_key(queue: QueueName) -> String {
        format!("{NAMESPACE}:{queue}:completed")
    }
    fn failed_key(queue: QueueName) -> String {
        format!("{NAMESPACE}:{queue}:failed")
    }

    // ========================================================================
    // Producer side
    // ========================================================================

    /// Enqueue a job, honoring its dedup key and an optional initial delay.
    pub async fn enqueue(&self, job: Job, delay_ms: u64) -> Result<EnqueueOutcome, BoxError> {
        let mut conn = self.conn().await?;

        if let Some(dedup) = &job.dedup_key {
            let added: i64 = conn.sadd(Self::dedup_key(job.queue), dedup).await?;
            if added == 0 {
                tracing::debug!(job = %job.name, dedup = %dedup, "Job deduplicated");
                return Ok(EnqueueOutcome::Deduplicated);
            }
        }

        let ready_at = shared::util::now_millis() + delay_ms as i64;
        let member = serde_json::to_string(&job)?;
        let _: () = conn
            .zadd(Self::pending_key(job.queue), member, job.score(ready_at))
            .await?;
        Ok(EnqueueOutcome::Enqueued)
    }

    // ========================================================================
    // Consumer side
    // ========================================================================

    /// Pop one ready job, moving it to the processing set. `None` when the
    /// queue is empty or the head is not ready yet.
    pub async fn pop_ready(&self, queue: QueueName) -> Result<Option<PoppedJob>, BoxError> {
        let mut conn = self.conn().await?;
        let now = shared::util::now_millis();

        let popped: Vec<(String, f64)> = conn.zpopmin(Self::pending_key(queue), 1).await?;
        let Some((raw, score)) = popped.into_iter().next() else {
            return Ok(None);
        };

        // Head not ready: put it back untouched.
        if score > (now + 1) as f64 {
            let _: () = conn.zadd(Self::pending_key(queue), &raw, score).await?;
            return Ok(None);
        }

        let job: Job = match serde_json::from_str(&raw) {
            Ok(job) => job,
            Err(e) => {
                tracing::warn!(queue = %queue, "Dropping undecodable job: {e}");
                return Ok(None);
            }
        };

        let deadline = now + STALL_TIMEOUT_MS;
        let _: () = conn
            .zadd(Self::processing_key(queue), &raw, deadline as f64)
            .await?;
        Ok(Some(PoppedJob { job, raw }))
    }

    /// Record a successful run.
    pub async fn complete(&self, popped: &PoppedJob) -> Result<(), BoxError> {
        let mut conn = self.conn().await?;
        let queue = popped.job.queue;

        let _: () = conn.zrem(Self::processing_key(queue), &popped.raw).await?;
        if let Some(dedup) = &popped.job.dedup_key {
            let _: () = conn.srem(Self::dedup_key(queue), dedup).await?;
        }

        let record = serde_json::json!({
            "id": popped.job.id,
            "name": popped.job.name,
            "attempts": popped.job.attempts_made + 1,
            "finished_at": shared::util::now_millis(),
        });
        let _: () = conn
            .lpush(Self::completed_key(queue), record.to_string())
            .await?;
        let _: () = conn
            .ltrim(Self::completed_key(queue), 0, RETENTION - 1)
            .await?;
        Ok(())
    }

    /// Record a failed run: re-schedule with backoff while attempts remain,
    /// park in the failed list otherwise.
    pub async fn fail(&self, popped: &PoppedJob, error: &str) -> Result<FailOutcome, BoxError> {
        let mut conn = self.conn().await?;
        let queue = popped.job.queue;
        let _: () = conn.zrem(Self::processing_key(queue), &popped.raw).await?;

        if popped.job.has_attempts_left() {
            let mut retry = popped.job.clone();
            retry.attempts_made += 1;
            let delay_ms = popped.job.next_delay_ms();
            let ready_at = shared::util::now_millis() + delay_ms as i64;
            let member = serde_json::to_string(&retry)?;
            let _: () = conn
                .zadd(Self::pending_key(queue), member, retry.score(ready_at))
                .await?;
            return Ok(FailOutcome::Requeued { delay_ms });
        }

        if let Some(dedup) = &popped.job.dedup_key {
            let _: () = conn.srem(Self::dedup_key(queue), dedup).await?;
        }
        let record = serde_json::json!({
            "id": popped.job.id,
            "name": popped.job.name,
            "attempts": popped.job.attempts_made + 1,
            "error": error,
            "failed_at": shared::util::now_millis(),
        });
        let _: () = conn
            .lpush(Self::failed_key(queue), record.to_string())
            .await?;
        let _: () = conn.ltrim(Self::failed_key(queue), 0, RETENTION - 1).await?;
        Ok(FailOutcome::Exhausted)
    }

    /// Move jobs whose processing deadline passed back to pending.
    pub async fn requeue_stalled(&self, queue: QueueName) -> Result<u32, BoxError> {
        let mut conn = self.conn().await?;
        let now = shared::util::now_millis();

        let stalled: Vec<String> = conn
            .zrangebyscore(Self::processing_key(queue), "-inf", now as f64)
            .await?;
        let mut moved = 0u32;
        for raw in stalled {
            let removed: i64 = conn.zrem(Self::processing_key(queue), &raw).await?;
            if removed == 0 {
                continue;
            }
            tracing::warn!(queue = %queue, "Re-queuing stalled job");
            let _: () = conn
                .zadd(Self::pending_key(queue), &raw, now as f64)
                .await?;
            moved += 1;
        }
        Ok(moved)
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    /// Depth snapshot across all queues.
    pub async fn depths(&self) -> Result<Vec<QueueDepth>, BoxError> {
        let mut conn = self.conn().await?;
        let mut out = Vec::with_capacity(QueueName::ALL.len());
        for &queue in QueueName::ALL {
            let pending: u64 = conn.zcard(Self::pending_key(queue)).await?;
            let processing: u64 = conn.zcard(Self::processing_key(queue)).await?;
            let completed: u64 = conn.llen(Self::completed_key(queue)).await?;
            let failed: u64 = conn.llen(Self::failed_key(queue)).await?;
            out.push(QueueDepth {
                queue: queue.to_string(),
                pending,
                processing,
                completed,
                failed,
            });
        }
        Ok(out)
    }

    /// Most recent failure records for one queue, newest first.
    pub async fn recent_failures(
        &self,
        queue: QueueName,
        count: isize,
    ) -> Result<Vec<serde_json::Value>, BoxError> {
        let mut conn = self.conn().await?;
        let raw: Vec<String> = conn
            .lrange(Self::failed_key(queue), 0, count.max(1) - 1)
            .await?;
        Ok(raw
            .into_iter()
            .filter_map(|r| serde_json::from_str(&r).ok())
            .collect())
    }

    /// Write a heartbeat record with a TTL, for supervisor introspection.
    pub async fn publish_heartbeat(
        &self,
        worker_id: &str,
        status: &str,
        active_jobs: usize,
    ) -> Result<(), BoxError> {
        let mut conn = self.conn().await?;
        let record = serde_json::json!({
            "status": status,
            "active_jobs": active_jobs,
            "at": shared::util::now_millis(),
        });
        let _: () = conn
            .set_ex(
                format!("{NAMESPACE}:worker:{worker_id}:heartbeat"),
                record.to_string(),
                30,
            )
            .await?;
        Ok(())
    }

    /// Live worker heartbeats.
    pub async fn worker_heartbeats(&self) -> Result<Vec<serde_json::Value>, BoxError> {
        let mut conn = self.conn().await?;
        let keys: Vec<String> = conn.keys(format!("{NAMESPACE}:worker:*:heartbeat")).await?;
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            let raw: Option<String> = conn.get(&key).await?;
            if let Some(raw) = raw {
                if let Ok(value) = serde_json::from_str::<serde_json::Value>(&raw) {
                    out.push(value);
                }
            }
        }
        Ok(out)
    }
}
