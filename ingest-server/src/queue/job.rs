//! Job envelope
//!
//! What actually sits in Redis: the payload plus everything the queue
//! needs to retry, prioritize and deduplicate it.

use serde::{Deserialize, Serialize};
use shared::jobs::QueueName;

/// Default attempts per job.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
/// Default base delay for exponential backoff.
pub const DEFAULT_BACKOFF_MS: u64 = 2000;
/// Default priority; lower runs earlier among equally-ready jobs.
pub const DEFAULT_PRIORITY: u8 = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    /// Handler key
    pub name: String,
    pub queue: QueueName,
    pub payload: serde_json::Value,
    #[serde(default)]
    pub attempts_made: u32,
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    pub priority: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dedup_key: Option<String>,
    /// Unix millis
    pub enqueued_at: i64,
}

impl Job {
    pub fn new(queue: QueueName, name: &str, payload: serde_json::Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            queue,
            payload,
            attempts_made: 0,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_base_ms: DEFAULT_BACKOFF_MS,
            priority: DEFAULT_PRIORITY,
            dedup_key: None,
            enqueued_at: shared::util::now_millis(),
        }
    }

    pub fn with_dedup_key(mut self, key: impl Into<String>) -> Self {
        self.dedup_key = Some(key.into());
        self
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Exponential backoff delay for the next attempt.
    pub fn next_delay_ms(&self) -> u64 {
        self.backoff_base_ms
            .saturating_mul(1u64 << self.attempts_made.min(16))
    }

    /// Whether a failed run leaves attempts on the budget.
    pub fn has_attempts_left(&self) -> bool {
        self.attempts_made + 1 < self.max_attempts
    }

    /// ZSET score: readiness in millis, priority as a sub-millisecond tie
    /// breaker.
    pub fn score(&self, ready_at_ms: i64) -> f64 {
        ready_at_ms as f64 + f64::from(self.priority) / 1000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_backoff_doubles_per_attempt() {
        let mut job = Job::new(QueueName::OrderCollection, "collect-shop-orders", json!({}));
        assert_eq!(job.next_delay_ms(), 2000);
        job.attempts_made = 1;
        assert_eq!(job.next_delay_ms(), 4000);
        job.attempts_made = 2;
        assert_eq!(job.next_delay_ms(), 8000);
    }

    #[test]
    fn test_attempt_budget() {
        let mut job = Job::new(QueueName::OrderCollection, "collect-shop-orders", json!({}));
        assert!(job.has_attempts_left());
        job.attempts_made = 2;
        assert!(!job.has_attempts_left());
    }

    #[test]
    fn test_priority_breaks_ties_without_reordering_time() {
        let urgent = Job::new(QueueName::OrderCollection, "manual-order-collect", json!({}))
            .with_priority(1);
        let normal = Job::new(QueueName::OrderCollection, "collect-shop-orders", json!({}));
        // Same readiness: lower priority number sorts first.
        assert!(urgent.score(1000) < normal.score(1000));
        // Earlier readiness always wins over priority.
        assert!(normal.score(999) < urgent.score(1000));
    }

    #[test]
    fn test_envelope_round_trip() {
        let job = Job::new(
            QueueName::ShipmentInfo,
            "process-shipment-info",
            json!({"shop_id": 67890}),
        )
        .with_dedup_key("shipment:67890");
        let raw = serde_json::to_string(&job).unwrap();
        let back: Job = serde_json::from_str(&raw).unwrap();
        assert_eq!(back.id, job.id);
        assert_eq!(back.queue, QueueName::ShipmentInfo);
        assert_eq!(back.dedup_key.as_deref(), Some("shipment:67890"));
    }
}
