//! Per-shop collection statistics

use serde::{Deserialize, Serialize};

/// Outcome of one orchestrator invocation for one shop.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectStats {
    /// Orders the list endpoint returned for the window
    pub total: u32,
    /// Orders persisted successfully
    pub success: u32,
    /// Orders that failed inside their own transaction
    pub failed: u32,
    /// Order numbers persisted this run, in processing order
    pub order_sns: Vec<String>,
}

impl CollectStats {
    pub fn record_success(&mut self, order_sn: impl Into<String>) {
        self.success += 1;
        self.order_sns.push(order_sn.into());
    }

    pub fn record_failure(&mut self) {
        self.failed += 1;
    }
}
