//! Shop and company identity rows

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A seller shop bound to the marketplace.
///
/// (shop_id, partner_id) identifies the shop on the wire; `id` is the
/// internal key. Exactly one non-tombstoned row per identity.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Shop {
    pub id: Uuid,
    /// Marketplace shop id
    pub shop_id: i64,
    /// Developer partner id used to sign requests
    pub partner_id: i64,
    /// HMAC secret
    pub partner_key: String,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    /// Access token expiry (Unix millis)
    pub expire_at: Option<i64>,
    pub is_active: bool,
    pub is_deleted: bool,
    /// Order poll lookback window in minutes (default 60)
    pub order_poll_minutes: Option<i32>,
    /// Shop-level sandbox flag; the company column takes precedence
    pub is_sandbox: Option<bool>,
    pub company_id: Option<Uuid>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Shop {
    /// Lookback window for the order poll, minutes.
    pub fn poll_window_minutes(&self) -> i64 {
        match self.order_poll_minutes {
            Some(m) if m > 0 => m as i64,
            _ => 60,
        }
    }
}

/// Parent company row. `is_sandbox` here wins over the process-level flag.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Company {
    pub id: Uuid,
    pub name: String,
    pub is_sandbox: Option<bool>,
    pub is_deleted: bool,
}

impl Company {
    /// Effective sandbox flag: company column first, process flag as fallback.
    pub fn effective_sandbox(&self, process_flag: bool) -> bool {
        self.is_sandbox.unwrap_or(process_flag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn company(is_sandbox: Option<bool>) -> Company {
        Company {
            id: Uuid::new_v4(),
            name: "acme".into(),
            is_sandbox,
            is_deleted: false,
        }
    }

    #[test]
    fn test_company_sandbox_column_wins() {
        assert!(company(Some(true)).effective_sandbox(false));
        assert!(!company(Some(false)).effective_sandbox(true));
    }

    #[test]
    fn test_process_flag_used_when_column_absent() {
        assert!(company(None).effective_sandbox(true));
        assert!(!company(None).effective_sandbox(false));
    }
}
