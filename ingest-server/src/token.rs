//! Access-token lifecycle
//!
//! Shops are taken by value and returned refreshed; the repository row is
//! the only shared state.

use shared::models::Shop;
use shared::{IngestError, IngestResult};
use shopee_client::ShopeeClient;
use sqlx::PgPool;

use crate::db;

/// Refresh when the token expires within this margin.
const REFRESH_MARGIN_MS: i64 = 300_000;

/// Keeps shop access tokens fresh.
#[derive(Clone)]
pub struct TokenManager {
    pool: PgPool,
}

impl TokenManager {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Whether `shop` needs a refresh before the next API call.
    pub fn needs_refresh(shop: &Shop, now_ms: i64) -> bool {
        match (&shop.access_token, shop.expire_at) {
            (None, _) => true,
            (Some(token), _) if token.is_empty() => true,
            (Some(_), None) => true,
            (Some(_), Some(expire_at)) => expire_at - now_ms < REFRESH_MARGIN_MS,
        }
    }

    /// Return a shop with a non-expired access token, refreshing and
    /// persisting when needed.
    pub async fn ensure_fresh(&self, client: &ShopeeClient, shop: Shop) -> IngestResult<Shop> {
        let now = shared::util::now_millis();
        if !Self::needs_refresh(&shop, now) {
            return Ok(shop);
        }

        let refresh_token = shop
            .refresh_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                IngestError::Token(format!("Shop {} has no refresh token", shop.shop_id))
            })?;

        tracing::info!(shop_id = shop.shop_id, "Refreshing access token");
        let grant = client
            .refresh_access_token(refresh_token, shop.shop_id)
            .await
            .map_err(|e| IngestError::Token(e.to_string()))?;

        let expire_at = now + grant.expire_in.saturating_mul(1000);
        db::shops::update_shop_tokens(
            &self.pool,
            shop.id,
            &grant.access_token,
            &grant.refresh_token,
            expire_at,
        )
        .await
        .map_err(|e| IngestError::Storage(e.to_string()))?;

        let mut shop = shop;
        shop.access_token = Some(grant.access_token);
        shop.refresh_token = Some(grant.refresh_token);
        shop.expire_at = Some(expire_at);
        shop.updated_at = now;
        Ok(shop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn shop(access_token: Option<&str>, expire_at: Option<i64>) -> Shop {
        Shop {
            id: Uuid::new_v4(),
            shop_id: 67890,
            partner_id: 2007117,
            partner_key: "key".into(),
            access_token: access_token.map(String::from),
            refresh_token: Some("refresh".into()),
            expire_at,
            is_active: true,
            is_deleted: false,
            order_poll_minutes: None,
            is_sandbox: None,
            company_id: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn test_needs_refresh_when_token_absent() {
        assert!(TokenManager::needs_refresh(&shop(None, None), 1_000_000));
        assert!(TokenManager::needs_refresh(&shop(Some(""), Some(i64::MAX)), 1_000_000));
    }

    #[test]
    fn test_needs_refresh_within_margin() {
        let now = 1_000_000_000;
        // Expired a minute ago.
        assert!(TokenManager::needs_refresh(&shop(Some("t"), Some(now - 60_000)), now));
        // Expires in 100 s, inside the 300 s margin.
        assert!(TokenManager::needs_refresh(&shop(Some("t"), Some(now + 100_000)), now));
        // Expires in an hour.
        assert!(!TokenManager::needs_refresh(&shop(Some("t"), Some(now + 3_600_000)), now));
    }
}
