//! Shop repository
//!
//! Loads active shops (sandbox precedence: company column over process
//! flag), persists refreshed tokens, resolves shops by internal key or
//! marketplace id.

use shared::models::{Company, Shop};
use sqlx::PgPool;
use uuid::Uuid;

use super::BoxError;

const SHOP_COLUMNS: &str = "s.id, s.shop_id, s.partner_id, s.partner_key, s.access_token, \
s.refresh_token, s.expire_at, s.is_active, s.is_deleted, s.order_poll_minutes, s.is_sandbox, \
s.company_id, s.created_at, s.updated_at";

/// Active, non-tombstoned shops whose effective sandbox flag matches the
/// runtime's. The company `is_sandbox` column wins; the shop column is the
/// fallback, then the process flag.
pub async fn load_active_shops(pool: &PgPool, sandbox: bool) -> Result<Vec<Shop>, BoxError> {
    let shops: Vec<Shop> = sqlx::query_as(&format!(
        r#"
        SELECT {SHOP_COLUMNS}
        FROM shop s
        LEFT JOIN company c ON c.id = s.company_id
        WHERE s.is_active
          AND NOT s.is_deleted
          AND (c.id IS NULL OR NOT c.is_deleted)
          AND COALESCE(c.is_sandbox, s.is_sandbox, $1) = $1
        ORDER BY s.created_at
        "#
    ))
    .bind(sandbox)
    .fetch_all(pool)
    .await?;
    Ok(shops)
}

/// Shop by internal key.
pub async fn get_shop(pool: &PgPool, shop_key: Uuid) -> Result<Option<Shop>, BoxError> {
    let shop: Option<Shop> = sqlx::query_as(&format!(
        "SELECT {SHOP_COLUMNS} FROM shop s WHERE s.id = $1 AND NOT s.is_deleted"
    ))
    .bind(shop_key)
    .fetch_optional(pool)
    .await?;
    Ok(shop)
}

/// Shop joined to its company, for cycle validation.
pub async fn get_shop_with_company(
    pool: &PgPool,
    shop_key: Uuid,
) -> Result<Option<(Shop, Option<Company>)>, BoxError> {
    let Some(shop) = get_shop(pool, shop_key).await? else {
        return Ok(None);
    };

    let company = match shop.company_id {
        Some(company_id) => {
            sqlx::query_as::<_, Company>(
                "SELECT id, name, is_sandbox, is_deleted FROM company WHERE id = $1",
            )
            .bind(company_id)
            .fetch_optional(pool)
            .await?
        }
        None => None,
    };

    Ok(Some((shop, company)))
}

/// Fallback resolution: match an active shop by marketplace shop id.
pub async fn get_shop_by_marketplace_id(
    pool: &PgPool,
    shop_id: i64,
) -> Result<Option<Shop>, BoxError> {
    let shop: Option<Shop> = sqlx::query_as(&format!(
        "SELECT {SHOP_COLUMNS} FROM shop s \
         WHERE s.shop_id = $1 AND s.is_active AND NOT s.is_deleted"
    ))
    .bind(shop_id)
    .fetch_optional(pool)
    .await?;
    Ok(shop)
}

/// Persist a refreshed token pair. `expire_at` is Unix millis.
pub async fn update_shop_tokens(
    pool: &PgPool,
    shop_key: Uuid,
    access_token: &str,
    refresh_token: &str,
    expire_at: i64,
) -> Result<(), BoxError> {
    let now = shared::util::now_millis();
    sqlx::query(
        "UPDATE shop SET access_token = $1, refresh_token = $2, expire_at = $3, updated_at = $4 \
         WHERE id = $5",
    )
    .bind(access_token)
    .bind(refresh_token)
    .bind(expire_at)
    .bind(now)
    .bind(shop_key)
    .execute(pool)
    .await?;
    Ok(())
}
