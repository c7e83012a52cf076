//! Server configuration

/// Ingest server configuration, loaded from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    // ── Database ──
    pub db_host: String,
    pub db_port: u16,
    pub db_name: String,
    pub db_user: String,
    pub db_password: String,
    pub db_schema: String,
    pub db_pool_size: u32,

    // ── Queue backend ──
    pub redis_host: String,
    pub redis_port: u16,
    pub redis_password: String,
    pub redis_db: i64,

    // ── Runtime ──
    /// Fan out through the queue; direct sequential processing otherwise
    pub cluster_enabled: bool,
    pub cluster_workers: usize,
    pub job_concurrency: usize,

    // ── Marketplace ──
    pub shopee_api_url: Option<String>,
    pub shopee_partner_id: i64,
    pub shopee_partner_key: String,
    pub shopee_is_sandbox: bool,

    // ── Scheduling / retry knobs ──
    pub cron_expression: String,
    pub max_retry_count: u32,
    pub order_batch_size: usize,

    // ── HTTP boundary ──
    pub api_host: String,
    pub api_port: u16,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            db_host: env_or("DB_HOST", "localhost"),
            db_port: env_parse("DB_PORT", 5432),
            db_name: env_or("DB_NAME", "toms"),
            db_user: env_or("DB_USER", "postgres"),
            db_password: env_or("DB_PASSWORD", ""),
            db_schema: env_or("DB_SCHEMA", "public"),
            db_pool_size: env_parse("DB_POOL_SIZE", 10),

            redis_host: env_or("REDIS_HOST", "localhost"),
            redis_port: env_parse("REDIS_PORT", 6379),
            redis_password: env_or("REDIS_PASSWORD", ""),
            redis_db: env_parse("REDIS_DB", 0),

            cluster_enabled: env_parse("CLUSTER_ENABLED", false),
            cluster_workers: env_parse("CLUSTER_WORKERS", num_cpus()),
            job_concurrency: env_parse("JOB_CONCURRENCY", 2),

            shopee_api_url: std::env::var("SHOPEE_API_URL").ok().filter(|s| !s.is_empty()),
            shopee_partner_id: env_parse("SHOPEE_PARTNER_ID", 0),
            shopee_partner_key: env_or("SHOPEE_PARTNER_KEY", ""),
            shopee_is_sandbox: env_parse("SHOPEE_IS_SANDBOX", false),

            cron_expression: env_or("CRON_EXPRESSION", "*/10 * * * *"),
            max_retry_count: env_parse("MAX_RETRY_COUNT", 3),
            order_batch_size: env_parse("ORDER_BATCH_SIZE", 50),

            api_host: env_or("API_HOST", "0.0.0.0"),
            api_port: env_parse("API_PORT", 3000),
        }
    }

    /// PostgreSQL connection URL.
    pub fn database_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.db_user, self.db_password, self.db_host, self.db_port, self.db_name
        )
    }

    /// Redis connection URL.
    pub fn redis_url(&self) -> String {
        if self.redis_password.is_empty() {
            format!("redis://{}:{}/{}", self.redis_host, self.redis_port, self.redis_db)
        } else {
            format!(
                "redis://:{}@{}:{}/{}",
                self.redis_password, self.redis_host, self.redis_port, self.redis_db
            )
        }
    }

    pub fn shopee_config(&self) -> shopee_client::ShopeeConfig {
        let mut cfg = shopee_client::ShopeeConfig::new(
            self.shopee_partner_id,
            self.shopee_partner_key.clone(),
            self.shopee_is_sandbox,
        );
        cfg.base_url = self.shopee_api_url.clone();
        cfg
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.into())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redis_url_with_and_without_password() {
        let mut cfg = Config::from_env();
        cfg.redis_host = "queue".into();
        cfg.redis_port = 6380;
        cfg.redis_db = 2;
        cfg.redis_password = "".into();
        assert_eq!(cfg.redis_url(), "redis://queue:6380/2");

        cfg.redis_password = "s3cret".into();
        assert_eq!(cfg.redis_url(), "redis://:s3cret@queue:6380/2");
    }
}
