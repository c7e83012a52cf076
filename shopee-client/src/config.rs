//! Client configuration

/// Production API host.
pub const PRODUCTION_HOST: &str = "https://partner.shopeemobile.com";
/// Sandbox API host.
pub const SANDBOX_HOST: &str = "https://partner.test-stable.shopeemobile.com";

/// Marketplace credentials and environment for one partner.
#[derive(Debug, Clone)]
pub struct ShopeeConfig {
    /// Developer partner id (appears in every query string)
    pub partner_id: i64,
    /// HMAC secret
    pub partner_key: String,
    /// Base URL override; empty means host selection by `sandbox`
    pub base_url: Option<String>,
    /// Sandbox environment
    pub sandbox: bool,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl ShopeeConfig {
    pub fn new(partner_id: i64, partner_key: impl Into<String>, sandbox: bool) -> Self {
        Self {
            partner_id,
            partner_key: partner_key.into(),
            base_url: None,
            sandbox,
            timeout_secs: 25,
        }
    }

    /// Effective host for this configuration.
    pub fn host(&self) -> &str {
        match &self.base_url {
            Some(url) if !url.is_empty() => url,
            _ => {
                if self.sandbox {
                    SANDBOX_HOST
                } else {
                    PRODUCTION_HOST
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_selection() {
        let prod = ShopeeConfig::new(1, "k", false);
        assert_eq!(prod.host(), PRODUCTION_HOST);

        let sandbox = ShopeeConfig::new(1, "k", true);
        assert_eq!(sandbox.host(), SANDBOX_HOST);

        let mut custom = ShopeeConfig::new(1, "k", true);
        custom.base_url = Some("http://localhost:9000".into());
        assert_eq!(custom.host(), "http://localhost:9000");
    }
}
