//! Application configuration.
//!
//! A nested [`Config`] with a [`ConfigBuilder`] supporting environment
//! variables. Billing secrets are held in [`SecretString`] so they never
//! appear in debug output.

use secrecy::SecretString;
use std::net::SocketAddr;
use std::time::Duration;

/// Main configuration for a vitrina deployment.
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub billing: BillingConfig,
    pub reconcile: ReconcileConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

/// Payment-provider credentials and checkout policy.
#[derive(Clone)]
pub struct BillingConfig {
    /// Stripe secret API key.
    pub secret_key: Option<SecretString>,
    /// Webhook signing secret.
    pub webhook_secret: Option<SecretString>,
    /// Allowed domains for checkout/portal redirect URLs.
    /// Empty = any HTTPS URL (not recommended for production).
    pub allowed_redirect_domains: Vec<String>,
}

impl std::fmt::Debug for BillingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BillingConfig")
            .field("secret_key", &self.secret_key.as_ref().map(|_| "***"))
            .field("webhook_secret", &self.webhook_secret.as_ref().map(|_| "***"))
            .field("allowed_redirect_domains", &self.allowed_redirect_domains)
            .finish()
    }
}

/// Reconciliation loop settings.
#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    /// Interval between periodic reconciliation ticks.
    pub interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
            billing: BillingConfig::default(),
            reconcile: ReconcileConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            secret_key: None,
            webhook_secret: None,
            allowed_redirect_domains: Vec::new(),
        }
    }
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
        }
    }
}

impl ServerConfig {
    pub fn addr(&self) -> std::result::Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}

/// Builder for [`Config`] with environment variable support.
#[must_use = "builder does nothing until you call build()"]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.config.server.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.config.server.port = port;
        self
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn with_json_logs(mut self, json: bool) -> Self {
        self.config.logging.json = json;
        self
    }

    pub fn with_stripe_secret_key(mut self, key: impl Into<SecretString>) -> Self {
        self.config.billing.secret_key = Some(key.into());
        self
    }

    pub fn with_webhook_secret(mut self, secret: impl Into<SecretString>) -> Self {
        self.config.billing.webhook_secret = Some(secret.into());
        self
    }

    pub fn with_allowed_redirect_domains<I, S>(mut self, domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.billing.allowed_redirect_domains =
            domains.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_reconcile_interval(mut self, interval: Duration) -> Self {
        self.config.reconcile.interval = interval;
        self
    }

    /// Load settings from environment variables.
    ///
    /// Recognized: `VITRINA_HOST`, `VITRINA_PORT`, `VITRINA_LOG_LEVEL`,
    /// `VITRINA_LOG_JSON`, `VITRINA_RECONCILE_INTERVAL_SECS`,
    /// `STRIPE_SECRET_KEY`, `STRIPE_WEBHOOK_SECRET`,
    /// `VITRINA_ALLOWED_REDIRECT_DOMAINS` (comma-separated).
    pub fn from_env(mut self) -> Self {
        if let Ok(host) = std::env::var("VITRINA_HOST") {
            self.config.server.host = host;
        }
        if let Ok(port) = std::env::var("VITRINA_PORT") {
            if let Ok(port) = port.parse() {
                self.config.server.port = port;
            }
        }
        if let Ok(level) = std::env::var("VITRINA_LOG_LEVEL") {
            self.config.logging.level = level;
        }
        if let Ok(json) = std::env::var("VITRINA_LOG_JSON") {
            self.config.logging.json = json.parse().unwrap_or(false);
        }
        if let Ok(secs) = std::env::var("VITRINA_RECONCILE_INTERVAL_SECS") {
            if let Ok(secs) = secs.parse() {
                self.config.reconcile.interval = Duration::from_secs(secs);
            }
        }
        if let Ok(key) = std::env::var("STRIPE_SECRET_KEY") {
            self.config.billing.secret_key = Some(key.into());
        }
        if let Ok(secret) = std::env::var("STRIPE_WEBHOOK_SECRET") {
            self.config.billing.webhook_secret = Some(secret.into());
        }
        if let Ok(domains) = std::env::var("VITRINA_ALLOWED_REDIRECT_DOMAINS") {
            self.config.billing.allowed_redirect_domains = domains
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.reconcile.interval, Duration::from_secs(60));
        assert!(config.billing.secret_key.is_none());
    }

    #[test]
    fn builder_overrides() {
        let config = ConfigBuilder::new()
            .with_host("127.0.0.1")
            .with_port(3000)
            .with_reconcile_interval(Duration::from_secs(5))
            .with_allowed_redirect_domains(["example.com"])
            .build();

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.reconcile.interval, Duration::from_secs(5));
        assert_eq!(config.billing.allowed_redirect_domains, vec!["example.com"]);
    }

    #[test]
    fn billing_config_debug_hides_secrets() {
        let config = ConfigBuilder::new()
            .with_stripe_secret_key("sk_test_1234567890abcdef")
            .build();
        let debug = format!("{:?}", config.billing);
        assert!(!debug.contains("sk_test_"));
    }
}
