//! Application configuration loaded from environment variables.

use std::time::Duration;

use commerce::{CommerceConfig, GatewayConfig, GatewayEnvironment};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables (after loading an optional `.env`):
/// - `HOST` — bind address (default: `"0.0.0.0"`)
/// - `PORT` — listen port (default: `3000`)
/// - `RUST_LOG` — tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT` — `text` or `json` (default: `text`)
/// - `DATABASE_URL` — PostgreSQL URL; unset runs on the in-memory store
/// - `DATABASE_MAX_CONNECTIONS` — pool size (default: `10`)
/// - `PAYMENT_SERVER_KEY` — gateway server key; unset uses the in-memory gateway
/// - `PAYMENT_ENVIRONMENT` — `sandbox` or `production` (default: `sandbox`)
/// - `PAYMENT_FINISH_URL` — where the payment page sends the buyer afterwards
/// - `CACHE_TTL_SECS` — cached view lifetime (default: `120`)
/// - `ORDER_EXPIRY_MINUTES` — unpaid order lifetime (default: `1440`)
/// - `SWEEP_INTERVAL_SECS` — expiry sweep period (default: `300`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub payment_server_key: Option<String>,
    pub payment_environment: GatewayEnvironment,
    pub payment_finish_url: Option<String>,
    pub cache_ttl_secs: u64,
    pub order_expiry_minutes: i64,
    pub sweep_interval_secs: u64,
}

impl Config {
    /// Loads configuration from the process environment, falling back to defaults.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from any key lookup. Unparseable values fall back
    /// to their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            host: non_empty("HOST").unwrap_or(defaults.host),
            port: parsed(&non_empty, "PORT").unwrap_or(defaults.port),
            log_level: non_empty("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: match non_empty("LOG_FORMAT").as_deref() {
                Some(f) if f.eq_ignore_ascii_case("json") => LogFormat::Json,
                _ => LogFormat::Text,
            },
            database_url: non_empty("DATABASE_URL"),
            database_max_connections: parsed(&non_empty, "DATABASE_MAX_CONNECTIONS")
                .unwrap_or(defaults.database_max_connections),
            payment_server_key: non_empty("PAYMENT_SERVER_KEY"),
            payment_environment: parsed(&non_empty, "PAYMENT_ENVIRONMENT")
                .unwrap_or(defaults.payment_environment),
            payment_finish_url: non_empty("PAYMENT_FINISH_URL"),
            cache_ttl_secs: parsed(&non_empty, "CACHE_TTL_SECS").unwrap_or(defaults.cache_ttl_secs),
            order_expiry_minutes: parsed(&non_empty, "ORDER_EXPIRY_MINUTES")
                .unwrap_or(defaults.order_expiry_minutes),
            sweep_interval_secs: parsed(&non_empty, "SWEEP_INTERVAL_SECS")
                .unwrap_or(defaults.sweep_interval_secs),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            server_key: self.payment_server_key.clone().unwrap_or_default(),
            environment: self.payment_environment,
            finish_url: self.payment_finish_url.clone(),
            enabled_methods: Vec::new(),
        }
    }

    pub fn commerce_config(&self) -> CommerceConfig {
        CommerceConfig {
            gateway: self.gateway_config(),
            cache_ttl: Duration::from_secs(self.cache_ttl_secs),
            order_ttl: self.order_ttl(),
        }
    }

    /// Unpaid order lifetime. Values chrono cannot represent, and
    /// non-positive ones, fall back to the default.
    pub fn order_ttl(&self) -> chrono::Duration {
        let fallback = Config::default().order_expiry_minutes;
        match chrono::Duration::try_minutes(self.order_expiry_minutes) {
            Some(ttl) if self.order_expiry_minutes > 0 => ttl,
            _ => {
                tracing::warn!(
                    value = self.order_expiry_minutes,
                    fallback,
                    "ORDER_EXPIRY_MINUTES out of range, using default"
                );
                chrono::Duration::minutes(fallback)
            }
        }
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

fn parsed<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparseable setting");
            None
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            database_url: None,
            database_max_connections: 10,
            payment_server_key: None,
            payment_environment: GatewayEnvironment::Sandbox,
            payment_finish_url: None,
            cache_ttl_secs: 120,
            order_expiry_minutes: 1440,
            sweep_interval_secs: 300,
        }
    }
}
