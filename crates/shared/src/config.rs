//! Application configuration management.

use rust_decimal::Decimal;
use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Deployment environment.
    #[serde(default)]
    pub environment: Environment,
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// JWT configuration.
    pub jwt: JwtSettings,
    /// Logging configuration.
    #[serde(default)]
    pub log: LogConfig,
    /// Ledger configuration.
    #[serde(default)]
    pub ledger: LedgerConfig,
    /// Fiscal authority bridge configuration.
    #[serde(default)]
    pub fiscal: FiscalConfig,
    /// Payment provider configuration.
    #[serde(default)]
    pub billing: BillingConfig,
    /// Card board configuration.
    #[serde(default)]
    pub card_board: CardBoardConfig,
}

/// Deployment environment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Local development.
    #[default]
    Development,
    /// Pre-production.
    Staging,
    /// Production.
    Production,
}

impl Environment {
    /// Returns true for production deployments.
    #[must_use]
    pub const fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

/// JWT configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct JwtSettings {
    /// Secret key for verifying tokens.
    pub secret: String,
    /// Access token expiration in seconds.
    #[serde(default = "default_access_token_expiry")]
    pub access_token_expiry_secs: u64,
}

fn default_access_token_expiry() -> u64 {
    900 // 15 minutes
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogConfig {
    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

/// Ledger configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    /// Last-resort USD→ARS rate used when no stored rate exists at all.
    #[serde(default = "default_fallback_rate")]
    pub fallback_usd_ars_rate: Option<Decimal>,
    /// Whether write paths may record with the last-resort rate.
    #[serde(default)]
    pub allow_degraded_rates: bool,
    /// Interval of the cash-box reconciliation job (0 disables it).
    #[serde(default = "default_reconcile_interval")]
    pub reconcile_interval_secs: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            fallback_usd_ars_rate: default_fallback_rate(),
            allow_degraded_rates: false,
            reconcile_interval_secs: default_reconcile_interval(),
        }
    }
}

#[allow(clippy::unnecessary_wraps)]
fn default_fallback_rate() -> Option<Decimal> {
    Some(Decimal::from(1000))
}

fn default_reconcile_interval() -> u64 {
    3600
}

/// Fiscal authority bridge configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FiscalConfig {
    /// Base URL of the RPC bridge.
    #[serde(default = "default_fiscal_bridge_url")]
    pub bridge_url: String,
    /// Access token for the bridge.
    #[serde(default)]
    pub access_token: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_fiscal_timeout")]
    pub request_timeout_secs: u64,
    /// Interval between automation polls in seconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Maximum number of automation polls per stage.
    #[serde(default = "default_max_poll_attempts")]
    pub max_poll_attempts: u32,
}

impl Default for FiscalConfig {
    fn default() -> Self {
        Self {
            bridge_url: default_fiscal_bridge_url(),
            access_token: String::new(),
            request_timeout_secs: default_fiscal_timeout(),
            poll_interval_secs: default_poll_interval(),
            max_poll_attempts: default_max_poll_attempts(),
        }
    }
}

fn default_fiscal_bridge_url() -> String {
    "https://app.afipsdk.com/api/v1".to_string()
}

fn default_fiscal_timeout() -> u64 {
    30
}

fn default_poll_interval() -> u64 {
    5
}

fn default_max_poll_attempts() -> u32 {
    24
}

/// Payment provider configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BillingConfig {
    /// Shared secret for webhook signatures.
    #[serde(default)]
    pub webhook_secret: Option<String>,
    /// Access token for the provider API.
    #[serde(default)]
    pub access_token: String,
    /// Base URL of the provider API.
    #[serde(default = "default_billing_api_base")]
    pub api_base: String,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            webhook_secret: None,
            access_token: String::new(),
            api_base: default_billing_api_base(),
        }
    }
}

fn default_billing_api_base() -> String {
    "https://api.mercadopago.com".to_string()
}

/// Card board configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CardBoardConfig {
    /// Base URL of the board API.
    #[serde(default = "default_card_board_api_base")]
    pub api_base: String,
    /// API key.
    #[serde(default)]
    pub api_key: String,
    /// API token.
    #[serde(default)]
    pub token: String,
    /// Secret used to sign webhook bodies.
    #[serde(default)]
    pub webhook_secret: Option<String>,
    /// Callback URL appended to the body before signing, when registered.
    #[serde(default)]
    pub callback_url: Option<String>,
}

impl Default for CardBoardConfig {
    fn default() -> Self {
        Self {
            api_base: default_card_board_api_base(),
            api_key: String::new(),
            token: String::new(),
            webhook_secret: None,
            callback_url: None,
        }
    }
}

fn default_card_board_api_base() -> String {
    "https://api.trello.com/1".to_string()
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("TESORO").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_load_from_environment() {
        temp_env::with_vars(
            [
                ("TESORO__DATABASE__URL", Some("postgres://localhost/tesoro")),
                ("TESORO__JWT__SECRET", Some("secret")),
                ("TESORO__ENVIRONMENT", Some("production")),
                ("TESORO__BILLING__WEBHOOK_SECRET", Some("whsec")),
            ],
            || {
                let config = AppConfig::load().unwrap();
                assert_eq!(config.database.url, "postgres://localhost/tesoro");
                assert_eq!(config.database.max_connections, 10);
                assert!(config.environment.is_production());
                assert_eq!(config.billing.webhook_secret.as_deref(), Some("whsec"));
                assert_eq!(config.server.port, 8080);
            },
        );
    }

    #[test]
    fn test_ledger_defaults() {
        let ledger = LedgerConfig::default();
        assert_eq!(ledger.fallback_usd_ars_rate, Some(dec!(1000)));
        assert!(!ledger.allow_degraded_rates);
        assert_eq!(ledger.reconcile_interval_secs, 3600);
    }

    #[test]
    fn test_fiscal_defaults() {
        let fiscal = FiscalConfig::default();
        assert_eq!(fiscal.request_timeout_secs, 30);
        assert_eq!(fiscal.poll_interval_secs, 5);
        assert_eq!(fiscal.max_poll_attempts, 24);
    }

    #[test]
    fn test_environment_default_is_development() {
        assert_eq!(Environment::default(), Environment::Development);
        assert!(!Environment::Staging.is_production());
    }
}
