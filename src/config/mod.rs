use std::env;
use std::time::Duration;

use crate::utils::constants::BASE_RPC_URL;

/// Configuration struct for the application
#[derive(Debug, Clone)]
pub struct Config {
    /// Public JSON-RPC endpoint of the target chain, used when no wallet is on it
    pub rpc_url: String,
    /// Local EIP-1193 endpoint of a desktop wallet acting as the injected provider
    pub injected_wallet_url: Option<String>,
    /// Endpoint of the Coinbase Wallet bridge
    pub coinbase_wallet_url: Option<String>,
    /// Directory holding the persisted session record
    pub session_cache_dir: String,
    /// How often wallet endpoints are polled for account/chain changes
    pub poll_interval: Duration,
    pub app_name: String,
    pub app_logo_url: String,
    pub log_level: String,
}

impl Config {
    /// Default values for configuration
    fn defaults() -> Self {
        Self {
            rpc_url: BASE_RPC_URL.to_string(),
            injected_wallet_url: None,
            coinbase_wallet_url: None,
            session_cache_dir: ".faction_session".to_string(),
            poll_interval: Duration::from_millis(4000),
            app_name: "Cursed Faction".to_string(),
            app_logo_url: "https://avatars.githubusercontent.com/u/1885080?s=200&v=4".to_string(),
            log_level: "info".to_string(),
        }
    }

    /// Load configuration from environment variables
    ///
    /// # Environment Variables:
    /// - `RPC_URL`: Public Base RPC endpoint
    /// - `INJECTED_WALLET_URL`: Wallet endpoint, e.g. `http://127.0.0.1:1248` for Frame
    /// - `COINBASE_WALLET_URL`: Coinbase Wallet bridge endpoint
    /// - `SESSION_CACHE_DIR`: Where the session record is stored
    /// - `POLL_INTERVAL_MS`: Event polling interval in milliseconds
    /// - `APP_NAME`, `APP_LOGO_URL`: Metadata presented to the Coinbase Wallet
    /// - `LOG_LEVEL`: `error`, `warn`, `info`, `debug` or `trace`
    ///
    /// # Returns
    /// Returns `Config` with values from environment variables or defaults
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::defaults();

        Self {
            rpc_url: env::var("RPC_URL").unwrap_or(defaults.rpc_url),
            injected_wallet_url: env::var("INJECTED_WALLET_URL")
                .ok()
                .filter(|url| !url.is_empty()),
            coinbase_wallet_url: env::var("COINBASE_WALLET_URL")
                .ok()
                .filter(|url| !url.is_empty()),
            session_cache_dir: env::var("SESSION_CACHE_DIR").unwrap_or(defaults.session_cache_dir),
            poll_interval: env::var("POLL_INTERVAL_MS")
                .ok()
                .and_then(|ms| ms.parse().ok())
                .map_or(defaults.poll_interval, Duration::from_millis),
            app_name: env::var("APP_NAME").unwrap_or(defaults.app_name),
            app_logo_url: env::var("APP_LOGO_URL").unwrap_or(defaults.app_logo_url),
            log_level: env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
        }
    }

    /// Create a test configuration
    #[cfg(test)]
    #[must_use]
    pub fn test_config() -> Self {
        Self::defaults()
    }
}
