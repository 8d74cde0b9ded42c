//! Application context wiring the session manager to real endpoints.
//!
//! - The injected wallet is a local EIP-1193 HTTP endpoint (Frame and similar)
//! - Coinbase Wallet is reached through its bridge endpoint
//! - Token reads and the balance fallback go to the public Base endpoint

use std::sync::Arc;

use alloy::network::Ethereum;
use alloy::providers::fillers::{
    BlobGasFiller, ChainIdFiller, FillProvider, GasFiller, JoinFill, NonceFiller,
};
use alloy::providers::{Identity, ProviderBuilder, RootProvider};
use eyre::Result;
use log::info;
use url::Url;

use crate::chain::Erc20Client;
use crate::config::Config;
use crate::wallet::coinbase::{CoinbaseWalletSdk, SdkOptions};
use crate::wallet::eip1193::Eip1193;
use crate::wallet::http::HttpEip1193;
use crate::wallet::store::{CacheStore, MemoryStore, SessionStore};
use crate::wallet::{ManagerParams, SessionManager};

type EthereumProvider = FillProvider<
    JoinFill<
        Identity,
        JoinFill<GasFiller, JoinFill<BlobGasFiller, JoinFill<NonceFiller, ChainIdFiller>>>,
    >,
    RootProvider,
    Ethereum,
>;

/// Everything a command needs: the session manager built from the configuration
pub struct AppContext {
    pub manager: Arc<SessionManager>,
}

impl AppContext {
    /// Builds the session manager and its collaborators. Nothing is contacted yet.
    ///
    /// # Arguments
    /// * `config` - Application configuration
    /// * `ephemeral` - Keep the session record in memory instead of on disk
    ///
    /// # Errors
    /// * If any configured endpoint URL is invalid
    /// * If an HTTP client cannot be built
    pub fn new(config: &Config, ephemeral: bool) -> Result<Self> {
        let injected: Option<Arc<dyn Eip1193>> = match &config.injected_wallet_url {
            Some(url) => {
                info!("Using injected wallet at {url}");
                Some(Arc::new(
                    HttpEip1193::new(url)?
                        .with_origin(&config.app_name)
                        .with_event_polling(config.poll_interval),
                ))
            }
            None => None,
        };

        let coinbase = CoinbaseWalletSdk::new(
            SdkOptions {
                app_name: config.app_name.clone(),
                app_logo_url: config.app_logo_url.clone(),
            },
            config.coinbase_wallet_url.clone(),
            config.poll_interval,
        );

        let store: Arc<dyn SessionStore> = if ephemeral {
            Arc::new(MemoryStore::default())
        } else {
            Arc::new(CacheStore::new(config.session_cache_dir.clone()))
        };

        let manager = SessionManager::new(ManagerParams {
            injected,
            coinbase: Arc::new(coinbase),
            public_rpc: Arc::new(HttpEip1193::new(&config.rpc_url)?),
            contracts: Arc::new(Erc20Client::new(Self::create_http_provider(&config.rpc_url)?)),
            store,
            rpc_url: config.rpc_url.clone(),
            receipt_poll_interval: config.poll_interval,
        });

        Ok(Self { manager })
    }

    /// Creates the contract-read provider for the public endpoint
    ///
    /// # Errors
    /// * If the URL is invalid
    pub fn create_http_provider(rpc_url: &str) -> Result<EthereumProvider> {
        let url = Url::parse(rpc_url)?;
        info!("Using HTTP provider at {url}");
        Ok(ProviderBuilder::new().on_http(url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::WalletError;

    #[tokio::test]
    async fn test_unconfigured_wallets() {
        let context = AppContext::new(&Config::test_config(), true).unwrap();

        let err = context.manager.connect_injected().await.unwrap_err();
        assert_eq!(err, WalletError::NoProvider);

        let err = context.manager.connect_coinbase().await.unwrap_err();
        assert!(matches!(err, WalletError::SdkUnavailable(_)));
        assert!(!context.manager.snapshot().await.is_connected());
    }

    #[test]
    fn test_invalid_rpc_url() {
        let config = Config {
            rpc_url: "not a url".to_string(),
            ..Config::test_config()
        };
        assert!(AppContext::new(&config, true).is_err());
    }
}
