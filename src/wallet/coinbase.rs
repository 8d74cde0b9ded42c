//! Coinbase Wallet SDK provider.
//!
//! The SDK hands out a provider bound to a default chain and a node RPC URL.
//! Account, signing and chain management requests go to the wallet; plain
//! reads go straight to the node.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info};
use serde_json::Value;
use tokio::sync::broadcast;

use super::eip1193::{Eip1193, ProviderEvent};
use super::error::{RpcError, WalletError};
use super::http::HttpEip1193;

/// Application metadata shown by the wallet when asking for authorization
#[derive(Debug, Clone)]
pub struct SdkOptions {
    pub app_name: String,
    pub app_logo_url: String,
}

/// Constructs Coinbase-backed providers. Construction may fail when the SDK is unavailable.
pub trait CoinbaseSdk: Send + Sync {
    /// # Errors
    /// * `WalletError::SdkUnavailable` if no provider can be built
    fn make_web3_provider(
        &self,
        rpc_url: &str,
        chain_id: u64,
    ) -> Result<Arc<dyn Eip1193>, WalletError>;
}

/// SDK reaching the Coinbase Wallet through a JSON-RPC bridge endpoint
#[derive(Debug, Clone)]
pub struct CoinbaseWalletSdk {
    options: SdkOptions,
    bridge_url: Option<String>,
    poll_interval: Duration,
}

impl CoinbaseWalletSdk {
    pub const fn new(options: SdkOptions, bridge_url: Option<String>, poll_interval: Duration) -> Self {
        Self {
            options,
            bridge_url,
            poll_interval,
        }
    }
}

impl CoinbaseSdk for CoinbaseWalletSdk {
    fn make_web3_provider(
        &self,
        rpc_url: &str,
        chain_id: u64,
    ) -> Result<Arc<dyn Eip1193>, WalletError> {
        let bridge_url = self.bridge_url.as_deref().ok_or_else(|| {
            WalletError::SdkUnavailable("Coinbase Wallet SDK is not configured".to_string())
        })?;

        let wallet = HttpEip1193::new(bridge_url)
            .map_err(|e| WalletError::SdkUnavailable(format!("Coinbase connect failed: {e}")))?
            .with_origin(&self.options.app_name)
            .with_event_polling(self.poll_interval);
        let node = HttpEip1193::new(rpc_url)
            .map_err(|e| WalletError::SdkUnavailable(format!("Coinbase connect failed: {e}")))?;

        info!(
            "wallet::coinbase: provider for {} on chain {chain_id} via {bridge_url}",
            self.options.app_name
        );
        debug!("wallet::coinbase: logo {}", self.options.app_logo_url);

        Ok(Arc::new(CoinbaseProvider::new(
            Arc::new(wallet),
            Arc::new(node),
            chain_id,
        )))
    }
}

/// Methods the wallet itself must answer; everything else is a node read
const WALLET_METHODS: &[&str] = &[
    "eth_requestAccounts",
    "eth_accounts",
    "eth_chainId",
    "eth_sendTransaction",
    "personal_sign",
    "eth_signTypedData_v4",
    "wallet_switchEthereumChain",
    "wallet_addEthereumChain",
];

pub struct CoinbaseProvider {
    wallet: Arc<dyn Eip1193>,
    node: Arc<dyn Eip1193>,
    default_chain: String,
}

impl CoinbaseProvider {
    pub fn new(wallet: Arc<dyn Eip1193>, node: Arc<dyn Eip1193>, chain_id: u64) -> Self {
        Self {
            wallet,
            node,
            default_chain: format!("{chain_id:#x}"),
        }
    }
}

#[async_trait]
impl Eip1193 for CoinbaseProvider {
    async fn request(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        if !WALLET_METHODS.contains(&method) {
            return self.node.request(method, params).await;
        }

        match self.wallet.request(method, params).await {
            // The SDK reports the chain it was bound to until the wallet tells otherwise
            Err(e) if method == "eth_chainId" => {
                debug!("wallet::coinbase: eth_chainId fell back to default: {e}");
                Ok(Value::String(self.default_chain.clone()))
            }
            result => result,
        }
    }

    fn events(&self) -> broadcast::Receiver<ProviderEvent> {
        self.wallet.events()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::MockProvider;
    use serde_json::json;

    fn options() -> SdkOptions {
        SdkOptions {
            app_name: "Cursed Faction".to_string(),
            app_logo_url: String::new(),
        }
    }

    #[test]
    fn test_unconfigured_sdk_fails_to_construct() {
        let sdk = CoinbaseWalletSdk::new(options(), None, Duration::from_secs(1));
        let err = sdk
            .make_web3_provider("https://mainnet.base.org", 8453)
            .err()
            .unwrap();
        assert!(matches!(err, WalletError::SdkUnavailable(_)));
    }

    #[test]
    fn test_bad_bridge_url_fails_to_construct() {
        let sdk = CoinbaseWalletSdk::new(options(), Some("::".to_string()), Duration::from_secs(1));
        assert!(sdk.make_web3_provider("https://mainnet.base.org", 8453).is_err());
    }

    #[tokio::test]
    async fn test_routes_reads_to_node() {
        let wallet = MockProvider::new();
        let node = MockProvider::new();
        node.respond("eth_getBalance", json!("0x1"));
        wallet.respond("eth_requestAccounts", json!(["0x0000000000000000000000000000000000000001"]));

        let provider = CoinbaseProvider::new(wallet.clone(), node.clone(), 8453);
        provider.request("eth_getBalance", json!([])).await.unwrap();
        provider.request("eth_requestAccounts", json!([])).await.unwrap();

        assert_eq!(node.calls("eth_getBalance"), 1);
        assert_eq!(wallet.calls("eth_getBalance"), 0);
        assert_eq!(wallet.calls("eth_requestAccounts"), 1);
    }

    #[tokio::test]
    async fn test_chain_id_falls_back_to_bound_chain() {
        let wallet = MockProvider::new();
        let node = MockProvider::new();

        let provider = CoinbaseProvider::new(wallet, node, 8453);
        let chain = provider.request("eth_chainId", json!([])).await.unwrap();
        assert_eq!(chain, json!("0x2105"));
    }
}
