//! The request/response and event surface every wallet provider exposes.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;

use super::error::RpcError;

/// Capacity of the per-provider event channel
pub const EVENT_CHANNEL_SIZE: usize = 16;

/// Change notifications pushed by a provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    /// New list of authorized accounts, lowercase
    AccountsChanged(Vec<String>),
    /// New chain id as lowercase hex
    ChainChanged(String),
}

/// An EIP-1193 style provider: requests keyed by method name plus a params list.
#[async_trait]
pub trait Eip1193: Send + Sync {
    /// Sends a request and returns the raw `result` value.
    ///
    /// # Errors
    /// * The provider's error object, or a transport error
    async fn request(&self, method: &str, params: Value) -> Result<Value, RpcError>;

    /// Returns a fresh receiver for account/chain change events.
    fn events(&self) -> broadcast::Receiver<ProviderEvent>;
}
