use crate::utils::constants::{UNKNOWN_CHAIN_CODE, USER_REJECTED_CODE};

/// JSON-RPC "internal error", used for transport level failures
pub const INTERNAL_ERROR_CODE: i64 = -32603;
/// JSON-RPC "method not found"
pub const METHOD_NOT_FOUND_CODE: i64 = -32601;

/// An error object returned by a provider `request`, following the EIP-1193 shape
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

impl RpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// The request never got a JSON-RPC answer (connection refused, bad body, ...)
    pub fn transport(err: impl std::fmt::Display) -> Self {
        Self::new(INTERNAL_ERROR_CODE, err.to_string())
    }
}

/// Every failure the session core can report.
///
/// `Display` yields the short human readable text shown as session status.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WalletError {
    #[error("No EVM wallet detected. Install Coinbase Wallet or MetaMask.")]
    NoProvider,

    #[error("{0}")]
    UserRejected(String),

    #[error("{0}")]
    UnknownChain(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid interface: {0}")]
    InvalidInterface(String),

    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("Contract call failed: {0}")]
    ContractCall(String),

    #[error("Connect your wallet first")]
    ConnectRequired,

    #[error("{0}")]
    SdkUnavailable(String),

    /// The session moved on (disconnect, reconnect) while the operation was in flight
    #[error("Session changed before the operation completed")]
    Superseded,

    #[error("{message}")]
    Rpc { code: i64, message: String },
}

impl WalletError {
    /// Text for the session status, using `fallback` when the provider sent no message.
    #[must_use]
    pub fn status_message(&self, fallback: &str) -> String {
        let message = self.to_string();
        if message.trim().is_empty() {
            fallback.to_string()
        } else {
            message
        }
    }
}

impl From<RpcError> for WalletError {
    fn from(err: RpcError) -> Self {
        match err.code {
            USER_REJECTED_CODE => Self::UserRejected(err.message),
            UNKNOWN_CHAIN_CODE => Self::UnknownChain(err.message),
            code => Self::Rpc {
                code,
                message: err.message,
            },
        }
    }
}

impl From<alloy::contract::Error> for WalletError {
    fn from(err: alloy::contract::Error) -> Self {
        Self::ContractCall(err.to_string())
    }
}
