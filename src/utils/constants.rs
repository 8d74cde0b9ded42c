use alloy::{primitives::U256, uint};
use serde::Serialize;

pub const ETHER: U256 = uint!(1_000_000_000_000_000_000_U256);

// Base mainnet
pub const BASE_CHAIN_ID: u64 = 8453;
pub const BASE_CHAIN_HEX: &str = "0x2105";
pub const BASE_RPC_URL: &str = "https://mainnet.base.org";
pub const BASE_EXPLORER_URL: &str = "https://basescan.org";

/// EIP-1193 error code returned when the user declines a request
pub const USER_REJECTED_CODE: i64 = 4001;
/// EIP-1193 error code returned by `wallet_switchEthereumChain` for unregistered chains
pub const UNKNOWN_CHAIN_CODE: i64 = 4902;

/// Native currency metadata as expected by `wallet_addEthereumChain`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NativeCurrency {
    pub name: &'static str,
    pub symbol: &'static str,
    pub decimals: u8,
}

/// Chain descriptor passed verbatim to `wallet_addEthereumChain`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainDescriptor {
    pub chain_id: &'static str,
    pub chain_name: &'static str,
    pub native_currency: NativeCurrency,
    pub rpc_urls: Vec<&'static str>,
    pub block_explorer_urls: Vec<&'static str>,
}

impl ChainDescriptor {
    /// The single chain this application expects the user to operate on.
    #[must_use]
    pub fn base() -> Self {
        Self {
            chain_id: BASE_CHAIN_HEX,
            chain_name: "Base Mainnet",
            native_currency: NativeCurrency {
                name: "Ether",
                symbol: "ETH",
                decimals: 18,
            },
            rpc_urls: vec![BASE_RPC_URL],
            block_explorer_urls: vec![BASE_EXPLORER_URL],
        }
    }
}
