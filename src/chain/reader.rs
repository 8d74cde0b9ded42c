//! ERC-20 metadata and balance reads, independent of the wallet session.

use alloy::network::Ethereum;
use alloy::primitives::{Address, U256};
use alloy::providers::Provider;
use alloy::sol;
use async_trait::async_trait;
use log::debug;
use serde::Serialize;

use crate::utils::address::{parse_address, to_lower_hex};
use crate::utils::units::{format_units, MAX_DECIMALS};
use crate::wallet::error::WalletError;

/// Shown when a token does not implement the optional `symbol()`
pub const DEFAULT_SYMBOL: &str = "TOKEN";
/// Assumed when a token does not implement the optional `decimals()`
pub const DEFAULT_DECIMALS: u8 = 18;

sol! {
    #[sol(rpc)]
    interface IERC20 {
        function symbol() external view returns (string memory);
        function decimals() external view returns (uint8);
        function balanceOf(address owner) external view returns (uint256 balance);
    }
}

/// Resolved token metadata and holder balance
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenInfo {
    pub address: String,
    pub symbol: String,
    pub decimals: u8,
    /// Holder balance formatted with `decimals`
    pub balance: String,
}

/// The contract reads the chain read service needs
#[async_trait]
pub trait ContractClient: Send + Sync {
    async fn symbol(&self, token: Address) -> Result<String, WalletError>;
    async fn decimals(&self, token: Address) -> Result<u8, WalletError>;
    async fn balance_of(&self, token: Address, holder: Address) -> Result<U256, WalletError>;
}

/// Contract client over any alloy provider
#[derive(Debug, Clone)]
pub struct Erc20Client<P> {
    provider: P,
}

impl<P> Erc20Client<P> {
    pub const fn new(provider: P) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<P> ContractClient for Erc20Client<P>
where
    P: Provider<Ethereum> + Clone + 'static,
{
    async fn symbol(&self, token: Address) -> Result<String, WalletError> {
        let erc20 = IERC20::new(token, self.provider.clone());
        Ok(erc20.symbol().call().await?._0)
    }

    async fn decimals(&self, token: Address) -> Result<u8, WalletError> {
        let erc20 = IERC20::new(token, self.provider.clone());
        Ok(erc20.decimals().call().await?._0)
    }

    async fn balance_of(&self, token: Address, holder: Address) -> Result<U256, WalletError> {
        let erc20 = IERC20::new(token, self.provider.clone());
        Ok(erc20.balanceOf(holder).call().await?.balance)
    }
}

/// Resolves symbol, decimals and the holder's balance for a token contract.
///
/// # Arguments
/// * `client` - Contract client used for the reads
/// * `address` - Token contract address
/// * `holder` - Account whose balance to read; the balance is `"0"` without one
///
/// # Errors
/// * `WalletError::InvalidAddress` if either address is malformed, before any read
/// * `WalletError::ContractCall` if the balance read fails
pub async fn fetch_token_info(
    client: &dyn ContractClient,
    address: &str,
    holder: Option<&str>,
) -> Result<TokenInfo, WalletError> {
    let token = parse_address(address)?;
    let holder = holder
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .map(parse_address)
        .transpose()?;

    let (symbol, decimals) = futures::join!(client.symbol(token), client.decimals(token));

    let symbol = match symbol {
        Ok(symbol) if !symbol.trim().is_empty() => symbol,
        Ok(_) => DEFAULT_SYMBOL.to_string(),
        Err(e) => {
            debug!("chain::reader: symbol() failed for {token}: {e}");
            DEFAULT_SYMBOL.to_string()
        }
    };
    let decimals = match decimals {
        Ok(decimals) if decimals <= MAX_DECIMALS => decimals,
        Ok(decimals) => {
            debug!("chain::reader: decimals() of {token} out of range: {decimals}");
            DEFAULT_DECIMALS
        }
        Err(e) => {
            debug!("chain::reader: decimals() failed for {token}: {e}");
            DEFAULT_DECIMALS
        }
    };

    let balance = match holder {
        Some(holder) => format_units(client.balance_of(token, holder).await?, decimals),
        None => "0".to_string(),
    };

    Ok(TokenInfo {
        address: to_lower_hex(&token),
        symbol,
        decimals,
        balance,
    })
}
