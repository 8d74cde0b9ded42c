use std::str::FromStr;
use std::sync::Arc;

use derive_more::Display;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::broadcast;

use super::eip1193::{Eip1193, ProviderEvent};
use super::error::WalletError;
use crate::utils::address::{parse_address, to_lower_hex};
use crate::utils::constants::ChainDescriptor;
use crate::utils::units::parse_quantity;

/// Which external collaborator backs the session
#[derive(Debug, Display, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    #[display("none")]
    None,
    #[display("injected")]
    Injected,
    #[display("coinbase")]
    Coinbase,
}

impl FromStr for ProviderKind {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "none" | "" => Ok(Self::None),
            "injected" => Ok(Self::Injected),
            "coinbase" => Ok(Self::Coinbase),
            other => Err(eyre::eyre!("Unknown provider kind: {other}")),
        }
    }
}

/// Transaction fields handed to the wallet for signing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionCall {
    pub from: String,
    pub to: String,
    pub data: String,
    pub value: String,
}

/// The parts of a receipt the session cares about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionReceipt {
    pub block_number: u64,
    pub success: bool,
}

/// A bound wallet provider, tagged with the collaborator it came from.
///
/// Both variants speak the same EIP-1193 request surface; the tag decides
/// routing and what gets persisted.
#[derive(Clone)]
pub enum WalletProvider {
    Injected(Arc<dyn Eip1193>),
    Coinbase(Arc<dyn Eip1193>),
}

impl std::fmt::Debug for WalletProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "WalletProvider({})", self.kind())
    }
}

impl WalletProvider {
    pub const fn kind(&self) -> ProviderKind {
        match self {
            Self::Injected(_) => ProviderKind::Injected,
            Self::Coinbase(_) => ProviderKind::Coinbase,
        }
    }

    fn inner(&self) -> &Arc<dyn Eip1193> {
        match self {
            Self::Injected(inner) | Self::Coinbase(inner) => inner,
        }
    }

    /// True if both handles point at the same provider instance
    pub fn same_instance(&self, other: &Self) -> bool {
        self.kind() == other.kind() && Arc::ptr_eq(self.inner(), other.inner())
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, WalletError> {
        Ok(self.inner().request(method, params).await?)
    }

    /// `eth_requestAccounts`: may prompt the user for authorization
    pub async fn request_accounts(&self) -> Result<Vec<String>, WalletError> {
        let value = self.request("eth_requestAccounts", json!([])).await?;
        Ok(parse_accounts(&value))
    }

    /// `eth_accounts`: already authorized accounts, never prompts
    pub async fn accounts(&self) -> Result<Vec<String>, WalletError> {
        let value = self.request("eth_accounts", json!([])).await?;
        Ok(parse_accounts(&value))
    }

    pub async fn chain_id(&self) -> Result<String, WalletError> {
        let value = self.request("eth_chainId", json!([])).await?;
        parse_chain_id(&value).ok_or_else(|| WalletError::Rpc {
            code: super::error::INTERNAL_ERROR_CODE,
            message: format!("Unexpected chain id: {value}"),
        })
    }

    pub async fn switch_chain(&self, chain_id: &str) -> Result<(), WalletError> {
        self.request("wallet_switchEthereumChain", json!([{ "chainId": chain_id }]))
            .await?;
        Ok(())
    }

    pub async fn add_chain(&self, chain: &ChainDescriptor) -> Result<(), WalletError> {
        self.request("wallet_addEthereumChain", json!([chain])).await?;
        Ok(())
    }

    /// Raw `eth_getBalance` result, left unparsed so callers decide how to treat junk
    pub async fn get_balance(&self, address: &str) -> Result<Value, WalletError> {
        self.request("eth_getBalance", json!([address, "latest"])).await
    }

    /// Submits a transaction for signing and returns its hash
    pub async fn send_transaction(&self, call: &TransactionCall) -> Result<String, WalletError> {
        let value = self.request("eth_sendTransaction", json!([call])).await?;
        value
            .as_str()
            .map(str::to_lowercase)
            .ok_or_else(|| WalletError::ContractCall(format!("Unexpected transaction hash: {value}")))
    }

    /// Returns `None` while the transaction is pending
    pub async fn transaction_receipt(
        &self,
        hash: &str,
    ) -> Result<Option<TransactionReceipt>, WalletError> {
        let value = self
            .request("eth_getTransactionReceipt", json!([hash]))
            .await?;
        if value.is_null() {
            return Ok(None);
        }
        parse_receipt(&value)
            .map(Some)
            .ok_or_else(|| WalletError::ContractCall(format!("Malformed receipt for {hash}")))
    }

    pub fn events(&self) -> broadcast::Receiver<ProviderEvent> {
        self.inner().events()
    }
}

/// Lowercase hex account list. Entries that are not addresses are dropped,
/// and anything that is not an array reads as empty.
pub(crate) fn parse_accounts(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|accounts| {
            accounts
                .iter()
                .filter_map(Value::as_str)
                .filter_map(|account| parse_address(&account.to_lowercase()).ok())
                .map(|address| to_lower_hex(&address))
                .collect()
        })
        .unwrap_or_default()
}

/// Normalizes a chain id to lowercase hex; some wallets answer with a number
pub(crate) fn parse_chain_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => parse_quantity(s)
            .and_then(|id| u64::try_from(id).ok())
            .map(|id| format!("{id:#x}")),
        Value::Number(n) => n.as_u64().map(|id| format!("{id:#x}")),
        _ => None,
    }
}

fn parse_receipt(value: &Value) -> Option<TransactionReceipt> {
    let block_number = value
        .get("blockNumber")
        .and_then(Value::as_str)
        .and_then(parse_quantity)
        .and_then(|n| u64::try_from(n).ok())?;

    // Pre-Byzantium receipts carry no status
    let success = value
        .get("status")
        .and_then(Value::as_str)
        .and_then(parse_quantity)
        .map_or(true, |status| !status.is_zero());

    Some(TransactionReceipt {
        block_number,
        success,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::MockProvider;

    #[test]
    fn test_provider_kind_round_trip() {
        for kind in [ProviderKind::None, ProviderKind::Injected, ProviderKind::Coinbase] {
            assert_eq!(kind.to_string().parse::<ProviderKind>().unwrap(), kind);
        }
        assert!("metamask".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn test_parse_accounts_lowercases() {
        let value = json!(["0xAbC0000000000000000000000000000000000001", 7]);
        assert_eq!(
            parse_accounts(&value),
            vec!["0xabc0000000000000000000000000000000000001".to_string()]
        );
        assert!(parse_accounts(&Value::Null).is_empty());
    }

    #[test]
    fn test_parse_accounts_drops_non_addresses() {
        let value = json!([
            "0xaaa\u{e9}bbbbbbbbbbbb",
            "not an account",
            "0x1234",
            "0x0000000000000000000000000000000000000B0B",
        ]);
        assert_eq!(
            parse_accounts(&value),
            vec!["0x0000000000000000000000000000000000000b0b".to_string()]
        );
    }

    #[test]
    fn test_parse_chain_id_variants() {
        assert_eq!(parse_chain_id(&json!("0x2105")).as_deref(), Some("0x2105"));
        assert_eq!(parse_chain_id(&json!("0X2105")).as_deref(), Some("0x2105"));
        assert_eq!(parse_chain_id(&json!(8453)).as_deref(), Some("0x2105"));
        assert_eq!(parse_chain_id(&json!("base")), None);
    }

    #[test]
    fn test_parse_receipt() {
        let mined = json!({"blockNumber": "0x10", "status": "0x1"});
        assert_eq!(
            parse_receipt(&mined),
            Some(TransactionReceipt {
                block_number: 16,
                success: true
            })
        );

        let reverted = json!({"blockNumber": "0x10", "status": "0x0"});
        assert!(!parse_receipt(&reverted).unwrap().success);

        assert_eq!(parse_receipt(&json!({"status": "0x1"})), None);
    }

    #[tokio::test]
    async fn test_add_chain_sends_descriptor() {
        let mock = MockProvider::new();
        mock.respond("wallet_addEthereumChain", Value::Null);
        let provider = WalletProvider::Injected(mock.clone());

        provider.add_chain(&ChainDescriptor::base()).await.unwrap();

        let params = mock.params("wallet_addEthereumChain");
        assert_eq!(params.len(), 1);
        assert_eq!(params[0][0]["chainId"], "0x2105");
        assert_eq!(params[0][0]["chainName"], "Base Mainnet");
    }

    #[tokio::test]
    async fn test_user_rejection_is_typed() {
        let mock = MockProvider::new();
        mock.fail("eth_requestAccounts", 4001, "User rejected the request.");
        let provider = WalletProvider::Coinbase(mock);

        let err = provider.request_accounts().await.unwrap_err();
        assert_eq!(
            err,
            WalletError::UserRejected("User rejected the request.".to_string())
        );
    }
}
