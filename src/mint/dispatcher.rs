use std::time::Duration;

use log::{debug, info};

use super::interface::{resolve_call, ResolvedCall};
use crate::utils::address::{parse_address, to_lower_hex};
use crate::wallet::error::WalletError;
use crate::wallet::provider::{TransactionCall, WalletProvider};

/// A mint the user asked for
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MintRequest {
    pub contract_address: String,
    pub function_name: String,
    pub quantity: Option<String>,
    /// Interface text overriding the synthesized `function_name` fragment
    pub custom_abi: Option<String>,
}

/// A submitted mint waiting to be mined
#[derive(Debug, Clone)]
pub struct PendingMint {
    pub tx_hash: String,
    pub call: ResolvedCall,
    /// Session epoch the mint was submitted under
    pub(crate) epoch: u64,
    provider: WalletProvider,
    poll_interval: Duration,
}

impl PendingMint {
    /// Waits until the transaction is mined and returns its block number.
    ///
    /// There is no timeout: the wallet or the network eventually answers.
    ///
    /// # Errors
    /// * `WalletError::ContractCall` if the transaction reverted
    /// * Provider errors while polling for the receipt
    pub async fn confirmed_block(&self) -> Result<u64, WalletError> {
        loop {
            match self.provider.transaction_receipt(&self.tx_hash).await? {
                Some(receipt) if receipt.success => {
                    info!(
                        "mint::dispatcher: {} mined in block {}",
                        self.tx_hash, receipt.block_number
                    );
                    return Ok(receipt.block_number);
                }
                Some(receipt) => {
                    return Err(WalletError::ContractCall(format!(
                        "Transaction reverted in block {}",
                        receipt.block_number
                    )))
                }
                None => {
                    debug!("mint::dispatcher: {} still pending", self.tx_hash);
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
    }
}

/// Assembles and submits single write transactions
#[derive(Debug, Clone)]
pub struct MintDispatcher {
    receipt_poll_interval: Duration,
}

impl MintDispatcher {
    pub const fn new(receipt_poll_interval: Duration) -> Self {
        Self {
            receipt_poll_interval,
        }
    }

    /// Validates the request, resolves the call and submits it through the wallet.
    ///
    /// Every validation happens before the wallet sees anything.
    ///
    /// # Arguments
    /// * `provider` - The session's bound provider, `None` when disconnected
    /// * `account` - The session account signing the transaction
    /// * `request` - What to mint
    ///
    /// # Errors
    /// * `WalletError::ConnectRequired` without a connected session
    /// * `WalletError::InvalidAddress` for a malformed contract address
    /// * `WalletError::InvalidInterface` / `InvalidQuantity` if the call cannot be built
    /// * Provider errors from `eth_sendTransaction`, e.g. `UserRejected`
    pub async fn dispatch(
        &self,
        provider: Option<&WalletProvider>,
        account: &str,
        request: &MintRequest,
    ) -> Result<PendingMint, WalletError> {
        let provider = provider
            .filter(|_| !account.is_empty())
            .ok_or(WalletError::ConnectRequired)?;
        let contract = parse_address(&request.contract_address)?;
        let call = resolve_call(
            &request.function_name,
            request.quantity.as_deref(),
            request.custom_abi.as_deref(),
        )?;

        let transaction = TransactionCall {
            from: account.to_string(),
            to: to_lower_hex(&contract),
            data: format!("0x{}", hex::encode(&call.data)),
            value: "0x0".to_string(),
        };

        info!(
            "mint::dispatcher: calling {} on {} from {account}",
            call.function.signature(),
            transaction.to
        );
        let tx_hash = provider.send_transaction(&transaction).await?;

        Ok(PendingMint {
            tx_hash,
            call,
            epoch: 0,
            provider: provider.clone(),
            poll_interval: self.receipt_poll_interval,
        })
    }
}
