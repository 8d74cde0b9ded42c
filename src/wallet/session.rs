use derive_more::Display;
use serde::Serialize;

use super::provider::ProviderKind;
use crate::chain::TokenInfo;

/// Where the session is in its connect lifecycle
#[derive(Debug, Display, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum SessionPhase {
    #[default]
    Disconnected,
    /// Waiting on the wallet's authorization prompt
    Connecting,
    Connected,
}

/// The record of which wallet is connected, and on which chain.
///
/// Only the session manager mutates it; everyone else works on snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Session {
    /// Lowercase hex address, empty when not connected
    pub account: String,
    /// Lowercase hex chain id, empty when unknown
    pub chain_id: String,
    pub provider_kind: ProviderKind,
    pub phase: SessionPhase,
    /// Human readable result of the last operation
    pub status: String,
    /// Last native balance read for the account, formatted in ether
    pub balance: Option<String>,
    pub token: Option<TokenInfo>,
    /// Advanced whenever the connected identity changes; late async results
    /// carrying an older epoch are dropped
    #[serde(skip)]
    pub epoch: u64,
}

impl Session {
    pub fn is_connected(&self) -> bool {
        !self.account.is_empty()
    }

    /// Shortened account for display, `0x1234…abcd`
    pub fn short_account(&self) -> String {
        let chars: Vec<char> = self.account.chars().collect();
        if chars.len() < 10 {
            return self.account.clone();
        }
        let head: String = chars[..6].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{head}…{tail}")
    }

    /// Clears everything tied to the connected identity, keeping the epoch.
    pub(crate) fn reset(&mut self, status: &str) {
        *self = Self {
            status: status.to_string(),
            epoch: self.epoch,
            ..Self::default()
        };
    }
}
