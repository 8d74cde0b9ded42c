use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{broadcast, Notify};

use crate::chain::ContractClient;
use crate::wallet::eip1193::{Eip1193, ProviderEvent, EVENT_CHANNEL_SIZE};
use crate::wallet::error::{RpcError, WalletError, METHOD_NOT_FOUND_CODE};

pub const ALICE: &str = "0x00000000000000000000000000000000000a11ce";
pub const BOB: &str = "0x0000000000000000000000000000000000000b0b";

/// A provider answering from per-method scripts.
///
/// Each method holds a queue of answers; the last one repeats forever.
/// Unscripted methods fail with "method not found".
pub struct MockProvider {
    scripts: Mutex<HashMap<String, VecDeque<Result<Value, RpcError>>>>,
    calls: Mutex<Vec<(String, Value)>>,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
    events: broadcast::Sender<ProviderEvent>,
}

impl MockProvider {
    pub fn new() -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        Arc::new(Self {
            scripts: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            gates: Mutex::new(HashMap::new()),
            events,
        })
    }

    /// A connected wallet on Base with the given accounts
    pub fn wallet(accounts: &[&str]) -> Arc<Self> {
        let mock = Self::new();
        mock.respond("eth_requestAccounts", serde_json::json!(accounts));
        mock.respond("eth_accounts", serde_json::json!(accounts));
        mock.respond("eth_chainId", serde_json::json!("0x2105"));
        mock
    }

    pub fn respond(&self, method: &str, value: Value) {
        self.script(method, vec![Ok(value)]);
    }

    pub fn respond_sequence(&self, method: &str, values: Vec<Value>) {
        self.script(method, values.into_iter().map(Ok).collect());
    }

    pub fn fail(&self, method: &str, code: i64, message: &str) {
        self.script(method, vec![Err(RpcError::new(code, message))]);
    }

    fn script(&self, method: &str, answers: Vec<Result<Value, RpcError>>) {
        self.scripts
            .lock()
            .unwrap()
            .insert(method.to_string(), answers.into());
    }

    /// Makes requests for `method` wait until the returned gate is notified
    pub fn hold(&self, method: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates
            .lock()
            .unwrap()
            .insert(method.to_string(), gate.clone());
        gate
    }

    pub fn calls(&self, method: &str) -> usize {
        self.params(method).len()
    }

    pub fn params(&self, method: &str) -> Vec<Value> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(m, _)| m == method)
            .map(|(_, params)| params.clone())
            .collect()
    }

    pub fn emit(&self, event: ProviderEvent) {
        let _ = self.events.send(event);
    }

    pub fn subscribers(&self) -> usize {
        self.events.receiver_count()
    }
}

#[async_trait]
impl Eip1193 for MockProvider {
    async fn request(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        self.calls
            .lock()
            .unwrap()
            .push((method.to_string(), params));

        let gate = self.gates.lock().unwrap().get(method).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let mut scripts = self.scripts.lock().unwrap();
        let Some(answers) = scripts.get_mut(method) else {
            return Err(RpcError::new(
                METHOD_NOT_FOUND_CODE,
                format!("{method} is not scripted"),
            ));
        };
        if answers.len() > 1 {
            answers.pop_front().unwrap()
        } else {
            answers.front().cloned().unwrap()
        }
    }

    fn events(&self) -> broadcast::Receiver<ProviderEvent> {
        self.events.subscribe()
    }
}

/// Contract client answering from fixed values; `None` makes the read fail
pub struct MockContractClient {
    symbol: Option<String>,
    decimals: Option<u8>,
    balance: U256,
    symbol_calls: AtomicUsize,
    decimals_calls: AtomicUsize,
    balance_calls: AtomicUsize,
    gate: Mutex<Option<Arc<Notify>>>,
}

impl MockContractClient {
    pub fn new(symbol: Option<&str>, decimals: Option<u8>, balance: U256) -> Self {
        Self {
            symbol: symbol.map(str::to_string),
            decimals,
            balance,
            symbol_calls: AtomicUsize::new(0),
            decimals_calls: AtomicUsize::new(0),
            balance_calls: AtomicUsize::new(0),
            gate: Mutex::new(None),
        }
    }

    /// Makes `balance_of` wait until the returned gate is notified
    pub fn hold_balance(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn balance_calls(&self) -> usize {
        self.balance_calls.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.symbol_calls.load(Ordering::SeqCst)
            + self.decimals_calls.load(Ordering::SeqCst)
            + self.balance_calls()
    }
}

#[async_trait]
impl ContractClient for MockContractClient {
    async fn symbol(&self, _token: Address) -> Result<String, WalletError> {
        self.symbol_calls.fetch_add(1, Ordering::SeqCst);
        self.symbol
            .clone()
            .ok_or_else(|| WalletError::ContractCall("execution reverted".to_string()))
    }

    async fn decimals(&self, _token: Address) -> Result<u8, WalletError> {
        self.decimals_calls.fetch_add(1, Ordering::SeqCst);
        self.decimals
            .ok_or_else(|| WalletError::ContractCall("execution reverted".to_string()))
    }

    async fn balance_of(&self, _token: Address, _holder: Address) -> Result<U256, WalletError> {
        self.balance_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        Ok(self.balance)
    }
}

/// Polls `condition` until it holds, failing the test after a second
pub async fn eventually<F>(mut condition: F)
where
    F: FnMut() -> bool,
{
    tokio::time::timeout(Duration::from_secs(1), async {
        while !condition() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("condition not met in time");
}
