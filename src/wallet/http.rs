//! EIP-1193 over plain JSON-RPC HTTP.
//!
//! Desktop wallets such as Frame expose the same request surface a browser
//! wallet injects, on a local HTTP port. The same transport also talks to the
//! public chain endpoint. HTTP carries no push notifications, so account and
//! chain changes are detected by polling when enabled.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use eyre::Result;
use log::{debug, warn};
use reqwest::Client;
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use url::Url;

use super::eip1193::{Eip1193, ProviderEvent, EVENT_CHANNEL_SIZE};
use super::error::{RpcError, INTERNAL_ERROR_CODE};
use super::provider::{parse_accounts, parse_chain_id};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
struct Endpoint {
    client: Client,
    url: Url,
    origin: Option<String>,
}

impl Endpoint {
    async fn call(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        let payload = json!({
            "jsonrpc": "2.0",
            "id": fastrand::u32(1..),
            "method": method,
            "params": params,
        });

        let mut request = self.client.post(self.url.clone()).json(&payload);
        if let Some(origin) = &self.origin {
            request = request.header("Origin", origin);
        }

        let response = request
            .send()
            .await
            .map_err(RpcError::transport)?
            .json::<Value>()
            .await
            .map_err(RpcError::transport)?;

        parse_response(response)
    }
}

/// A provider backed by a JSON-RPC HTTP endpoint
#[derive(Debug)]
pub struct HttpEip1193 {
    endpoint: Endpoint,
    events: broadcast::Sender<ProviderEvent>,
    poll_interval: Option<Duration>,
    poller: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl HttpEip1193 {
    /// Creates a transport for the given endpoint.
    ///
    /// # Errors
    /// * If the URL is invalid
    /// * If the HTTP client cannot be built
    pub fn new(url: &str) -> Result<Self> {
        let url = Url::parse(url)?;
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        let (events, _) = broadcast::channel(EVENT_CHANNEL_SIZE);

        Ok(Self {
            endpoint: Endpoint {
                client,
                url,
                origin: None,
            },
            events,
            poll_interval: None,
            poller: Arc::new(Mutex::new(None)),
        })
    }

    /// Identifies this application to the wallet, which keys permissions by origin.
    #[must_use]
    pub fn with_origin(mut self, origin: &str) -> Self {
        self.endpoint.origin = Some(origin.to_string());
        self
    }

    /// Emits change events by polling `eth_accounts` and `eth_chainId`.
    #[must_use]
    pub fn with_event_polling(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    /// Starts the poller when someone listens; a no-op without polling or outside a runtime.
    ///
    /// The poller stops by itself once the last receiver is gone.
    fn ensure_poller(&self) {
        let Some(interval) = self.poll_interval else {
            return;
        };
        let Ok(mut poller) = self.poller.lock() else {
            return;
        };
        if poller.is_some() || tokio::runtime::Handle::try_current().is_err() {
            return;
        }

        debug!("wallet::http: polling {} every {:?}", self.endpoint.url, interval);
        let endpoint = self.endpoint.clone();
        let events = self.events.clone();
        let slot = self.poller.clone();
        *poller = Some(tokio::spawn(poll_changes(endpoint, events, slot, interval)));
    }
}

impl Drop for HttpEip1193 {
    fn drop(&mut self) {
        if let Ok(mut poller) = self.poller.lock() {
            if let Some(handle) = poller.take() {
                handle.abort();
            }
        }
    }
}

#[async_trait]
impl Eip1193 for HttpEip1193 {
    async fn request(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        self.endpoint.call(method, params).await
    }

    fn events(&self) -> broadcast::Receiver<ProviderEvent> {
        // Subscribe first so a poller about to idle out sees the new receiver
        let receiver = self.events.subscribe();
        self.ensure_poller();
        receiver
    }
}

/// Polls the endpoint and emits an event whenever accounts or chain differ
/// from the previous observation. The first observation only sets the baseline.
///
/// Exits and clears `slot` once nobody listens.
async fn poll_changes(
    endpoint: Endpoint,
    events: broadcast::Sender<ProviderEvent>,
    slot: Arc<Mutex<Option<JoinHandle<()>>>>,
    interval: Duration,
) {
    let mut last_accounts: Option<Vec<String>> = None;
    let mut last_chain: Option<String> = None;

    loop {
        if events.receiver_count() == 0 {
            // Re-checked under the slot lock so `ensure_poller` either sees
            // this task running or an empty slot
            let Ok(mut poller) = slot.lock() else {
                return;
            };
            if events.receiver_count() == 0 {
                debug!("wallet::http: no listeners left, stopping poller");
                poller.take();
                return;
            }
        }

        match endpoint.call("eth_accounts", json!([])).await {
            Ok(value) => {
                let accounts = parse_accounts(&value);
                if last_accounts.as_ref() != Some(&accounts) {
                    if last_accounts.is_some() {
                        let _ = events.send(ProviderEvent::AccountsChanged(accounts.clone()));
                    }
                    last_accounts = Some(accounts);
                }
            }
            Err(e) => debug!("wallet::http: eth_accounts poll failed: {e}"),
        }

        match endpoint.call("eth_chainId", json!([])).await {
            Ok(value) => match parse_chain_id(&value) {
                Some(chain) if last_chain.as_ref() != Some(&chain) => {
                    if last_chain.is_some() {
                        let _ = events.send(ProviderEvent::ChainChanged(chain.clone()));
                    }
                    last_chain = Some(chain);
                }
                Some(_) => {}
                None => warn!("wallet::http: unexpected eth_chainId result: {value}"),
            },
            Err(e) => debug!("wallet::http: eth_chainId poll failed: {e}"),
        }

        tokio::time::sleep(interval).await;
    }
}

/// Extracts `result` or the error object from a JSON-RPC response body
pub(crate) fn parse_response(response: Value) -> Result<Value, RpcError> {
    if let Some(error) = response.get("error").filter(|e| !e.is_null()) {
        return Err(RpcError::new(
            error["code"].as_i64().unwrap_or(INTERNAL_ERROR_CODE),
            error["message"].as_str().unwrap_or_default(),
        ));
    }

    response
        .get("result")
        .cloned()
        .ok_or_else(|| RpcError::transport("response has neither result nor error"))
}
