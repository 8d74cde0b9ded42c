//! The wallet session state machine.
//!
//! `SessionManager` is the only writer of the [`Session`]. Every operation
//! reads what it needs under the lock, releases it for the provider call and
//! re-locks to apply a single transition. Continuations carry the epoch they
//! started under and drop their result once it has moved.

use std::sync::{Arc, Weak};
use std::time::Duration;

use log::{debug, info, warn};
use serde_json::json;
use tokio::sync::{watch, Mutex};

use super::coinbase::CoinbaseSdk;
use super::eip1193::Eip1193;
use super::error::{WalletError, INTERNAL_ERROR_CODE};
use super::provider::{ProviderKind, WalletProvider};
use super::session::{Session, SessionPhase};
use super::store::{SessionRecord, SessionStore};
use super::subscription::Subscription;
use crate::chain::{fetch_token_info, ContractClient, TokenInfo};
use crate::mint::{MintDispatcher, MintRequest, PendingMint};
use crate::utils::constants::{ChainDescriptor, BASE_CHAIN_HEX, BASE_CHAIN_ID};
use crate::utils::units::{format_ether, parse_quantity};

const STATUS_DISCONNECTED: &str = "Disconnected";
const STATUS_SWITCHED: &str = "Switched to Base";
const STATUS_CHAIN_ADDED: &str = "Base added. Please retry switch if needed.";
const STATUS_ADD_FAILED: &str = "Failed to add Base";
const STATUS_SWITCH_FAILED: &str = "Switch failed";
const STATUS_MINT_FAILED: &str = "Mint failed";

/// Collaborators the manager is built from
pub struct ManagerParams {
    /// The injected wallet, when one is present
    pub injected: Option<Arc<dyn Eip1193>>,
    pub coinbase: Arc<dyn CoinbaseSdk>,
    /// Public endpoint of the target chain, for reads without a wallet on it
    pub public_rpc: Arc<dyn Eip1193>,
    pub contracts: Arc<dyn ContractClient>,
    pub store: Arc<dyn SessionStore>,
    /// Node URL handed to the Coinbase SDK
    pub rpc_url: String,
    pub receipt_poll_interval: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectMode<'a> {
    /// `eth_requestAccounts`, may show the wallet's authorization prompt
    Prompt,
    /// `eth_accounts` only; the given account must already be authorized
    Silent(Option<&'a str>),
}

#[derive(Default)]
struct State {
    session: Session,
    /// Provider of the current session, `None` when disconnected
    provider: Option<WalletProvider>,
    /// Coinbase provider built on first use
    coinbase: Option<Arc<dyn Eip1193>>,
    subscription: Option<Subscription>,
}

pub struct SessionManager {
    state: Mutex<State>,
    injected: Option<Arc<dyn Eip1193>>,
    coinbase_sdk: Arc<dyn CoinbaseSdk>,
    public_rpc: Arc<dyn Eip1193>,
    contracts: Arc<dyn ContractClient>,
    store: Arc<dyn SessionStore>,
    rpc_url: String,
    mint: MintDispatcher,
    feed: watch::Sender<Session>,
    me: Weak<Self>,
}

const fn connected_status(kind: ProviderKind) -> &'static str {
    match kind {
        ProviderKind::Coinbase => "Connected with Coinbase Wallet",
        _ => "Connected",
    }
}

const fn failed_status(kind: ProviderKind) -> &'static str {
    match kind {
        ProviderKind::Coinbase => "Coinbase connect failed",
        _ => "Connect failed",
    }
}

impl SessionManager {
    pub fn new(params: ManagerParams) -> Arc<Self> {
        let (feed, _) = watch::channel(Session::default());

        Arc::new_cyclic(|me| Self {
            state: Mutex::new(State::default()),
            injected: params.injected,
            coinbase_sdk: params.coinbase,
            public_rpc: params.public_rpc,
            contracts: params.contracts,
            store: params.store,
            rpc_url: params.rpc_url,
            mint: MintDispatcher::new(params.receipt_poll_interval),
            feed,
            me: me.clone(),
        })
    }

    /// A copy of the current session
    pub async fn snapshot(&self) -> Session {
        self.state.lock().await.session.clone()
    }

    /// Receives every session change as it is applied
    pub fn subscribe_state(&self) -> watch::Receiver<Session> {
        self.feed.subscribe()
    }

    fn publish(&self, session: &Session) {
        self.feed.send_replace(session.clone());
    }

    async fn current(&self) -> (Option<WalletProvider>, Session) {
        let state = self.state.lock().await;
        (state.provider.clone(), state.session.clone())
    }

    /// Writes `status` unless the session moved past `epoch`
    async fn set_status(&self, epoch: u64, status: String) {
        let mut state = self.state.lock().await;
        if state.session.epoch != epoch {
            debug!("session::status: dropping {status:?} from epoch {epoch}");
            return;
        }
        state.session.status = status;
        self.publish(&state.session);
    }

    /// Restores the persisted session, then syncs with the bound provider.
    pub async fn start(&self) -> Session {
        self.auto_reconnect().await;
        if let Err(e) = self.reconcile_from_provider().await {
            debug!("session::start: reconcile failed: {e}");
        }
        self.snapshot().await
    }

    /// Connects through the injected wallet, prompting for authorization.
    ///
    /// # Errors
    /// * `WalletError::NoProvider` if no injected wallet is present
    /// * `WalletError::UserRejected` if the user declines the prompt
    /// * `WalletError::Superseded` if the session changed while waiting on the wallet
    /// * Any other provider error
    pub async fn connect_injected(&self) -> Result<Session, WalletError> {
        let Some(injected) = self.injected.clone() else {
            let err = WalletError::NoProvider;
            warn!("session::connect_injected: {err}");
            let mut state = self.state.lock().await;
            state.session.status = err.to_string();
            self.publish(&state.session);
            return Err(err);
        };
        self.connect_with(WalletProvider::Injected(injected), ConnectMode::Prompt)
            .await
    }

    /// Connects through the Coinbase Wallet SDK, prompting for authorization.
    ///
    /// The SDK provider is bound to Base and built once, on first use.
    ///
    /// # Errors
    /// * `WalletError::SdkUnavailable` if the SDK cannot build a provider
    /// * The same wallet errors as [`Self::connect_injected`]
    pub async fn connect_coinbase(&self) -> Result<Session, WalletError> {
        self.connect_coinbase_with(ConnectMode::Prompt).await
    }

    async fn connect_coinbase_with(&self, mode: ConnectMode<'_>) -> Result<Session, WalletError> {
        let provider = match self.coinbase_provider().await {
            Ok(provider) => provider,
            Err(e) => {
                warn!("session::connect_coinbase: {e}");
                if mode == ConnectMode::Prompt {
                    let epoch = self.state.lock().await.session.epoch;
                    self.set_status(epoch, e.status_message(failed_status(ProviderKind::Coinbase)))
                        .await;
                }
                return Err(e);
            }
        };
        self.connect_with(WalletProvider::Coinbase(provider), mode)
            .await
    }

    async fn coinbase_provider(&self) -> Result<Arc<dyn Eip1193>, WalletError> {
        if let Some(provider) = self.state.lock().await.coinbase.clone() {
            return Ok(provider);
        }

        let provider = self
            .coinbase_sdk
            .make_web3_provider(&self.rpc_url, BASE_CHAIN_ID)?;
        let mut state = self.state.lock().await;
        Ok(state.coinbase.get_or_insert(provider).clone())
    }

    async fn connect_with(
        &self,
        provider: WalletProvider,
        mode: ConnectMode<'_>,
    ) -> Result<Session, WalletError> {
        let kind = provider.kind();
        let (epoch, prior_phase) = {
            let mut state = self.state.lock().await;
            state.session.epoch += 1;
            let prior_phase = state.session.phase;
            if mode == ConnectMode::Prompt {
                state.session.phase = SessionPhase::Connecting;
                self.publish(&state.session);
            }
            (state.session.epoch, prior_phase)
        };
        info!("session::connect: {kind} ({mode:?})");

        let authorized = authorize(&provider, mode).await;

        let mut state = self.state.lock().await;
        if state.session.epoch != epoch {
            debug!("session::connect: {kind} superseded");
            return Err(WalletError::Superseded);
        }

        let (account, chain_id) = match authorized {
            Ok(pair) => pair,
            Err(e) => {
                warn!("session::connect: {kind} failed: {e}");
                if mode == ConnectMode::Prompt {
                    state.session.phase = prior_phase;
                    state.session.status = e.status_message(failed_status(kind));
                    self.publish(&state.session);
                }
                return Err(e);
            }
        };

        let record = SessionRecord {
            account: account.clone(),
            provider_kind: kind,
        };
        state.session = Session {
            account,
            chain_id,
            provider_kind: kind,
            phase: SessionPhase::Connected,
            status: connected_status(kind).to_string(),
            balance: None,
            token: None,
            epoch,
        };
        state.subscription = Some(self.subscribe(&provider));
        state.provider = Some(provider);
        if kind != ProviderKind::Coinbase {
            state.coinbase = None;
        }

        if let Err(e) = self.store.save(&record).await {
            warn!("session::connect: could not persist session: {e}");
        }
        info!(
            "session::connect: {} on {} via {kind}",
            state.session.account, state.session.chain_id
        );
        self.publish(&state.session);
        Ok(state.session.clone())
    }

    /// Routes the provider's change events into [`Self::reconcile_from_provider`].
    fn subscribe(&self, provider: &WalletProvider) -> Subscription {
        let manager = self.me.clone();
        Subscription::spawn(provider.events(), move |event| {
            let manager = manager.clone();
            async move {
                let Some(manager) = manager.upgrade() else {
                    return;
                };
                debug!("session::events: {event:?}");
                if let Err(e) = manager.reconcile_from_provider().await {
                    warn!("session::events: reconcile failed: {e}");
                }
            }
        })
    }

    /// Ends the session, forgets the persisted record and stops listening
    /// to the provider. Calling it again is harmless.
    pub async fn disconnect(&self) {
        let mut state = self.state.lock().await;
        state.session.epoch += 1;
        state.session.reset(STATUS_DISCONNECTED);
        state.provider = None;
        state.coinbase = None;
        if let Some(subscription) = state.subscription.take() {
            subscription.unsubscribe();
        }

        if let Err(e) = self.store.clear().await {
            warn!("session::disconnect: could not clear persisted session: {e}");
        }
        info!("session::disconnect: session cleared");
        self.publish(&state.session);
    }

    /// Re-reads accounts and chain from the bound provider without prompting
    /// and applies them as the truth. A no-op without a bound provider.
    ///
    /// # Errors
    /// * Provider errors from `eth_accounts` / `eth_chainId`; nothing is applied then
    pub async fn reconcile_from_provider(&self) -> Result<(), WalletError> {
        let (provider, epoch) = {
            let state = self.state.lock().await;
            match &state.provider {
                Some(provider) => (provider.clone(), state.session.epoch),
                None => return Ok(()),
            }
        };

        let (accounts, chain_id) = futures::join!(provider.accounts(), provider.chain_id());
        let (accounts, chain_id) = (accounts?, chain_id?);
        let account = accounts.into_iter().next().unwrap_or_default();

        let mut state = self.state.lock().await;
        let still_bound = state
            .provider
            .as_ref()
            .is_some_and(|bound| bound.same_instance(&provider));
        if state.session.epoch != epoch || !still_bound {
            debug!("session::reconcile: discarding result from epoch {epoch}");
            return Ok(());
        }

        if state.session.account != account {
            info!(
                "session::reconcile: account {:?} -> {account:?}",
                state.session.account
            );
            let session = &mut state.session;
            session.epoch += 1;
            session.balance = None;
            session.token = None;
            session.phase = if account.is_empty() {
                SessionPhase::Disconnected
            } else {
                SessionPhase::Connected
            };
            session.account = account;

            if session.is_connected() {
                let record = SessionRecord {
                    account: session.account.clone(),
                    provider_kind: session.provider_kind,
                };
                if let Err(e) = self.store.save(&record).await {
                    warn!("session::reconcile: could not persist session: {e}");
                }
            }
        }
        if state.session.chain_id != chain_id {
            info!(
                "session::reconcile: chain {:?} -> {chain_id:?}",
                state.session.chain_id
            );
            state.session.chain_id = chain_id;
        }

        self.publish(&state.session);
        Ok(())
    }

    /// Replays the connect path for the persisted session without prompting.
    ///
    /// Failures are swallowed: the session is left as it was before and the
    /// status is not touched. Returns whether the session was restored.
    pub async fn auto_reconnect(&self) -> bool {
        let Some(record) = self.store.load().await else {
            debug!("session::auto_reconnect: no persisted session");
            return false;
        };

        let status = {
            let mut state = self.state.lock().await;
            if state.provider.is_some() {
                return false;
            }
            state.session.account = record.account.clone();
            state.session.provider_kind = record.provider_kind;
            state.session.phase = SessionPhase::Connecting;
            self.publish(&state.session);
            state.session.status.clone()
        };
        info!(
            "session::auto_reconnect: resuming {} via {}",
            record.account, record.provider_kind
        );

        let result = match (record.provider_kind, &self.injected) {
            (ProviderKind::Injected, Some(injected)) => {
                self.connect_with(
                    WalletProvider::Injected(injected.clone()),
                    ConnectMode::Silent(Some(&record.account)),
                )
                .await
            }
            (ProviderKind::Injected, None) => Err(WalletError::NoProvider),
            (ProviderKind::Coinbase, _) => {
                self.connect_coinbase_with(ConnectMode::Silent(None))
                    .await
            }
            (ProviderKind::None, _) => return false,
        };

        match result {
            Ok(_) => true,
            Err(WalletError::Superseded) => false,
            Err(e) => {
                debug!("session::auto_reconnect: suppressed {e}");
                let mut state = self.state.lock().await;
                if state.provider.is_none() {
                    state.session.reset(&status);
                    self.publish(&state.session);
                }
                false
            }
        }
    }

    /// Asks the wallet to switch to Base, registering the chain first if the
    /// wallet does not know it.
    ///
    /// An unknown chain is added once; the user then retries the switch.
    ///
    /// # Errors
    /// * `WalletError::ConnectRequired` without a connected session
    /// * The switch error, or the add-chain error after an unknown chain
    pub async fn switch_to_target_chain(&self) -> Result<(), WalletError> {
        let (provider, session) = self.current().await;
        let Some(provider) = provider.filter(|_| session.is_connected()) else {
            let err = WalletError::ConnectRequired;
            self.set_status(session.epoch, err.to_string()).await;
            return Err(err);
        };

        match provider.switch_chain(BASE_CHAIN_HEX).await {
            Ok(()) => {
                info!("session::switch_to_target_chain: switched to {BASE_CHAIN_HEX}");
                self.set_status(session.epoch, STATUS_SWITCHED.to_string())
                    .await;
                if let Err(e) = self.reconcile_from_provider().await {
                    debug!("session::switch_to_target_chain: reconcile failed: {e}");
                }
                Ok(())
            }
            Err(WalletError::UnknownChain(message)) => {
                info!("session::switch_to_target_chain: {message}, adding {BASE_CHAIN_HEX}");
                match provider.add_chain(&ChainDescriptor::base()).await {
                    Ok(()) => {
                        self.set_status(session.epoch, STATUS_CHAIN_ADDED.to_string())
                            .await;
                        Ok(())
                    }
                    Err(e) => {
                        warn!("session::switch_to_target_chain: add chain failed: {e}");
                        self.set_status(session.epoch, e.status_message(STATUS_ADD_FAILED))
                            .await;
                        Err(e)
                    }
                }
            }
            Err(e) => {
                warn!("session::switch_to_target_chain: {e}");
                self.set_status(session.epoch, e.status_message(STATUS_SWITCH_FAILED))
                    .await;
                Err(e)
            }
        }
    }

    /// Native balance of `address` in ether, `"0"` when it cannot be read.
    ///
    /// Goes through the wallet when it is on Base, otherwise through the
    /// public endpoint. The session caches the value for its own account.
    pub async fn fetch_native_balance(&self, address: &str) -> String {
        let (provider, session) = self.current().await;
        let on_target = session.chain_id == BASE_CHAIN_HEX;

        let result = match provider.filter(|_| on_target) {
            Some(provider) => provider.get_balance(address).await,
            None => self
                .public_rpc
                .request("eth_getBalance", json!([address, "latest"]))
                .await
                .map_err(WalletError::from),
        };

        let balance = match result {
            Ok(value) => value
                .as_str()
                .and_then(parse_quantity)
                .map(format_ether)
                .unwrap_or_else(|| {
                    debug!("session::fetch_native_balance: unreadable balance {value}");
                    "0".to_string()
                }),
            Err(e) => {
                debug!("session::fetch_native_balance: {e}");
                "0".to_string()
            }
        };

        let mut state = self.state.lock().await;
        if state.session.epoch == session.epoch
            && state.session.is_connected()
            && state.session.account.eq_ignore_ascii_case(address.trim())
        {
            state.session.balance = Some(balance.clone());
            self.publish(&state.session);
        }
        balance
    }

    /// Reads token metadata and the holder's balance and keeps the result on
    /// the session. Without a holder the session account is used.
    ///
    /// # Errors
    /// * `WalletError::InvalidAddress` for a malformed token or holder address
    /// * `WalletError::ContractCall` if the balance read fails
    /// * `WalletError::Superseded` if the session changed during the read
    pub async fn fetch_token(
        &self,
        address: &str,
        holder: Option<&str>,
    ) -> Result<TokenInfo, WalletError> {
        let (_, session) = self.current().await;
        let holder = holder
            .map(str::to_string)
            .or_else(|| session.is_connected().then(|| session.account.clone()));

        let info = match fetch_token_info(self.contracts.as_ref(), address, holder.as_deref()).await
        {
            Ok(info) => info,
            Err(e) => {
                warn!("session::fetch_token: {e}");
                self.set_status(session.epoch, e.to_string()).await;
                return Err(e);
            }
        };

        let mut state = self.state.lock().await;
        if state.session.epoch != session.epoch {
            debug!("session::fetch_token: discarding {} from epoch {}", info.address, session.epoch);
            return Err(WalletError::Superseded);
        }
        state.session.token = Some(info.clone());
        self.publish(&state.session);
        Ok(info)
    }

    /// Submits a mint through the session's wallet and returns it pending.
    ///
    /// # Errors
    /// * `WalletError::ConnectRequired` without a connected session
    /// * Validation errors for the address, interface or quantity
    /// * Wallet errors from the submission
    pub async fn mint(&self, request: &MintRequest) -> Result<PendingMint, WalletError> {
        let (provider, session) = self.current().await;

        match self
            .mint
            .dispatch(provider.as_ref(), &session.account, request)
            .await
        {
            Ok(mut pending) => {
                pending.epoch = session.epoch;
                self.set_status(session.epoch, format!("Mint submitted: {}", pending.tx_hash))
                    .await;
                Ok(pending)
            }
            Err(e) => {
                warn!("session::mint: {e}");
                self.set_status(session.epoch, e.status_message(STATUS_MINT_FAILED))
                    .await;
                Err(e)
            }
        }
    }

    /// Waits for a submitted mint and reports the block it landed in.
    ///
    /// The status is only written while the session that submitted the mint
    /// is still current.
    ///
    /// # Errors
    /// * `WalletError::ContractCall` if the transaction reverted
    /// * Provider errors while polling
    pub async fn confirm_mint(&self, pending: &PendingMint) -> Result<u64, WalletError> {
        let epoch = pending.epoch;

        match pending.confirmed_block().await {
            Ok(block) => {
                self.set_status(epoch, format!("Minted in block {block}"))
                    .await;
                Ok(block)
            }
            Err(e) => {
                warn!("session::confirm_mint: {e}");
                self.set_status(epoch, e.status_message(STATUS_MINT_FAILED))
                    .await;
                Err(e)
            }
        }
    }
}

/// Reads the account and chain a connect settles on
async fn authorize(
    provider: &WalletProvider,
    mode: ConnectMode<'_>,
) -> Result<(String, String), WalletError> {
    let accounts = match mode {
        ConnectMode::Prompt => provider.request_accounts().await?,
        ConnectMode::Silent(_) => provider.accounts().await?,
    };

    let account = match mode {
        ConnectMode::Silent(Some(expected)) => accounts
            .into_iter()
            .find(|account| account.eq_ignore_ascii_case(expected)),
        _ => accounts.into_iter().next(),
    }
    .ok_or_else(|| WalletError::Rpc {
        code: INTERNAL_ERROR_CODE,
        message: "Wallet returned no authorized account".to_string(),
    })?;

    let chain_id = provider.chain_id().await?;
    Ok((account, chain_id))
}
