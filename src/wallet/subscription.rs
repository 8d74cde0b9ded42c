use std::future::Future;

use log::{debug, warn};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

use super::eip1193::ProviderEvent;

/// Handle to a running provider event listener. Dropping it stops the listener.
#[derive(Debug)]
pub struct Subscription {
    handle: JoinHandle<()>,
}

impl Subscription {
    /// Forwards every event from `events` to `on_event`, one at a time.
    ///
    /// A lagging receiver still triggers one delivery so the handler can
    /// resynchronize from the provider.
    pub fn spawn<F, Fut>(mut events: broadcast::Receiver<ProviderEvent>, on_event: F) -> Self
    where
        F: Fn(ProviderEvent) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        debug!("wallet::subscription: {event:?}");
                        on_event(event).await;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("wallet::subscription: skipped {skipped} provider events");
                        on_event(ProviderEvent::AccountsChanged(Vec::new())).await;
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        Self { handle }
    }

    /// Stops delivering events.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
