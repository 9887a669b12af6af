pub mod local;

use std::sync::Arc;

use alloy::primitives::Address;
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;

use crate::data::provider::ChainTransport;
use crate::error::Result;

/// Stream of account lists pushed by the wallet whenever the user switches or
/// locks accounts. An empty list means no account is authorised any more.
pub type AccountChanges = BoxStream<'static, Vec<Address>>;

/// The wallet boundary: account access, signing transport and notifications.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Ask the wallet for account access. The selected account comes first.
    async fn request_accounts(&self) -> Result<Vec<Address>>;

    /// Transport that signs with the wallet's accounts.
    fn transport(&self) -> Arc<dyn ChainTransport>;

    /// Subscribe to account-change notifications.
    fn account_changes(&self) -> AccountChanges;
}

/// Turn a broadcast receiver into an [`AccountChanges`] stream.
///
/// Lagged receivers skip to the newest notifications; the stream ends when the
/// wallet drops its sender.
pub fn notification_stream(rx: broadcast::Receiver<Vec<Address>>) -> AccountChanges {
    futures::stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(accounts) => return Some((accounts, rx)),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "account notifications lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    })
    .boxed()
}
