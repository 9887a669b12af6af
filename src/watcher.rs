use std::sync::Arc;

use alloy::primitives::Address;
use futures::StreamExt;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::flows::{Flow, FlowContract};

/// Background task that re-binds a flow whenever the wallet's accounts change.
///
/// Each notification detaches the previous account before anything is awaited
/// on the chain. Binding the new account runs beside the notification loop,
/// and a later notification cancels a bind that has not finished.
///
/// The task ends when the wallet stops publishing notifications, or when the
/// watcher is stopped or dropped.
pub struct SessionChangeWatcher {
    handle: JoinHandle<()>,
}

impl SessionChangeWatcher {
    /// Subscribe before spawning so no notification sent after this returns is missed.
    pub fn spawn<F: FlowContract>(flow: Arc<Flow<F>>) -> Result<Self> {
        let mut changes = flow.wallet()?.account_changes();

        let handle = tokio::spawn(async move {
            let mut binds = JoinSet::new();
            loop {
                tokio::select! {
                    change = changes.next() => {
                        let Some(accounts) = change else { break };
                        debug!(flow = flow.name(), accounts = accounts.len(), "accounts changed");
                        binds.abort_all();
                        match accounts.first() {
                            Some(&account) => {
                                let epoch = flow.begin_switch().await;
                                binds.spawn(rebind(Arc::clone(&flow), account, epoch));
                            }
                            None => {
                                flow.disconnect().await;
                                info!(flow = flow.name(), "wallet locked");
                            }
                        }
                    }
                    Some(_) = binds.join_next(), if !binds.is_empty() => {}
                }
            }
            // Let the last bind land before the task ends.
            while binds.join_next().await.is_some() {}
            debug!(flow = flow.name(), "account notifications closed");
        });

        Ok(Self { handle })
    }

    pub fn stop(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

async fn rebind<F: FlowContract>(flow: Arc<Flow<F>>, account: Address, epoch: u64) {
    match flow.complete_bind(account, epoch).await {
        Ok(Some(session)) => {
            info!(flow = flow.name(), account = %session.address, "session switched")
        }
        Ok(None) => debug!(flow = flow.name(), %account, "bind superseded"),
        Err(e) => {
            warn!(flow = flow.name(), %account, error = %e, "could not rebind session");
            flow.report_error(&e);
        }
    }
}

impl Drop for SessionChangeWatcher {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
