use std::future::Future;

use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::Result;

struct MirrorState<S> {
    /// Bumped whenever the identity the snapshot belongs to changes.
    epoch: u64,
    snapshot: Option<S>,
}

/// Result of a refresh that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Installed,
    /// The session changed while the batch was in flight; the result was dropped.
    Superseded,
}

/// Client-held copy of a contract's view data.
///
/// The snapshot is only ever replaced as a whole, from one batch that fully
/// succeeded, and only if no session change happened since the batch started.
pub struct StateMirror<S> {
    state: RwLock<MirrorState<S>>,
}

impl<S: Clone> StateMirror<S> {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(MirrorState {
                epoch: 0,
                snapshot: None,
            }),
        }
    }

    pub async fn snapshot(&self) -> Option<S> {
        self.state.read().await.snapshot.clone()
    }

    pub async fn epoch(&self) -> u64 {
        self.state.read().await.epoch
    }

    /// Drop the snapshot and invalidate any refresh still in flight.
    pub async fn reset(&self) -> u64 {
        let mut state = self.state.write().await;
        state.epoch += 1;
        state.snapshot = None;
        state.epoch
    }

    /// Run a read batch and install its result.
    ///
    /// `fetch` must issue every read the snapshot needs; the lock is not held
    /// while it runs. On error the previous snapshot stays in place.
    pub async fn refresh<F>(&self, fetch: F) -> Result<RefreshOutcome>
    where
        F: Future<Output = Result<S>>,
    {
        let started_at = self.epoch().await;
        self.refresh_from(started_at, fetch).await
    }

    /// Like [`refresh`](Self::refresh), for a batch whose epoch the caller
    /// read together with the identity the batch is issued for.
    pub async fn refresh_from<F>(&self, started_at: u64, fetch: F) -> Result<RefreshOutcome>
    where
        F: Future<Output = Result<S>>,
    {
        let fetched = match fetch.await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "refresh failed, keeping previous snapshot");
                return Err(e);
            }
        };

        let mut state = self.state.write().await;
        if state.epoch != started_at {
            debug!(
                started_at,
                current = state.epoch,
                "discarding refresh for a previous session"
            );
            return Ok(RefreshOutcome::Superseded);
        }
        state.snapshot = Some(fetched);
        Ok(RefreshOutcome::Installed)
    }
}

impl<S: Clone> Default for StateMirror<S> {
    fn default() -> Self {
        Self::new()
    }
}
