use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};

use alloy::primitives::TxHash;
use alloy::sol_types::SolInterface;
use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::data::gateway::{ContractGateway, PreparedCall};
use crate::data::provider::Confirmation;
use crate::data::types::{ActionStatus, PendingAction};
use crate::error::{ClientError, Result};
use crate::events::FlowEvent;
use crate::mirror::RefreshOutcome;

struct SubmitterState {
    status: ActionStatus,
    pending: Option<PendingAction>,
}

/// Runs one write at a time: validate, send, wait for a confirmation, refresh.
///
/// The busy status is the only gate against overlapping writes from the same
/// flow. Nothing is applied to the mirrored state ahead of confirmation.
pub struct ActionSubmitter {
    flow: &'static str,
    state: Mutex<SubmitterState>,
    events: mpsc::UnboundedSender<FlowEvent>,
}

impl ActionSubmitter {
    pub fn new(flow: &'static str, events: mpsc::UnboundedSender<FlowEvent>) -> Self {
        Self {
            flow,
            state: Mutex::new(SubmitterState {
                status: ActionStatus::Idle,
                pending: None,
            }),
            events,
        }
    }

    pub fn status(&self) -> ActionStatus {
        self.lock().status
    }

    pub fn pending(&self) -> Option<PendingAction> {
        self.lock().pending.clone()
    }

    /// Submit one action.
    ///
    /// `prepare` validates the user's input and builds the call; it runs in
    /// the `Validating` state so a rejected input never reaches the chain.
    /// `refresh` runs only after the confirmation was observed. A failed
    /// refresh at that point is reported but does not fail the action: the
    /// transaction is already final.
    pub async fn submit<I, P, R, Fut>(
        &self,
        kind: &'static str,
        description: String,
        prepare: P,
        gateway: Option<ContractGateway<I>>,
        refresh: R,
    ) -> Result<Confirmation>
    where
        I: SolInterface,
        P: FnOnce() -> Result<PreparedCall<I>>,
        R: FnOnce() -> Fut,
        Fut: Future<Output = Result<RefreshOutcome>>,
    {
        let guard = self.begin(kind, description)?;

        let prepared = prepare().map_err(|e| guard.fail(e))?;

        guard.advance(ActionStatus::Submitting);
        let gateway = gateway.ok_or(ClientError::NotConnected).map_err(|e| guard.fail(e))?;
        let pending = gateway.write(prepared).await.map_err(|e| guard.fail(e))?;
        guard.submitted(pending.tx_hash);

        guard.advance(ActionStatus::AwaitingConfirmation);
        let confirmation = gateway.confirm(&pending).await.map_err(|e| guard.fail(e))?;
        guard.emit(FlowEvent::ActionConfirmed {
            flow: self.flow,
            kind,
            tx_hash: confirmation.tx_hash,
        });

        guard.advance(ActionStatus::Refreshing);
        if let Err(e) = refresh().await {
            warn!(flow = self.flow, kind, error = %e, "state refresh after confirmation failed");
        }

        info!(flow = self.flow, kind, tx_hash = %confirmation.tx_hash, "action complete");
        Ok(confirmation)
    }

    fn begin(&self, kind: &'static str, description: String) -> Result<ActionGuard<'_>> {
        {
            let mut state = self.lock();
            if state.status != ActionStatus::Idle {
                warn!(flow = self.flow, kind, status = %state.status, "rejecting overlapping submit");
                return Err(ClientError::ActionInProgress);
            }
            state.status = ActionStatus::Validating;
            state.pending = Some(PendingAction {
                kind,
                description,
                submitted_at: Utc::now(),
                tx_hash: None,
            });
        }
        let guard = ActionGuard {
            submitter: self,
            kind,
        };
        guard.emit_status(ActionStatus::Validating);
        Ok(guard)
    }

    fn lock(&self) -> MutexGuard<'_, SubmitterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Holds the submitter busy; dropping it returns the submitter to `Idle`.
struct ActionGuard<'a> {
    submitter: &'a ActionSubmitter,
    kind: &'static str,
}

impl ActionGuard<'_> {
    fn advance(&self, status: ActionStatus) {
        self.submitter.lock().status = status;
        self.emit_status(status);
    }

    fn submitted(&self, tx_hash: TxHash) {
        {
            let mut state = self.submitter.lock();
            if let Some(pending) = state.pending.as_mut() {
                pending.tx_hash = Some(tx_hash);
                pending.submitted_at = Utc::now();
            }
        }
        self.emit(FlowEvent::ActionSubmitted {
            flow: self.submitter.flow,
            kind: self.kind,
            tx_hash,
        });
    }

    fn fail(&self, err: ClientError) -> ClientError {
        if err.is_chain_error() {
            warn!(flow = self.submitter.flow, kind = self.kind, error = %err, "action failed");
        } else {
            info!(flow = self.submitter.flow, kind = self.kind, error = %err, "action rejected");
        }
        self.advance(ActionStatus::Failed);
        self.emit(FlowEvent::ActionFailed {
            flow: self.submitter.flow,
            kind: self.kind,
            reason: err.to_string(),
        });
        err
    }

    fn emit_status(&self, status: ActionStatus) {
        self.emit(FlowEvent::ActionStatusChanged {
            flow: self.submitter.flow,
            kind: self.kind,
            status,
        });
    }

    fn emit(&self, event: FlowEvent) {
        let _ = self.submitter.events.send(event);
    }
}

impl Drop for ActionGuard<'_> {
    fn drop(&mut self) {
        {
            let mut state = self.submitter.lock();
            state.status = ActionStatus::Idle;
            state.pending = None;
        }
        self.emit_status(ActionStatus::Idle);
    }
}
