use alloy::primitives::TxHash;

use crate::data::types::ActionStatus;
use crate::session::Session;

/// Events a flow reports to whoever drives the front-end.
#[derive(Debug, Clone, PartialEq)]
pub enum FlowEvent {
    // Session
    SessionChanged {
        flow: &'static str,
        session: Option<Session>,
    },

    // State mirror
    SnapshotRefreshed {
        flow: &'static str,
        epoch: u64,
    },
    /// Non-fatal: the previous snapshot is still shown.
    RefreshFailed {
        flow: &'static str,
        reason: String,
    },

    // Actions
    ActionStatusChanged {
        flow: &'static str,
        kind: &'static str,
        status: ActionStatus,
    },
    ActionSubmitted {
        flow: &'static str,
        kind: &'static str,
        tx_hash: TxHash,
    },
    ActionConfirmed {
        flow: &'static str,
        kind: &'static str,
        tx_hash: TxHash,
    },
    ActionFailed {
        flow: &'static str,
        kind: &'static str,
        reason: String,
    },

    // Status
    Error(String),
}

impl FlowEvent {
    pub fn flow(&self) -> Option<&'static str> {
        match self {
            FlowEvent::SessionChanged { flow, .. }
            | FlowEvent::SnapshotRefreshed { flow, .. }
            | FlowEvent::RefreshFailed { flow, .. }
            | FlowEvent::ActionStatusChanged { flow, .. }
            | FlowEvent::ActionSubmitted { flow, .. }
            | FlowEvent::ActionConfirmed { flow, .. }
            | FlowEvent::ActionFailed { flow, .. } => Some(flow),
            FlowEvent::Error(_) => None,
        }
    }
}
