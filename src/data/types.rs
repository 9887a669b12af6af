use alloy::primitives::{Address, TxHash, U256};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::data::contracts::{CharityDonation, Votify};

/// Named network preset.
#[derive(Debug, Clone)]
pub struct ChainConfig {
    pub name: String,
    pub chain_id: u64,
    pub rpc_url: String,
    pub symbol: String,
    pub explorer_url: Option<String>,
}

/// Everything the donation flow shows, read as one batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DonationSnapshot {
    pub contract_balance: U256,
    pub total_donation_count: U256,
    pub total_donation_amount: U256,
    pub caller_contribution: U256,
    pub charity_address: Address,
    pub donations: Vec<DonationRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DonationRecord {
    pub donor: Address,
    pub amount: U256,
    /// Unix seconds as reported by the contract.
    pub timestamp: u64,
}

impl From<CharityDonation::Donation> for DonationRecord {
    fn from(d: CharityDonation::Donation) -> Self {
        Self {
            donor: d.donor,
            amount: d.amount,
            timestamp: u64::try_from(d.timestamp).unwrap_or(u64::MAX),
        }
    }
}

/// Everything the voting flow shows, read as one batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VotingSnapshot {
    pub candidates: Vec<CandidateRecord>,
    pub voting_open: bool,
    pub caller_has_voted: bool,
    pub caller_voted_candidate_id: U256,
}

impl VotingSnapshot {
    /// The candidate the caller voted for, if any.
    pub fn voted_candidate(&self) -> Option<&CandidateRecord> {
        if !self.caller_has_voted {
            return None;
        }
        self.candidates
            .iter()
            .find(|c| c.id == self.caller_voted_candidate_id)
    }

    /// Candidates that have not been removed.
    pub fn active_candidates(&self) -> impl Iterator<Item = &CandidateRecord> {
        self.candidates.iter().filter(|c| c.exists)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateRecord {
    pub id: U256,
    pub name: String,
    pub description: String,
    pub vote_count: U256,
    pub exists: bool,
}

impl From<Votify::Candidate> for CandidateRecord {
    fn from(c: Votify::Candidate) -> Self {
        Self {
            id: c.id,
            name: c.name,
            description: c.description,
            vote_count: c.voteCount,
            exists: c.exists,
        }
    }
}

/// Where an action is in its submit cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ActionStatus {
    Idle,
    Validating,
    Submitting,
    AwaitingConfirmation,
    Refreshing,
    Failed,
}

impl std::fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionStatus::Idle => write!(f, "Idle"),
            ActionStatus::Validating => write!(f, "Validating"),
            ActionStatus::Submitting => write!(f, "Submitting"),
            ActionStatus::AwaitingConfirmation => write!(f, "Awaiting confirmation"),
            ActionStatus::Refreshing => write!(f, "Refreshing"),
            ActionStatus::Failed => write!(f, "Failed"),
        }
    }
}

/// The write currently in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAction {
    pub kind: &'static str,
    pub description: String,
    pub submitted_at: DateTime<Utc>,
    pub tx_hash: Option<TxHash>,
}
