use std::fmt;

use alloy::primitives::{Address, U256};
use async_trait::async_trait;

use crate::data::contracts::Votify;
use crate::data::gateway::{ContractGateway, PreparedCall};
use crate::data::types::{CandidateRecord, VotingSnapshot};
use crate::error::{ClientError, Result};
use crate::flows::{FlowAction, FlowContract};

type Calls = Votify::VotifyCalls;

/// Client flow for the Votify voting registry.
#[derive(Debug, Clone, Copy, Default)]
pub struct VotingFlow;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VotingAction {
    AddCandidate {
        name: String,
        description: String,
    },
    UpdateCandidate {
        id: u64,
        name: String,
        description: String,
    },
    RemoveCandidate {
        id: u64,
    },
    Vote {
        id: u64,
    },
    ToggleVoting,
}

impl FlowAction for VotingAction {
    fn kind(&self) -> &'static str {
        match self {
            VotingAction::AddCandidate { .. } => "add-candidate",
            VotingAction::UpdateCandidate { .. } => "update-candidate",
            VotingAction::RemoveCandidate { .. } => "remove-candidate",
            VotingAction::Vote { .. } => "vote",
            VotingAction::ToggleVoting => "toggle-voting",
        }
    }
}

fn candidate_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ClientError::Validation(
            "candidate name must not be empty".to_string(),
        ));
    }
    Ok(name.to_string())
}

#[async_trait]
impl FlowContract for VotingFlow {
    type Interface = Calls;
    type Snapshot = VotingSnapshot;
    type Action = VotingAction;

    fn name(&self) -> &'static str {
        "voting"
    }

    fn privileged_role(&self) -> &'static str {
        "owner"
    }

    async fn privileged_address(&self, gateway: &ContractGateway<Calls>) -> Result<Address> {
        Ok(gateway.read(Votify::ownerCall {}).await?._0)
    }

    async fn fetch_snapshot(
        &self,
        gateway: &ContractGateway<Calls>,
        account: Address,
    ) -> Result<VotingSnapshot> {
        let (candidates, open, voter) = tokio::try_join!(
            gateway.read(Votify::getAllCandidatesCall {}),
            gateway.read(Votify::votingOpenCall {}),
            gateway.read(Votify::getVoterDetailsCall { _voter: account }),
        )?;

        Ok(VotingSnapshot {
            candidates: candidates
                ._0
                .into_iter()
                .map(CandidateRecord::from)
                .collect(),
            voting_open: open._0,
            caller_has_voted: voter._hasVoted,
            caller_voted_candidate_id: voter._votedCandidateId,
        })
    }

    fn prepare(&self, action: &VotingAction) -> Result<PreparedCall<Calls>> {
        let call = match action {
            VotingAction::AddCandidate { name, description } => {
                Calls::addCandidate(Votify::addCandidateCall {
                    _name: candidate_name(name)?,
                    _description: description.trim().to_string(),
                })
            }
            VotingAction::UpdateCandidate {
                id,
                name,
                description,
            } => Calls::updateCandidate(Votify::updateCandidateCall {
                _candidateId: U256::from(*id),
                _name: candidate_name(name)?,
                _description: description.trim().to_string(),
            }),
            VotingAction::RemoveCandidate { id } => {
                Calls::removeCandidate(Votify::removeCandidateCall {
                    _candidateId: U256::from(*id),
                })
            }
            VotingAction::Vote { id } => Calls::vote(Votify::voteCall {
                _candidateId: U256::from(*id),
            }),
            VotingAction::ToggleVoting => Calls::toggleVoting(Votify::toggleVotingCall {}),
        };
        let prepared = PreparedCall::new(call);
        Ok(prepared)
    }
}

impl fmt::Display for VotingSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Voting:   {}",
            if self.voting_open { "Open" } else { "Closed" }
        )?;
        match self.voted_candidate() {
            Some(c) => writeln!(f, "You voted for #{} {}", c.id, c.name)?,
            None if self.caller_has_voted => writeln!(f, "You have already voted")?,
            None => writeln!(f, "You have not voted yet")?,
        }
        let mut active = self.active_candidates().peekable();
        if active.peek().is_none() {
            return write!(f, "No candidates yet");
        }
        write!(f, "Candidates:")?;
        for c in active {
            let marker = if self.caller_has_voted && c.id == self.caller_voted_candidate_id {
                "*"
            } else {
                " "
            };
            write!(f, "\n {marker} #{:<4} {:<24} {:>6} votes", c.id, c.name, c.vote_count)?;
            if !c.description.is_empty() {
                write!(f, "  {}", c.description)?;
            }
        }
        Ok(())
    }
}
