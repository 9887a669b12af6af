use std::path::PathBuf;
use std::time::Duration;

use alloy::primitives::Address;
use clap::{Parser, Subcommand};

use crate::data::chains::{get_chain_config, supported_chains};
use crate::data::types::ChainConfig;
use crate::error::{ClientError, Result};
use crate::flows::donation::DonationAction;
use crate::flows::voting::VotingAction;
use crate::utils::parse_address;

#[derive(Parser, Debug)]
#[command(
    name = "dapp-client",
    about = "Client for the CharityDonation and Votify contracts"
)]
pub struct Config {
    /// RPC endpoint URL; overrides the chain preset's endpoint
    #[arg(short, long, env = "RPC_URL")]
    pub rpc_url: Option<String>,

    /// Chain preset (sepolia, holesky, ethereum, local)
    #[arg(long, default_value = "sepolia")]
    pub chain: String,

    /// Hex private key of a wallet account; repeat or comma-separate for several
    #[arg(
        long = "private-key",
        env = "WALLET_PRIVATE_KEYS",
        value_delimiter = ',',
        hide_env_values = true
    )]
    pub private_keys: Vec<String>,

    /// Deployed CharityDonation contract
    #[arg(long, env = "CHARITY_CONTRACT_ADDRESS")]
    pub charity_contract: Option<String>,

    /// Deployed Votify contract
    #[arg(long, env = "VOTING_CONTRACT_ADDRESS")]
    pub voting_contract: Option<String>,

    /// Receipt polling interval in milliseconds
    #[arg(long, default_value = "1000")]
    pub poll_interval_ms: u64,

    /// Print state and results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Charity donation tracker
    Donation {
        #[command(subcommand)]
        command: DonationCommand,
    },
    /// Votify voting registry
    Voting {
        #[command(subcommand)]
        command: VotingCommand,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum DonationCommand {
    /// Show balances, totals and donation history
    Status,
    /// Donate an amount of ether
    Donate { amount: String },
    /// Withdraw the whole balance (charity only)
    WithdrawAll,
    /// Withdraw part of the balance (charity only)
    Withdraw { amount: String },
    /// Hand the charity role to another address (charity only)
    UpdateCharity { address: String },
    /// Write the donation history to a file
    Export {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Follow account changes and flow events until interrupted
    Watch,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum VotingCommand {
    /// Show candidates, voting state and your vote
    Status,
    /// Add a candidate (owner only)
    Add {
        name: String,
        description: Option<String>,
    },
    /// Rename or redescribe a candidate (owner only)
    Update {
        id: u64,
        name: String,
        description: Option<String>,
    },
    /// Remove a candidate (owner only)
    Remove { id: u64 },
    /// Vote for a candidate
    Vote { id: u64 },
    /// Open or close voting (owner only)
    Toggle,
    /// Write the candidate list to a file
    Export {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Follow account changes and flow events until interrupted
    Watch,
}

/// What a flow command asks the client to do once connected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step<A> {
    Status,
    Act(A),
    Export(PathBuf),
    Watch,
}

impl DonationCommand {
    pub fn into_step(self) -> Step<DonationAction> {
        match self {
            DonationCommand::Status => Step::Status,
            DonationCommand::Donate { amount } => Step::Act(DonationAction::Donate { amount }),
            DonationCommand::WithdrawAll => Step::Act(DonationAction::WithdrawAll),
            DonationCommand::Withdraw { amount } => {
                Step::Act(DonationAction::WithdrawAmount { amount })
            }
            DonationCommand::UpdateCharity { address } => {
                Step::Act(DonationAction::UpdateCharityAddress { address })
            }
            DonationCommand::Export { csv } => Step::Export(csv),
            DonationCommand::Watch => Step::Watch,
        }
    }
}

impl VotingCommand {
    pub fn into_step(self) -> Step<VotingAction> {
        match self {
            VotingCommand::Status => Step::Status,
            VotingCommand::Add { name, description } => Step::Act(VotingAction::AddCandidate {
                name,
                description: description.unwrap_or_default(),
            }),
            VotingCommand::Update {
                id,
                name,
                description,
            } => Step::Act(VotingAction::UpdateCandidate {
                id,
                name,
                description: description.unwrap_or_default(),
            }),
            VotingCommand::Remove { id } => Step::Act(VotingAction::RemoveCandidate { id }),
            VotingCommand::Vote { id } => Step::Act(VotingAction::Vote { id }),
            VotingCommand::Toggle => Step::Act(VotingAction::ToggleVoting),
            VotingCommand::Export { csv } => Step::Export(csv),
            VotingCommand::Watch => Step::Watch,
        }
    }
}

impl Config {
    /// The selected chain preset, if the name is known.
    pub fn chain_config(&self) -> Option<ChainConfig> {
        get_chain_config(&self.chain)
    }

    /// An explicit `--rpc-url` wins over the preset's endpoint.
    pub fn resolve_rpc_url(&self) -> Result<String> {
        if let Some(url) = &self.rpc_url {
            return Ok(url.clone());
        }
        self.chain_config().map(|c| c.rpc_url).ok_or_else(|| {
            ClientError::Config(format!(
                "unknown chain {:?} (expected one of {}) and no --rpc-url given",
                self.chain,
                supported_chains().join(", ")
            ))
        })
    }

    pub fn charity_address(&self) -> Result<Address> {
        contract_address(self.charity_contract.as_deref(), "CHARITY_CONTRACT_ADDRESS")
    }

    pub fn voting_address(&self) -> Result<Address> {
        contract_address(self.voting_contract.as_deref(), "VOTING_CONTRACT_ADDRESS")
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

/// A contract address is required configuration; anything else is a hard stop.
fn contract_address(value: Option<&str>, variable: &str) -> Result<Address> {
    let value = value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ClientError::Config(format!("{variable} is not set")))?;
    parse_address(value).map_err(|e| ClientError::Config(format!("{variable}: {e}")))
}
