use thiserror::Error;

/// Everything that can go wrong between the user, the wallet and the chain.
///
/// Chain-originated messages are carried verbatim so revert reasons such as
/// "You have already voted" reach the user unchanged.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("no wallet available: configure at least one signer key")]
    NoWallet,

    #[error("request rejected: {0}")]
    UserRejected(String),

    #[error("wallet is not connected")]
    NotConnected,

    #[error("execution reverted: {0}")]
    ExecutionReverted(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("another action is already in progress")]
    ActionInProgress,

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("failed to connect wallet: {0}")]
    Connection(String),

    #[error("failed to decode result of `{function}`: {reason}")]
    Decode { function: &'static str, reason: String },

    #[error("configuration error: {0}")]
    Config(String),
}

impl ClientError {
    /// Errors raised by the chain or the wallet, as opposed to local checks.
    pub fn is_chain_error(&self) -> bool {
        matches!(
            self,
            ClientError::UserRejected(_)
                | ClientError::ExecutionReverted(_)
                | ClientError::Network(_)
                | ClientError::Decode { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
