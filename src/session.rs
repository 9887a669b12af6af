use std::sync::Arc;

use alloy::primitives::Address;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{ClientError, Result};
use crate::wallet::WalletProvider;

/// The account currently authorised to sign, and whether it is the contract's
/// privileged account (owner or charity).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub address: Address,
    pub is_privileged: bool,
}

impl Session {
    /// Build a session, comparing the account with the contract-reported
    /// privileged address. Both are parsed 20-byte values, so the hex casing
    /// (checksummed or not) the wallet or node used does not matter.
    pub fn new(address: Address, privileged: Address) -> Self {
        Self {
            address,
            is_privileged: address == privileged,
        }
    }
}

/// Owns the wallet handle and the current session.
pub struct SessionManager {
    wallet: Option<Arc<dyn WalletProvider>>,
    current: RwLock<Option<Session>>,
}

impl SessionManager {
    pub fn new(wallet: Option<Arc<dyn WalletProvider>>) -> Self {
        Self {
            wallet,
            current: RwLock::new(None),
        }
    }

    pub fn wallet(&self) -> Result<&Arc<dyn WalletProvider>> {
        self.wallet.as_ref().ok_or(ClientError::NoWallet)
    }

    /// Ask the wallet for account access and return the selected account.
    pub async fn request_account(&self) -> Result<Address> {
        let wallet = self.wallet()?;
        let accounts = wallet.request_accounts().await.map_err(|e| match e {
            ClientError::UserRejected(_) | ClientError::NoWallet => e,
            ClientError::Connection(_) => e,
            other => ClientError::Connection(other.to_string()),
        })?;
        let account = accounts.first().copied().ok_or_else(|| {
            ClientError::UserRejected("wallet returned no authorised account".to_string())
        })?;
        debug!(%account, "account access granted");
        Ok(account)
    }

    /// Replace the current session.
    pub async fn establish(&self, address: Address, privileged: Address) -> Session {
        let session = Session::new(address, privileged);
        info!(
            account = %session.address,
            privileged = session.is_privileged,
            "session established"
        );
        *self.current.write().await = Some(session.clone());
        session
    }

    pub async fn current(&self) -> Option<Session> {
        self.current.read().await.clone()
    }

    pub async fn clear(&self) {
        if self.current.write().await.take().is_some() {
            info!("session cleared");
        }
    }
}
