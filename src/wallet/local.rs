use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use alloy::network::EthereumWallet;
use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::info;

use crate::data::provider::{ChainTransport, EthProvider};
use crate::error::{ClientError, Result};
use crate::wallet::{notification_stream, AccountChanges, WalletProvider};

const NOTIFICATION_CAPACITY: usize = 16;

/// Wallet backed by private keys held in process memory.
///
/// One key is the selected account. Selecting another key or locking the
/// wallet notifies subscribers, like a browser wallet's `accountsChanged`.
pub struct LocalWallet {
    accounts: Vec<Address>,
    selected: Mutex<Option<usize>>,
    notifier: broadcast::Sender<Vec<Address>>,
    transport: Arc<dyn ChainTransport>,
    chain_id: Option<u64>,
}

impl LocalWallet {
    pub fn new(accounts: Vec<Address>, transport: Arc<dyn ChainTransport>) -> Result<Self> {
        if accounts.is_empty() {
            return Err(ClientError::NoWallet);
        }
        let (notifier, _) = broadcast::channel(NOTIFICATION_CAPACITY);
        Ok(Self {
            accounts,
            selected: Mutex::new(Some(0)),
            notifier,
            transport,
            chain_id: None,
        })
    }

    /// Parse hex private keys and connect a signing provider to `rpc_url`.
    pub async fn from_keys(
        rpc_url: &str,
        keys: &[String],
        poll_interval: Duration,
    ) -> Result<Self> {
        let signers = keys
            .iter()
            .enumerate()
            .map(|(i, key)| {
                key.trim()
                    .parse::<PrivateKeySigner>()
                    .map_err(|e| ClientError::Config(format!("private key #{}: {e}", i + 1)))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut signers = signers.into_iter();
        let first = signers.next().ok_or(ClientError::NoWallet)?;
        let mut accounts = vec![first.address()];
        let mut wallet = EthereumWallet::new(first);
        for signer in signers {
            accounts.push(signer.address());
            wallet.register_signer(signer);
        }

        let provider = EthProvider::connect(rpc_url, wallet, poll_interval).await?;
        let chain_id = provider.chain_id();
        info!(chain_id, accounts = accounts.len(), "wallet ready");
        let mut local = Self::new(accounts, Arc::new(provider))?;
        local.chain_id = Some(chain_id);
        Ok(local)
    }

    /// Chain id reported by the node at connect time.
    pub fn chain_id(&self) -> Option<u64> {
        self.chain_id
    }

    pub fn accounts(&self) -> &[Address] {
        &self.accounts
    }

    /// The currently selected account, `None` while locked.
    pub fn selected(&self) -> Option<Address> {
        let selected = self.selected.lock().unwrap_or_else(PoisonError::into_inner);
        selected.map(|i| self.accounts[i])
    }

    /// Switch the selected account and notify subscribers.
    pub fn select(&self, index: usize) -> Result<Address> {
        let account = *self.accounts.get(index).ok_or_else(|| {
            ClientError::Validation(format!(
                "account index {index} out of range (wallet has {})",
                self.accounts.len()
            ))
        })?;
        *self.selected.lock().unwrap_or_else(PoisonError::into_inner) = Some(index);
        let _ = self.notifier.send(self.ordered_accounts(index));
        Ok(account)
    }

    /// Revoke account access; subscribers receive an empty list.
    pub fn lock(&self) {
        *self.selected.lock().unwrap_or_else(PoisonError::into_inner) = None;
        let _ = self.notifier.send(Vec::new());
    }

    /// All accounts with the selected one first.
    fn ordered_accounts(&self, selected: usize) -> Vec<Address> {
        let mut ordered = Vec::with_capacity(self.accounts.len());
        ordered.push(self.accounts[selected]);
        ordered.extend(
            self.accounts
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != selected)
                .map(|(_, a)| *a),
        );
        ordered
    }
}

#[async_trait]
impl WalletProvider for LocalWallet {
    async fn request_accounts(&self) -> Result<Vec<Address>> {
        // Requesting access on a locked wallet unlocks the first key.
        let index = {
            let mut selected = self.selected.lock().unwrap_or_else(PoisonError::into_inner);
            *selected.get_or_insert(0)
        };
        Ok(self.ordered_accounts(index))
    }

    fn transport(&self) -> Arc<dyn ChainTransport> {
        Arc::clone(&self.transport)
    }

    fn account_changes(&self) -> AccountChanges {
        notification_stream(self.notifier.subscribe())
    }
}
