pub mod donation;
pub mod voting;

use std::fmt::Debug;
use std::sync::Arc;

use alloy::primitives::Address;
use alloy::sol_types::SolInterface;
use async_trait::async_trait;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};

use crate::data::gateway::{ContractGateway, PreparedCall};
use crate::data::provider::Confirmation;
use crate::data::types::{ActionStatus, PendingAction};
use crate::error::{ClientError, Result};
use crate::events::FlowEvent;
use crate::mirror::{RefreshOutcome, StateMirror};
use crate::session::{Session, SessionManager};
use crate::submitter::ActionSubmitter;
use crate::wallet::WalletProvider;

/// A user-initiated write, as typed by the user.
pub trait FlowAction: Debug + Send + Sync {
    /// Short stable name used in logs and events.
    fn kind(&self) -> &'static str;
}

/// What distinguishes one contract's flow from another.
#[async_trait]
pub trait FlowContract: Send + Sync + 'static {
    type Interface: SolInterface + Send + Sync + 'static;
    type Snapshot: Clone + Debug + Send + Sync + 'static;
    type Action: FlowAction;

    fn name(&self) -> &'static str;

    /// How the privileged account is labelled to the user.
    fn privileged_role(&self) -> &'static str;

    /// The account allowed to use the contract's administrative functions.
    async fn privileged_address(
        &self,
        gateway: &ContractGateway<Self::Interface>,
    ) -> Result<Address>;

    /// Issue the flow's full read batch for `account`.
    async fn fetch_snapshot(
        &self,
        gateway: &ContractGateway<Self::Interface>,
        account: Address,
    ) -> Result<Self::Snapshot>;

    /// Validate user input and build the contract call.
    fn prepare(&self, action: &Self::Action) -> Result<PreparedCall<Self::Interface>>;
}

/// One contract's client: session, gateway, mirrored state and submitter.
///
/// The mirror's epoch only changes while the gateway slot is write-locked, so
/// a gateway and an epoch read under one slot lock always belong to the same
/// account.
pub struct Flow<F: FlowContract> {
    contract: F,
    address: Address,
    sessions: SessionManager,
    gateway: RwLock<Option<ContractGateway<F::Interface>>>,
    mirror: StateMirror<F::Snapshot>,
    submitter: ActionSubmitter,
    events: mpsc::UnboundedSender<FlowEvent>,
}

impl<F: FlowContract> Flow<F> {
    pub fn new(
        contract: F,
        address: Address,
        wallet: Option<Arc<dyn WalletProvider>>,
        events: mpsc::UnboundedSender<FlowEvent>,
    ) -> Self {
        let submitter = ActionSubmitter::new(contract.name(), events.clone());
        Self {
            contract,
            address,
            sessions: SessionManager::new(wallet),
            gateway: RwLock::new(None),
            mirror: StateMirror::new(),
            submitter,
            events,
        }
    }

    pub fn name(&self) -> &'static str {
        self.contract.name()
    }

    pub fn privileged_role(&self) -> &'static str {
        self.contract.privileged_role()
    }

    pub fn contract_address(&self) -> Address {
        self.address
    }

    pub fn wallet(&self) -> Result<Arc<dyn WalletProvider>> {
        self.sessions.wallet().map(Arc::clone)
    }

    pub async fn session(&self) -> Option<Session> {
        self.sessions.current().await
    }

    pub async fn snapshot(&self) -> Option<F::Snapshot> {
        self.mirror.snapshot().await
    }

    pub fn status(&self) -> ActionStatus {
        self.submitter.status()
    }

    pub fn pending_action(&self) -> Option<PendingAction> {
        self.submitter.pending()
    }

    /// Request account access, bind the contract and load its state.
    pub async fn connect(&self) -> Result<Session> {
        let account = self.sessions.request_account().await?;
        let epoch = self.detach().await;
        self.complete_bind(account, epoch)
            .await?
            .ok_or_else(|| ClientError::Connection("account changed while connecting".to_string()))
    }

    /// Reload the mirrored state for the current session.
    pub async fn refresh(&self) -> Result<RefreshOutcome> {
        let (gateway, epoch) = {
            let slot = self.gateway.read().await;
            let Some(gateway) = slot.clone() else {
                return Err(ClientError::NotConnected);
            };
            (gateway, self.mirror.epoch().await)
        };
        let account = gateway.signer().ok_or(ClientError::NotConnected)?;

        let result = self
            .mirror
            .refresh_from(epoch, self.contract.fetch_snapshot(&gateway, account))
            .await;
        match &result {
            Ok(RefreshOutcome::Installed) => {
                self.emit(FlowEvent::SnapshotRefreshed {
                    flow: self.name(),
                    epoch,
                });
            }
            Ok(RefreshOutcome::Superseded) => {}
            Err(e) => self.emit(FlowEvent::RefreshFailed {
                flow: self.name(),
                reason: e.to_string(),
            }),
        }
        result
    }

    /// Submit a write and wait for it to be confirmed and mirrored.
    pub async fn submit(&self, action: F::Action) -> Result<Confirmation> {
        let gateway = self.gateway.read().await.clone();
        self.submitter
            .submit(
                action.kind(),
                format!("{action:?}"),
                || self.contract.prepare(&action),
                gateway,
                || self.refresh(),
            )
            .await
    }

    /// React to the wallet's account list changing.
    ///
    /// Returns `Ok(None)` when the wallet locked, or when another change
    /// superseded this one before the new account was bound.
    pub async fn handle_account_change(&self, accounts: &[Address]) -> Result<Option<Session>> {
        match accounts.first() {
            Some(&account) => {
                let epoch = self.begin_switch().await;
                self.complete_bind(account, epoch).await
            }
            None => {
                self.disconnect().await;
                Ok(None)
            }
        }
    }

    /// Forget the session and everything mirrored for it.
    pub async fn disconnect(&self) {
        self.detach().await;
        info!(flow = self.name(), "disconnected");
        self.emit(FlowEvent::SessionChanged {
            flow: self.name(),
            session: None,
        });
    }

    /// First half of an account switch: the previous identity is unusable
    /// once this returns. The epoch it returns is handed to `complete_bind`.
    pub(crate) async fn begin_switch(&self) -> u64 {
        let epoch = self.detach().await;
        self.emit(FlowEvent::SessionChanged {
            flow: self.name(),
            session: None,
        });
        epoch
    }

    /// Bind `account` unless the session changed again since `epoch`.
    pub(crate) async fn complete_bind(&self, account: Address, epoch: u64) -> Result<Option<Session>> {
        let transport = self.sessions.wallet()?.transport();
        let gateway = ContractGateway::bind(self.address, transport, Some(account));

        let privileged = match self.contract.privileged_address(&gateway).await {
            Ok(privileged) => privileged,
            Err(e) => {
                warn!(flow = self.name(), %account, error = %e, "could not read privileged address");
                return Err(e);
            }
        };

        let session = {
            let mut slot = self.gateway.write().await;
            if self.mirror.epoch().await != epoch {
                debug!(flow = self.name(), %account, "account changed again while binding");
                return Ok(None);
            }
            *slot = Some(gateway);
            self.sessions.establish(account, privileged).await
        };
        self.emit(FlowEvent::SessionChanged {
            flow: self.name(),
            session: Some(session.clone()),
        });

        if let Err(e) = self.refresh().await {
            warn!(flow = self.name(), error = %e, "initial state load failed");
        }
        Ok(Some(session))
    }

    pub(crate) fn report_error(&self, err: &ClientError) {
        self.emit(FlowEvent::Error(format!("{}: {err}", self.name())));
    }

    /// Drop the gateway, the session and the mirrored state together.
    async fn detach(&self) -> u64 {
        let mut slot = self.gateway.write().await;
        *slot = None;
        let epoch = self.mirror.reset().await;
        self.sessions.clear().await;
        epoch
    }

    fn emit(&self, event: FlowEvent) {
        let _ = self.events.send(event);
    }
}
