use std::marker::PhantomData;
use std::sync::Arc;

use alloy::primitives::{Address, Bytes, TxHash, U256};
use alloy::sol_types::{SolCall, SolInterface};
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::data::provider::{CallRequest, ChainTransport, Confirmation};
use crate::error::{ClientError, Result};

/// A write ready to be signed: one call of interface `I` plus attached ether.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedCall<I> {
    pub call: I,
    pub value: U256,
}

impl<I> PreparedCall<I> {
    pub fn new(call: I) -> Self {
        Self {
            call,
            value: U256::ZERO,
        }
    }

    pub fn with_value(call: I, value: U256) -> Self {
        Self { call, value }
    }
}

/// Reference to a transaction the node accepted but that may not be mined yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTransaction {
    pub tx_hash: TxHash,
    pub from: Address,
    pub submitted_at: DateTime<Utc>,
}

/// Typed handle on one deployed contract.
///
/// `I` is the `sol!`-generated calls enum of the contract's interface, so only
/// functions the interface declares can go through the handle. The signer is
/// fixed at construction; a session change builds a new gateway.
pub struct ContractGateway<I> {
    address: Address,
    signer: Option<Address>,
    transport: Arc<dyn ChainTransport>,
    _interface: PhantomData<fn() -> I>,
}

impl<I> Clone for ContractGateway<I> {
    fn clone(&self) -> Self {
        Self {
            address: self.address,
            signer: self.signer,
            transport: Arc::clone(&self.transport),
            _interface: PhantomData,
        }
    }
}

impl<I: SolInterface> ContractGateway<I> {
    pub fn bind(
        address: Address,
        transport: Arc<dyn ChainTransport>,
        signer: Option<Address>,
    ) -> Self {
        Self {
            address,
            signer,
            transport,
            _interface: PhantomData,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn signer(&self) -> Option<Address> {
        self.signer
    }

    /// Issue a view call and decode its return values.
    pub async fn read<C>(&self, call: C) -> Result<C::Return>
    where
        C: SolCall,
    {
        let request = CallRequest {
            from: self.signer,
            to: self.address,
            input: Bytes::from(call.abi_encode()),
            value: U256::ZERO,
        };
        debug!(interface = I::NAME, function = C::SIGNATURE, "read");
        let output = self.transport.call(request).await?;
        C::abi_decode_returns(&output, true).map_err(|e| ClientError::Decode {
            function: C::SIGNATURE,
            reason: e.to_string(),
        })
    }

    /// Sign and send a state-changing call from the bound session account.
    ///
    /// Returns as soon as the node accepts the transaction; use [`confirm`]
    /// to wait for inclusion.
    ///
    /// [`confirm`]: ContractGateway::confirm
    pub async fn write(&self, prepared: PreparedCall<I>) -> Result<PendingTransaction> {
        let from = self.signer.ok_or(ClientError::NotConnected)?;
        let request = CallRequest {
            from: Some(from),
            to: self.address,
            input: Bytes::from(prepared.call.abi_encode()),
            value: prepared.value,
        };
        let tx_hash = self.transport.send_transaction(request).await?;
        info!(interface = I::NAME, %tx_hash, %from, "transaction submitted");
        Ok(PendingTransaction {
            tx_hash,
            from,
            submitted_at: Utc::now(),
        })
    }

    /// Block until the pending transaction has one confirmation.
    pub async fn confirm(&self, pending: &PendingTransaction) -> Result<Confirmation> {
        let confirmation = self.transport.wait_for_confirmation(pending.tx_hash).await?;
        info!(
            tx_hash = %confirmation.tx_hash,
            block = ?confirmation.block_number,
            gas_used = confirmation.gas_used,
            "transaction confirmed"
        );
        Ok(confirmation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::contracts::Votify;
    use crate::testing::SimulatedChain;

    #[tokio::test]
    async fn test_read_decodes_return() {
        let chain = SimulatedChain::new();
        let owner = Address::repeat_byte(0x0a);
        let contract = chain.deploy_voting(owner);
        let gateway: ContractGateway<Votify::VotifyCalls> =
            ContractGateway::bind(contract, chain.clone(), None);

        let result = gateway.read(Votify::ownerCall {}).await.unwrap();
        assert_eq!(result._0, owner);
    }

    #[tokio::test]
    async fn test_write_without_signer_is_not_connected() {
        let chain = SimulatedChain::new();
        let contract = chain.deploy_voting(Address::repeat_byte(0x0a));
        let gateway: ContractGateway<Votify::VotifyCalls> =
            ContractGateway::bind(contract, chain.clone(), None);

        let err = gateway
            .write(PreparedCall::new(Votify::VotifyCalls::toggleVoting(
                Votify::toggleVotingCall {},
            )))
            .await
            .unwrap_err();
        assert_eq!(err, ClientError::NotConnected);
        assert_eq!(chain.sent_transactions(), 0);
    }

    #[tokio::test]
    async fn test_write_then_confirm() {
        let chain = SimulatedChain::new();
        let owner = Address::repeat_byte(0x0a);
        let contract = chain.deploy_voting(owner);
        let gateway: ContractGateway<Votify::VotifyCalls> =
            ContractGateway::bind(contract, chain.clone(), Some(owner));

        let pending = gateway
            .write(PreparedCall::new(Votify::VotifyCalls::toggleVoting(
                Votify::toggleVotingCall {},
            )))
            .await
            .unwrap();
        assert_eq!(pending.from, owner);

        // Not applied until confirmed.
        assert!(!gateway.read(Votify::votingOpenCall {}).await.unwrap()._0);
        let confirmation = gateway.confirm(&pending).await.unwrap();
        assert_eq!(confirmation.tx_hash, pending.tx_hash);
        assert!(gateway.read(Votify::votingOpenCall {}).await.unwrap()._0);
    }

    #[tokio::test]
    async fn test_read_failure_surfaces_network_error() {
        let chain = SimulatedChain::new();
        let contract = chain.deploy_voting(Address::repeat_byte(0x0a));
        chain.fail_reads(true);
        let gateway: ContractGateway<Votify::VotifyCalls> =
            ContractGateway::bind(contract, chain.clone(), None);

        let err = gateway.read(Votify::votingOpenCall {}).await.unwrap_err();
        assert!(matches!(err, ClientError::Network(_)));
    }
}
