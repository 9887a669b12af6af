use std::time::Duration;

use alloy::network::EthereumWallet;
use alloy::primitives::{Address, Bytes, TxHash, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::transports::{RpcError, TransportError};
use async_trait::async_trait;
use tracing::{debug, trace};

use crate::error::{ClientError, Result};

/// JSON-RPC error code wallets use when the user declines a request (EIP-1193).
const USER_REJECTED_CODE: i64 = 4001;
/// JSON-RPC error code nodes use for `execution reverted`.
const EXECUTION_REVERTED_CODE: i64 = 3;

/// A contract call as the client sees it, before the provider fills gas and nonce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRequest {
    pub from: Option<Address>,
    pub to: Address,
    pub input: Bytes,
    pub value: U256,
}

impl CallRequest {
    fn into_transaction(self) -> TransactionRequest {
        let mut tx = TransactionRequest::default()
            .to(self.to)
            .input(self.input.into());
        if let Some(from) = self.from {
            tx = tx.from(from);
        }
        if !self.value.is_zero() {
            tx = tx.value(self.value);
        }
        tx
    }
}

/// Inclusion of a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    pub tx_hash: TxHash,
    pub block_number: Option<u64>,
    pub gas_used: u64,
}

/// The chain as reached through the wallet: view calls, signed sends and receipts.
#[async_trait]
pub trait ChainTransport: Send + Sync {
    /// Execute a view call against the latest block.
    async fn call(&self, request: CallRequest) -> Result<Bytes>;

    /// Sign and broadcast a transaction, returning its hash once the node accepts it.
    async fn send_transaction(&self, request: CallRequest) -> Result<TxHash>;

    /// Wait until the transaction is included in a block.
    async fn wait_for_confirmation(&self, tx_hash: TxHash) -> Result<Confirmation>;
}

/// HTTP JSON-RPC provider with a local wallet filler for signing.
pub struct EthProvider {
    provider: Box<dyn Provider + Send + Sync>,
    chain_id: u64,
    poll_interval: Duration,
}

impl EthProvider {
    /// Connect to a node via HTTP RPC; transactions are signed by `wallet`.
    pub async fn connect(
        rpc_url: &str,
        wallet: EthereumWallet,
        poll_interval: Duration,
    ) -> Result<Self> {
        let url: reqwest::Url = rpc_url
            .parse()
            .map_err(|e| ClientError::Config(format!("invalid RPC url {rpc_url}: {e}")))?;
        let provider = ProviderBuilder::new().wallet(wallet).on_http(url);
        let chain_id = provider
            .get_chain_id()
            .await
            .map_err(|e| ClientError::Connection(e.to_string()))?;
        debug!(chain_id, rpc_url, "connected to node");
        Ok(Self {
            provider: Box::new(provider),
            chain_id,
            poll_interval,
        })
    }

    /// Return the chain ID obtained at connection time.
    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }
}

#[async_trait]
impl ChainTransport for EthProvider {
    async fn call(&self, request: CallRequest) -> Result<Bytes> {
        let output = self
            .provider
            .call(request.into_transaction())
            .await
            .map_err(classify_transport_error)?;
        Ok(output)
    }

    async fn send_transaction(&self, request: CallRequest) -> Result<TxHash> {
        let pending = self
            .provider
            .send_transaction(request.into_transaction())
            .await
            .map_err(classify_transport_error)?;
        Ok(*pending.tx_hash())
    }

    async fn wait_for_confirmation(&self, tx_hash: TxHash) -> Result<Confirmation> {
        loop {
            let receipt = self
                .provider
                .get_transaction_receipt(tx_hash)
                .await
                .map_err(classify_transport_error)?;

            match receipt {
                Some(receipt) if receipt.status() => {
                    return Ok(Confirmation {
                        tx_hash,
                        block_number: receipt.block_number,
                        gas_used: receipt.gas_used,
                    });
                }
                Some(_) => {
                    return Err(ClientError::ExecutionReverted(format!(
                        "transaction {tx_hash} reverted"
                    )));
                }
                None => {
                    trace!(%tx_hash, "receipt not available yet");
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
    }
}

/// Map a JSON-RPC failure onto the client taxonomy.
pub fn classify_transport_error(err: TransportError) -> ClientError {
    match err {
        RpcError::ErrorResp(payload) => {
            classify_rpc_error(payload.code, payload.message.as_ref())
        }
        RpcError::LocalUsageError(e) => ClientError::UserRejected(e.to_string()),
        other => ClientError::Network(other.to_string()),
    }
}

fn classify_rpc_error(code: i64, message: &str) -> ClientError {
    let lower = message.to_lowercase();
    if code == USER_REJECTED_CODE || lower.contains("user rejected") || lower.contains("user denied")
    {
        ClientError::UserRejected(message.to_string())
    } else if code == EXECUTION_REVERTED_CODE
        || lower.contains("revert")
        || lower.contains("insufficient funds")
    {
        let reason = message
            .strip_prefix("execution reverted: ")
            .unwrap_or(message);
        ClientError::ExecutionReverted(reason.to_string())
    } else {
        ClientError::Network(format!("{message} (code {code})"))
    }
}
