//! In-memory chain and wallet for tests.
//!
//! `SimulatedChain` decodes calldata with the same `sol!` bindings the client
//! uses and reproduces the observable behaviour of both contracts, including
//! their revert messages. State changes happen only when a transaction is
//! confirmed, so reads issued between submission and confirmation still see
//! the old state.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use alloy::primitives::{keccak256, Address, Bytes, TxHash, U256};
use alloy::sol_types::{SolCall, SolInterface};
use async_trait::async_trait;
use tokio::sync::{broadcast, watch};

use crate::data::contracts::{CharityDonation, Votify};
use crate::data::provider::{CallRequest, ChainTransport, Confirmation};
use crate::error::{ClientError, Result};
use crate::wallet::{notification_stream, AccountChanges, WalletProvider};

const BLOCK_TIME: u64 = 12;
const GENESIS_TIMESTAMP: u64 = 1_700_000_000;

#[derive(Clone)]
struct DonationContract {
    charity: Address,
    donations: Vec<CharityDonation::Donation>,
    total: U256,
    contributions: HashMap<Address, U256>,
}

#[derive(Clone)]
struct VotingContract {
    owner: Address,
    candidates: Vec<Votify::Candidate>,
    open: bool,
    voters: HashMap<Address, U256>,
}

#[derive(Clone, Default)]
struct ChainState {
    balances: HashMap<Address, U256>,
    donation: HashMap<Address, DonationContract>,
    voting: HashMap<Address, VotingContract>,
    pending: HashMap<TxHash, CallRequest>,
    deployed: u8,
    nonce: u64,
    block: u64,
    timestamp: u64,
}

type Revert = std::result::Result<Vec<u8>, String>;

impl ChainState {
    /// Execute on a copy; the copy is returned only if execution succeeded.
    fn run(&self, from: Address, to: Address, input: &[u8], value: U256) -> std::result::Result<(ChainState, Vec<u8>), String> {
        let mut next = self.clone();
        let output = next.apply(from, to, input, value)?;
        Ok((next, output))
    }

    fn apply(&mut self, from: Address, to: Address, input: &[u8], value: U256) -> Revert {
        if !value.is_zero() {
            let balance = self.balances.get(&from).copied().unwrap_or_default();
            if balance < value {
                return Err("insufficient funds for gas * price + value".to_string());
            }
            self.transfer(from, to, value);
        }

        if self.donation.contains_key(&to) {
            self.apply_donation(from, to, input, value)
        } else if self.voting.contains_key(&to) {
            if !value.is_zero() {
                return Err("function is not payable".to_string());
            }
            self.apply_voting(from, to, input)
        } else {
            Ok(Vec::new())
        }
    }

    fn transfer(&mut self, from: Address, to: Address, amount: U256) {
        *self.balances.entry(from).or_default() -= amount;
        *self.balances.entry(to).or_default() += amount;
    }

    fn apply_donation(&mut self, from: Address, to: Address, input: &[u8], value: U256) -> Revert {
        use CharityDonation::CharityDonationCalls as Call;

        let call = Call::abi_decode(input, true).map_err(|e| e.to_string())?;
        if !value.is_zero() && !matches!(call, Call::donate(_)) {
            return Err("function is not payable".to_string());
        }
        let balance = self.balances.get(&to).copied().unwrap_or_default();
        let timestamp = self.timestamp;
        let Some(contract) = self.donation.get_mut(&to) else {
            return Ok(Vec::new());
        };

        match call {
            Call::donate(_) => {
                if value.is_zero() {
                    return Err("Donation amount must be greater than 0".to_string());
                }
                contract.donations.push(CharityDonation::Donation {
                    donor: from,
                    amount: value,
                    timestamp: U256::from(timestamp),
                });
                contract.total += value;
                *contract.contributions.entry(from).or_default() += value;
                Ok(Vec::new())
            }
            Call::withdrawFunds(_) => {
                if from != contract.charity {
                    return Err("Only charity can withdraw".to_string());
                }
                if balance.is_zero() {
                    return Err("No funds to withdraw".to_string());
                }
                let charity = contract.charity;
                self.transfer(to, charity, balance);
                Ok(Vec::new())
            }
            Call::withdrawAmount(c) => {
                if from != contract.charity {
                    return Err("Only charity can withdraw".to_string());
                }
                if c._amount.is_zero() {
                    return Err("Amount must be greater than 0".to_string());
                }
                if c._amount > balance {
                    return Err("Insufficient balance".to_string());
                }
                let charity = contract.charity;
                self.transfer(to, charity, c._amount);
                Ok(Vec::new())
            }
            Call::updateCharityAddress(c) => {
                if from != contract.charity {
                    return Err("Only charity can update address".to_string());
                }
                if c._newCharityAddress == Address::ZERO {
                    return Err("Invalid address".to_string());
                }
                contract.charity = c._newCharityAddress;
                Ok(Vec::new())
            }
            Call::getContractBalance(_) => {
                Ok(CharityDonation::getContractBalanceCall::abi_encode_returns(&(balance,)))
            }
            Call::getTotalDonations(_) => Ok(CharityDonation::getTotalDonationsCall::abi_encode_returns(
                &(U256::from(contract.donations.len()),),
            )),
            Call::getAllDonations(_) => Ok(CharityDonation::getAllDonationsCall::abi_encode_returns(
                &(contract.donations.clone(),),
            )),
            Call::getDonorContribution(c) => {
                let amount = contract.contributions.get(&c._donor).copied().unwrap_or_default();
                Ok(CharityDonation::getDonorContributionCall::abi_encode_returns(&(amount,)))
            }
            Call::charityAddress(_) => Ok(CharityDonation::charityAddressCall::abi_encode_returns(
                &(contract.charity,),
            )),
            Call::totalDonations(_) => Ok(CharityDonation::totalDonationsCall::abi_encode_returns(
                &(contract.total,),
            )),
        }
    }

    fn apply_voting(&mut self, from: Address, to: Address, input: &[u8]) -> Revert {
        use Votify::VotifyCalls as Call;

        let call = Call::abi_decode(input, true).map_err(|e| e.to_string())?;
        let Some(contract) = self.voting.get_mut(&to) else {
            return Ok(Vec::new());
        };
        let only_owner = |contract: &VotingContract| {
            if from == contract.owner {
                Ok(())
            } else {
                Err("Only owner can perform this action".to_string())
            }
        };

        match call {
            Call::addCandidate(c) => {
                only_owner(contract)?;
                let id = U256::from(contract.candidates.len() + 1);
                contract.candidates.push(Votify::Candidate {
                    id,
                    name: c._name,
                    description: c._description,
                    voteCount: U256::ZERO,
                    exists: true,
                });
                Ok(Vec::new())
            }
            Call::updateCandidate(c) => {
                only_owner(contract)?;
                let candidate = existing(contract, c._candidateId)?;
                candidate.name = c._name;
                candidate.description = c._description;
                Ok(Vec::new())
            }
            Call::removeCandidate(c) => {
                only_owner(contract)?;
                existing(contract, c._candidateId)?.exists = false;
                Ok(Vec::new())
            }
            Call::vote(c) => {
                if !contract.open {
                    return Err("Voting is closed".to_string());
                }
                if contract.voters.contains_key(&from) {
                    return Err("You have already voted".to_string());
                }
                let candidate = existing(contract, c._candidateId)
                    .map_err(|_| "Invalid candidate".to_string())?;
                candidate.voteCount += U256::from(1u64);
                contract.voters.insert(from, c._candidateId);
                Ok(Vec::new())
            }
            Call::toggleVoting(_) => {
                only_owner(contract)?;
                contract.open = !contract.open;
                Ok(Vec::new())
            }
            Call::owner(_) => Ok(Votify::ownerCall::abi_encode_returns(&(contract.owner,))),
            Call::candidatesCount(_) => Ok(Votify::candidatesCountCall::abi_encode_returns(&(
                U256::from(contract.candidates.len()),
            ))),
            Call::votingOpen(_) => Ok(Votify::votingOpenCall::abi_encode_returns(&(contract.open,))),
            Call::getAllCandidates(_) => Ok(Votify::getAllCandidatesCall::abi_encode_returns(&(
                contract.candidates.clone(),
            ))),
            Call::hasVoted(c) => Ok(Votify::hasVotedCall::abi_encode_returns(&(
                contract.voters.contains_key(&c._voter),
            ))),
            Call::getVoterDetails(c) => {
                let details = match contract.voters.get(&c._voter) {
                    Some(id) => (true, *id),
                    None => (false, U256::ZERO),
                };
                Ok(Votify::getVoterDetailsCall::abi_encode_returns(&details))
            }
        }
    }
}

fn existing(contract: &mut VotingContract, id: U256) -> std::result::Result<&mut Votify::Candidate, String> {
    contract
        .candidates
        .iter_mut()
        .find(|c| c.id == id && c.exists)
        .ok_or_else(|| "Candidate does not exist".to_string())
}

async fn wait_released(flag: &watch::Sender<bool>) {
    let mut rx = flag.subscribe();
    loop {
        let held = *rx.borrow_and_update();
        if !held {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}

async fn wait_caller_released(held: &watch::Sender<Vec<Address>>, caller: Address) {
    let mut rx = held.subscribe();
    loop {
        if !rx.borrow_and_update().contains(&caller) {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}

pub struct SimulatedChain {
    state: Mutex<ChainState>,
    sent: AtomicUsize,
    view_calls: AtomicUsize,
    fail_reads: AtomicBool,
    revert_on_confirmation: AtomicBool,
    hold_reads: watch::Sender<bool>,
    held_callers: watch::Sender<Vec<Address>>,
    hold_confirmations: watch::Sender<bool>,
}

impl SimulatedChain {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(ChainState {
                timestamp: GENESIS_TIMESTAMP,
                ..ChainState::default()
            }),
            sent: AtomicUsize::new(0),
            view_calls: AtomicUsize::new(0),
            fail_reads: AtomicBool::new(false),
            revert_on_confirmation: AtomicBool::new(false),
            hold_reads: watch::Sender::new(false),
            held_callers: watch::Sender::new(Vec::new()),
            hold_confirmations: watch::Sender::new(false),
        })
    }

    fn lock(&self) -> MutexGuard<'_, ChainState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_contract_address(state: &mut ChainState) -> Address {
        state.deployed += 1;
        Address::with_last_byte(0x10 + state.deployed)
    }

    pub fn deploy_donation(&self, charity: Address) -> Address {
        let mut state = self.lock();
        let address = Self::next_contract_address(&mut state);
        state.donation.insert(
            address,
            DonationContract {
                charity,
                donations: Vec::new(),
                total: U256::ZERO,
                contributions: HashMap::new(),
            },
        );
        address
    }

    pub fn deploy_voting(&self, owner: Address) -> Address {
        let mut state = self.lock();
        let address = Self::next_contract_address(&mut state);
        state.voting.insert(
            address,
            VotingContract {
                owner,
                candidates: Vec::new(),
                open: false,
                voters: HashMap::new(),
            },
        );
        address
    }

    /// Add a candidate with a preset vote count, bypassing access checks.
    pub fn seed_candidate(&self, contract: Address, name: &str, votes: u64) {
        let mut state = self.lock();
        if let Some(voting) = state.voting.get_mut(&contract) {
            let id = U256::from(voting.candidates.len() + 1);
            voting.candidates.push(Votify::Candidate {
                id,
                name: name.to_string(),
                description: String::new(),
                voteCount: U256::from(votes),
                exists: true,
            });
        }
    }

    pub fn set_voting_open(&self, contract: Address, open: bool) {
        if let Some(voting) = self.lock().voting.get_mut(&contract) {
            voting.open = open;
        }
    }

    pub fn fund(&self, account: Address, amount: U256) {
        *self.lock().balances.entry(account).or_default() += amount;
    }

    pub fn balance(&self, account: Address) -> U256 {
        self.lock().balances.get(&account).copied().unwrap_or_default()
    }

    pub fn sent_transactions(&self) -> usize {
        self.sent.load(Ordering::SeqCst)
    }

    pub fn view_calls(&self) -> usize {
        self.view_calls.load(Ordering::SeqCst)
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn revert_on_confirmation(&self, revert: bool) {
        self.revert_on_confirmation.store(revert, Ordering::SeqCst);
    }

    pub fn hold_reads(&self, hold: bool) {
        self.hold_reads.send_replace(hold);
    }

    /// Hold only the reads issued on behalf of `caller`.
    pub fn hold_reads_from(&self, caller: Address, hold: bool) {
        self.held_callers.send_modify(|held| {
            held.retain(|a| *a != caller);
            if hold {
                held.push(caller);
            }
        });
    }

    pub fn hold_confirmations(&self, hold: bool) {
        self.hold_confirmations.send_replace(hold);
    }
}

#[async_trait]
impl ChainTransport for SimulatedChain {
    async fn call(&self, request: CallRequest) -> Result<Bytes> {
        self.view_calls.fetch_add(1, Ordering::SeqCst);
        wait_released(&self.hold_reads).await;
        wait_caller_released(&self.held_callers, request.from.unwrap_or_default()).await;
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(ClientError::Network("simulated node unavailable".to_string()));
        }
        let state = self.lock();
        let (_, output) = state
            .run(
                request.from.unwrap_or_default(),
                request.to,
                &request.input,
                request.value,
            )
            .map_err(ClientError::ExecutionReverted)?;
        Ok(Bytes::from(output))
    }

    async fn send_transaction(&self, request: CallRequest) -> Result<TxHash> {
        let from = request.from.ok_or(ClientError::NotConnected)?;
        let mut state = self.lock();
        // Nodes estimate gas before accepting, which surfaces reverts here.
        state
            .run(from, request.to, &request.input, request.value)
            .map_err(ClientError::ExecutionReverted)?;
        state.nonce += 1;
        let tx_hash = keccak256(state.nonce.to_be_bytes());
        state.pending.insert(tx_hash, request);
        self.sent.fetch_add(1, Ordering::SeqCst);
        Ok(tx_hash)
    }

    async fn wait_for_confirmation(&self, tx_hash: TxHash) -> Result<Confirmation> {
        wait_released(&self.hold_confirmations).await;
        let mut state = self.lock();
        let request = state
            .pending
            .remove(&tx_hash)
            .ok_or_else(|| ClientError::Network(format!("unknown transaction {tx_hash}")))?;
        if self.revert_on_confirmation.load(Ordering::SeqCst) {
            return Err(ClientError::ExecutionReverted(format!(
                "transaction {tx_hash} reverted"
            )));
        }
        let from = request.from.unwrap_or_default();
        let (mut next, _) = state
            .run(from, request.to, &request.input, request.value)
            .map_err(ClientError::ExecutionReverted)?;
        next.block += 1;
        next.timestamp += BLOCK_TIME;
        let block_number = next.block;
        *state = next;
        Ok(Confirmation {
            tx_hash,
            block_number: Some(block_number),
            gas_used: 21_000,
        })
    }
}

/// Signs through the simulated chain unless the user "declines".
struct SigningTransport {
    chain: Arc<SimulatedChain>,
    reject: Arc<AtomicBool>,
}

#[async_trait]
impl ChainTransport for SigningTransport {
    async fn call(&self, request: CallRequest) -> Result<Bytes> {
        self.chain.call(request).await
    }

    async fn send_transaction(&self, request: CallRequest) -> Result<TxHash> {
        if self.reject.load(Ordering::SeqCst) {
            return Err(ClientError::UserRejected(
                "User denied transaction signature.".to_string(),
            ));
        }
        self.chain.send_transaction(request).await
    }

    async fn wait_for_confirmation(&self, tx_hash: TxHash) -> Result<Confirmation> {
        self.chain.wait_for_confirmation(tx_hash).await
    }
}

/// Scriptable wallet: accounts, rejections and account-change notifications.
pub struct TestWallet {
    accounts: Mutex<Vec<Address>>,
    reject: Arc<AtomicBool>,
    fail: AtomicBool,
    notifier: broadcast::Sender<Vec<Address>>,
    transport: Arc<SigningTransport>,
}

impl TestWallet {
    pub fn new(accounts: Vec<Address>) -> Arc<Self> {
        Self::with_transport(accounts, SimulatedChain::new())
    }

    pub fn with_transport(accounts: Vec<Address>, chain: Arc<SimulatedChain>) -> Arc<Self> {
        let reject = Arc::new(AtomicBool::new(false));
        let (notifier, _) = broadcast::channel(16);
        Arc::new(Self {
            accounts: Mutex::new(accounts),
            reject: Arc::clone(&reject),
            fail: AtomicBool::new(false),
            notifier,
            transport: Arc::new(SigningTransport { chain, reject }),
        })
    }

    /// Decline every account request and signature from now on.
    pub fn reject_requests(&self, reject: bool) {
        self.reject.store(reject, Ordering::SeqCst);
    }

    pub fn fail_requests(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Simulate the user switching or locking accounts.
    pub fn switch_accounts(&self, accounts: Vec<Address>) {
        *self.accounts.lock().unwrap_or_else(PoisonError::into_inner) = accounts.clone();
        let _ = self.notifier.send(accounts);
    }
}

#[async_trait]
impl WalletProvider for TestWallet {
    async fn request_accounts(&self) -> Result<Vec<Address>> {
        if self.reject.load(Ordering::SeqCst) {
            return Err(ClientError::UserRejected(
                "User rejected the request.".to_string(),
            ));
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(ClientError::Network("wallet provider unavailable".to_string()));
        }
        Ok(self
            .accounts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn transport(&self) -> Arc<dyn ChainTransport> {
        self.transport.clone()
    }

    fn account_changes(&self) -> AccountChanges {
        notification_stream(self.notifier.subscribe())
    }
}
