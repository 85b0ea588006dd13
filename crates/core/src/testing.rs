//! In-memory adapters and fixtures for service tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde_json::json;

use crate::error::{ChainError, ChainResult, StorageError, StorageResult};
use crate::models::{
    Account, AccountTx, Block, Delegation, DelegatorReward, HeightFacts, HistoryProposal, Jailer,
    MissedBlock, ParserCheckpoint, ProposalDeposit, ProposalVote, Transaction, Transfer,
    ValidatorReward, derived_id,
};
use crate::ports::{
    AccountFilter, AccountRepository, ChainNode, CheckpointRepository, FactRepository, GenesisDoc,
    NodeBlock, NodeBlockBody, NodeBlockData, NodeBlockId, NodeCommitSig, NodeHeader,
    NodeLastCommit, NodePubKey, NodeTx, Repositories, SetValidator, ValidatorSet,
};
use crate::services::{consensus_address, tx_hash_from_base64};

fn time_at(height: u64) -> DateTime<Utc> {
    DateTime::from_timestamp(1_600_000_000 + height as i64 * 6, 0).unwrap()
}

// =============================================================================
// Fixtures
// =============================================================================

/// Base64 ed25519 key filled with `seed`.
pub fn validator_key(seed: u8) -> String {
    STANDARD.encode([seed; 32])
}

/// A one-message `MsgSend` from `address` to itself.
pub fn sample_tx(address: &str, code: i64) -> NodeTx {
    serde_json::from_value(json!({
        "tx": {
            "body": {
                "messages": [{
                    "@type": "/cosmos.bank.v1beta1.MsgSend",
                    "from_address": address,
                    "to_address": address,
                    "amount": [{ "denom": "uatom", "amount": "1000000" }]
                }]
            },
            "auth_info": { "fee": { "amount": [{ "denom": "uatom", "amount": "5000" }] } }
        },
        "tx_response": {
            "height": "0",
            "txhash": "",
            "code": code,
            "logs": [],
            "gas_wanted": "200000",
            "gas_used": "80000",
            "timestamp": "2021-03-01T12:00:00Z"
        }
    }))
    .unwrap()
}

pub fn sample_genesis() -> GenesisDoc {
    serde_json::from_value(json!({
        "genesis_time": "2019-12-11T16:11:34Z",
        "app_state": {
            "auth": { "accounts": [
                { "@type": "/cosmos.auth.v1beta1.BaseAccount", "address": "cosmos1alice" },
                {
                    "@type": "/cosmos.vesting.v1beta1.ContinuousVestingAccount",
                    "base_vesting_account": { "base_account": { "address": "cosmos1vesting" } }
                }
            ]},
            "bank": { "balances": [
                { "address": "cosmos1alice", "coins": [
                    { "denom": "uatom", "amount": "3000000" },
                    { "denom": "stake", "amount": "99" }
                ]},
                { "address": "cosmos1carol", "coins": [{ "denom": "uatom", "amount": "1000000" }] }
            ]},
            "staking": {
                "delegations": [
                    { "delegator_address": "cosmos1alice", "validator_address": "cosmosvaloper1a", "shares": "5000000.000000000000000000" },
                    { "delegator_address": "cosmos1bob", "validator_address": "cosmosvaloper1a", "shares": "1500000" }
                ],
                "redelegations": [{
                    "delegator_address": "cosmos1alice",
                    "validator_src_address": "cosmosvaloper1a",
                    "validator_dst_address": "cosmosvaloper1b",
                    "entries": [{ "shares_dst": "2000000" }]
                }],
                "unbonding_delegations": [{
                    "delegator_address": "cosmos1alice",
                    "validator_address": "cosmosvaloper1a",
                    "entries": [{ "balance": "7000000" }]
                }]
            }
        }
    }))
    .unwrap()
}

/// Facts of one height: a block, a transaction, a transfer, a delegation,
/// a reward and an account link. Addresses are the same at every height.
pub fn height_facts(height: u64) -> HeightFacts {
    let created_at = time_at(height);
    let hash = format!("TX{height}");
    HeightFacts {
        height,
        blocks: vec![Block {
            height,
            hash: format!("BLOCK{height}"),
            proposer: "PROPOSER".into(),
            created_at,
        }],
        transactions: vec![Transaction {
            hash: hash.clone(),
            success: true,
            height,
            message_count: 3,
            fee: BigDecimal::from(0),
            gas_used: 1,
            gas_wanted: 2,
            created_at,
        }],
        transfers: vec![Transfer {
            id: derived_id(format!("{hash}.0")),
            tx_hash: hash.clone(),
            from: "cosmos1sender".into(),
            to: "cosmos1receiver".into(),
            amount: BigDecimal::from(1),
            currency: "uatom".into(),
            created_at,
        }],
        delegations: vec![Delegation {
            id: derived_id(format!("{hash}.1")),
            tx_hash: hash.clone(),
            delegator: "cosmos1delegator".into(),
            validator: "cosmosvaloper1v".into(),
            amount: BigDecimal::from(2),
            created_at,
        }],
        delegator_rewards: vec![DelegatorReward {
            id: derived_id(format!("{hash}.2")),
            tx_hash: hash.clone(),
            delegator: "cosmos1delegator".into(),
            validator: "cosmosvaloper1v".into(),
            amount: BigDecimal::from(3),
            created_at,
        }],
        account_txs: vec![AccountTx {
            account: "cosmos1sender".into(),
            tx_hash: hash,
        }],
        ..Default::default()
    }
}

// =============================================================================
// MockChain
// =============================================================================

#[derive(Default)]
struct ChainState {
    latest: u64,
    validators: HashMap<u64, Vec<String>>,
    signers: HashMap<u64, Vec<String>>,
    raw_txs: HashMap<u64, Vec<String>>,
    txs: HashMap<String, NodeTx>,
    genesis: Option<GenesisDoc>,
    failing_blocks: u32,
    failing_txs: u32,
    latest_calls: usize,
    calls: Vec<String>,
}

/// Deterministic in-memory node.
pub struct MockChain {
    state: Mutex<ChainState>,
}

impl MockChain {
    pub fn new(latest: u64) -> Self {
        Self {
            state: Mutex::new(ChainState {
                latest,
                ..Default::default()
            }),
        }
    }

    pub fn set_latest(&self, latest: u64) {
        self.state.lock().unwrap().latest = latest;
    }

    pub fn set_validators(&self, height: u64, keys: Vec<String>) {
        self.state.lock().unwrap().validators.insert(height, keys);
    }

    pub fn set_signers(&self, height: u64, keys: Vec<String>) {
        self.state.lock().unwrap().signers.insert(height, keys);
    }

    pub fn set_genesis(&self, genesis: GenesisDoc) {
        self.state.lock().unwrap().genesis = Some(genesis);
    }

    /// Include `tx` in the block at `height`, returning its hash.
    pub fn add_tx(&self, height: u64, mut tx: NodeTx) -> String {
        let mut state = self.state.lock().unwrap();
        let raw_txs = state.raw_txs.entry(height).or_default();
        let raw = STANDARD.encode(format!("tx-{height}-{}", raw_txs.len()));
        raw_txs.push(raw.clone());

        let hash = tx_hash_from_base64(&raw).unwrap();
        tx.tx_response.txhash = hash.clone();
        tx.tx_response.height = height;
        state.txs.insert(hash.clone(), tx);
        hash
    }

    /// Replace the node's answer for `hash` with one carrying no tx hash.
    pub fn blank_tx_hash(&self, hash: &str) {
        if let Some(tx) = self.state.lock().unwrap().txs.get_mut(hash) {
            tx.tx_response.txhash.clear();
        }
    }

    /// Make the next `count` block requests fail.
    pub fn fail_block_fetches(&self, count: u32) {
        self.state.lock().unwrap().failing_blocks = count;
    }

    /// Make the next `count` transaction requests fail.
    pub fn fail_tx_fetches(&self, count: u32) {
        self.state.lock().unwrap().failing_txs = count;
    }

    pub fn latest_calls(&self) -> usize {
        self.state.lock().unwrap().latest_calls
    }

    pub fn genesis_calls(&self) -> usize {
        self.calls().iter().filter(|c| *c == "genesis").count()
    }

    pub fn block_calls(&self) -> usize {
        self.calls().iter().filter(|c| c.starts_with("block:")).count()
    }

    pub fn first_block_call(&self) -> Option<u64> {
        self.calls()
            .iter()
            .find_map(|c| c.strip_prefix("block:"))
            .and_then(|h| h.parse().ok())
    }

    pub fn genesis_called_before_blocks(&self) -> bool {
        let calls = self.calls();
        let genesis = calls.iter().position(|c| c == "genesis");
        let block = calls.iter().position(|c| c.starts_with("block:"));
        matches!((genesis, block), (Some(g), Some(b)) if g < b)
    }

    fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    fn build_block(state: &ChainState, height: u64) -> NodeBlock {
        let signatures = state
            .signers
            .get(&height)
            .map(|keys| {
                keys.iter()
                    .map(|key| NodeCommitSig {
                        validator_address: consensus_address(key).unwrap(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        NodeBlock {
            block_id: NodeBlockId {
                hash: format!("BLOCK{height}"),
            },
            block: NodeBlockBody {
                header: NodeHeader {
                    height,
                    time: time_at(height),
                    proposer_address: "PROPOSER".into(),
                },
                data: NodeBlockData {
                    txs: state.raw_txs.get(&height).cloned().unwrap_or_default(),
                },
                last_commit: NodeLastCommit { signatures },
            },
        }
    }
}

#[async_trait]
impl ChainNode for MockChain {
    async fn latest_block(&self) -> ChainResult<NodeBlock> {
        let mut state = self.state.lock().unwrap();
        state.latest_calls += 1;
        Ok(Self::build_block(&state, state.latest))
    }

    async fn block(&self, height: u64) -> ChainResult<NodeBlock> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("block:{height}"));
        if state.failing_blocks > 0 {
            state.failing_blocks -= 1;
            return Err(ChainError::RequestFailed("connection reset".into()));
        }
        Ok(Self::build_block(&state, height))
    }

    async fn validator_set(&self, height: u64) -> ChainResult<ValidatorSet> {
        let state = self.state.lock().unwrap();
        let validators = state
            .validators
            .get(&height)
            .map(|keys| {
                keys.iter()
                    .enumerate()
                    .map(|(i, key)| SetValidator {
                        address: format!("cosmosvalcons1v{i}"),
                        pub_key: NodePubKey {
                            type_url: "/cosmos.crypto.ed25519.PubKey".into(),
                            key: key.clone(),
                        },
                        voting_power: "1".into(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(ValidatorSet { validators })
    }

    async fn transaction(&self, hash: &str) -> ChainResult<NodeTx> {
        let mut state = self.state.lock().unwrap();
        if state.failing_txs > 0 {
            state.failing_txs -= 1;
            return Err(ChainError::RequestFailed("timeout".into()));
        }
        state
            .txs
            .get(hash)
            .cloned()
            .ok_or_else(|| ChainError::BadStatus {
                endpoint: format!("cosmos/tx/v1beta1/txs/{hash}"),
                status: 404,
                body: "tx not found".into(),
            })
    }

    async fn genesis(&self) -> ChainResult<GenesisDoc> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("genesis".into());
        state
            .genesis
            .clone()
            .ok_or_else(|| ChainError::GenesisUnavailable("no genesis configured".into()))
    }
}

// =============================================================================
// MemoryRepositories
// =============================================================================

#[derive(Default)]
struct StoreState {
    checkpoints: BTreeMap<String, u64>,
    checkpoint_history: BTreeMap<String, Vec<u64>>,
    blocks: BTreeMap<u64, Block>,
    block_batches: Vec<usize>,
    transactions: BTreeMap<String, Transaction>,
    transfers: BTreeMap<String, Transfer>,
    delegations: BTreeMap<String, Delegation>,
    delegator_rewards: BTreeMap<String, DelegatorReward>,
    validator_rewards: BTreeMap<String, ValidatorReward>,
    proposals: BTreeMap<u64, HistoryProposal>,
    deposits: BTreeMap<String, ProposalDeposit>,
    votes: BTreeMap<String, ProposalVote>,
    jailers: BTreeMap<String, Jailer>,
    missed_blocks: BTreeMap<String, MissedBlock>,
    account_txs: Vec<AccountTx>,
    accounts: BTreeMap<String, Account>,
    create_accounts_calls: usize,
    failures: HashMap<&'static str, u32>,
    calls: Vec<&'static str>,
}

/// In-memory storage with idempotent inserts and failure injection.
#[derive(Default)]
pub struct MemoryRepositories {
    state: Mutex<StoreState>,
}

impl MemoryRepositories {
    pub fn with_checkpoint(title: &str, height: u64) -> Self {
        let repos = Self::default();
        repos
            .state
            .lock()
            .unwrap()
            .checkpoints
            .insert(title.to_string(), height);
        repos
    }

    /// Make the next `count` calls of `operation` fail.
    pub fn fail_next(&self, operation: &'static str, count: u32) {
        self.state.lock().unwrap().failures.insert(operation, count);
    }

    pub fn checkpoint(&self, title: &str) -> u64 {
        self.state.lock().unwrap().checkpoints.get(title).copied().unwrap_or(0)
    }

    pub fn checkpoint_history(&self, title: &str) -> Vec<u64> {
        self.state
            .lock()
            .unwrap()
            .checkpoint_history
            .get(title)
            .cloned()
            .unwrap_or_default()
    }

    /// Successful write calls, in order.
    pub fn calls(&self) -> Vec<&'static str> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Row count of every `create_blocks` call.
    pub fn block_batches(&self) -> Vec<usize> {
        self.state.lock().unwrap().block_batches.clone()
    }

    pub fn block_count(&self) -> usize {
        self.state.lock().unwrap().blocks.len()
    }

    pub fn block_heights(&self) -> Vec<u64> {
        self.state.lock().unwrap().blocks.keys().copied().collect()
    }

    pub fn transaction_count(&self) -> usize {
        self.state.lock().unwrap().transactions.len()
    }

    pub fn delegation_count(&self) -> usize {
        self.state.lock().unwrap().delegations.len()
    }

    pub fn accounts_snapshot(&self) -> Vec<Account> {
        self.state.lock().unwrap().accounts.values().cloned().collect()
    }

    pub fn has_account(&self, address: &str) -> bool {
        self.state.lock().unwrap().accounts.contains_key(address)
    }

    pub fn create_accounts_calls(&self) -> usize {
        self.state.lock().unwrap().create_accounts_calls
    }

    fn write<F>(&self, operation: &'static str, apply: F) -> StorageResult<()>
    where
        F: FnOnce(&mut StoreState),
    {
        let mut state = self.state.lock().unwrap();
        if let Some(remaining) = state.failures.get_mut(operation).filter(|n| **n > 0) {
            *remaining -= 1;
            return Err(StorageError::QueryError(format!("{operation}: injected failure")));
        }
        apply(&mut state);
        state.calls.push(operation);
        Ok(())
    }
}

fn insert_new<K: Ord, V: Clone>(map: &mut BTreeMap<K, V>, rows: &[V], key: impl Fn(&V) -> K) {
    for row in rows {
        map.entry(key(row)).or_insert_with(|| row.clone());
    }
}

#[async_trait]
impl CheckpointRepository for MemoryRepositories {
    async fn get_or_create(&self, title: &str) -> StorageResult<ParserCheckpoint> {
        let mut state = self.state.lock().unwrap();
        let height = *state.checkpoints.entry(title.to_string()).or_insert(0);
        Ok(ParserCheckpoint {
            id: 1,
            title: title.to_string(),
            height,
        })
    }

    async fn set_checkpoint(&self, title: &str, height: u64) -> StorageResult<()> {
        self.write("set_checkpoint", |s| {
            s.checkpoints.insert(title.to_string(), height);
            s.checkpoint_history
                .entry(title.to_string())
                .or_default()
                .push(height);
        })
    }
}

#[async_trait]
impl FactRepository for MemoryRepositories {
    async fn create_blocks(&self, blocks: &[Block]) -> StorageResult<()> {
        self.write("create_blocks", |s| {
            s.block_batches.push(blocks.len());
            insert_new(&mut s.blocks, blocks, |b| b.height);
        })
    }

    async fn create_transactions(&self, transactions: &[Transaction]) -> StorageResult<()> {
        self.write("create_transactions", |s| {
            insert_new(&mut s.transactions, transactions, |t| t.hash.clone())
        })
    }

    async fn create_transfers(&self, transfers: &[Transfer]) -> StorageResult<()> {
        self.write("create_transfers", |s| {
            insert_new(&mut s.transfers, transfers, |t| t.id.clone())
        })
    }

    async fn create_delegations(&self, delegations: &[Delegation]) -> StorageResult<()> {
        self.write("create_delegations", |s| {
            insert_new(&mut s.delegations, delegations, |d| d.id.clone())
        })
    }

    async fn create_delegator_rewards(&self, rewards: &[DelegatorReward]) -> StorageResult<()> {
        self.write("create_delegator_rewards", |s| {
            insert_new(&mut s.delegator_rewards, rewards, |r| r.id.clone())
        })
    }

    async fn create_validator_rewards(&self, rewards: &[ValidatorReward]) -> StorageResult<()> {
        self.write("create_validator_rewards", |s| {
            insert_new(&mut s.validator_rewards, rewards, |r| r.id.clone())
        })
    }

    async fn create_history_proposals(&self, proposals: &[HistoryProposal]) -> StorageResult<()> {
        self.write("create_history_proposals", |s| {
            insert_new(&mut s.proposals, proposals, |p| p.id)
        })
    }

    async fn create_proposal_deposits(&self, deposits: &[ProposalDeposit]) -> StorageResult<()> {
        self.write("create_proposal_deposits", |s| {
            insert_new(&mut s.deposits, deposits, |d| d.id.clone())
        })
    }

    async fn create_proposal_votes(&self, votes: &[ProposalVote]) -> StorageResult<()> {
        self.write("create_proposal_votes", |s| {
            insert_new(&mut s.votes, votes, |v| v.id.clone())
        })
    }

    async fn create_jailers(&self, jailers: &[Jailer]) -> StorageResult<()> {
        self.write("create_jailers", |s| {
            insert_new(&mut s.jailers, jailers, |j| j.id.clone())
        })
    }

    async fn create_missed_blocks(&self, missed: &[MissedBlock]) -> StorageResult<()> {
        self.write("create_missed_blocks", |s| {
            insert_new(&mut s.missed_blocks, missed, |m| m.id.clone())
        })
    }

    async fn create_account_txs(&self, links: &[AccountTx]) -> StorageResult<()> {
        self.write("create_account_txs", |s| {
            for link in links {
                if !s.account_txs.contains(link) {
                    s.account_txs.push(link.clone());
                }
            }
        })
    }
}

#[async_trait]
impl AccountRepository for MemoryRepositories {
    async fn create_accounts(&self, accounts: &[Account]) -> StorageResult<()> {
        self.write("create_accounts", |s| {
            s.create_accounts_calls += 1;
            insert_new(&mut s.accounts, accounts, |a| a.address.clone());
        })
    }

    async fn list_accounts(&self, filter: AccountFilter) -> StorageResult<Vec<Account>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .accounts
            .values()
            .filter(|a| filter.addresses.is_empty() || filter.addresses.contains(&a.address))
            .cloned()
            .collect())
    }
}

impl Repositories for MemoryRepositories {
    fn checkpoints(&self) -> &dyn CheckpointRepository {
        self
    }

    fn facts(&self) -> &dyn FactRepository {
        self
    }

    fn accounts(&self) -> &dyn AccountRepository {
        self
    }
}
