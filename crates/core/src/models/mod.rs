//! Domain models representing indexed chain facts.
//!
//! These models are storage-agnostic. Every fact except [`Account`] and
//! [`ParserCheckpoint`] is immutable once created and keyed by a
//! deterministic id, so re-processing a height yields identical rows.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// =============================================================================
// Derived Identifiers
// =============================================================================

/// Compute a deterministic fact id from its seed.
///
/// Seeds look like `"{tx_hash}.{msg_index}"` with optional suffixes; the id
/// is the lowercase hex SHA-256 of the seed.
pub fn derived_id(seed: impl AsRef<[u8]>) -> String {
    hex::encode(Sha256::digest(seed.as_ref()))
}

// =============================================================================
// Parser State
// =============================================================================

/// Resume position of a named parser.
///
/// Height 0 means the parser never ran and the genesis import is pending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParserCheckpoint {
    pub id: i64,
    /// Parser name (e.g. `hub3`).
    pub title: String,
    /// Last height whose facts are durably committed.
    pub height: u64,
}

// =============================================================================
// Blocks & Transactions
// =============================================================================

/// Indexed block header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Block height.
    pub height: u64,
    /// Block hash as reported by the node.
    pub hash: String,
    /// Consensus address of the proposer.
    pub proposer: String,
    /// Header time.
    pub created_at: DateTime<Utc>,
}

/// Indexed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Uppercase hex transaction hash.
    pub hash: String,
    /// `true` when the response code was 0.
    pub success: bool,
    pub height: u64,
    /// Number of messages in the transaction body.
    pub message_count: u64,
    /// Fee in main units.
    pub fee: BigDecimal,
    pub gas_used: u64,
    pub gas_wanted: u64,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Message Facts
// =============================================================================

/// Token movement.
///
/// Multi-send legs have an empty `from` (outputs) or `to` (inputs).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub id: String,
    pub tx_hash: String,
    pub from: String,
    pub to: String,
    /// Main-denom amounts are in main units, other denoms in minor units.
    pub amount: BigDecimal,
    /// Denomination the amount was carried in.
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

/// Stake change of a delegator on a validator.
///
/// Positive for delegations, negative for undelegations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delegation {
    pub id: String,
    pub tx_hash: String,
    pub delegator: String,
    pub validator: String,
    pub amount: BigDecimal,
    pub created_at: DateTime<Utc>,
}

/// Staking reward withdrawn by a delegator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegatorReward {
    pub id: String,
    pub tx_hash: String,
    pub delegator: String,
    pub validator: String,
    pub amount: BigDecimal,
    pub created_at: DateTime<Utc>,
}

/// Commission withdrawn by a validator operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorReward {
    pub id: String,
    pub tx_hash: String,
    /// Validator operator address.
    pub address: String,
    pub amount: BigDecimal,
    pub created_at: DateTime<Utc>,
}

/// Immutable record of a governance proposal submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryProposal {
    /// On-chain proposal id.
    pub id: u64,
    pub tx_hash: String,
    pub title: String,
    pub description: String,
    /// Community pool spend recipient (empty for other proposal kinds).
    pub recipient: String,
    /// Requested community pool amount.
    pub amount: BigDecimal,
    pub init_deposit: BigDecimal,
    pub proposer: String,
    pub created_at: DateTime<Utc>,
}

/// Deposit added to a governance proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalDeposit {
    pub id: String,
    pub tx_hash: String,
    pub proposal_id: u64,
    pub depositor: String,
    pub amount: BigDecimal,
    pub created_at: DateTime<Utc>,
}

/// Stored vote option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VoteOption {
    Yes,
    Abstain,
    No,
    NoWithVeto,
}

impl VoteOption {
    /// Stored string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            VoteOption::Yes => "Yes",
            VoteOption::Abstain => "Abstain",
            VoteOption::No => "No",
            VoteOption::NoWithVeto => "NoWithVeto",
        }
    }
}

impl std::fmt::Display for VoteOption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Governance vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalVote {
    pub id: String,
    pub tx_hash: String,
    pub proposal_id: u64,
    pub voter: String,
    pub option: VoteOption,
    pub created_at: DateTime<Utc>,
}

/// Validator unjail request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jailer {
    pub id: String,
    pub tx_hash: String,
    /// Validator operator address.
    pub address: String,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Consensus Facts
// =============================================================================

/// A validator from the height's set without a precommit for that height.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissedBlock {
    pub id: String,
    pub height: u64,
    /// Uppercase hex consensus address.
    pub validator: String,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Accounts
// =============================================================================

/// Address first observed by the parser.
///
/// Balances are refreshed by an external job; the parser only creates rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub address: String,
    pub balance: BigDecimal,
    pub stake: BigDecimal,
    pub unbonding: BigDecimal,
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Account with zero balances.
    pub fn discovered(address: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            address: address.into(),
            balance: BigDecimal::from(0),
            stake: BigDecimal::from(0),
            unbonding: BigDecimal::from(0),
            created_at,
        }
    }
}

/// Link between an address mentioned in a transaction and that transaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountTx {
    pub account: String,
    pub tx_hash: String,
}

// =============================================================================
// Per-height Results
// =============================================================================

/// Everything derived from one block height.
///
/// Built by a fetch worker, merged into batches by the committer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeightFacts {
    pub height: u64,
    pub blocks: Vec<Block>,
    pub transactions: Vec<Transaction>,
    pub transfers: Vec<Transfer>,
    pub delegations: Vec<Delegation>,
    pub delegator_rewards: Vec<DelegatorReward>,
    pub validator_rewards: Vec<ValidatorReward>,
    pub proposals: Vec<HistoryProposal>,
    pub proposal_deposits: Vec<ProposalDeposit>,
    pub proposal_votes: Vec<ProposalVote>,
    pub jailers: Vec<Jailer>,
    pub missed_blocks: Vec<MissedBlock>,
    pub account_txs: Vec<AccountTx>,
}

impl HeightFacts {
    pub fn new(height: u64) -> Self {
        Self {
            height,
            ..Default::default()
        }
    }

    /// Route a decoded message fact into its collection.
    pub fn push(&mut self, fact: Fact) {
        match fact {
            Fact::Transfer(f) => self.transfers.push(f),
            Fact::Delegation(f) => self.delegations.push(f),
            Fact::DelegatorReward(f) => self.delegator_rewards.push(f),
            Fact::ValidatorReward(f) => self.validator_rewards.push(f),
            Fact::Proposal(f) => self.proposals.push(f),
            Fact::ProposalDeposit(f) => self.proposal_deposits.push(f),
            Fact::ProposalVote(f) => self.proposal_votes.push(f),
            Fact::Jailer(f) => self.jailers.push(f),
        }
    }

    /// Append all collections of `other`. The height is left untouched.
    pub fn merge(&mut self, other: HeightFacts) {
        self.blocks.extend(other.blocks);
        self.transactions.extend(other.transactions);
        self.transfers.extend(other.transfers);
        self.delegations.extend(other.delegations);
        self.delegator_rewards.extend(other.delegator_rewards);
        self.validator_rewards.extend(other.validator_rewards);
        self.proposals.extend(other.proposals);
        self.proposal_deposits.extend(other.proposal_deposits);
        self.proposal_votes.extend(other.proposal_votes);
        self.jailers.extend(other.jailers);
        self.missed_blocks.extend(other.missed_blocks);
        self.account_txs.extend(other.account_txs);
    }
}

/// A fact decoded from a single transaction message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fact {
    Transfer(Transfer),
    Delegation(Delegation),
    DelegatorReward(DelegatorReward),
    ValidatorReward(ValidatorReward),
    Proposal(HistoryProposal),
    ProposalDeposit(ProposalDeposit),
    ProposalVote(ProposalVote),
    Jailer(Jailer),
}
