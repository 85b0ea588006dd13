//! Port traits for data repositories.
//!
//! These traits define the storage interface used by the domain layer.
//! Implementations live in the infrastructure layer (e.g., `cosmoscan-storage`).
//!
//! Every `create_*` operation must be a no-op returning `Ok(())` on an empty
//! slice and must ignore rows whose key already exists, so that re-ingesting
//! a height is harmless.

use async_trait::async_trait;

use crate::error::StorageResult;
use crate::models::{
    Account, AccountTx, Block, Delegation, DelegatorReward, HistoryProposal, Jailer, MissedBlock,
    ParserCheckpoint, ProposalDeposit, ProposalVote, Transaction, Transfer, ValidatorReward,
};

// =============================================================================
// Filter Types
// =============================================================================

/// Filter options for account listing.
#[derive(Debug, Clone, Default)]
pub struct AccountFilter {
    /// Only return these addresses (all accounts when empty).
    pub addresses: Vec<String>,
}

// =============================================================================
// Repository Traits
// =============================================================================

/// Repository for parser resume positions.
#[async_trait]
pub trait CheckpointRepository: Send + Sync {
    /// Get the checkpoint for a parser, creating it at height 0 if missing.
    async fn get_or_create(&self, title: &str) -> StorageResult<ParserCheckpoint>;

    /// Persist a new committed height for a parser.
    async fn set_checkpoint(&self, title: &str, height: u64) -> StorageResult<()>;
}

/// Repository for immutable chain facts.
#[async_trait]
pub trait FactRepository: Send + Sync {
    async fn create_blocks(&self, blocks: &[Block]) -> StorageResult<()>;

    async fn create_transactions(&self, transactions: &[Transaction]) -> StorageResult<()>;

    async fn create_transfers(&self, transfers: &[Transfer]) -> StorageResult<()>;

    async fn create_delegations(&self, delegations: &[Delegation]) -> StorageResult<()>;

    async fn create_delegator_rewards(&self, rewards: &[DelegatorReward]) -> StorageResult<()>;

    async fn create_validator_rewards(&self, rewards: &[ValidatorReward]) -> StorageResult<()>;

    async fn create_history_proposals(&self, proposals: &[HistoryProposal]) -> StorageResult<()>;

    async fn create_proposal_deposits(&self, deposits: &[ProposalDeposit]) -> StorageResult<()>;

    async fn create_proposal_votes(&self, votes: &[ProposalVote]) -> StorageResult<()>;

    async fn create_jailers(&self, jailers: &[Jailer]) -> StorageResult<()>;

    async fn create_missed_blocks(&self, missed: &[MissedBlock]) -> StorageResult<()>;

    async fn create_account_txs(&self, links: &[AccountTx]) -> StorageResult<()>;
}

/// Repository for observed accounts.
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Insert accounts that do not exist yet.
    async fn create_accounts(&self, accounts: &[Account]) -> StorageResult<()>;

    /// List stored accounts.
    async fn list_accounts(&self, filter: AccountFilter) -> StorageResult<Vec<Account>>;
}

// =============================================================================
// Composite Repository
// =============================================================================

/// Combined repository access for the parser.
///
/// The parser only ever writes through a single committer task, so
/// implementations do not need cross-call locking.
pub trait Repositories: Send + Sync {
    /// Access the checkpoint repository.
    fn checkpoints(&self) -> &dyn CheckpointRepository;

    /// Access the fact repository.
    fn facts(&self) -> &dyn FactRepository;

    /// Access the account repository.
    fn accounts(&self) -> &dyn AccountRepository;
}
