//! Fact repository implementation for PostgreSQL.
//!
//! Every fact row is keyed by its derived id (or natural key) and inserted
//! with `ON CONFLICT DO NOTHING`, so re-committing a height is a no-op.

use async_trait::async_trait;
use sqlx::PgPool;

use cosmoscan_core::error::StorageResult;
use cosmoscan_core::models::{
    AccountTx, Block, Delegation, DelegatorReward, HistoryProposal, Jailer, MissedBlock,
    ProposalDeposit, ProposalVote, Transaction, Transfer, ValidatorReward,
};
use cosmoscan_core::ports::FactRepository;

use super::database::Database;
use super::helpers::insert_all;

/// PostgreSQL implementation of FactRepository.
pub struct PgFactRepository {
    pool: PgPool,
}

impl PgFactRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            pool: db.pool().clone(),
        }
    }
}

#[async_trait]
impl FactRepository for PgFactRepository {
    async fn create_blocks(&self, blocks: &[Block]) -> StorageResult<()> {
        insert_all(
            &self.pool,
            "INSERT INTO blocks (height, hash, proposer, created_at) ",
            "ON CONFLICT (height) DO NOTHING",
            blocks,
            |mut row, block| {
                row.push_bind(block.height as i64)
                    .push_bind(block.hash.clone())
                    .push_bind(block.proposer.clone())
                    .push_bind(block.created_at);
            },
        )
        .await
    }

    async fn create_transactions(&self, transactions: &[Transaction]) -> StorageResult<()> {
        insert_all(
            &self.pool,
            "INSERT INTO transactions (hash, status, height, messages, fee, gas_used, gas_wanted, created_at) ",
            "ON CONFLICT (hash) DO NOTHING",
            transactions,
            |mut row, tx| {
                row.push_bind(tx.hash.clone())
                    .push_bind(tx.success)
                    .push_bind(tx.height as i64)
                    .push_bind(tx.message_count as i64)
                    .push_bind(tx.fee.clone())
                    .push_bind(tx.gas_used as i64)
                    .push_bind(tx.gas_wanted as i64)
                    .push_bind(tx.created_at);
            },
        )
        .await
    }

    async fn create_transfers(&self, transfers: &[Transfer]) -> StorageResult<()> {
        insert_all(
            &self.pool,
            "INSERT INTO transfers (id, tx_hash, from_address, to_address, amount, currency, created_at) ",
            "ON CONFLICT (id) DO NOTHING",
            transfers,
            |mut row, transfer| {
                row.push_bind(transfer.id.clone())
                    .push_bind(transfer.tx_hash.clone())
                    .push_bind(transfer.from.clone())
                    .push_bind(transfer.to.clone())
                    .push_bind(transfer.amount.clone())
                    .push_bind(transfer.currency.clone())
                    .push_bind(transfer.created_at);
            },
        )
        .await
    }

    async fn create_delegations(&self, delegations: &[Delegation]) -> StorageResult<()> {
        insert_all(
            &self.pool,
            "INSERT INTO delegations (id, tx_hash, delegator, validator, amount, created_at) ",
            "ON CONFLICT (id) DO NOTHING",
            delegations,
            |mut row, delegation| {
                row.push_bind(delegation.id.clone())
                    .push_bind(delegation.tx_hash.clone())
                    .push_bind(delegation.delegator.clone())
                    .push_bind(delegation.validator.clone())
                    .push_bind(delegation.amount.clone())
                    .push_bind(delegation.created_at);
            },
        )
        .await
    }

    async fn create_delegator_rewards(&self, rewards: &[DelegatorReward]) -> StorageResult<()> {
        insert_all(
            &self.pool,
            "INSERT INTO delegator_rewards (id, tx_hash, delegator, validator, amount, created_at) ",
            "ON CONFLICT (id) DO NOTHING",
            rewards,
            |mut row, reward| {
                row.push_bind(reward.id.clone())
                    .push_bind(reward.tx_hash.clone())
                    .push_bind(reward.delegator.clone())
                    .push_bind(reward.validator.clone())
                    .push_bind(reward.amount.clone())
                    .push_bind(reward.created_at);
            },
        )
        .await
    }

    async fn create_validator_rewards(&self, rewards: &[ValidatorReward]) -> StorageResult<()> {
        insert_all(
            &self.pool,
            "INSERT INTO validator_rewards (id, tx_hash, address, amount, created_at) ",
            "ON CONFLICT (id) DO NOTHING",
            rewards,
            |mut row, reward| {
                row.push_bind(reward.id.clone())
                    .push_bind(reward.tx_hash.clone())
                    .push_bind(reward.address.clone())
                    .push_bind(reward.amount.clone())
                    .push_bind(reward.created_at);
            },
        )
        .await
    }

    async fn create_history_proposals(&self, proposals: &[HistoryProposal]) -> StorageResult<()> {
        insert_all(
            &self.pool,
            "INSERT INTO history_proposals (id, tx_hash, title, description, recipient, amount, init_deposit, proposer, created_at) ",
            "ON CONFLICT (id) DO NOTHING",
            proposals,
            |mut row, proposal| {
                row.push_bind(proposal.id as i64)
                    .push_bind(proposal.tx_hash.clone())
                    .push_bind(proposal.title.clone())
                    .push_bind(proposal.description.clone())
                    .push_bind(proposal.recipient.clone())
                    .push_bind(proposal.amount.clone())
                    .push_bind(proposal.init_deposit.clone())
                    .push_bind(proposal.proposer.clone())
                    .push_bind(proposal.created_at);
            },
        )
        .await
    }

    async fn create_proposal_deposits(&self, deposits: &[ProposalDeposit]) -> StorageResult<()> {
        insert_all(
            &self.pool,
            "INSERT INTO proposal_deposits (id, tx_hash, proposal_id, depositor, amount, created_at) ",
            "ON CONFLICT (id) DO NOTHING",
            deposits,
            |mut row, deposit| {
                row.push_bind(deposit.id.clone())
                    .push_bind(deposit.tx_hash.clone())
                    .push_bind(deposit.proposal_id as i64)
                    .push_bind(deposit.depositor.clone())
                    .push_bind(deposit.amount.clone())
                    .push_bind(deposit.created_at);
            },
        )
        .await
    }

    async fn create_proposal_votes(&self, votes: &[ProposalVote]) -> StorageResult<()> {
        insert_all(
            &self.pool,
            "INSERT INTO proposal_votes (id, tx_hash, proposal_id, voter, option, created_at) ",
            "ON CONFLICT (id) DO NOTHING",
            votes,
            |mut row, vote| {
                row.push_bind(vote.id.clone())
                    .push_bind(vote.tx_hash.clone())
                    .push_bind(vote.proposal_id as i64)
                    .push_bind(vote.voter.clone())
                    .push_bind(vote.option.as_str())
                    .push_bind(vote.created_at);
            },
        )
        .await
    }

    async fn create_jailers(&self, jailers: &[Jailer]) -> StorageResult<()> {
        insert_all(
            &self.pool,
            "INSERT INTO jailers (id, tx_hash, address, created_at) ",
            "ON CONFLICT (id) DO NOTHING",
            jailers,
            |mut row, jailer| {
                row.push_bind(jailer.id.clone())
                    .push_bind(jailer.tx_hash.clone())
                    .push_bind(jailer.address.clone())
                    .push_bind(jailer.created_at);
            },
        )
        .await
    }

    async fn create_missed_blocks(&self, missed: &[MissedBlock]) -> StorageResult<()> {
        insert_all(
            &self.pool,
            "INSERT INTO missed_blocks (id, height, validator, created_at) ",
            "ON CONFLICT (id) DO NOTHING",
            missed,
            |mut row, miss| {
                row.push_bind(miss.id.clone())
                    .push_bind(miss.height as i64)
                    .push_bind(miss.validator.clone())
                    .push_bind(miss.created_at);
            },
        )
        .await
    }

    async fn create_account_txs(&self, links: &[AccountTx]) -> StorageResult<()> {
        insert_all(
            &self.pool,
            "INSERT INTO account_txs (account, tx_hash) ",
            "ON CONFLICT (account, tx_hash) DO NOTHING",
            links,
            |mut row, link| {
                row.push_bind(link.account.clone())
                    .push_bind(link.tx_hash.clone());
            },
        )
        .await
    }
}
