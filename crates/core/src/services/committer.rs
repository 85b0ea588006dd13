//! Sequencing committer - the parser's single storage writer.
//!
//! Per-height results arrive in any order. The committer buffers them and
//! only persists the run of heights exactly contiguous with the checkpoint,
//! so the checkpoint never skips a height. All writes are retried forever:
//! a failing store stalls the parser but never loses data.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, instrument, trace};

use crate::metrics::{
    CommitTimer, record_accounts_discovered, record_batch_committed, record_pending_results,
    record_storage_retry,
};
use crate::models::{Account, HeightFacts};
use crate::ports::Repositories;

use super::retry::{RetryPolicy, retry_forever};
use super::wait_for_shutdown;

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the committer.
#[derive(Debug, Clone)]
pub struct CommitterConfig {
    /// Maximum heights merged into one batch.
    pub batch_size: usize,
    /// Delay before the first commit tick.
    pub first_tick: Duration,
    /// Interval between commit ticks.
    pub commit_interval: Duration,
    /// Retry schedule for storage writes.
    pub retry: RetryPolicy,
}

impl Default for CommitterConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            first_tick: Duration::from_secs(1),
            commit_interval: Duration::from_secs(2),
            retry: RetryPolicy::storage(),
        }
    }
}

// =============================================================================
// Known Addresses
// =============================================================================

/// Addresses that already have an account row.
///
/// Owned by the committer once the parser is running.
#[derive(Debug, Clone, Default)]
pub struct KnownAddresses(HashSet<String>);

impl KnownAddresses {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the address was not known yet.
    pub fn insert(&mut self, address: impl Into<String>) -> bool {
        self.0.insert(address.into())
    }

    pub fn contains(&self, address: &str) -> bool {
        self.0.contains(address)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<String> for KnownAddresses {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

// =============================================================================
// SequencingCommitter
// =============================================================================

/// Orders per-height results and commits contiguous batches.
pub struct SequencingCommitter<R: Repositories> {
    title: String,
    repositories: Arc<R>,
    config: CommitterConfig,
    checkpoint: u64,
    buffer: BTreeMap<u64, HeightFacts>,
    known: KnownAddresses,
    height_tx: watch::Sender<u64>,
}

impl<R: Repositories> SequencingCommitter<R> {
    pub fn new(
        title: impl Into<String>,
        repositories: Arc<R>,
        config: CommitterConfig,
        checkpoint: u64,
        known: KnownAddresses,
        height_tx: watch::Sender<u64>,
    ) -> Self {
        Self {
            title: title.into(),
            repositories,
            config,
            checkpoint,
            buffer: BTreeMap::new(),
            known,
            height_tx,
        }
    }

    /// Last committed height.
    pub fn checkpoint(&self) -> u64 {
        self.checkpoint
    }

    /// Buffered results not committed yet.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    pub fn known_addresses(&self) -> &KnownAddresses {
        &self.known
    }

    /// Buffer a result.
    ///
    /// Heights already committed or already buffered are dropped.
    pub fn receive(&mut self, facts: HeightFacts) -> bool {
        if facts.height <= self.checkpoint || self.buffer.contains_key(&facts.height) {
            trace!(height = facts.height, "Dropping duplicate result");
            return false;
        }
        self.buffer.insert(facts.height, facts);
        record_pending_results(self.buffer.len());
        true
    }

    /// Length of the run starting right after the checkpoint, capped at the
    /// batch size.
    pub fn ready_run(&self) -> usize {
        let mut expected = self.checkpoint + 1;
        let mut count = 0;
        for height in self.buffer.keys() {
            if *height != expected || count >= self.config.batch_size.max(1) {
                break;
            }
            count += 1;
            expected += 1;
        }
        count
    }

    /// Commit batches until no contiguous run is left.
    ///
    /// Returns the number of committed heights.
    pub async fn commit_ready(&mut self) -> u64 {
        let mut committed = 0;
        loop {
            let count = self.ready_run();
            if count == 0 {
                break;
            }
            self.commit_run(count).await;
            committed += count as u64;
        }
        committed
    }

    #[instrument(skip(self), fields(parser = %self.title, from = self.checkpoint + 1))]
    async fn commit_run(&mut self, count: usize) {
        let _timer = CommitTimer::new();
        let from = self.checkpoint + 1;
        let to = self.checkpoint + count as u64;

        let mut batch = HeightFacts::new(to);
        for height in from..=to {
            if let Some(facts) = self.buffer.remove(&height) {
                batch.merge(facts);
            }
        }

        self.persist(&batch).await;

        let accounts = self.discover_accounts(&batch);
        if !accounts.is_empty() {
            let repositories = &self.repositories;
            let policy = self.config.retry;
            retry_forever(
                "create_accounts",
                policy,
                || record_storage_retry("create_accounts"),
                || repositories.accounts().create_accounts(&accounts),
            )
            .await;
            record_accounts_discovered(accounts.len());
        }

        let repositories = &self.repositories;
        let title = self.title.as_str();
        retry_forever(
            "set_checkpoint",
            self.config.retry,
            || record_storage_retry("set_checkpoint"),
            || repositories.checkpoints().set_checkpoint(title, to),
        )
        .await;

        self.checkpoint = to;
        self.height_tx.send_replace(to);
        record_batch_committed(count as u64, to);
        record_pending_results(self.buffer.len());

        info!(
            from,
            to,
            txs = batch.transactions.len(),
            accounts = accounts.len(),
            "🗄️  Batch committed"
        );
    }

    /// Write every fact collection, in a fixed order.
    async fn persist(&self, batch: &HeightFacts) {
        let facts = self.repositories.facts();
        let policy = self.config.retry;

        macro_rules! persist_rows {
            ($op:literal, $method:ident, $rows:expr) => {
                if !$rows.is_empty() {
                    retry_forever($op, policy, || record_storage_retry($op), || {
                        facts.$method(&$rows)
                    })
                    .await;
                }
            };
        }

        persist_rows!("create_blocks", create_blocks, batch.blocks);
        persist_rows!("create_transactions", create_transactions, batch.transactions);
        persist_rows!("create_transfers", create_transfers, batch.transfers);
        persist_rows!("create_delegations", create_delegations, batch.delegations);
        persist_rows!("create_delegator_rewards", create_delegator_rewards, batch.delegator_rewards);
        persist_rows!("create_validator_rewards", create_validator_rewards, batch.validator_rewards);
        persist_rows!("create_history_proposals", create_history_proposals, batch.proposals);
        persist_rows!("create_proposal_deposits", create_proposal_deposits, batch.proposal_deposits);
        persist_rows!("create_proposal_votes", create_proposal_votes, batch.proposal_votes);
        persist_rows!("create_jailers", create_jailers, batch.jailers);
        persist_rows!("create_missed_blocks", create_missed_blocks, batch.missed_blocks);
        persist_rows!("create_account_txs", create_account_txs, batch.account_txs);
    }

    /// New accounts for delegators, transfer parties and reward recipients.
    fn discover_accounts(&mut self, batch: &HeightFacts) -> Vec<Account> {
        let mut accounts = Vec::new();
        let mut add = |address: &str, created_at| {
            if !address.trim().is_empty() && self.known.insert(address) {
                accounts.push(Account::discovered(address, created_at));
            }
        };

        for delegation in &batch.delegations {
            add(&delegation.delegator, delegation.created_at);
        }
        for transfer in &batch.transfers {
            add(&transfer.from, transfer.created_at);
            add(&transfer.to, transfer.created_at);
        }
        for reward in &batch.delegator_rewards {
            add(&reward.delegator, reward.created_at);
        }

        accounts
    }

    /// Run until shutdown or until every worker has stopped.
    ///
    /// Results already received are committed before returning.
    #[instrument(skip_all, fields(parser = %self.title))]
    pub async fn run(
        mut self,
        mut results: mpsc::Receiver<HeightFacts>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> u64 {
        debug!(checkpoint = self.checkpoint, "Committer started");
        let mut ticker = tokio::time::interval_at(
            Instant::now() + self.config.first_tick,
            self.config.commit_interval,
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = wait_for_shutdown(&mut shutdown_rx) => break,
                received = results.recv() => match received {
                    Some(facts) => {
                        self.receive(facts);
                    }
                    None => break,
                },
                _ = ticker.tick() => {
                    self.commit_ready().await;
                }
            }
        }

        while let Ok(facts) = results.try_recv() {
            self.receive(facts);
        }
        let drained = self.commit_ready().await;
        debug!(
            checkpoint = self.checkpoint,
            drained,
            pending = self.buffer.len(),
            "Committer stopped"
        );
        self.checkpoint
    }
}
