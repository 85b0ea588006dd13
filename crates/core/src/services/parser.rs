//! Parser lifecycle - orchestrates genesis, workers, committer and scheduling.
//!
//! # Flow
//!
//! 1. Load (or create) the checkpoint
//! 2. Import genesis when the checkpoint is 0
//! 3. Spawn fetch workers and the committer
//! 4. Poll the node's latest height and enqueue every height above the
//!    scheduled cursor
//! 5. On shutdown, stop scheduling and let workers and committer drain

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{Instrument, debug, error, info, info_span, instrument, warn};

use crate::error::{IndexerError, IndexerResult};
use crate::metrics::{record_chain_latest_height, record_parser_height, record_storage_retry};
use crate::ports::{AccountFilter, ChainNode, Repositories};

use super::amount::ChainParams;
use super::committer::{CommitterConfig, KnownAddresses, SequencingCommitter};
use super::decoder::MessageDecoder;
use super::fetcher::{FetchConfig, FetchWorkerPool, HeightFetcher};
use super::genesis::GenesisBootstrapper;
use super::retry::{RetryPolicy, retry_forever};
use super::wait_for_shutdown;

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the parser.
#[derive(Debug, Clone)]
pub struct ParserConfig {
    /// Parser name, key of the checkpoint row.
    pub title: String,
    /// Number of fetch workers.
    pub fetchers: usize,
    /// Capacity of the height task queue.
    pub task_queue_capacity: usize,
    /// Capacity of the result queue.
    pub result_queue_capacity: usize,
    /// Sleep between latest-height polls when there is nothing to schedule.
    pub poll_interval: Duration,
    /// Rows per write during the genesis import.
    pub genesis_batch_size: usize,
    pub fetch: FetchConfig,
    pub committer: CommitterConfig,
    /// Delay between retries of startup storage reads.
    pub storage_retry: RetryPolicy,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            title: "hub3".to_string(),
            fetchers: 5,
            task_queue_capacity: 5000,
            result_queue_capacity: 5000,
            poll_interval: Duration::from_secs(1),
            genesis_batch_size: 100,
            fetch: FetchConfig::default(),
            committer: CommitterConfig::default(),
            storage_retry: RetryPolicy::storage(),
        }
    }
}

// =============================================================================
// Parser
// =============================================================================

/// Chain parser.
///
/// # Design
///
/// Workers only build facts; the committer is the single writer and the
/// only component advancing the checkpoint. The scheduler keeps its own
/// cursor of enqueued heights and never reads the checkpoint after startup.
pub struct Parser<N: ChainNode, R: Repositories> {
    config: ParserConfig,
    params: ChainParams,
    node: Arc<N>,
    repositories: Arc<R>,
    height_tx: watch::Sender<u64>,
}

impl<N: ChainNode + 'static, R: Repositories + 'static> Parser<N, R> {
    pub fn new(config: ParserConfig, params: ChainParams, node: Arc<N>, repositories: Arc<R>) -> Self {
        let (height_tx, _) = watch::channel(0);
        Self {
            config,
            params,
            node,
            repositories,
            height_tx,
        }
    }

    /// Watch the committed height.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.height_tx.subscribe()
    }

    /// Run the parser on a background task.
    pub fn spawn(self) -> ParserHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let checkpoint_rx = self.subscribe();
        let task = tokio::spawn(
            async move { self.run(shutdown_rx).await }.instrument(info_span!("parser")),
        );
        ParserHandle {
            shutdown_tx,
            checkpoint_rx,
            task: Some(task),
        }
    }

    /// Run until shutdown is signalled.
    ///
    /// Fails only on startup errors: unreadable checkpoint or failed
    /// genesis import.
    #[instrument(skip_all, fields(parser = %self.config.title))]
    pub async fn run(&self, mut shutdown_rx: watch::Receiver<bool>) -> IndexerResult<()> {
        info!("⛓️  Starting parser");

        let checkpoint = self
            .repositories
            .checkpoints()
            .get_or_create(&self.config.title)
            .await?;
        self.height_tx.send_replace(checkpoint.height);
        record_parser_height(checkpoint.height);
        info!(height = checkpoint.height, "⛓️  Checkpoint loaded");

        let known = if checkpoint.height == 0 {
            GenesisBootstrapper::new(
                self.node.clone(),
                self.repositories.clone(),
                self.params.clone(),
                self.config.genesis_batch_size,
            )
            .run()
            .await?
        } else {
            self.load_known_addresses().await
        };
        debug!(count = known.len(), "Known addresses loaded");

        let (task_tx, task_rx) = mpsc::channel(self.config.task_queue_capacity.max(1));
        let (result_tx, result_rx) = mpsc::channel(self.config.result_queue_capacity.max(1));

        let fetcher = Arc::new(HeightFetcher::new(
            self.node.clone(),
            MessageDecoder::new(self.params.clone()),
            self.config.fetch.clone(),
        ));
        let workers = FetchWorkerPool::spawn(
            self.config.fetchers,
            fetcher,
            task_rx,
            result_tx,
            shutdown_rx.clone(),
        );

        let committer = SequencingCommitter::new(
            self.config.title.clone(),
            self.repositories.clone(),
            self.config.committer.clone(),
            checkpoint.height,
            known,
            self.height_tx.clone(),
        );
        let committer = tokio::spawn(
            committer
                .run(result_rx, shutdown_rx.clone())
                .instrument(info_span!("committer")),
        );
        let mut children: Vec<AbortHandle> = workers.iter().map(JoinHandle::abort_handle).collect();
        children.push(committer.abort_handle());
        let _children = AbortOnDrop(children);

        self.schedule(checkpoint.height, &task_tx, &mut shutdown_rx)
            .await;
        drop(task_tx);

        for worker in workers {
            if let Err(e) = worker.await {
                error!(error = ?e, "❌ Fetch worker panicked");
            }
        }
        match committer.await {
            Ok(height) => info!(height, "🛑 Parser stopped"),
            Err(e) => {
                error!(error = ?e, "❌ Committer panicked");
                return Err(IndexerError::Internal(format!("committer task failed: {e}")));
            }
        }
        Ok(())
    }

    /// Enqueue heights above the scheduled cursor until shutdown.
    async fn schedule(
        &self,
        mut scheduled: u64,
        task_tx: &mpsc::Sender<u64>,
        shutdown_rx: &mut watch::Receiver<bool>,
    ) {
        loop {
            if *shutdown_rx.borrow() {
                return;
            }

            let latest = match self.node.latest_block().await {
                Ok(block) => {
                    record_chain_latest_height(block.block.header.height);
                    block.block.header.height
                }
                Err(e) => {
                    warn!(error = ?e, "⚠️  Failed to get latest block");
                    scheduled
                }
            };

            let progressed = latest > scheduled;
            if progressed {
                debug!(from = scheduled + 1, to = latest, "Scheduling heights");
            }
            while scheduled < latest {
                tokio::select! {
                    sent = task_tx.send(scheduled + 1) => {
                        if sent.is_err() {
                            return;
                        }
                        scheduled += 1;
                    }
                    _ = wait_for_shutdown(shutdown_rx) => return,
                }
            }

            if progressed {
                continue;
            }
            tokio::select! {
                _ = tokio::time::sleep(self.config.poll_interval) => {}
                _ = wait_for_shutdown(shutdown_rx) => return,
            }
        }
    }

    async fn load_known_addresses(&self) -> KnownAddresses {
        let repositories = &self.repositories;
        let accounts = retry_forever(
            "list_accounts",
            self.config.storage_retry,
            || record_storage_retry("list_accounts"),
            || repositories.accounts().list_accounts(AccountFilter::default()),
        )
        .await;
        accounts.into_iter().map(|a| a.address).collect()
    }
}

/// Aborts the worker and committer tasks when the parser future is dropped.
struct AbortOnDrop(Vec<AbortHandle>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        for handle in &self.0 {
            handle.abort();
        }
    }
}

// =============================================================================
// ParserHandle
// =============================================================================

/// Control handle of a spawned [`Parser`].
pub struct ParserHandle {
    shutdown_tx: watch::Sender<bool>,
    checkpoint_rx: watch::Receiver<u64>,
    task: Option<JoinHandle<IndexerResult<()>>>,
}

impl ParserHandle {
    /// Last committed height.
    pub fn checkpoint(&self) -> u64 {
        *self.checkpoint_rx.borrow()
    }

    /// Watch the committed height.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.checkpoint_rx.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(|task| task.is_finished())
    }

    /// Wait for the parser to exit on its own (startup failure).
    pub async fn wait(&mut self) -> IndexerResult<()> {
        let Some(task) = self.task.as_mut() else {
            return Ok(());
        };
        let result = task.await;
        self.task = None;
        flatten(result)
    }

    /// Signal shutdown and wait up to `grace` for workers and committer.
    ///
    /// On timeout the parser task is aborted, and with it every worker and
    /// the committer, even one stuck retrying a write.
    pub async fn stop(mut self, grace: Duration) -> IndexerResult<()> {
        let _ = self.shutdown_tx.send(true);
        let Some(mut task) = self.task.take() else {
            return Ok(());
        };
        match tokio::time::timeout(grace, &mut task).await {
            Ok(result) => flatten(result),
            Err(_) => {
                warn!(grace_secs = grace.as_secs(), "⚠️  Parser shutdown timed out");
                task.abort();
                Err(IndexerError::Internal("parser shutdown timed out".into()))
            }
        }
    }
}

fn flatten(result: Result<IndexerResult<()>, tokio::task::JoinError>) -> IndexerResult<()> {
    result.map_err(|e| IndexerError::Internal(format!("parser task failed: {e}")))?
}
