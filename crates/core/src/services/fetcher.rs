//! Fetch workers - turn one height into its facts.
//!
//! Workers pull heights from a shared task queue, fetch everything the
//! height needs from the node, decode it and push the result to the
//! committer. Any failure discards the height's partial work and the whole
//! height is retried; workers never touch storage.

use std::collections::BTreeSet;
use std::sync::Arc;

use bigdecimal::BigDecimal;
use futures::{StreamExt, TryStreamExt, stream};
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, debug_span, instrument, trace, warn};

use crate::error::{ChainError, DecodeResult, IndexerResult};
use crate::metrics::{record_decode_error, record_fetch_failure, record_height_fetched};
use crate::models::{AccountTx, Block, HeightFacts, MissedBlock, Transaction, derived_id};
use crate::ports::{ChainNode, NodeBlock, NodeTx, ValidatorSet};

use super::address::{AddressScanner, consensus_address, normalize_signer, tx_hash_from_base64};
use super::decoder::MessageDecoder;
use super::retry::{RetryPolicy, retry_forever};
use super::wait_for_shutdown;

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for fetch workers.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Transaction details fetched concurrently within one height.
    pub tx_fetch_concurrency: usize,
    /// Delay between attempts of a failed height.
    pub retry: RetryPolicy,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            tx_fetch_concurrency: 4,
            retry: RetryPolicy::fetch(),
        }
    }
}

// =============================================================================
// HeightFetcher
// =============================================================================

/// Builds the complete [`HeightFacts`] of one height.
pub struct HeightFetcher<N: ChainNode> {
    node: Arc<N>,
    decoder: MessageDecoder,
    scanner: AddressScanner,
    config: FetchConfig,
}

impl<N: ChainNode> HeightFetcher<N> {
    pub fn new(node: Arc<N>, decoder: MessageDecoder, config: FetchConfig) -> Self {
        let params = decoder.params();
        let scanner = AddressScanner::new(params.address_prefix.clone(), params.address_length);
        Self {
            node,
            decoder,
            scanner,
            config,
        }
    }

    /// Fetch and decode one height, once.
    ///
    /// Either every fact of the height is returned, or an error.
    pub async fn fetch_height(&self, height: u64) -> IndexerResult<HeightFacts> {
        let block = self
            .node
            .block(height)
            .await
            .inspect_err(|_| record_fetch_failure("block"))?;
        let validators = self
            .node
            .validator_set(height)
            .await
            .inspect_err(|_| record_fetch_failure("validators"))?;

        let header = &block.block.header;
        let mut facts = HeightFacts::new(height);
        facts.blocks.push(Block {
            height,
            hash: block.block_id.hash.clone(),
            proposer: header.proposer_address.clone(),
            created_at: header.time,
        });
        facts.missed_blocks = missed_blocks(height, &block, &validators);

        let hashes = block
            .block
            .data
            .txs
            .iter()
            .map(|raw| tx_hash_from_base64(raw))
            .collect::<DecodeResult<Vec<_>>>()
            .inspect_err(|_| record_fetch_failure("decode"))?;

        let node = &self.node;
        let txs: Vec<NodeTx> = stream::iter(hashes)
            .map(|hash| async move { node.transaction(&hash).await })
            .buffered(self.config.tx_fetch_concurrency.max(1))
            .try_collect()
            .await
            .inspect_err(|_| record_fetch_failure("tx"))?;

        for tx in &txs {
            self.process_tx(tx, &mut facts)?;
        }

        trace!(
            height,
            txs = facts.transactions.len(),
            missed = facts.missed_blocks.len(),
            "Height fetched"
        );
        Ok(facts)
    }

    fn process_tx(&self, tx: &NodeTx, facts: &mut HeightFacts) -> IndexerResult<()> {
        let response = &tx.tx_response;
        if response.txhash.is_empty() {
            record_fetch_failure("tx");
            return Err(ChainError::InvalidResponse {
                endpoint: "cosmos/tx/v1beta1/txs".to_string(),
                message: "empty tx hash".to_string(),
            }
            .into());
        }

        let success = response.code == 0;
        let messages = &tx.tx.body.messages;

        let fee = self
            .decoder
            .params()
            .main_amount(&tx.tx.auth_info.fee.amount)
            .unwrap_or_else(|e| {
                warn!(height = response.height, tx = %response.txhash, error = %e, "⚠️  Unreadable fee, storing zero");
                BigDecimal::from(0)
            });

        facts.transactions.push(Transaction {
            hash: response.txhash.clone(),
            success,
            height: response.height,
            message_count: messages.len() as u64,
            fee,
            gas_used: response.gas_used,
            gas_wanted: response.gas_wanted,
            created_at: response.timestamp,
        });

        let mut addresses = BTreeSet::new();
        for message in messages {
            self.scanner.scan(message, &mut addresses);
        }
        facts
            .account_txs
            .extend(addresses.into_iter().map(|account| AccountTx {
                account,
                tx_hash: response.txhash.clone(),
            }));

        if !success {
            return Ok(());
        }

        for (index, message) in messages.iter().enumerate() {
            let decoded = self.decoder.decode(index, message, tx).inspect_err(|e| {
                let type_url = message
                    .get("@type")
                    .and_then(|t| t.as_str())
                    .unwrap_or("unknown");
                debug!(tx = %response.txhash, index, type_url, error = %e, "Message decode failed");
                record_decode_error(type_url);
                record_fetch_failure("decode");
            })?;
            for fact in decoded {
                facts.push(fact);
            }
        }

        Ok(())
    }
}

/// Validators of the set without a precommit in the block's last commit.
fn missed_blocks(height: u64, block: &NodeBlock, set: &ValidatorSet) -> Vec<MissedBlock> {
    let required: BTreeSet<String> = set
        .validators
        .iter()
        .filter_map(|v| match consensus_address(&v.pub_key.key) {
            Ok(address) => Some(address),
            Err(e) => {
                warn!(height, validator = %v.address, error = %e, "⚠️  Skipping validator key");
                None
            }
        })
        .collect();

    let signed: BTreeSet<String> = block
        .block
        .last_commit
        .signatures
        .iter()
        .filter_map(|s| normalize_signer(&s.validator_address))
        .collect();

    required
        .difference(&signed)
        .map(|validator| MissedBlock {
            id: derived_id(format!("{height}.{validator}")),
            height,
            validator: validator.clone(),
            created_at: block.block.header.time,
        })
        .collect()
}

// =============================================================================
// FetchWorkerPool
// =============================================================================

/// Fixed pool of fetch workers sharing one task queue.
pub struct FetchWorkerPool;

impl FetchWorkerPool {
    /// Spawn `workers` tasks.
    ///
    /// Each exits when the task queue closes, the result queue closes or
    /// shutdown is signalled.
    pub fn spawn<N: ChainNode + 'static>(
        workers: usize,
        fetcher: Arc<HeightFetcher<N>>,
        tasks: mpsc::Receiver<u64>,
        results: mpsc::Sender<HeightFacts>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Vec<JoinHandle<()>> {
        let tasks = Arc::new(Mutex::new(tasks));
        (0..workers.max(1))
            .map(|worker| {
                tokio::spawn(run_worker(
                    worker,
                    fetcher.clone(),
                    tasks.clone(),
                    results.clone(),
                    shutdown_rx.clone(),
                ))
            })
            .collect()
    }
}

#[instrument(skip_all, fields(worker = worker))]
async fn run_worker<N: ChainNode>(
    worker: usize,
    fetcher: Arc<HeightFetcher<N>>,
    tasks: Arc<Mutex<mpsc::Receiver<u64>>>,
    results: mpsc::Sender<HeightFacts>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let retry = fetcher.config.retry;
    loop {
        let next = {
            let mut queue = tasks.lock().await;
            tokio::select! {
                height = queue.recv() => height,
                _ = wait_for_shutdown(&mut shutdown_rx) => None,
            }
        };
        let Some(height) = next else {
            break;
        };

        let f = fetcher.as_ref();
        let fetch = retry_forever("fetch_height", retry, || {}, move || f.fetch_height(height))
            .instrument(debug_span!("height", height));

        let facts = tokio::select! {
            facts = fetch => facts,
            _ = wait_for_shutdown(&mut shutdown_rx) => break,
        };
        record_height_fetched();

        tokio::select! {
            sent = results.send(facts) => {
                if sent.is_err() {
                    debug!("Result queue closed");
                    break;
                }
            }
            _ = wait_for_shutdown(&mut shutdown_rx) => break,
        }
    }
    debug!("Fetch worker stopped");
}
