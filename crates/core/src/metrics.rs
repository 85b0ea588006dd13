//! Metrics definitions for the parser.
//!
//! This module defines all metrics used throughout the parser.
//! Metrics are collected using the `metrics` crate and can be exported
//! to Prometheus via `metrics-exporter-prometheus`.

use metrics::{
    counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram,
};
use std::time::Instant;

/// Initialize all metric descriptions.
/// Call this once at startup before any metrics are recorded.
pub fn init_metrics() {
    describe_counter!(
        "heights_fetched_total",
        "Total number of heights fully fetched and decoded by workers"
    );
    describe_counter!(
        "fetch_failures_total",
        "Total number of failed height fetch attempts"
    );
    describe_counter!(
        "decode_errors_total",
        "Total number of message decode errors"
    );
    describe_counter!(
        "heights_committed_total",
        "Total number of heights durably committed"
    );
    describe_counter!(
        "batches_committed_total",
        "Total number of committed batches"
    );
    describe_counter!(
        "storage_retries_total",
        "Total number of retried storage operations"
    );
    describe_counter!(
        "retry_stalls_total",
        "Failures of operations that exceeded the retry alert threshold"
    );
    describe_counter!(
        "accounts_discovered_total",
        "Total number of newly discovered accounts"
    );
    describe_gauge!("parser_height", "Last committed height");
    describe_gauge!("chain_latest_height", "Latest height reported by the node");
    describe_gauge!(
        "pending_results",
        "Per-height results buffered by the committer"
    );
    describe_histogram!(
        "batch_commit_duration_seconds",
        "Time taken to persist a batch in seconds"
    );
}

/// Record a height fully fetched by a worker.
pub fn record_height_fetched() {
    counter!("heights_fetched_total").increment(1);
}

/// Record a failed fetch attempt.
///
/// # Arguments
/// * `stage` - What failed ("block", "validators", "tx" or "decode")
pub fn record_fetch_failure(stage: &'static str) {
    counter!("fetch_failures_total", "stage" => stage).increment(1);
}

/// Record a message decode error.
///
/// # Arguments
/// * `message` - The message type URL
pub fn record_decode_error(message: &str) {
    counter!("decode_errors_total", "message" => message.to_string()).increment(1);
}

/// Record a committed batch.
pub fn record_batch_committed(heights: u64, checkpoint: u64) {
    counter!("batches_committed_total").increment(1);
    counter!("heights_committed_total").increment(heights);
    gauge!("parser_height").set(checkpoint as f64);
}

/// Record the current checkpoint without a commit (startup).
pub fn record_parser_height(height: u64) {
    gauge!("parser_height").set(height as f64);
}

/// Record the chain head seen by the scheduler.
pub fn record_chain_latest_height(height: u64) {
    gauge!("chain_latest_height").set(height as f64);
}

/// Record the committer buffer size.
pub fn record_pending_results(count: usize) {
    gauge!("pending_results").set(count as f64);
}

/// Record a retried storage operation.
pub fn record_storage_retry(operation: &'static str) {
    counter!("storage_retries_total", "operation" => operation).increment(1);
}

/// Record a failure past the retry alert threshold.
pub fn record_retry_stall(operation: &'static str) {
    counter!("retry_stalls_total", "operation" => operation).increment(1);
}

/// Record newly discovered accounts.
pub fn record_accounts_discovered(count: usize) {
    counter!("accounts_discovered_total").increment(count as u64);
}

/// Record batch persistence duration.
pub fn record_batch_commit_duration(duration_secs: f64) {
    histogram!("batch_commit_duration_seconds").record(duration_secs);
}

/// A timer that records batch commit duration when dropped.
pub struct CommitTimer {
    start: Instant,
}

impl CommitTimer {
    /// Start a new commit timer.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for CommitTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CommitTimer {
    fn drop(&mut self) {
        record_batch_commit_duration(self.start.elapsed().as_secs_f64());
    }
}
