//! Concurrent batch replay strategy
//!
//! # Architecture
//!
//! ```text
//! AsyncProcessingStrategy
//!     ├── BatchConfig (batch_size, max_concurrent_batches)
//!     ├── SyncReader (streaming CSV rows, taken batch_size at a time)
//!     └── BatchProcessor (account partitioning + blocking pool)
//!         └── LedgerEngine<MemoryStore> (shared, per-account locking)
//! ```
//!
//! Batches are processed one after another so an account's operations keep
//! file order across batch boundaries. Within a batch, groups that share no
//! account run concurrently on the tokio blocking pool.

use crate::core::{LedgerEngine, MemoryStore};
use crate::io::sync_reader::SyncReader;
use crate::strategy::batch::BatchProcessor;
use crate::strategy::{log_rejection, ProcessingStrategy, ReplaySummary};
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Configuration for batch processing
///
/// Controls how many rows form a batch and how many account groups of a batch
/// run at once.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchConfig {
    /// Number of operations per batch
    pub batch_size: usize,
    /// Maximum number of account groups running concurrently
    pub max_concurrent_batches: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            max_concurrent_batches: num_cpus::get(),
        }
    }
}

impl BatchConfig {
    /// Create a new BatchConfig with custom values
    ///
    /// Zero values fall back to the defaults with a warning.
    pub fn new(batch_size: usize, max_concurrent_batches: usize) -> Self {
        let default = Self::default();

        let batch_size = if batch_size == 0 {
            warn!(
                batch_size,
                fallback = default.batch_size,
                "invalid batch_size, using default"
            );
            default.batch_size
        } else {
            batch_size
        };

        let max_concurrent_batches = if max_concurrent_batches == 0 {
            warn!(
                max_concurrent_batches,
                fallback = default.max_concurrent_batches,
                "invalid max_concurrent_batches, using default"
            );
            default.max_concurrent_batches
        } else {
            max_concurrent_batches
        };

        Self {
            batch_size,
            max_concurrent_batches,
        }
    }
}

/// Concurrent batch replay strategy
#[derive(Debug, Clone)]
pub struct AsyncProcessingStrategy {
    config: BatchConfig,
}

impl AsyncProcessingStrategy {
    pub fn new(config: BatchConfig) -> Self {
        Self { config }
    }
}

impl ProcessingStrategy for AsyncProcessingStrategy {
    fn process(
        &self,
        engine: &LedgerEngine<MemoryStore>,
        input_path: &Path,
        cancel: &CancellationToken,
    ) -> Result<ReplaySummary, String> {
        let mut reader = SyncReader::new(input_path)?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.config.max_concurrent_batches)
            .max_blocking_threads(self.config.max_concurrent_batches)
            .build()
            .map_err(|e| format!("Failed to create tokio runtime: {}", e))?;

        let processor = BatchProcessor::new(engine.clone(), self.config.max_concurrent_batches);

        runtime.block_on(async {
            let mut summary = ReplaySummary::default();

            loop {
                let mut batch = Vec::with_capacity(self.config.batch_size);
                let mut rows = 0;
                for row in reader.by_ref().take(self.config.batch_size) {
                    rows += 1;
                    match row {
                        Ok(request) => batch.push(request),
                        Err(e) => {
                            summary.malformed += 1;
                            log_rejection("skipping malformed row", &e);
                        }
                    }
                }
                if rows == 0 {
                    break;
                }

                debug!(size = batch.len(), "processing batch");
                for outcome in processor.process_batch(batch, cancel).await {
                    summary.record(&outcome.result);
                    if let Err(e) = &outcome.result {
                        log_rejection("operation refused", e);
                    }
                }
            }

            Ok(summary)
        })
    }
}
