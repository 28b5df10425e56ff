//! Synchronous replay strategy
//!
//! Replays an operations file one row at a time on the calling thread. It is
//! the reference ordering the concurrent strategy must agree with.
//!
//! # Memory Efficiency
//!
//! Rows are streamed through `SyncReader`; the file is never loaded whole.

use crate::core::{LedgerEngine, MemoryStore};
use crate::io::sync_reader::SyncReader;
use crate::strategy::{log_rejection, ProcessingStrategy, ReplaySummary};
use std::path::Path;
use tokio_util::sync::CancellationToken;

/// Synchronous replay strategy
///
/// # Examples
///
/// ```no_run
/// use ledger_engine::config::EngineConfig;
/// use ledger_engine::core::{LedgerEngine, MemoryStore};
/// use ledger_engine::strategy::{ProcessingStrategy, SyncProcessingStrategy};
/// use std::path::Path;
/// use std::sync::Arc;
/// use tokio_util::sync::CancellationToken;
///
/// let engine = LedgerEngine::new(Arc::new(MemoryStore::new()), EngineConfig::default());
/// let summary = SyncProcessingStrategy
///     .process(&engine, Path::new("operations.csv"), &CancellationToken::new())
///     .expect("Replay failed");
/// println!("{} completed", summary.completed);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct SyncProcessingStrategy;

impl ProcessingStrategy for SyncProcessingStrategy {
    fn process(
        &self,
        engine: &LedgerEngine<MemoryStore>,
        input_path: &Path,
        cancel: &CancellationToken,
    ) -> Result<ReplaySummary, String> {
        let reader = SyncReader::new(input_path)?;
        let mut summary = ReplaySummary::default();

        for row in reader {
            match row {
                Ok(request) => {
                    let result = engine.execute(request, cancel);
                    if let Err(e) = &result {
                        log_rejection("operation refused", e);
                    }
                    summary.record(&result);
                }
                Err(e) => {
                    summary.malformed += 1;
                    log_rejection("skipping malformed row", &e);
                }
            }
        }

        Ok(summary)
    }
}
