//! Replay strategies for operations files
//!
//! A strategy feeds every request in an operations CSV through a
//! [`LedgerEngine`]. Strategies differ only in scheduling: the sync strategy
//! replays rows one after another, the async strategy replays independent
//! groups of rows concurrently.
//!
//! [`replay`] wires a strategy to the rest of the pipeline: seed the store,
//! run the strategy, then write balances and the optional journal.

use crate::cli::StrategyType;
use crate::config::EngineConfig;
use crate::core::{LedgerEngine, MemoryStore};
use crate::io::{read_accounts, write_accounts_csv, write_transactions_csv};
use crate::types::{LedgerError, Transaction};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub mod r#async;
pub mod batch;
pub mod sync;

pub use self::r#async::{AsyncProcessingStrategy, BatchConfig};
pub use batch::{BatchProcessor, ProcessingResult};
pub use sync::SyncProcessingStrategy;

/// Counts of how each replayed row ended
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    /// Operations that committed a Completed record
    pub completed: usize,
    /// Operations the engine refused
    pub rejected: usize,
    /// Rows that could not be parsed into a request
    pub malformed: usize,
}

impl ReplaySummary {
    /// Count one engine outcome
    pub fn record(&mut self, result: &Result<Transaction, LedgerError>) {
        match result {
            Ok(_) => self.completed += 1,
            Err(_) => self.rejected += 1,
        }
    }

    pub fn merge(&mut self, other: ReplaySummary) {
        self.completed += other.completed;
        self.rejected += other.rejected;
        self.malformed += other.malformed;
    }

    pub fn total(&self) -> usize {
        self.completed + self.rejected + self.malformed
    }
}

/// Processing strategy for replaying an operations file
pub trait ProcessingStrategy: Send + Sync {
    /// Replay every row of `input_path` through `engine`
    ///
    /// # Returns
    ///
    /// * `Ok(ReplaySummary)` once every row has been attempted
    /// * `Err(String)` if a fatal error occurred (file not found, runtime failure)
    ///
    /// Malformed rows and refused operations are logged and counted. They do
    /// not stop the replay.
    fn process(
        &self,
        engine: &LedgerEngine<MemoryStore>,
        input_path: &Path,
        cancel: &CancellationToken,
    ) -> Result<ReplaySummary, String>;
}

/// Create a processing strategy based on the specified strategy type
///
/// `config` is ignored for the sync strategy.
pub fn create_strategy(
    strategy_type: StrategyType,
    config: Option<BatchConfig>,
) -> Box<dyn ProcessingStrategy> {
    match strategy_type {
        StrategyType::Sync => Box::new(SyncProcessingStrategy),
        StrategyType::Async => {
            let config = config.unwrap_or_default();
            Box::new(AsyncProcessingStrategy::new(config))
        }
    }
}

/// Log a refused operation or malformed row without stopping the replay
pub(crate) fn log_rejection(context: &str, error: &dyn std::fmt::Display) {
    warn!(%error, "{}", context);
}

/// Input and output locations for one replay run
pub struct ReplayJob<'a> {
    pub accounts_path: &'a Path,
    pub operations_path: &'a Path,
    pub output: &'a mut dyn Write,
    pub journal: Option<&'a mut dyn Write>,
}

/// Seed a fresh store, replay the operations and write the results
///
/// Balances go to `job.output`. Every committed record, Completed or Failed,
/// goes to `job.journal` in commit order.
pub fn replay(
    strategy: &dyn ProcessingStrategy,
    config: &EngineConfig,
    job: ReplayJob<'_>,
) -> Result<ReplaySummary, String> {
    let store = Arc::new(MemoryStore::with_config(config));
    for account in read_accounts(job.accounts_path)? {
        store
            .open_account(account)
            .map_err(|e| format!("Failed to seed accounts: {}", e))?;
    }
    let engine = LedgerEngine::new(Arc::clone(&store), config.clone());

    let summary = strategy.process(&engine, job.operations_path, &CancellationToken::new())?;
    info!(
        completed = summary.completed,
        rejected = summary.rejected,
        malformed = summary.malformed,
        "replay finished"
    );

    write_accounts_csv(&store.accounts(), job.output)?;
    if let Some(journal) = job.journal {
        write_transactions_csv(&store.transactions().all(), journal)?;
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_summary_counts() {
        let mut summary = ReplaySummary::default();
        summary.record(&Err(LedgerError::invalid_amount(dec!(0))));
        summary.record(&Err(LedgerError::Cancelled));

        let mut other = ReplaySummary {
            completed: 2,
            rejected: 0,
            malformed: 1,
        };
        other.merge(summary);

        assert_eq!(other.completed, 2);
        assert_eq!(other.rejected, 2);
        assert_eq!(other.malformed, 1);
        assert_eq!(other.total(), 5);
    }
}
