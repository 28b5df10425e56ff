use crate::config::EngineConfig;
use crate::logging::LogFormat;
use crate::strategy::BatchConfig;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Replay ledger operations against a seeded set of accounts
#[derive(Parser, Debug)]
#[command(name = "ledger-engine")]
#[command(about = "Replay credits, debits and transfers against seeded accounts", long_about = None)]
pub struct CliArgs {
    /// Operations CSV file path
    #[arg(value_name = "OPERATIONS", help = "Path to the operations CSV file")]
    pub input_file: PathBuf,

    /// Accounts seed CSV file path
    #[arg(
        long = "accounts",
        value_name = "FILE",
        help = "Path to the accounts seed CSV (account,balance,status[,currency])"
    )]
    pub accounts_file: PathBuf,

    /// Replay strategy
    #[arg(
        long = "strategy",
        value_name = "STRATEGY",
        default_value = "sync",
        help = "Replay strategy: 'sync' for in-order or 'async' for concurrent batches"
    )]
    pub strategy: StrategyType,

    /// Number of operations per batch (async mode only)
    #[arg(
        long = "batch-size",
        value_name = "SIZE",
        help = "Number of operations per batch (default: 1000)"
    )]
    pub batch_size: Option<usize>,

    /// Maximum number of account groups running at once (async mode only)
    #[arg(
        long = "max-concurrent",
        value_name = "COUNT",
        help = "Maximum number of account groups processing concurrently (default: CPU cores)"
    )]
    pub max_concurrent_batches: Option<usize>,

    /// Per-account lock wait bound
    #[arg(
        long = "lock-timeout-ms",
        value_name = "MILLIS",
        help = "Longest wait for one account lock before the operation fails (default: 5000)"
    )]
    pub lock_timeout_ms: Option<u64>,

    /// Journal output path
    #[arg(
        long = "journal",
        value_name = "FILE",
        help = "Write every committed transaction record to this CSV file"
    )]
    pub journal_file: Option<PathBuf>,

    #[arg(long = "log-format", value_name = "FORMAT", default_value = "pretty")]
    pub log_format: LogFormat,

    /// Default log filter, overridden by RUST_LOG
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "warn")]
    pub log_level: String,
}

/// Available replay strategies
#[derive(Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum StrategyType {
    Sync,
    Async,
}

impl CliArgs {
    /// Create a BatchConfig from CLI arguments
    ///
    /// Missing values take the defaults; zero values fall back to the
    /// defaults with a warning.
    pub fn to_batch_config(&self) -> BatchConfig {
        if self.batch_size.is_some() || self.max_concurrent_batches.is_some() {
            let default = BatchConfig::default();
            BatchConfig::new(
                self.batch_size.unwrap_or(default.batch_size),
                self.max_concurrent_batches
                    .unwrap_or(default.max_concurrent_batches),
            )
        } else {
            BatchConfig::default()
        }
    }

    pub fn to_engine_config(&self) -> EngineConfig {
        EngineConfig::from_millis(self.lock_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::time::Duration;

    #[rstest]
    #[case::default_strategy(&["program", "--accounts", "a.csv", "ops.csv"], StrategyType::Sync)]
    #[case::explicit_sync(&["program", "--accounts", "a.csv", "--strategy", "sync", "ops.csv"], StrategyType::Sync)]
    #[case::explicit_async(&["program", "--accounts", "a.csv", "--strategy", "async", "ops.csv"], StrategyType::Async)]
    fn test_strategy_parsing(#[case] args: &[&str], #[case] expected: StrategyType) {
        let parsed = CliArgs::try_parse_from(args).unwrap();
        assert_eq!(parsed.strategy, expected);
    }

    #[rstest]
    #[case::batch_size(&["program", "--accounts", "a.csv", "--batch-size", "2000", "ops.csv"], Some(2000), None)]
    #[case::max_concurrent(&["program", "--accounts", "a.csv", "--max-concurrent", "8", "ops.csv"], None, Some(8))]
    #[case::no_options(&["program", "--accounts", "a.csv", "ops.csv"], None, None)]
    fn test_batch_options(
        #[case] args: &[&str],
        #[case] batch_size: Option<usize>,
        #[case] max_concurrent: Option<usize>,
    ) {
        let parsed = CliArgs::try_parse_from(args).unwrap();
        assert_eq!(parsed.batch_size, batch_size);
        assert_eq!(parsed.max_concurrent_batches, max_concurrent);
    }

    #[rstest]
    #[case::all_defaults(&["program", "--accounts", "a.csv", "ops.csv"], 1000, num_cpus::get())]
    #[case::custom_batch_size(&["program", "--accounts", "a.csv", "--batch-size", "2000", "ops.csv"], 2000, num_cpus::get())]
    #[case::zero_batch_size(&["program", "--accounts", "a.csv", "--batch-size", "0", "ops.csv"], 1000, num_cpus::get())]
    #[case::zero_max_concurrent(&["program", "--accounts", "a.csv", "--max-concurrent", "0", "ops.csv"], 1000, num_cpus::get())]
    fn test_batch_config_conversion(
        #[case] args: &[&str],
        #[case] expected_batch_size: usize,
        #[case] expected_max_concurrent: usize,
    ) {
        let config = CliArgs::try_parse_from(args).unwrap().to_batch_config();
        assert_eq!(config.batch_size, expected_batch_size);
        assert_eq!(config.max_concurrent_batches, expected_max_concurrent);
    }

    #[rstest]
    #[case::default(&["program", "--accounts", "a.csv", "ops.csv"], Duration::from_secs(5))]
    #[case::custom(&["program", "--accounts", "a.csv", "--lock-timeout-ms", "250", "ops.csv"], Duration::from_millis(250))]
    fn test_engine_config_conversion(#[case] args: &[&str], #[case] expected: Duration) {
        let config = CliArgs::try_parse_from(args).unwrap().to_engine_config();
        assert_eq!(config.lock_timeout, expected);
    }

    #[test]
    fn test_output_and_logging_options() {
        let parsed = CliArgs::try_parse_from([
            "program",
            "--accounts",
            "a.csv",
            "--journal",
            "journal.csv",
            "--log-format",
            "json",
            "--log-level",
            "debug",
            "ops.csv",
        ])
        .unwrap();
        assert_eq!(parsed.journal_file, Some(PathBuf::from("journal.csv")));
        assert_eq!(parsed.log_format, LogFormat::Json);
        assert_eq!(parsed.log_level, "debug");
    }

    #[rstest]
    #[case::missing_input(&["program", "--accounts", "a.csv"])]
    #[case::missing_accounts(&["program", "ops.csv"])]
    #[case::invalid_strategy(&["program", "--accounts", "a.csv", "--strategy", "invalid", "ops.csv"])]
    #[case::invalid_log_format(&["program", "--accounts", "a.csv", "--log-format", "xml", "ops.csv"])]
    fn test_parsing_errors(#[case] args: &[&str]) {
        assert!(CliArgs::try_parse_from(args).is_err());
    }
}
