//! Ledger Engine CLI
//!
//! Replays an operations CSV against accounts seeded from a CSV file.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- --accounts accounts.csv operations.csv > balances.csv
//! cargo run -- --accounts accounts.csv --strategy async --batch-size 2000 operations.csv
//! cargo run -- --accounts accounts.csv --journal journal.csv --log-format json operations.csv
//! ```
//!
//! Final balances go to stdout. Logs go to stderr.
//!
//! # Exit Codes
//!
//! - 0: Success
//! - 1: Error (file not found, malformed seed file, output failure, etc.)

use ledger_engine::cli;
use ledger_engine::logging::init_logging;
use ledger_engine::strategy::{self, ReplayJob};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::process;

fn main() {
    let args = cli::parse_args();
    init_logging(&args.log_level, args.log_format);

    let strategy = {
        let config = if matches!(args.strategy, cli::StrategyType::Async) {
            Some(args.to_batch_config())
        } else {
            None
        };
        strategy::create_strategy(args.strategy.clone(), config)
    };

    let mut journal = match &args.journal_file {
        Some(path) => match File::create(path) {
            Ok(file) => Some(BufWriter::new(file)),
            Err(e) => {
                eprintln!("Error: Failed to create journal '{}': {}", path.display(), e);
                process::exit(1);
            }
        },
        None => None,
    };

    let mut output = std::io::stdout();
    let job = ReplayJob {
        accounts_path: &args.accounts_file,
        operations_path: &args.input_file,
        output: &mut output,
        journal: journal.as_mut().map(|writer| writer as &mut dyn Write),
    };

    if let Err(e) = strategy::replay(strategy.as_ref(), &args.to_engine_config(), job) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
    if let Some(Err(e)) = journal.as_mut().map(Write::flush) {
        eprintln!("Error: Failed to flush journal: {}", e);
        process::exit(1);
    }
}
