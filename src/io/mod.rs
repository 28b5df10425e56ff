//! I/O module
//!
//! Handles CSV parsing and output for the replay CLI.
//!
//! # Components
//!
//! - `csv_format` - CSV format handling (record conversion, output serialization)
//! - `sync_reader` - Streaming operations reader and accounts seed loader

pub mod csv_format;
pub mod sync_reader;

pub use csv_format::{
    convert_account_record, convert_operation_record, write_accounts_csv, write_transactions_csv,
    AccountCsvRecord, OperationCsvRecord,
};
pub use sync_reader::{read_accounts, SyncReader};
