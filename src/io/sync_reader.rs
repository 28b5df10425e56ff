//! Synchronous CSV readers
//!
//! [`SyncReader`] streams operation requests from an operations file, one row
//! at a time. [`read_accounts`] loads a whole accounts seed file.
//!
//! ```no_run
//! use ledger_engine::io::sync_reader::SyncReader;
//! use std::path::Path;
//!
//! let reader = SyncReader::new(Path::new("operations.csv")).unwrap();
//! for result in reader {
//!     match result {
//!         Ok(request) => println!("{:?}", request),
//!         Err(e) => eprintln!("Error: {}", e),
//!     }
//! }
//! ```
//!
//! # Error Handling
//!
//! - Fatal errors (file not found, I/O errors) are returned from `new()`
//! - Malformed operation rows are yielded as `Err` and iteration continues
//! - A malformed seed row fails the whole seed load
//! - Line numbers are included in error messages

use crate::io::csv_format::{
    convert_account_record, convert_operation_record, AccountCsvRecord, OperationCsvRecord,
};
use crate::types::{Account, OperationRequest};
use csv::{Reader, ReaderBuilder, Trim};
use std::fs::File;
use std::path::Path;

fn open_csv(path: &Path) -> Result<Reader<File>, String> {
    let file = File::open(path)
        .map_err(|e| format!("Failed to open file '{}': {}", path.display(), e))?;

    Ok(ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .buffer_capacity(8 * 1024)
        .from_reader(file))
}

/// Streaming reader over an operations file
#[derive(Debug)]
pub struct SyncReader {
    reader: Reader<File>,
    line_num: usize,
}

impl SyncReader {
    /// Open `path` for streaming
    ///
    /// Fields are trimmed and rows may omit trailing optional columns.
    pub fn new(path: &Path) -> Result<Self, String> {
        Ok(Self {
            reader: open_csv(path)?,
            line_num: 0,
        })
    }
}

impl Iterator for SyncReader {
    type Item = Result<OperationRequest, String>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut deserializer = self.reader.deserialize::<OperationCsvRecord>();
        let row = deserializer.next()?;
        self.line_num += 1;

        // +1 for the header row
        let line = self.line_num + 1;
        Some(match row {
            Ok(record) => convert_operation_record(record).map_err(|e| format!("Line {}: {}", line, e)),
            Err(e) => Err(format!("Line {}: CSV parse error: {}", line, e)),
        })
    }
}

/// Load every account from a seed file
pub fn read_accounts(path: &Path) -> Result<Vec<Account>, String> {
    let mut reader = open_csv(path)?;
    let mut accounts = Vec::new();

    for (index, row) in reader.deserialize::<AccountCsvRecord>().enumerate() {
        let line = index + 2;
        let record = row.map_err(|e| format!("Line {}: CSV parse error: {}", line, e))?;
        accounts.push(convert_account_record(record).map_err(|e| format!("Line {}: {}", line, e))?);
    }

    Ok(accounts)
}
