//! Types module
//!
//! Contains core data structures used throughout the application.
//! This module organizes types into logical submodules:
//! - `account`: account numbers, status and balance snapshots
//! - `transaction`: references, transaction records and operation requests
//! - `error`: error types for the ledger engine

pub mod account;
pub mod error;
pub mod transaction;

pub use account::{Account, AccountNumber, AccountStatus};
pub use error::LedgerError;
pub use transaction::{
    OperationKind, OperationRequest, Reference, Transaction, TransactionMetadata,
    TransactionStatus, TransactionType,
};
