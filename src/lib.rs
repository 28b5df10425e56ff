//! Ledger Transaction Engine Library
//!
//! # Overview
//!
//! Moves value between accounts under a strict non-negative balance invariant.
//! Every credit, debit and transfer runs inside one atomic scope of a
//! pluggable store: its balance changes and its transaction record land
//! together or not at all.
//!
//! # Architecture
//!
//! - [`types`] - Accounts, transactions, operation requests and [`LedgerError`]
//! - [`core`] - Business logic components:
//!   - [`core::traits`] - The store and reference-source contracts
//!   - [`core::reference`] - Collision-resistant reference generation
//!   - [`core::engine`] - Credit, debit and transfer orchestration
//!   - [`core::memory`] - In-memory store with per-account locking
//! - [`config`] - Engine tunables
//! - [`logging`] - `tracing` subscriber setup
//! - [`io`] - CSV formats for the replay CLI
//! - [`strategy`] - Sequential and concurrent replay of an operations file
//! - [`cli`] - CLI arguments parsing
//!
//! # Operations
//!
//! - **Credit**: add funds to a receiver account
//! - **Debit**: remove funds from a sender account (requires sufficient balance)
//! - **Transfer**: move funds between two distinct accounts in one scope
//!
//! Transfers lock their two accounts in ascending account-number order, so
//! opposite transfers between the same pair cannot deadlock.
//!
//! # Transaction States
//!
//! Records start Pending and end Completed or Failed. Failed records are kept
//! for operations refused for an inactive account or insufficient funds.

pub mod cli;
pub mod config;
pub mod core;
pub mod io;
pub mod logging;
pub mod strategy;
pub mod types;

pub use config::EngineConfig;
pub use core::{LedgerEngine, LedgerStore, MemoryStore, ReferenceGenerator, ReferenceSource};
pub use io::write_accounts_csv;
pub use types::{
    Account, AccountNumber, AccountStatus, LedgerError, OperationRequest, Reference, Transaction,
    TransactionStatus, TransactionType,
};
