//! Core business logic module
//!
//! This module contains the ledger's transaction processing components:
//! - `traits` - The store and reference-source seams the engine is generic over
//! - `reference` - Transaction reference generation
//! - `engine` - Credit, debit and transfer orchestration
//! - `memory` - The in-memory store with per-account locking

pub mod engine;
pub mod memory;
pub mod reference;
pub mod traits;

pub use engine::LedgerEngine;
pub use memory::{FaultPoint, MemoryStore};
pub use reference::ReferenceGenerator;
pub use traits::{AccountLedger, AtomicScope, LedgerStore, ReferenceSource, TransactionRecords};
