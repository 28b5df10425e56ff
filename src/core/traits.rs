//! Core traits for reference generation, account access and transaction storage
//!
//! These traits are the engine's only view of the outside world. The engine is
//! generic over them, so any persistence engine offering an atomic scope with
//! rollback can sit underneath it.
//!
//! # Scope contract
//!
//! A scope returned by [`LedgerStore::begin`] holds the mutation guarantee for
//! every account in its lock set until it ends. Writes made through the scope
//! become visible together on [`AtomicScope::commit`]. Dropping a scope
//! without committing is a rollback.

use crate::types::{
    Account, AccountNumber, LedgerError, Reference, Transaction, TransactionStatus,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio_util::sync::CancellationToken;

/// Source of fresh transaction references
pub trait ReferenceSource: Send + Sync {
    /// Produce a reference no earlier call has produced
    ///
    /// Fails only if the entropy source is exhausted.
    fn new_reference(&self) -> Result<Reference, LedgerError>;
}

/// Balance access for the accounts locked by a scope
pub trait AccountLedger {
    /// Read an account as seen from inside the scope
    ///
    /// Reflects balance changes already staged in this scope.
    fn find_account(&self, number: &AccountNumber) -> Result<Option<Account>, LedgerError>;

    /// Apply `delta` to a locked account's balance and return the new balance
    ///
    /// When `expected_prior` is given the mutation is refused unless the
    /// current balance equals it. A result below zero is refused.
    fn mutate_balance(
        &mut self,
        number: &AccountNumber,
        delta: Decimal,
        expected_prior: Option<Decimal>,
    ) -> Result<Decimal, LedgerError>;
}

/// Transaction record writes inside a scope
pub trait TransactionRecords {
    /// Stage a new record
    ///
    /// Fails with [`LedgerError::DuplicateReference`] if the reference is
    /// committed or claimed by another open scope.
    fn insert_transaction(&mut self, transaction: &Transaction) -> Result<(), LedgerError>;

    /// Move a record staged in this scope to `status`
    fn update_transaction_status(
        &mut self,
        reference: &Reference,
        status: TransactionStatus,
        at: DateTime<Utc>,
    ) -> Result<(), LedgerError>;
}

/// One unit of work: all of its writes land together or not at all
pub trait AtomicScope: AccountLedger + TransactionRecords {
    /// Make every staged write visible and release the scope's locks
    fn commit(self) -> Result<(), LedgerError>;

    /// Discard every staged write and release the scope's locks
    fn rollback(self);
}

/// The persistence engine underneath the ledger
pub trait LedgerStore: Send + Sync {
    type Scope<'a>: AtomicScope
    where
        Self: 'a;

    /// Open a scope holding the mutation guarantee for `accounts`
    ///
    /// Implementations must acquire per-account guarantees in ascending
    /// account-number order, whatever order `accounts` arrives in. A wait for
    /// a held account ends with [`LedgerError::Cancelled`] once `cancel` fires.
    fn begin(
        &self,
        accounts: &[AccountNumber],
        cancel: &CancellationToken,
    ) -> Result<Self::Scope<'_>, LedgerError>;

    /// Committed snapshot of one account
    fn account(&self, number: &AccountNumber) -> Result<Option<Account>, LedgerError>;

    /// Committed record with this reference
    fn transaction_by_reference(
        &self,
        reference: &Reference,
    ) -> Result<Option<Transaction>, LedgerError>;

    /// Committed records naming `number` as sender or receiver, oldest first
    fn transactions_for_account(
        &self,
        number: &AccountNumber,
    ) -> Result<Vec<Transaction>, LedgerError>;
}
