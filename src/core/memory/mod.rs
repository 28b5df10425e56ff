//! In-memory ledger store
//!
//! The default [`LedgerStore`] behind the binary and the test suite. Accounts
//! sit in a concurrent table with one mutex per row; a scope locks its rows in
//! ascending account-number order and keeps them until it ends.

mod account_ledger;
mod faults;
mod scope;
mod transaction_store;

pub use account_ledger::AccountTable;
pub use faults::{FaultInjector, FaultPoint};
pub use scope::MemoryScope;
pub use transaction_store::TransactionLog;

use crate::config::{EngineConfig, DEFAULT_LOCK_TIMEOUT};
use crate::core::traits::LedgerStore;
use crate::types::{Account, AccountNumber, AccountStatus, LedgerError, Reference, Transaction};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::trace;

#[derive(Debug)]
pub struct MemoryStore {
    accounts: AccountTable,
    transactions: TransactionLog,
    faults: FaultInjector,
    lock_timeout: Duration,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_lock_timeout(DEFAULT_LOCK_TIMEOUT)
    }

    pub fn with_config(config: &EngineConfig) -> Self {
        Self::with_lock_timeout(config.lock_timeout)
    }

    fn with_lock_timeout(lock_timeout: Duration) -> Self {
        Self {
            accounts: AccountTable::new(),
            transactions: TransactionLog::new(),
            faults: FaultInjector::default(),
            lock_timeout,
        }
    }

    /// Register an account. Fails if the number is taken.
    pub fn open_account(&self, account: Account) -> Result<(), LedgerError> {
        self.accounts.open(account)
    }

    pub fn set_account_status(
        &self,
        number: &AccountNumber,
        status: AccountStatus,
    ) -> Result<(), LedgerError> {
        self.accounts.set_status(number, status)
    }

    /// Committed snapshots of all accounts, sorted by number
    pub fn accounts(&self) -> Vec<Account> {
        self.accounts.all()
    }

    pub fn transactions(&self) -> &TransactionLog {
        &self.transactions
    }

    /// Fault switches for exercising rollback paths
    pub fn faults(&self) -> &FaultInjector {
        &self.faults
    }
}

impl LedgerStore for MemoryStore {
    type Scope<'a> = MemoryScope<'a>;

    fn begin(
        &self,
        accounts: &[AccountNumber],
        cancel: &CancellationToken,
    ) -> Result<MemoryScope<'_>, LedgerError> {
        self.faults.check(FaultPoint::Begin)?;

        // BTreeSet iteration fixes the global lock order
        let ordered: BTreeSet<&AccountNumber> = accounts.iter().collect();
        let mut guards = BTreeMap::new();
        for number in ordered {
            trace!(account = %number, "acquiring account lock");
            if let Some(guard) = self.accounts.lock(number, self.lock_timeout, cancel)? {
                guards.insert(number.clone(), guard);
            }
        }
        Ok(MemoryScope::new(self, guards))
    }

    fn account(&self, number: &AccountNumber) -> Result<Option<Account>, LedgerError> {
        Ok(self.accounts.snapshot(number))
    }

    fn transaction_by_reference(
        &self,
        reference: &Reference,
    ) -> Result<Option<Transaction>, LedgerError> {
        Ok(self.transactions.get(reference))
    }

    fn transactions_for_account(
        &self,
        number: &AccountNumber,
    ) -> Result<Vec<Transaction>, LedgerError> {
        Ok(self.transactions.for_account(number))
    }
}
