//! Account rows for the in-memory store
//!
//! Each account lives behind its own `parking_lot` mutex inside a `DashMap`.
//! The map gives concurrent lookup of different accounts; the per-row mutex is
//! the mutation guarantee an atomic scope holds for its whole lifetime.
//!
//! Scopes take owned (`Arc`) guards so a lock can outlive the map lookup that
//! found it. No map reference is held while waiting on a row lock.

use crate::types::{Account, AccountNumber, AccountStatus, LedgerError};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::lock_api::ArcMutexGuard;
use parking_lot::{Mutex, RawMutex};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Exclusive hold on one account row
pub(crate) type AccountGuard = ArcMutexGuard<RawMutex, Account>;

/// Longest single wait on a row lock before cancellation is re-checked
const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Thread-safe table of account rows
#[derive(Debug, Default)]
pub struct AccountTable {
    rows: DashMap<AccountNumber, Arc<Mutex<Account>>>,
}

impl AccountTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new account
    ///
    /// Opening balances must not be negative.
    pub fn open(&self, account: Account) -> Result<(), LedgerError> {
        if account.balance < Decimal::ZERO {
            return Err(LedgerError::invalid_amount(account.balance));
        }
        match self.rows.entry(account.number.clone()) {
            Entry::Occupied(_) => Err(LedgerError::account_already_exists(&account.number)),
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(Mutex::new(account)));
                Ok(())
            }
        }
    }

    fn row(&self, number: &AccountNumber) -> Option<Arc<Mutex<Account>>> {
        self.rows.get(number).map(|row| Arc::clone(row.value()))
    }

    /// Change an account's status
    ///
    /// Waits for any scope currently holding the account.
    pub fn set_status(
        &self,
        number: &AccountNumber,
        status: AccountStatus,
    ) -> Result<(), LedgerError> {
        let row = self
            .row(number)
            .ok_or_else(|| LedgerError::account_not_found(number))?;
        row.lock().status = status;
        Ok(())
    }

    pub fn contains(&self, number: &AccountNumber) -> bool {
        self.rows.contains_key(number)
    }

    /// Committed snapshot of one account
    pub fn snapshot(&self, number: &AccountNumber) -> Option<Account> {
        self.row(number).map(|row| row.lock().clone())
    }

    /// Committed snapshots of every account, sorted by account number
    pub fn all(&self) -> Vec<Account> {
        let rows: Vec<Arc<Mutex<Account>>> = self
            .rows
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        let mut accounts: Vec<Account> = rows.iter().map(|row| row.lock().clone()).collect();
        accounts.sort_by(|a, b| a.number.cmp(&b.number));
        accounts
    }

    /// Acquire the row lock for `number`, waiting at most `timeout`
    ///
    /// Returns `Ok(None)` for unknown accounts. The wait is sliced so a fired
    /// `cancel` ends it with [`LedgerError::Cancelled`] within one poll interval.
    pub(crate) fn lock(
        &self,
        number: &AccountNumber,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Option<AccountGuard>, LedgerError> {
        let Some(row) = self.row(number) else {
            return Ok(None);
        };
        let deadline = Instant::now() + timeout;
        loop {
            if cancel.is_cancelled() {
                return Err(LedgerError::Cancelled);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if let Some(guard) = row.try_lock_arc_for(remaining.min(LOCK_POLL_INTERVAL)) {
                return Ok(Some(guard));
            }
            if Instant::now() >= deadline {
                return Err(LedgerError::persistence(format!(
                    "timed out after {:?} waiting for lock on account {}",
                    timeout, number
                )));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::thread;

    fn number(raw: &str) -> AccountNumber {
        AccountNumber::parse(raw).unwrap()
    }

    #[test]
    fn test_open_and_snapshot() {
        let table = AccountTable::new();
        table
            .open(Account::new(number("1001"), dec!(100.00)))
            .unwrap();

        let account = table.snapshot(&number("1001")).unwrap();
        assert_eq!(account.balance, dec!(100.00));
        assert!(account.is_active());
        assert!(table.contains(&number("1001")));
        assert!(table.snapshot(&number("9999")).is_none());
    }

    #[test]
    fn test_open_rejects_duplicate() {
        let table = AccountTable::new();
        table.open(Account::new(number("1001"), dec!(1))).unwrap();
        let err = table
            .open(Account::new(number("1001"), dec!(2)))
            .unwrap_err();
        assert!(matches!(err, LedgerError::AccountAlreadyExists { .. }));
        assert_eq!(table.snapshot(&number("1001")).unwrap().balance, dec!(1));
    }

    #[test]
    fn test_open_rejects_negative_balance() {
        let table = AccountTable::new();
        let err = table
            .open(Account::new(number("1001"), dec!(-0.01)))
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidAmount { .. }));
    }

    #[test]
    fn test_set_status() {
        let table = AccountTable::new();
        table.open(Account::new(number("1001"), dec!(1))).unwrap();
        table
            .set_status(&number("1001"), AccountStatus::Inactive)
            .unwrap();
        assert!(!table.snapshot(&number("1001")).unwrap().is_active());

        let err = table
            .set_status(&number("404"), AccountStatus::Active)
            .unwrap_err();
        assert!(matches!(err, LedgerError::AccountNotFound { .. }));
    }

    #[test]
    fn test_all_is_sorted() {
        let table = AccountTable::new();
        for raw in ["3", "1", "2"] {
            table.open(Account::new(number(raw), dec!(0))).unwrap();
        }
        let numbers: Vec<String> = table
            .all()
            .into_iter()
            .map(|a| a.number.to_string())
            .collect();
        assert_eq!(numbers, vec!["1", "2", "3"]);
    }

    #[test]
    fn test_lock_unknown_account_is_none() {
        let table = AccountTable::new();
        let guard = table
            .lock(&number("404"), Duration::from_millis(10), &CancellationToken::new())
            .unwrap();
        assert!(guard.is_none());
    }

    #[test]
    fn test_lock_times_out_while_held() {
        let table = AccountTable::new();
        table.open(Account::new(number("1001"), dec!(1))).unwrap();

        let cancel = CancellationToken::new();
        let _held = table
            .lock(&number("1001"), Duration::from_millis(10), &cancel)
            .unwrap()
            .unwrap();
        assert!(matches!(
            table.lock(&number("1001"), Duration::from_millis(30), &cancel),
            Err(LedgerError::PersistenceFailure { .. })
        ));
    }

    #[test]
    fn test_lock_wait_ends_on_cancel() {
        let table = Arc::new(AccountTable::new());
        table.open(Account::new(number("1001"), dec!(1))).unwrap();
        let cancel = CancellationToken::new();

        let _held = table
            .lock(&number("1001"), Duration::from_millis(10), &cancel)
            .unwrap()
            .unwrap();
        let waiter = {
            let table = Arc::clone(&table);
            let cancel = cancel.clone();
            thread::spawn(move || {
                let started = Instant::now();
                let result = table
                    .lock(&number("1001"), Duration::from_secs(30), &cancel)
                    .map(|guard| guard.is_some());
                (result, started.elapsed())
            })
        };
        thread::sleep(Duration::from_millis(50));
        cancel.cancel();

        let (result, waited) = waiter.join().unwrap();
        assert_eq!(result, Err(LedgerError::Cancelled));
        assert!(waited < Duration::from_secs(5));
    }

    #[test]
    fn test_lock_refuses_when_already_cancelled() {
        let table = AccountTable::new();
        table.open(Account::new(number("1001"), dec!(1))).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        assert!(matches!(
            table.lock(&number("1001"), Duration::from_secs(1), &cancel),
            Err(LedgerError::Cancelled)
        ));
    }

    #[test]
    fn test_lock_released_on_guard_drop() {
        let table = AccountTable::new();
        table.open(Account::new(number("1001"), dec!(1))).unwrap();

        {
            let mut guard = table
                .lock(&number("1001"), Duration::from_millis(10), &CancellationToken::new())
                .unwrap()
                .unwrap();
            guard.balance = dec!(5);
        }
        assert_eq!(table.snapshot(&number("1001")).unwrap().balance, dec!(5));
    }
}
