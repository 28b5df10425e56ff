//! Atomic scope over the in-memory store
//!
//! A scope owns the row locks for its lock set from `begin` until it is
//! committed or dropped. Balance changes and new records are staged locally
//! and only written through to the shared tables on commit, so dropping the
//! scope at any point leaves no trace.

use super::account_ledger::AccountGuard;
use super::faults::FaultPoint;
use super::MemoryStore;
use crate::core::traits::{AccountLedger, AtomicScope, TransactionRecords};
use crate::types::{
    Account, AccountNumber, LedgerError, Reference, Transaction, TransactionStatus,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use tracing::debug;

pub struct MemoryScope<'a> {
    store: &'a MemoryStore,
    guards: BTreeMap<AccountNumber, AccountGuard>,
    staged_balances: BTreeMap<AccountNumber, Decimal>,
    staged_records: Vec<Transaction>,
    committed: bool,
}

impl<'a> MemoryScope<'a> {
    pub(super) fn new(store: &'a MemoryStore, guards: BTreeMap<AccountNumber, AccountGuard>) -> Self {
        Self {
            store,
            guards,
            staged_balances: BTreeMap::new(),
            staged_records: Vec::new(),
            committed: false,
        }
    }

    /// Accounts this scope holds locks on, in acquisition order
    pub fn locked_accounts(&self) -> impl Iterator<Item = &AccountNumber> {
        self.guards.keys()
    }

    fn current_balance(&self, number: &AccountNumber, guard: &AccountGuard) -> Decimal {
        self.staged_balances
            .get(number)
            .copied()
            .unwrap_or(guard.balance)
    }

    fn not_locked(number: &AccountNumber) -> LedgerError {
        LedgerError::persistence(format!("account {} is not locked by this scope", number))
    }
}

impl AccountLedger for MemoryScope<'_> {
    fn find_account(&self, number: &AccountNumber) -> Result<Option<Account>, LedgerError> {
        self.store.faults.check(FaultPoint::FindAccount)?;

        match self.guards.get(number) {
            Some(guard) => {
                let mut account = Account::clone(guard);
                account.balance = self.current_balance(number, guard);
                Ok(Some(account))
            }
            None if self.store.accounts.contains(number) => Err(Self::not_locked(number)),
            None => Ok(None),
        }
    }

    fn mutate_balance(
        &mut self,
        number: &AccountNumber,
        delta: Decimal,
        expected_prior: Option<Decimal>,
    ) -> Result<Decimal, LedgerError> {
        let point = if delta.is_sign_negative() {
            FaultPoint::DebitBalance
        } else {
            FaultPoint::CreditBalance
        };
        self.store.faults.check(point)?;

        let guard = self
            .guards
            .get(number)
            .ok_or_else(|| Self::not_locked(number))?;
        let current = self.current_balance(number, guard);

        if let Some(expected) = expected_prior {
            if expected != current {
                return Err(LedgerError::persistence(format!(
                    "stale balance for account {}: expected {}, found {}",
                    number, expected, current
                )));
            }
        }

        let next = current
            .checked_add(delta)
            .ok_or_else(|| LedgerError::balance_overflow(number))?;
        if next < Decimal::ZERO {
            return Err(LedgerError::insufficient_funds(number, current, -delta));
        }

        self.staged_balances.insert(number.clone(), next);
        Ok(next)
    }
}

impl TransactionRecords for MemoryScope<'_> {
    fn insert_transaction(&mut self, transaction: &Transaction) -> Result<(), LedgerError> {
        self.store.faults.check(FaultPoint::InsertTransaction)?;

        if self
            .staged_records
            .iter()
            .any(|staged| staged.reference == transaction.reference)
        {
            return Err(LedgerError::duplicate_reference(&transaction.reference));
        }
        self.store.transactions.reserve(&transaction.reference)?;
        self.staged_records.push(transaction.clone());
        Ok(())
    }

    fn update_transaction_status(
        &mut self,
        reference: &Reference,
        status: TransactionStatus,
        at: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        self.store.faults.check(FaultPoint::UpdateStatus)?;

        if let Some(staged) = self
            .staged_records
            .iter_mut()
            .find(|staged| &staged.reference == reference)
        {
            return staged.transition(status, at);
        }

        // Committed records are already terminal
        match self.store.transactions.get(reference) {
            Some(committed) => Err(LedgerError::invalid_transition(
                reference,
                committed.status,
                status,
            )),
            None => Err(LedgerError::transaction_not_found(reference)),
        }
    }
}

impl AtomicScope for MemoryScope<'_> {
    fn commit(mut self) -> Result<(), LedgerError> {
        self.store.faults.check(FaultPoint::Commit)?;

        if let Some(open) = self
            .staged_records
            .iter()
            .find(|staged| !staged.status.is_terminal())
        {
            return Err(LedgerError::persistence(format!(
                "transaction {} is still {} at commit",
                open.reference, open.status
            )));
        }

        let balances = std::mem::take(&mut self.staged_balances);
        for (number, balance) in balances {
            if let Some(guard) = self.guards.get_mut(&number) {
                guard.balance = balance;
            }
        }

        let records = std::mem::take(&mut self.staged_records);
        let published = records.len();
        for record in records {
            self.store.transactions.publish(record);
        }

        self.committed = true;
        debug!(
            accounts = self.guards.len(),
            records = published,
            "scope committed"
        );
        Ok(())
    }

    fn rollback(self) {}
}

impl Drop for MemoryScope<'_> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        for record in &self.staged_records {
            self.store.transactions.release(&record.reference);
        }
        debug!(
            accounts = self.guards.len(),
            discarded = self.staged_records.len(),
            "scope rolled back"
        );
    }
}
