//! Transaction records for the in-memory store
//!
//! Committed records are keyed by reference and indexed by account number.
//! References claimed by open scopes are tracked separately so that two scopes
//! can never stage the same reference.

use crate::types::{AccountNumber, LedgerError, Reference, Transaction};
use dashmap::{DashMap, DashSet};
use std::sync::atomic::{AtomicU64, Ordering};

/// A committed record with its commit sequence number
#[derive(Debug, Clone)]
struct StoredTransaction {
    sequence: u64,
    transaction: Transaction,
}

/// Thread-safe log of committed transaction records
#[derive(Debug, Default)]
pub struct TransactionLog {
    records: DashMap<Reference, StoredTransaction>,
    reserved: DashSet<Reference>,
    by_account: DashMap<AccountNumber, Vec<Reference>>,
    next_sequence: AtomicU64,
}

impl TransactionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `reference` for an open scope
    ///
    /// The claim is taken before the committed records are checked. A
    /// committing scope publishes its record before dropping its claim, so one
    /// of the two checks always sees it.
    pub(crate) fn reserve(&self, reference: &Reference) -> Result<(), LedgerError> {
        if !self.reserved.insert(reference.clone()) {
            return Err(LedgerError::duplicate_reference(reference));
        }
        if self.contains(reference) {
            self.reserved.remove(reference);
            return Err(LedgerError::duplicate_reference(reference));
        }
        Ok(())
    }

    /// Drop a claim taken by a scope that is rolling back
    pub(crate) fn release(&self, reference: &Reference) {
        self.reserved.remove(reference);
    }

    /// Make a record visible and drop its claim
    pub(crate) fn publish(&self, transaction: Transaction) {
        let sequence = self.next_sequence.fetch_add(1, Ordering::SeqCst);
        let reference = transaction.reference.clone();
        let parties: Vec<AccountNumber> = transaction
            .sender
            .iter()
            .chain(transaction.receiver.iter())
            .cloned()
            .collect();

        self.records.insert(
            reference.clone(),
            StoredTransaction {
                sequence,
                transaction,
            },
        );
        for account in parties {
            self.by_account
                .entry(account)
                .or_default()
                .push(reference.clone());
        }
        self.reserved.remove(&reference);
    }

    pub fn get(&self, reference: &Reference) -> Option<Transaction> {
        self.records
            .get(reference)
            .map(|stored| stored.transaction.clone())
    }

    pub fn contains(&self, reference: &Reference) -> bool {
        self.records.contains_key(reference)
    }

    pub fn is_reserved(&self, reference: &Reference) -> bool {
        self.reserved.contains(reference)
    }

    /// Records naming `account` as sender or receiver, oldest first
    ///
    /// Ordered by creation time, with commit order breaking ties.
    pub fn for_account(&self, account: &AccountNumber) -> Vec<Transaction> {
        let references: Vec<Reference> = self
            .by_account
            .get(account)
            .map(|refs| refs.value().clone())
            .unwrap_or_default();

        let mut stored: Vec<StoredTransaction> = references
            .iter()
            .filter_map(|reference| self.records.get(reference).map(|s| s.value().clone()))
            .collect();
        stored.sort_by(|a, b| {
            a.transaction
                .created_at
                .cmp(&b.transaction.created_at)
                .then(a.sequence.cmp(&b.sequence))
        });
        stored.into_iter().map(|s| s.transaction).collect()
    }

    /// Every committed record in commit order
    pub fn all(&self) -> Vec<Transaction> {
        let mut stored: Vec<StoredTransaction> = self
            .records
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        stored.sort_by_key(|s| s.sequence);
        stored.into_iter().map(|s| s.transaction).collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
