//! Transaction-related types for the ledger engine
//!
//! This module defines the transaction record the engine writes, its status
//! lifecycle, and the [`OperationRequest`] callers hand to the engine.

use super::account::AccountNumber;
use super::error::LedgerError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Longest reference accepted from a caller
pub const MAX_REFERENCE_LEN: usize = 64;

/// Unique identifier of one transaction attempt
///
/// References are URL-safe: only ASCII alphanumerics, `-` and `_`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Reference(String);

impl Reference {
    /// Validate a caller-supplied reference
    pub fn parse(raw: &str) -> Result<Self, LedgerError> {
        let valid = !raw.is_empty()
            && raw.len() <= MAX_REFERENCE_LEN
            && raw
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
        if !valid {
            return Err(LedgerError::invalid_reference(raw));
        }
        Ok(Reference(raw.to_string()))
    }

    /// Wrap a value produced by the reference generator
    pub(crate) fn from_generated(encoded: String) -> Self {
        Reference(encoded)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Reference {
    type Error = LedgerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Reference::parse(&value)
    }
}

impl From<Reference> for String {
    fn from(reference: Reference) -> Self {
        reference.0
    }
}

/// Kind of balance movement a transaction records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    /// Funds added to a receiver account from outside the ledger
    Credit,

    /// Funds removed from a sender account to outside the ledger
    Debit,

    /// Funds moved from a sender account to a receiver account
    Transfer,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Credit => "credit",
            TransactionType::Debit => "debit",
            TransactionType::Transfer => "transfer",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a transaction record
///
/// ```text
/// Pending ──► Completed
///    │
///    └──────► Failed
/// ```
///
/// Completed and Failed are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

impl TransactionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }

    /// Whether moving from `self` to `next` is a legal transition
    pub fn can_transition_to(&self, next: TransactionStatus) -> bool {
        matches!(
            (self, next),
            (TransactionStatus::Pending, TransactionStatus::Completed)
                | (TransactionStatus::Pending, TransactionStatus::Failed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque descriptive fields carried on a transaction
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionMetadata {
    pub description: String,
    pub payment_method: String,
    pub currency: Option<String>,
}

impl TransactionMetadata {
    pub fn new(description: impl Into<String>, payment_method: impl Into<String>) -> Self {
        TransactionMetadata {
            description: description.into(),
            payment_method: payment_method.into(),
            currency: None,
        }
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = Some(currency.into());
        self
    }
}

/// Which accounts an operation touches
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationKind {
    Credit {
        receiver: AccountNumber,
    },
    Debit {
        sender: AccountNumber,
    },
    Transfer {
        sender: AccountNumber,
        receiver: AccountNumber,
    },
}

/// A request to move funds, as handed to the engine
///
/// Built with [`OperationRequest::credit`], [`OperationRequest::debit`] or
/// [`OperationRequest::transfer`]. When a reference is supplied with
/// [`OperationRequest::with_reference`] it acts as an idempotency key: the
/// engine uses it verbatim and rejects a second operation carrying it.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationRequest {
    pub kind: OperationKind,
    pub amount: Decimal,
    pub metadata: TransactionMetadata,
    pub reference: Option<Reference>,
}

impl OperationRequest {
    pub fn credit(receiver: AccountNumber, amount: Decimal) -> Self {
        Self::new(OperationKind::Credit { receiver }, amount)
    }

    pub fn debit(sender: AccountNumber, amount: Decimal) -> Self {
        Self::new(OperationKind::Debit { sender }, amount)
    }

    pub fn transfer(sender: AccountNumber, receiver: AccountNumber, amount: Decimal) -> Self {
        Self::new(OperationKind::Transfer { sender, receiver }, amount)
    }

    fn new(kind: OperationKind, amount: Decimal) -> Self {
        OperationRequest {
            kind,
            amount,
            metadata: TransactionMetadata::default(),
            reference: None,
        }
    }

    pub fn with_metadata(mut self, metadata: TransactionMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_reference(mut self, reference: Reference) -> Self {
        self.reference = Some(reference);
        self
    }

    pub fn tx_type(&self) -> TransactionType {
        match self.kind {
            OperationKind::Credit { .. } => TransactionType::Credit,
            OperationKind::Debit { .. } => TransactionType::Debit,
            OperationKind::Transfer { .. } => TransactionType::Transfer,
        }
    }

    pub fn sender(&self) -> Option<&AccountNumber> {
        match &self.kind {
            OperationKind::Debit { sender } | OperationKind::Transfer { sender, .. } => {
                Some(sender)
            }
            OperationKind::Credit { .. } => None,
        }
    }

    pub fn receiver(&self) -> Option<&AccountNumber> {
        match &self.kind {
            OperationKind::Credit { receiver } | OperationKind::Transfer { receiver, .. } => {
                Some(receiver)
            }
            OperationKind::Debit { .. } => None,
        }
    }

    /// Accounts this operation locks, in global lock order
    pub fn lock_set(&self) -> Vec<AccountNumber> {
        let mut accounts: Vec<AccountNumber> = self
            .sender()
            .into_iter()
            .chain(self.receiver())
            .cloned()
            .collect();
        accounts.sort();
        accounts.dedup();
        accounts
    }

    /// Check the request-level preconditions
    ///
    /// These need no account state and are checked before any atomic scope
    /// is opened.
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.amount <= Decimal::ZERO {
            return Err(LedgerError::invalid_amount(self.amount));
        }
        if let OperationKind::Transfer { sender, receiver } = &self.kind {
            if sender == receiver {
                return Err(LedgerError::same_account_transfer(sender));
            }
        }
        Ok(())
    }
}

/// A transaction record
///
/// Created Pending before any balance is touched, then moved exactly once to
/// Completed or Failed. Accounts are referenced by number only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub reference: Reference,
    pub tx_type: TransactionType,
    pub sender: Option<AccountNumber>,
    pub receiver: Option<AccountNumber>,
    pub amount: Decimal,
    pub description: String,
    pub payment_method: String,
    pub currency: Option<String>,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// Start a Pending record for `request` under `reference`
    pub fn pending(reference: Reference, request: &OperationRequest, now: DateTime<Utc>) -> Self {
        Transaction {
            reference,
            tx_type: request.tx_type(),
            sender: request.sender().cloned(),
            receiver: request.receiver().cloned(),
            amount: request.amount,
            description: request.metadata.description.clone(),
            payment_method: request.metadata.payment_method.clone(),
            currency: request.metadata.currency.clone(),
            status: TransactionStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    /// Move to `next`, enforcing the status state machine
    pub fn transition(
        &mut self,
        next: TransactionStatus,
        at: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        if !self.status.can_transition_to(next) {
            return Err(LedgerError::invalid_transition(
                &self.reference,
                self.status,
                next,
            ));
        }
        self.status = next;
        self.updated_at = at;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn number(raw: &str) -> AccountNumber {
        AccountNumber::parse(raw).unwrap()
    }

    #[rstest]
    #[case::alnum("3kT9zQ")]
    #[case::dashes("order-2024_07")]
    #[case::max_len(&"a".repeat(MAX_REFERENCE_LEN))]
    fn test_reference_parse_valid(#[case] raw: &str) {
        assert_eq!(Reference::parse(raw).unwrap().as_str(), raw);
    }

    #[rstest]
    #[case::empty("")]
    #[case::too_long(&"a".repeat(MAX_REFERENCE_LEN + 1))]
    #[case::slash("a/b")]
    #[case::space("a b")]
    #[case::non_ascii("réf")]
    fn test_reference_parse_invalid(#[case] raw: &str) {
        assert!(matches!(
            Reference::parse(raw),
            Err(LedgerError::InvalidReference { .. })
        ));
    }

    #[rstest]
    #[case(TransactionStatus::Pending, TransactionStatus::Completed, true)]
    #[case(TransactionStatus::Pending, TransactionStatus::Failed, true)]
    #[case(TransactionStatus::Pending, TransactionStatus::Pending, false)]
    #[case(TransactionStatus::Completed, TransactionStatus::Failed, false)]
    #[case(TransactionStatus::Completed, TransactionStatus::Pending, false)]
    #[case(TransactionStatus::Completed, TransactionStatus::Completed, false)]
    #[case(TransactionStatus::Failed, TransactionStatus::Completed, false)]
    #[case(TransactionStatus::Failed, TransactionStatus::Pending, false)]
    fn test_status_transitions(
        #[case] from: TransactionStatus,
        #[case] to: TransactionStatus,
        #[case] allowed: bool,
    ) {
        assert_eq!(from.can_transition_to(to), allowed);
    }

    #[test]
    fn test_transition_is_applied_once() {
        let request = OperationRequest::credit(number("1001"), dec!(10.00));
        let created = Utc::now();
        let mut tx = Transaction::pending(Reference::parse("ref1").unwrap(), &request, created);

        let later = created + chrono::Duration::milliseconds(5);
        tx.transition(TransactionStatus::Completed, later).unwrap();
        assert_eq!(tx.status, TransactionStatus::Completed);
        assert_eq!(tx.updated_at, later);
        assert_eq!(tx.created_at, created);

        let err = tx
            .transition(TransactionStatus::Failed, Utc::now())
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidTransition { .. }));
        assert_eq!(tx.status, TransactionStatus::Completed);
    }

    #[test]
    fn test_pending_copies_request_fields() {
        let request = OperationRequest::transfer(number("1001"), number("1002"), dec!(5.50))
            .with_metadata(TransactionMetadata::new("rent", "wallet").with_currency("NGN"));
        let tx = Transaction::pending(Reference::parse("ref2").unwrap(), &request, Utc::now());

        assert_eq!(tx.tx_type, TransactionType::Transfer);
        assert_eq!(tx.sender, Some(number("1001")));
        assert_eq!(tx.receiver, Some(number("1002")));
        assert_eq!(tx.amount, dec!(5.50));
        assert_eq!(tx.description, "rent");
        assert_eq!(tx.payment_method, "wallet");
        assert_eq!(tx.currency.as_deref(), Some("NGN"));
        assert_eq!(tx.status, TransactionStatus::Pending);
    }

    #[rstest]
    #[case::zero(dec!(0))]
    #[case::negative(dec!(-1.00))]
    fn test_validate_rejects_non_positive_amount(#[case] amount: Decimal) {
        let request = OperationRequest::debit(number("1001"), amount);
        assert!(matches!(
            request.validate(),
            Err(LedgerError::InvalidAmount { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_self_transfer() {
        let request = OperationRequest::transfer(number("1001"), number("1001"), dec!(1));
        assert!(matches!(
            request.validate(),
            Err(LedgerError::SameAccountTransfer { .. })
        ));
    }

    #[test]
    fn test_lock_set_is_sorted_regardless_of_direction() {
        let forward = OperationRequest::transfer(number("B"), number("A"), dec!(1));
        let backward = OperationRequest::transfer(number("A"), number("B"), dec!(1));
        assert_eq!(forward.lock_set(), vec![number("A"), number("B")]);
        assert_eq!(forward.lock_set(), backward.lock_set());
    }

    #[rstest]
    #[case::credit(OperationRequest::credit(number("1"), dec!(1)), None, Some("1"))]
    #[case::debit(OperationRequest::debit(number("2"), dec!(1)), Some("2"), None)]
    #[case::transfer(OperationRequest::transfer(number("3"), number("4"), dec!(1)), Some("3"), Some("4"))]
    fn test_request_parties(
        #[case] request: OperationRequest,
        #[case] sender: Option<&str>,
        #[case] receiver: Option<&str>,
    ) {
        assert_eq!(request.sender().map(|n| n.as_str()), sender);
        assert_eq!(request.receiver().map(|n| n.as_str()), receiver);
    }
}
