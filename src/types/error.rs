//! Error types for the ledger engine
//!
//! Every engine operation returns either a completed [`Transaction`] or one of
//! these errors.
//!
//! # Error Categories
//!
//! - **Request errors**: invalid amount, self-transfer, malformed identifiers.
//!   Detected before any atomic scope is opened.
//! - **Business-rule errors**: unknown account, inactive account, insufficient
//!   funds. Detected inside the scope against locked account state, before any
//!   balance is mutated.
//! - **Storage errors**: persistence failures, reference collisions and
//!   cancellation. The scope is rolled back.
//!
//! [`Transaction`]: crate::types::Transaction

use super::account::AccountNumber;
use super::transaction::{Reference, TransactionStatus};
use rust_decimal::Decimal;
use thiserror::Error;

/// Main error type for the ledger engine
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    /// No account exists with this number
    #[error("Account {account} not found")]
    AccountNotFound { account: String },

    /// The account exists but does not accept mutations
    #[error("Account {account} is inactive")]
    AccountInactive { account: String },

    /// The sender's locked balance is below the requested amount
    #[error("Insufficient funds in account {account}: available {available}, requested {requested}")]
    InsufficientFunds {
        account: String,
        available: Decimal,
        requested: Decimal,
    },

    /// Amounts must be strictly positive
    #[error("Invalid amount {amount}: must be greater than zero")]
    InvalidAmount { amount: Decimal },

    /// Sender and receiver of a transfer are the same account
    #[error("Cannot transfer from account {account} to itself")]
    SameAccountTransfer { account: String },

    /// A transaction with this reference already exists or is in flight
    #[error("Duplicate transaction reference {reference}")]
    DuplicateReference { reference: String },

    /// Any failure of the underlying atomic scope
    ///
    /// The scope has been rolled back. Callers may retry the whole operation,
    /// which will run under a fresh reference.
    #[error("Persistence failure: {message}")]
    PersistenceFailure { message: String },

    /// No transaction with this reference exists
    #[error("Transaction {reference} not found")]
    TransactionNotFound { reference: String },

    /// A caller-supplied reference is not URL-safe or has a bad length
    #[error("Invalid reference '{reference}'")]
    InvalidReference { reference: String },

    /// An account number is empty or contains whitespace
    #[error("Invalid account number '{account}'")]
    InvalidAccountNumber { account: String },

    /// A status change the transaction state machine does not allow
    #[error("Transaction {reference} cannot move from {from} to {to}")]
    InvalidTransition {
        reference: String,
        from: TransactionStatus,
        to: TransactionStatus,
    },

    /// Applying the amount would overflow the balance representation
    #[error("Balance overflow on account {account}")]
    BalanceOverflow { account: String },

    /// The OS random source could not supply bytes for a reference
    #[error("Entropy source unavailable: {message}")]
    EntropyUnavailable { message: String },

    /// The caller cancelled the operation; the scope was rolled back
    #[error("Operation cancelled")]
    Cancelled,

    /// An account with this number is already registered
    #[error("Account {account} already exists")]
    AccountAlreadyExists { account: String },
}

impl LedgerError {
    pub fn account_not_found(account: &AccountNumber) -> Self {
        LedgerError::AccountNotFound {
            account: account.to_string(),
        }
    }

    pub fn account_inactive(account: &AccountNumber) -> Self {
        LedgerError::AccountInactive {
            account: account.to_string(),
        }
    }

    pub fn insufficient_funds(account: &AccountNumber, available: Decimal, requested: Decimal) -> Self {
        LedgerError::InsufficientFunds {
            account: account.to_string(),
            available,
            requested,
        }
    }

    pub fn invalid_amount(amount: Decimal) -> Self {
        LedgerError::InvalidAmount { amount }
    }

    pub fn same_account_transfer(account: &AccountNumber) -> Self {
        LedgerError::SameAccountTransfer {
            account: account.to_string(),
        }
    }

    pub fn duplicate_reference(reference: &Reference) -> Self {
        LedgerError::DuplicateReference {
            reference: reference.to_string(),
        }
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        LedgerError::PersistenceFailure {
            message: message.into(),
        }
    }

    pub fn transaction_not_found(reference: &Reference) -> Self {
        LedgerError::TransactionNotFound {
            reference: reference.to_string(),
        }
    }

    pub fn invalid_reference(reference: &str) -> Self {
        LedgerError::InvalidReference {
            reference: reference.to_string(),
        }
    }

    pub fn invalid_account_number(account: &str) -> Self {
        LedgerError::InvalidAccountNumber {
            account: account.to_string(),
        }
    }

    pub fn invalid_transition(
        reference: &Reference,
        from: TransactionStatus,
        to: TransactionStatus,
    ) -> Self {
        LedgerError::InvalidTransition {
            reference: reference.to_string(),
            from,
            to,
        }
    }

    pub fn balance_overflow(account: &AccountNumber) -> Self {
        LedgerError::BalanceOverflow {
            account: account.to_string(),
        }
    }

    pub fn entropy_unavailable(message: impl Into<String>) -> Self {
        LedgerError::EntropyUnavailable {
            message: message.into(),
        }
    }

    pub fn account_already_exists(account: &AccountNumber) -> Self {
        LedgerError::AccountAlreadyExists {
            account: account.to_string(),
        }
    }

    /// Errors caused by the request or by account state rather than by storage
    pub fn is_business_rule(&self) -> bool {
        matches!(
            self,
            LedgerError::AccountNotFound { .. }
                | LedgerError::AccountInactive { .. }
                | LedgerError::InsufficientFunds { .. }
                | LedgerError::InvalidAmount { .. }
                | LedgerError::SameAccountTransfer { .. }
                | LedgerError::InvalidReference { .. }
                | LedgerError::InvalidAccountNumber { .. }
                | LedgerError::BalanceOverflow { .. }
        )
    }

    /// Whether re-running the whole operation under a fresh reference may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LedgerError::PersistenceFailure { .. }
                | LedgerError::DuplicateReference { .. }
                | LedgerError::EntropyUnavailable { .. }
        )
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
    #[case::account_not_found(
        LedgerError::account_not_found(&number("1001")),
        "Account 1001 not found"
    )]
    #[case::account_inactive(
        LedgerError::account_inactive(&number("1001")),
        "Account 1001 is inactive"
    )]
    #[case::insufficient_funds(
        LedgerError::insufficient_funds(&number("1002"), dec!(20.00), dec!(50.00)),
        "Insufficient funds in account 1002: available 20.00, requested 50.00"
    )]
    #[case::invalid_amount(
        LedgerError::invalid_amount(dec!(-5)),
        "Invalid amount -5: must be greater than zero"
    )]
    #[case::same_account(
        LedgerError::same_account_transfer(&number("7")),
        "Cannot transfer from account 7 to itself"
    )]
    #[case::persistence(
        LedgerError::persistence("disk full"),
        "Persistence failure: disk full"
    )]
    #[case::transition(
        LedgerError::InvalidTransition {
            reference: "abc".to_string(),
            from: TransactionStatus::Completed,
            to: TransactionStatus::Failed,
        },
        "Transaction abc cannot move from completed to failed"
    )]
    #[case::cancelled(LedgerError::Cancelled, "Operation cancelled")]
    fn test_error_display(#[case] error: LedgerError, #[case] expected: &str) {
        assert_eq!(error.to_string(), expected);
    }

    #[rstest]
    #[case(LedgerError::account_not_found(&number("1")), true, false)]
    #[case(LedgerError::insufficient_funds(&number("1"), dec!(0), dec!(1)), true, false)]
    #[case(LedgerError::invalid_amount(dec!(0)), true, false)]
    #[case(LedgerError::persistence("boom"), false, true)]
    #[case(LedgerError::DuplicateReference { reference: "r".to_string() }, false, true)]
    #[case(LedgerError::Cancelled, false, false)]
    fn test_error_classification(
        #[case] error: LedgerError,
        #[case] business_rule: bool,
        #[case] retryable: bool,
    ) {
        assert_eq!(error.is_business_rule(), business_rule);
        assert_eq!(error.is_retryable(), retryable);
    }
}
