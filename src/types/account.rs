//! Account-related types for the ledger engine
//!
//! The engine never owns accounts. It sees them as short-lived snapshots read
//! through the account ledger inside one atomic scope, and refers to them
//! everywhere else by [`AccountNumber`].

use super::error::LedgerError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Stable, unique account identifier
///
/// Ordering is byte-lexicographic. The engine relies on this ordering as the
/// global lock order when an operation touches more than one account.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountNumber(String);

impl AccountNumber {
    /// Parse an account number
    ///
    /// Leading and trailing whitespace is trimmed. The remaining value must be
    /// non-empty and free of whitespace and control characters.
    pub fn parse(raw: &str) -> Result<Self, LedgerError> {
        let trimmed = raw.trim();
        if trimmed.is_empty()
            || trimmed
                .chars()
                .any(|c| c.is_whitespace() || c.is_control())
        {
            return Err(LedgerError::invalid_account_number(raw));
        }
        Ok(AccountNumber(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for AccountNumber {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AccountNumber::parse(s)
    }
}

impl TryFrom<String> for AccountNumber {
    type Error = LedgerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        AccountNumber::parse(&value)
    }
}

impl From<AccountNumber> for String {
    fn from(number: AccountNumber) -> Self {
        number.0
    }
}

/// Whether an account accepts balance mutations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Active,
    Inactive,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "active",
            AccountStatus::Inactive => "inactive",
        }
    }
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "active" => Ok(AccountStatus::Active),
            "inactive" => Ok(AccountStatus::Inactive),
            other => Err(format!("Invalid account status '{}'", other)),
        }
    }
}

/// Point-in-time view of an account
///
/// Snapshots are values: holding one does not hold a lock, and the balance it
/// carries may be stale as soon as the scope that produced it ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// The account number
    pub number: AccountNumber,

    /// Current balance
    ///
    /// Never negative in any committed state.
    pub balance: Decimal,

    /// Active accounts accept credits and debits, inactive ones accept neither
    pub status: AccountStatus,

    /// Opaque currency code, carried but never interpreted
    pub currency: Option<String>,
}

impl Account {
    /// Create an active account with the given opening balance
    pub fn new(number: AccountNumber, balance: Decimal) -> Self {
        Account {
            number,
            balance,
            status: AccountStatus::Active,
            currency: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::plain("1001", "1001")]
    #[case::trimmed("  1002 ", "1002")]
    #[case::alphanumeric("ACC-42", "ACC-42")]
    fn test_account_number_parse_valid(#[case] raw: &str, #[case] expected: &str) {
        let number = AccountNumber::parse(raw).unwrap();
        assert_eq!(number.as_str(), expected);
    }

    #[rstest]
    #[case::empty("")]
    #[case::blank("   ")]
    #[case::inner_space("10 01")]
    #[case::control("10\u{7}01")]
    fn test_account_number_parse_invalid(#[case] raw: &str) {
        let result = AccountNumber::parse(raw);
        assert!(matches!(
            result,
            Err(LedgerError::InvalidAccountNumber { .. })
        ));
    }

    #[test]
    fn test_account_numbers_order_lexicographically() {
        let mut numbers = vec![
            AccountNumber::parse("2000").unwrap(),
            AccountNumber::parse("1001").unwrap(),
            AccountNumber::parse("1002").unwrap(),
        ];
        numbers.sort();
        let ordered: Vec<&str> = numbers.iter().map(|n| n.as_str()).collect();
        assert_eq!(ordered, vec!["1001", "1002", "2000"]);
    }

    #[rstest]
    #[case("active", AccountStatus::Active)]
    #[case("Inactive", AccountStatus::Inactive)]
    #[case(" ACTIVE ", AccountStatus::Active)]
    fn test_account_status_from_str(#[case] raw: &str, #[case] expected: AccountStatus) {
        assert_eq!(raw.parse::<AccountStatus>().unwrap(), expected);
    }

    #[test]
    fn test_account_status_rejects_unknown() {
        assert!("frozen".parse::<AccountStatus>().is_err());
    }

    #[test]
    fn test_new_account_is_active() {
        let account = Account::new(AccountNumber::parse("1001").unwrap(), Decimal::ZERO);
        assert!(account.is_active());
        assert_eq!(account.balance, Decimal::ZERO);
        assert_eq!(account.currency, None);
    }
}
