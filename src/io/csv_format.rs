//! CSV format handling for the replay CLI
//!
//! This module centralizes all CSV format concerns, providing:
//! - Record structures for the accounts seed and operations files
//! - Conversion from CSV records to domain types
//! - Account and journal output serialization
//!
//! Conversions are pure (no I/O) for easy testing.

use crate::types::{
    Account, AccountNumber, AccountStatus, OperationRequest, Reference, Transaction,
    TransactionMetadata,
};
use chrono::SecondsFormat;
use csv::Writer;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Write;
use std::str::FromStr;

/// One row of the accounts seed file
///
/// Columns: account, balance, status, currency. `status` defaults to active
/// and `currency` may be omitted.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct AccountCsvRecord {
    pub account: String,
    pub balance: String,
    pub status: Option<String>,
    pub currency: Option<String>,
}

/// One row of the operations file
///
/// Columns: type, sender, receiver, amount, description, method, currency,
/// reference. Empty cells mean absent.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct OperationCsvRecord {
    #[serde(rename = "type")]
    pub op_type: String,
    pub sender: Option<String>,
    pub receiver: Option<String>,
    pub amount: Option<String>,
    pub description: Option<String>,
    pub method: Option<String>,
    pub currency: Option<String>,
    pub reference: Option<String>,
}

fn non_empty(field: Option<String>) -> Option<String> {
    field
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_amount(raw: &str) -> Result<Decimal, String> {
    Decimal::from_str(raw.trim()).map_err(|_| format!("Invalid amount '{}'", raw))
}

fn required_account(field: Option<String>, role: &str, op_type: &str) -> Result<AccountNumber, String> {
    let raw = non_empty(field).ok_or_else(|| format!("{} operation requires a {}", op_type, role))?;
    AccountNumber::parse(&raw).map_err(|e| e.to_string())
}

/// Convert a seed row to an Account
pub fn convert_account_record(record: AccountCsvRecord) -> Result<Account, String> {
    let number = AccountNumber::parse(&record.account).map_err(|e| e.to_string())?;
    let balance = parse_amount(&record.balance)?;
    let status = match non_empty(record.status) {
        Some(raw) => AccountStatus::from_str(&raw)?,
        None => AccountStatus::Active,
    };

    let mut account = Account::new(number, balance);
    account.status = status;
    account.currency = non_empty(record.currency);
    Ok(account)
}

/// Convert an operations row to an OperationRequest
///
/// Only shape is checked here: the operation type, the presence of the
/// accounts it needs and a parseable amount. Amount sign and self-transfers
/// are left to the engine so they surface as ledger errors.
pub fn convert_operation_record(record: OperationCsvRecord) -> Result<OperationRequest, String> {
    let op_type = record.op_type.trim().to_lowercase();
    let amount = match non_empty(record.amount) {
        Some(raw) => parse_amount(&raw)?,
        None => return Err(format!("{} operation requires an amount", op_type)),
    };

    let request = match op_type.as_str() {
        "credit" => {
            OperationRequest::credit(required_account(record.receiver, "receiver", &op_type)?, amount)
        }
        "debit" => {
            OperationRequest::debit(required_account(record.sender, "sender", &op_type)?, amount)
        }
        "transfer" => OperationRequest::transfer(
            required_account(record.sender, "sender", &op_type)?,
            required_account(record.receiver, "receiver", &op_type)?,
            amount,
        ),
        _ => return Err(format!("Invalid operation type: '{}'", record.op_type)),
    };

    let mut metadata = TransactionMetadata::new(
        non_empty(record.description).unwrap_or_default(),
        non_empty(record.method).unwrap_or_default(),
    );
    if let Some(currency) = non_empty(record.currency) {
        metadata = metadata.with_currency(currency);
    }
    let mut request = request.with_metadata(metadata);

    if let Some(raw) = non_empty(record.reference) {
        request = request.with_reference(Reference::parse(&raw).map_err(|e| e.to_string())?);
    }
    Ok(request)
}

/// Write account balances to CSV format
///
/// Writes columns account, balance, status, sorted by account number with
/// balances to 2 decimal places.
pub fn write_accounts_csv(accounts: &[Account], output: &mut dyn Write) -> Result<(), String> {
    let mut writer = Writer::from_writer(output);

    writer
        .write_record(["account", "balance", "status"])
        .map_err(|e| format!("Failed to write CSV header: {}", e))?;

    let mut sorted_accounts = accounts.to_vec();
    sorted_accounts.sort_by(|a, b| a.number.cmp(&b.number));

    for account in sorted_accounts {
        writer
            .write_record(&[
                account.number.to_string(),
                format!("{:.2}", account.balance),
                account.status.to_string(),
            ])
            .map_err(|e| format!("Failed to write account record: {}", e))?;
    }

    writer
        .flush()
        .map_err(|e| format!("Failed to flush output: {}", e))?;

    Ok(())
}

/// Write transaction records to CSV format, in the order given
pub fn write_transactions_csv(
    transactions: &[Transaction],
    output: &mut dyn Write,
) -> Result<(), String> {
    let mut writer = Writer::from_writer(output);

    writer
        .write_record([
            "reference",
            "type",
            "sender",
            "receiver",
            "amount",
            "status",
            "description",
            "method",
            "currency",
            "created_at",
            "updated_at",
        ])
        .map_err(|e| format!("Failed to write CSV header: {}", e))?;

    for tx in transactions {
        writer
            .write_record(&[
                tx.reference.to_string(),
                tx.tx_type.to_string(),
                tx.sender.as_ref().map(ToString::to_string).unwrap_or_default(),
                tx.receiver.as_ref().map(ToString::to_string).unwrap_or_default(),
                tx.amount.to_string(),
                tx.status.to_string(),
                tx.description.clone(),
                tx.payment_method.clone(),
                tx.currency.clone().unwrap_or_default(),
                tx.created_at.to_rfc3339_opts(SecondsFormat::Millis, true),
                tx.updated_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            ])
            .map_err(|e| format!("Failed to write transaction record: {}", e))?;
    }

    writer
        .flush()
        .map_err(|e| format!("Failed to flush journal: {}", e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{OperationKind, TransactionStatus, TransactionType};
    use chrono::{TimeZone, Utc};
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn operation(
        op_type: &str,
        sender: Option<&str>,
        receiver: Option<&str>,
        amount: Option<&str>,
    ) -> OperationCsvRecord {
        OperationCsvRecord {
            op_type: op_type.to_string(),
            sender: sender.map(str::to_string),
            receiver: receiver.map(str::to_string),
            amount: amount.map(str::to_string),
            description: None,
            method: None,
            currency: None,
            reference: None,
        }
    }

    #[rstest]
    #[case("credit", None, Some("1001"), TransactionType::Credit)]
    #[case("DEBIT", Some("1001"), None, TransactionType::Debit)]
    #[case("Transfer", Some("1001"), Some("1002"), TransactionType::Transfer)]
    fn test_convert_operation_valid(
        #[case] op_type: &str,
        #[case] sender: Option<&str>,
        #[case] receiver: Option<&str>,
        #[case] expected: TransactionType,
    ) {
        let request = convert_operation_record(operation(op_type, sender, receiver, Some("12.50")))
            .unwrap();
        assert_eq!(request.tx_type(), expected);
        assert_eq!(request.amount, dec!(12.50));
        assert_eq!(request.sender().map(|n| n.as_str()), sender);
        assert_eq!(request.receiver().map(|n| n.as_str()), receiver);
        assert!(request.reference.is_none());
    }

    #[rstest]
    #[case::invalid_type("refund", None, Some("1"), Some("1"), "Invalid operation type")]
    #[case::missing_amount("credit", None, Some("1"), None, "requires an amount")]
    #[case::blank_amount("credit", None, Some("1"), Some("  "), "requires an amount")]
    #[case::bad_amount("credit", None, Some("1"), Some("ten"), "Invalid amount")]
    #[case::credit_without_receiver("credit", Some("1"), None, Some("1"), "requires a receiver")]
    #[case::debit_without_sender("debit", None, Some("1"), Some("1"), "requires a sender")]
    #[case::transfer_without_receiver("transfer", Some("1"), Some(""), Some("1"), "requires a receiver")]
    fn test_convert_operation_errors(
        #[case] op_type: &str,
        #[case] sender: Option<&str>,
        #[case] receiver: Option<&str>,
        #[case] amount: Option<&str>,
        #[case] expected_error: &str,
    ) {
        let err = convert_operation_record(operation(op_type, sender, receiver, amount)).unwrap_err();
        assert!(err.contains(expected_error), "unexpected error: {}", err);
    }

    #[test]
    fn test_convert_operation_keeps_sign_and_self_transfer_for_engine() {
        let request =
            convert_operation_record(operation("transfer", Some("7"), Some("7"), Some("-1")))
                .unwrap();
        assert_eq!(request.amount, dec!(-1));
        assert!(matches!(request.kind, OperationKind::Transfer { .. }));
    }

    #[test]
    fn test_convert_operation_metadata_and_reference() {
        let mut record = operation("credit", None, Some("1001"), Some("5"));
        record.description = Some(" payroll ".to_string());
        record.method = Some("wire".to_string());
        record.currency = Some("EUR".to_string());
        record.reference = Some("batch-7_001".to_string());

        let request = convert_operation_record(record).unwrap();
        assert_eq!(request.metadata.description, "payroll");
        assert_eq!(request.metadata.payment_method, "wire");
        assert_eq!(request.metadata.currency.as_deref(), Some("EUR"));
        assert_eq!(request.reference.unwrap().as_str(), "batch-7_001");
    }

    #[test]
    fn test_convert_operation_rejects_bad_reference() {
        let mut record = operation("credit", None, Some("1001"), Some("5"));
        record.reference = Some("no spaces".to_string());
        assert!(convert_operation_record(record).is_err());
    }

    #[rstest]
    #[case::defaults("1001", "10.00", None, AccountStatus::Active)]
    #[case::inactive("1002", "0", Some("inactive"), AccountStatus::Inactive)]
    #[case::blank_status("1003", "1", Some(""), AccountStatus::Active)]
    fn test_convert_account_record(
        #[case] account: &str,
        #[case] balance: &str,
        #[case] status: Option<&str>,
        #[case] expected: AccountStatus,
    ) {
        let converted = convert_account_record(AccountCsvRecord {
            account: account.to_string(),
            balance: balance.to_string(),
            status: status.map(str::to_string),
            currency: None,
        })
        .unwrap();
        assert_eq!(converted.number.as_str(), account);
        assert_eq!(converted.status, expected);
        assert_eq!(converted.currency, None);
    }

    #[test]
    fn test_convert_account_record_errors() {
        let bad_balance = AccountCsvRecord {
            account: "1".to_string(),
            balance: "lots".to_string(),
            status: None,
            currency: None,
        };
        assert!(convert_account_record(bad_balance).is_err());

        let bad_status = AccountCsvRecord {
            account: "1".to_string(),
            balance: "1".to_string(),
            status: Some("frozen".to_string()),
            currency: None,
        };
        assert!(convert_account_record(bad_status).is_err());
    }

    #[rstest]
    #[case::sorted_and_rounded(
        vec![
            Account::new(AccountNumber::parse("1002").unwrap(), dec!(70)),
            Account::new(AccountNumber::parse("1001").unwrap(), dec!(100.004)),
        ],
        "account,balance,status\n1001,100.00,active\n1002,70.00,active\n"
    )]
    #[case::empty_accounts(vec![], "account,balance,status\n")]
    fn test_write_accounts_csv(#[case] accounts: Vec<Account>, #[case] expected_output: &str) {
        let mut output = Vec::new();
        write_accounts_csv(&accounts, &mut output).unwrap();
        assert_eq!(String::from_utf8(output).unwrap(), expected_output);
    }

    #[test]
    fn test_write_transactions_csv() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let request = OperationRequest::credit(AccountNumber::parse("1001").unwrap(), dec!(5.25))
            .with_metadata(TransactionMetadata::new("gift", "cash"));
        let mut tx = Transaction::pending(Reference::parse("ref1").unwrap(), &request, at);
        tx.transition(TransactionStatus::Completed, at).unwrap();

        let mut output = Vec::new();
        write_transactions_csv(&[tx], &mut output).unwrap();

        let text = String::from_utf8(output).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "reference,type,sender,receiver,amount,status,description,method,currency,created_at,updated_at"
        );
        assert_eq!(
            lines.next().unwrap(),
            "ref1,credit,,1001,5.25,completed,gift,cash,,2024-03-01T12:00:00.000Z,2024-03-01T12:00:00.000Z"
        );
    }
}
