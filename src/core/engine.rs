//! Ledger transaction engine
//!
//! This module provides the LedgerEngine that runs credits, debits and
//! transfers against a [`LedgerStore`]. Every operation runs in exactly one
//! atomic scope:
//!
//! 1. Validate the request (no scope opened on failure)
//! 2. Open a scope over the operation's accounts, locked in ascending order
//! 3. Resolve the accounts and stage a Pending record
//! 4. Check status and funds against the locked balances
//! 5. Apply the balance deltas and mark the record Completed
//! 6. Commit
//!
//! Any error between 2 and 6 rolls the scope back. Status and funds failures
//! are the exception: the record is marked Failed and committed on its own so
//! the attempt stays auditable.

use crate::config::EngineConfig;
use crate::core::reference::ReferenceGenerator;
use crate::core::traits::{AtomicScope, LedgerStore, ReferenceSource};
use crate::types::{
    Account, AccountNumber, LedgerError, OperationRequest, Reference, Transaction,
    TransactionMetadata, TransactionStatus,
};
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How a scope that got as far as staging its record ended
enum Outcome {
    Completed(Transaction),
    Rejected {
        transaction: Transaction,
        error: LedgerError,
    },
}

/// Ledger transaction engine
///
/// Cheap to clone; clones share the store and reference source, so one engine
/// can serve any number of concurrent callers.
pub struct LedgerEngine<S, G = ReferenceGenerator> {
    store: Arc<S>,
    references: Arc<G>,
    config: EngineConfig,
}

impl<S, G> Clone for LedgerEngine<S, G> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            references: Arc::clone(&self.references),
            config: self.config.clone(),
        }
    }
}

impl<S: LedgerStore> LedgerEngine<S, ReferenceGenerator> {
    /// Create an engine using the default reference generator
    pub fn new(store: Arc<S>, config: EngineConfig) -> Self {
        Self::with_reference_source(store, Arc::new(ReferenceGenerator::new()), config)
    }
}

impl<S: LedgerStore, G: ReferenceSource> LedgerEngine<S, G> {
    pub fn with_reference_source(store: Arc<S>, references: Arc<G>, config: EngineConfig) -> Self {
        LedgerEngine {
            store,
            references,
            config,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Increase `receiver`'s balance by `amount`
    ///
    /// # Errors
    ///
    /// - `InvalidAmount` if `amount` is not positive
    /// - `AccountNotFound` if the receiver does not exist
    /// - `AccountInactive` if the receiver is inactive (a Failed record is kept)
    /// - `PersistenceFailure` if the store fails (nothing is written)
    pub fn credit_account(
        &self,
        receiver: &AccountNumber,
        amount: Decimal,
        description: &str,
        method: &str,
    ) -> Result<Transaction, LedgerError> {
        let request = OperationRequest::credit(receiver.clone(), amount)
            .with_metadata(TransactionMetadata::new(description, method));
        self.execute(request, &CancellationToken::new())
    }

    /// Decrease `sender`'s balance by `amount`
    ///
    /// # Errors
    ///
    /// As [`credit_account`](Self::credit_account), plus `InsufficientFunds`
    /// when the locked balance is below `amount`. The balance is never touched
    /// in that case.
    pub fn debit_account(
        &self,
        sender: &AccountNumber,
        amount: Decimal,
        description: &str,
        method: &str,
    ) -> Result<Transaction, LedgerError> {
        let request = OperationRequest::debit(sender.clone(), amount)
            .with_metadata(TransactionMetadata::new(description, method));
        self.execute(request, &CancellationToken::new())
    }

    /// Move `amount` from `sender` to `receiver` in one scope
    ///
    /// Both balances change or neither does.
    ///
    /// # Errors
    ///
    /// As [`debit_account`](Self::debit_account) for either side, plus
    /// `SameAccountTransfer` when both sides name the same account.
    pub fn transfer_funds(
        &self,
        sender: &AccountNumber,
        receiver: &AccountNumber,
        amount: Decimal,
        description: &str,
        method: &str,
    ) -> Result<Transaction, LedgerError> {
        let request = OperationRequest::transfer(sender.clone(), receiver.clone(), amount)
            .with_metadata(TransactionMetadata::new(description, method));
        self.execute(request, &CancellationToken::new())
    }

    /// Run one operation request
    ///
    /// Generated references that collide with an existing one are replaced
    /// and the whole operation re-run, up to
    /// `EngineConfig::duplicate_reference_retries` times. A caller-supplied
    /// reference is an idempotency key and is never replaced.
    ///
    /// # Returns
    ///
    /// The Completed transaction. A Pending transaction is never returned.
    pub fn execute(
        &self,
        request: OperationRequest,
        cancel: &CancellationToken,
    ) -> Result<Transaction, LedgerError> {
        request.validate()?;

        let supplied = request.reference.clone();
        let mut retries_left = match supplied {
            Some(_) => 0,
            None => self.config.duplicate_reference_retries,
        };

        loop {
            if cancel.is_cancelled() {
                return Err(LedgerError::Cancelled);
            }
            let reference = match &supplied {
                Some(reference) => reference.clone(),
                None => self.references.new_reference()?,
            };

            match self.attempt(&request, reference, cancel) {
                Err(LedgerError::DuplicateReference { reference }) if retries_left > 0 => {
                    retries_left -= 1;
                    warn!(%reference, retries_left, "generated reference collided, retrying");
                }
                result => return result,
            }
        }
    }

    /// One pass through a scope under a fixed reference
    fn attempt(
        &self,
        request: &OperationRequest,
        reference: Reference,
        cancel: &CancellationToken,
    ) -> Result<Transaction, LedgerError> {
        let mut scope = self.store.begin(&request.lock_set(), cancel)?;

        match Self::stage(&mut scope, request, reference, cancel) {
            Ok(Outcome::Completed(transaction)) => {
                scope.commit()?;
                info!(
                    reference = %transaction.reference,
                    tx_type = %transaction.tx_type,
                    amount = %transaction.amount,
                    "transaction completed"
                );
                Ok(transaction)
            }
            Ok(Outcome::Rejected { transaction, error }) => {
                scope.commit()?;
                warn!(
                    reference = %transaction.reference,
                    tx_type = %transaction.tx_type,
                    %error,
                    "transaction failed"
                );
                Err(error)
            }
            Err(error) => {
                scope.rollback();
                warn!(tx_type = %request.tx_type(), %error, "operation rolled back");
                Err(error)
            }
        }
    }

    fn stage<Sc: AtomicScope>(
        scope: &mut Sc,
        request: &OperationRequest,
        reference: Reference,
        cancel: &CancellationToken,
    ) -> Result<Outcome, LedgerError> {
        if cancel.is_cancelled() {
            return Err(LedgerError::Cancelled);
        }

        let sender = Self::resolve(scope, request.sender())?;
        let receiver = Self::resolve(scope, request.receiver())?;

        let mut transaction = Transaction::pending(reference, request, Utc::now());
        scope.insert_transaction(&transaction)?;
        debug!(reference = %transaction.reference, "pending record staged");

        if let Some(error) = Self::check_rules(sender.as_ref(), receiver.as_ref(), request.amount) {
            let at = Utc::now();
            scope.update_transaction_status(&transaction.reference, TransactionStatus::Failed, at)?;
            transaction.transition(TransactionStatus::Failed, at)?;
            if cancel.is_cancelled() {
                return Err(LedgerError::Cancelled);
            }
            return Ok(Outcome::Rejected { transaction, error });
        }

        if let Some(sender) = &sender {
            scope.mutate_balance(&sender.number, -request.amount, Some(sender.balance))?;
        }
        if let Some(receiver) = &receiver {
            scope.mutate_balance(&receiver.number, request.amount, Some(receiver.balance))?;
        }

        let at = Utc::now();
        scope.update_transaction_status(&transaction.reference, TransactionStatus::Completed, at)?;
        transaction.transition(TransactionStatus::Completed, at)?;

        if cancel.is_cancelled() {
            return Err(LedgerError::Cancelled);
        }
        Ok(Outcome::Completed(transaction))
    }

    fn resolve<Sc: AtomicScope>(
        scope: &Sc,
        number: Option<&AccountNumber>,
    ) -> Result<Option<Account>, LedgerError> {
        let Some(number) = number else {
            return Ok(None);
        };
        scope
            .find_account(number)?
            .map(Some)
            .ok_or_else(|| LedgerError::account_not_found(number))
    }

    /// Status and funds rules, checked against locked state
    fn check_rules(
        sender: Option<&Account>,
        receiver: Option<&Account>,
        amount: Decimal,
    ) -> Option<LedgerError> {
        for account in sender.into_iter().chain(receiver) {
            if !account.is_active() {
                return Some(LedgerError::account_inactive(&account.number));
            }
        }
        match sender {
            Some(sender) if sender.balance < amount => Some(LedgerError::insufficient_funds(
                &sender.number,
                sender.balance,
                amount,
            )),
            _ => None,
        }
    }

    /// Committed transaction with this reference
    ///
    /// Repeated calls return identical data.
    pub fn get_transaction_by_reference(
        &self,
        reference: &Reference,
    ) -> Result<Transaction, LedgerError> {
        self.store
            .transaction_by_reference(reference)?
            .ok_or_else(|| LedgerError::transaction_not_found(reference))
    }

    /// Every committed transaction naming `number` as sender or receiver,
    /// ordered by creation time
    pub fn get_transactions_for_account(
        &self,
        number: &AccountNumber,
    ) -> Result<Vec<Transaction>, LedgerError> {
        self.store.transactions_for_account(number)
    }

    pub fn account(&self, number: &AccountNumber) -> Result<Account, LedgerError> {
        self.store
            .account(number)?
            .ok_or_else(|| LedgerError::account_not_found(number))
    }

    /// Committed transaction with this reference, plus a current snapshot of
    /// the account it paid into (the sender, for debits)
    pub fn get_account_and_transaction(
        &self,
        reference: &Reference,
    ) -> Result<(Account, Transaction), LedgerError> {
        let transaction = self.get_transaction_by_reference(reference)?;
        let number = transaction
            .receiver
            .as_ref()
            .or(transaction.sender.as_ref())
            .ok_or_else(|| {
                LedgerError::persistence(format!("transaction {} names no account", reference))
            })?;
        let account = self.account(number)?;
        Ok((account, transaction))
    }
}
