use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use super::account::{Account, AccountError, AccountLedger};

/// Errors that can occur during transaction operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransactionError {
    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: u64, available: u64 },

    #[error("Invalid amount: {0} (must be positive)")]
    InvalidAmount(u64),

    #[error("Unknown account: {0}")]
    UnknownAccount(String),

    #[error("Account error: {0}")]
    AccountError(AccountError),
}

impl From<AccountError> for TransactionError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::InsufficientFunds {
                required,
                available,
            } => TransactionError::InsufficientFunds {
                required,
                available,
            },
            AccountError::InvalidAmount(amount) => TransactionError::InvalidAmount(amount),
            AccountError::UnknownAccount(username) => TransactionError::UnknownAccount(username),
            other => TransactionError::AccountError(other),
        }
    }
}

/// A transfer intent between two accounts.
///
/// Not `Clone`: `apply` consumes the transaction so it can be applied at most once.
#[derive(Debug, PartialEq, Eq)]
pub struct Transaction {
    /// Sender's account identifier
    pub sender: String,

    /// Receiver's account identifier
    pub receiver: String,

    /// Amount being transferred
    pub amount: u64,
}

/// The committed form of a transaction, as stored in the pending buffer and in blocks.
///
/// The account snapshots are taken when the transaction is applied and never
/// follow later balance changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TransactionRecord {
    /// Sender as it was right after the transfer
    pub sender: Account,

    /// Receiver as it was right after the transfer
    pub receiver: Account,

    /// Amount transferred
    pub amount: u64,
}

impl Transaction {
    /// Creates a new transaction
    pub fn new(sender: impl Into<String>, receiver: impl Into<String>, amount: u64) -> Self {
        Transaction {
            sender: sender.into(),
            receiver: receiver.into(),
            amount,
        }
    }

    /// Applies the transfer to the ledger.
    ///
    /// The debit and the credit happen together or not at all. A rejected
    /// transaction changes nothing.
    pub fn apply(self, ledger: &AccountLedger) -> Result<TransactionRecord, TransactionError> {
        let (sender, receiver) = ledger.transfer(&self.sender, &self.receiver, self.amount)?;

        Ok(TransactionRecord {
            sender,
            receiver,
            amount: self.amount,
        })
    }
}
