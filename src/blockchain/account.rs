use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::info;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Balance every newly registered account starts with
pub const STARTING_BALANCE: u64 = 1000;

/// Errors that can occur during account operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccountError {
    #[error("Account already exists: {0}")]
    DuplicateAccount(String),

    #[error("Account not found: {0}")]
    UnknownAccount(String),

    #[error("Invalid amount: {0} (must be positive)")]
    InvalidAmount(u64),

    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: u64, available: u64 },

    #[error("Balance of account {0} would overflow")]
    BalanceOverflow(String),
}

/// Represents an account in the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Account {
    /// Unique account identifier
    pub username: String,

    /// The account's balance
    pub vault: u64,
}

impl Account {
    /// Creates a new account with the given balance
    pub fn new(username: impl Into<String>, vault: u64) -> Self {
        Account {
            username: username.into(),
            vault,
        }
    }

    /// Increases the account's balance
    ///
    /// # Returns
    ///
    /// The new balance
    pub fn deposit(&mut self, amount: u64) -> Result<u64, AccountError> {
        if amount == 0 {
            return Err(AccountError::InvalidAmount(amount));
        }

        self.vault = self
            .vault
            .checked_add(amount)
            .ok_or_else(|| AccountError::BalanceOverflow(self.username.clone()))?;
        Ok(self.vault)
    }

    /// Decreases the account's balance if it covers `amount`
    ///
    /// Insufficient funds is an expected outcome and is reported as `Ok(false)`
    /// with the balance left untouched.
    pub fn withdraw(&mut self, amount: u64) -> Result<bool, AccountError> {
        if amount == 0 {
            return Err(AccountError::InvalidAmount(amount));
        }

        if !self.has_sufficient_funds(amount) {
            return Ok(false);
        }

        self.vault -= amount;
        Ok(true)
    }

    /// Checks if the account has sufficient funds
    pub fn has_sufficient_funds(&self, amount: u64) -> bool {
        self.vault >= amount
    }
}

/// Owns every account balance.
///
/// Reads go straight to the map. Every balance mutation is serialized by
/// `write_guard`, which also makes `transfer` a single critical section and
/// lets `accounts` take a consistent snapshot.
#[derive(Debug)]
pub struct AccountLedger {
    accounts: DashMap<String, Account>,
    write_guard: Mutex<()>,
    starting_balance: u64,
}

impl Default for AccountLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl AccountLedger {
    /// Creates an empty ledger using [`STARTING_BALANCE`]
    pub fn new() -> Self {
        Self::with_starting_balance(STARTING_BALANCE)
    }

    /// Creates an empty ledger whose new accounts start with `starting_balance`
    pub fn with_starting_balance(starting_balance: u64) -> Self {
        AccountLedger {
            accounts: DashMap::new(),
            write_guard: Mutex::new(()),
            starting_balance,
        }
    }

    /// Registers a new account with the starting balance
    ///
    /// # Errors
    ///
    /// `DuplicateAccount` if the identifier is already taken
    pub fn register(&self, username: &str) -> Result<Account, AccountError> {
        match self.accounts.entry(username.to_string()) {
            Entry::Occupied(_) => Err(AccountError::DuplicateAccount(username.to_string())),
            Entry::Vacant(entry) => {
                let account = Account::new(username, self.starting_balance);
                entry.insert(account.clone());
                info!("Registered account {} with balance {}", username, account.vault);
                Ok(account)
            }
        }
    }

    /// Credits `amount` to an existing account and returns the new balance
    pub fn credit(&self, username: &str, amount: u64) -> Result<u64, AccountError> {
        let _guard = self.write_guard.lock();
        self.credit_locked(username, amount)
    }

    /// Debits `amount` from an existing account
    ///
    /// Returns `Ok(false)` without touching the balance when funds are short.
    pub fn debit(&self, username: &str, amount: u64) -> Result<bool, AccountError> {
        let _guard = self.write_guard.lock();
        self.debit_locked(username, amount)
    }

    /// Moves `amount` from `from` to `to` as one step.
    ///
    /// Either both balances change or neither does. On success the
    /// post-transfer snapshots of sender and receiver are returned.
    pub fn transfer(
        &self,
        from: &str,
        to: &str,
        amount: u64,
    ) -> Result<(Account, Account), AccountError> {
        if amount == 0 {
            return Err(AccountError::InvalidAmount(amount));
        }

        let _guard = self.write_guard.lock();

        let sender = self.get(from).ok_or_else(|| AccountError::UnknownAccount(from.to_string()))?;
        let receiver = self.get(to).ok_or_else(|| AccountError::UnknownAccount(to.to_string()))?;

        if !sender.has_sufficient_funds(amount) {
            return Err(AccountError::InsufficientFunds {
                required: amount,
                available: sender.vault,
            });
        }

        // Moving funds onto the same account leaves it unchanged.
        if from == to {
            return Ok((sender.clone(), sender));
        }

        if receiver.vault.checked_add(amount).is_none() {
            return Err(AccountError::BalanceOverflow(to.to_string()));
        }

        self.debit_locked(from, amount)?;
        self.credit_locked(to, amount)?;

        let sender = self.get(from).ok_or_else(|| AccountError::UnknownAccount(from.to_string()))?;
        let receiver = self.get(to).ok_or_else(|| AccountError::UnknownAccount(to.to_string()))?;
        Ok((sender, receiver))
    }

    /// Gets a copy of an account
    pub fn get(&self, username: &str) -> Option<Account> {
        self.accounts.get(username).map(|entry| entry.value().clone())
    }

    /// Gets the balance of an account
    pub fn balance(&self, username: &str) -> Option<u64> {
        self.accounts.get(username).map(|entry| entry.vault)
    }

    /// Gets a consistent snapshot of all accounts, sorted by username
    pub fn accounts(&self) -> Vec<Account> {
        let _guard = self.write_guard.lock();
        let mut accounts: Vec<Account> =
            self.accounts.iter().map(|entry| entry.value().clone()).collect();
        accounts.sort_by(|a, b| a.username.cmp(&b.username));
        accounts
    }

    fn credit_locked(&self, username: &str, amount: u64) -> Result<u64, AccountError> {
        let mut account = self
            .accounts
            .get_mut(username)
            .ok_or_else(|| AccountError::UnknownAccount(username.to_string()))?;
        account.deposit(amount)
    }

    fn debit_locked(&self, username: &str, amount: u64) -> Result<bool, AccountError> {
        let mut account = self
            .accounts
            .get_mut(username)
            .ok_or_else(|| AccountError::UnknownAccount(username.to_string()))?;
        account.withdraw(amount)
    }
}
