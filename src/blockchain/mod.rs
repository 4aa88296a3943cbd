// Blockchain module
//
// This module contains the ledger engine:
// - Account ledger and transactions
// - Block structure and hashing
// - Chain store and the ledger service
// - Proof of work and chain validation
// - The background credit printer

pub mod account;
pub mod block;
pub mod chain;
pub mod printer;
pub mod proof_of_work;
pub mod transaction;
pub mod validator;

// Re-export main components for easier access
pub use account::{Account, AccountError, AccountLedger};
pub use block::Block;
pub use chain::{Blockchain, BlockchainError, Chain};
pub use printer::CreditPrinter;
pub use transaction::{Transaction, TransactionError, TransactionRecord};
pub use validator::ValidationError;
