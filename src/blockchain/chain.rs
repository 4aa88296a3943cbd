use std::sync::Arc;

use log::{debug, info, warn};
use parking_lot::Mutex;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use super::account::{Account, AccountError, AccountLedger};
use super::block::Block;
use super::proof_of_work;
use super::transaction::{Transaction, TransactionError, TransactionRecord};
use super::validator::{self, ValidationError};

/// Errors that can occur during blockchain operations
#[derive(Debug, Error)]
pub enum BlockchainError {
    #[error("Transaction error: {0}")]
    TransactionError(#[from] TransactionError),

    #[error("Account error: {0}")]
    AccountError(#[from] AccountError),

    #[error("Chain is empty")]
    EmptyChain,
}

/// Append-only sequence of blocks, always starting with the genesis block
#[derive(Debug, Clone)]
pub struct Chain {
    blocks: Vec<Block>,
}

impl Default for Chain {
    fn default() -> Self {
        Self::new()
    }
}

impl Chain {
    /// Creates a chain holding only the genesis block
    pub fn new() -> Self {
        Chain {
            blocks: vec![Block::genesis()],
        }
    }

    /// Appends a block with the next index and the current time.
    ///
    /// Nothing is validated here; the caller establishes proof and linkage.
    pub fn append(
        &mut self,
        proof: u64,
        previous_hash: String,
        transactions: Vec<TransactionRecord>,
    ) -> Block {
        let block = Block::new(self.blocks.len() as u64 + 1, proof, previous_hash, transactions);
        self.blocks.push(block.clone());
        block
    }

    /// Gets the most recently appended block
    pub fn latest(&self) -> Result<&Block, BlockchainError> {
        self.blocks.last().ok_or(BlockchainError::EmptyChain)
    }

    /// Gets all blocks in order
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Number of blocks, genesis included
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Always false once constructed
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

/// The ledger service: accounts, chain and pending transactions behind one interface.
///
/// Lock order is `mining_guard`, then `chain`, then `pending_transactions`, then
/// the ledger's write guard.
#[derive(Debug)]
pub struct Blockchain {
    /// The chain of blocks
    chain: Mutex<Chain>,

    /// Transactions accepted since the last mined block
    pending_transactions: Mutex<Vec<TransactionRecord>>,

    /// Account balances
    account_ledger: Arc<AccountLedger>,

    /// Held for the whole read-solve-append sequence of a mining run
    mining_guard: Mutex<()>,

    /// Shard the proof-of-work search over the rayon pool
    parallel_mining: bool,
}

impl Default for Blockchain {
    fn default() -> Self {
        Self::new()
    }
}

impl Blockchain {
    /// Creates a new blockchain with a genesis block and an empty ledger
    pub fn new() -> Self {
        Self::with_ledger(Arc::new(AccountLedger::new()))
    }

    /// Creates a new blockchain on top of an existing account ledger
    pub fn with_ledger(account_ledger: Arc<AccountLedger>) -> Self {
        Blockchain {
            chain: Mutex::new(Chain::new()),
            pending_transactions: Mutex::new(Vec::new()),
            account_ledger,
            mining_guard: Mutex::new(()),
            parallel_mining: false,
        }
    }

    /// Enables or disables the parallel proof-of-work search
    pub fn with_parallel_mining(mut self, parallel_mining: bool) -> Self {
        self.parallel_mining = parallel_mining;
        self
    }

    /// Gets the shared account ledger
    pub fn ledger(&self) -> Arc<AccountLedger> {
        Arc::clone(&self.account_ledger)
    }

    /// Registers a new account
    pub fn register_account(&self, username: &str) -> Result<Account, BlockchainError> {
        Ok(self.account_ledger.register(username)?)
    }

    /// Gets an account by identifier
    pub fn account(&self, username: &str) -> Option<Account> {
        self.account_ledger.get(username)
    }

    /// Gets all accounts
    pub fn accounts(&self) -> Vec<Account> {
        self.account_ledger.accounts()
    }

    /// Applies a transfer and queues its record for the next block.
    ///
    /// A rejected transfer changes no balance and is not queued.
    pub fn submit_transaction(
        &self,
        sender: &str,
        receiver: &str,
        amount: u64,
    ) -> Result<TransactionRecord, BlockchainError> {
        // Held across apply so records are queued in the order they were applied
        let mut pending = self.pending_transactions.lock();

        let record = match Transaction::new(sender, receiver, amount).apply(&self.account_ledger) {
            Ok(record) => record,
            Err(err) => {
                warn!("Rejected transaction {} -> {} ({}): {}", sender, receiver, amount, err);
                return Err(err.into());
            }
        };

        pending.push(record.clone());
        drop(pending);
        info!("Accepted transaction {} -> {} ({})", sender, receiver, amount);

        Ok(record)
    }

    /// Mines a new block sealing all pending transactions.
    ///
    /// May run for an unbounded time while searching for a proof.
    pub fn mine_block(&self) -> Result<Block, BlockchainError> {
        let _mining = self.mining_guard.lock();
        let (previous_proof, previous_hash) = self.tip()?;

        let proof = if self.parallel_mining {
            proof_of_work::solve_parallel(previous_proof)
        } else {
            proof_of_work::solve(previous_proof)
        };

        Ok(self.commit(proof, previous_hash))
    }

    /// Same as [`Blockchain::mine_block`], but stops searching once `token` is cancelled.
    ///
    /// Returns `Ok(None)` when cancelled; nothing is committed in that case.
    pub fn mine_block_until(
        &self,
        token: &CancellationToken,
    ) -> Result<Option<Block>, BlockchainError> {
        let _mining = self.mining_guard.lock();
        let (previous_proof, previous_hash) = self.tip()?;

        let proof = if self.parallel_mining {
            proof_of_work::solve_parallel_until(previous_proof, token)
        } else {
            proof_of_work::solve_until(previous_proof, token)
        };

        match proof {
            Some(proof) => Ok(Some(self.commit(proof, previous_hash))),
            None => {
                warn!("Mining cancelled before a proof was found");
                Ok(None)
            }
        }
    }

    /// Proof and hash of the latest block
    fn tip(&self) -> Result<(u64, String), BlockchainError> {
        let chain = self.chain.lock();
        let latest = chain.latest()?;
        Ok((latest.proof, latest.hash()))
    }

    /// Drains the pending buffer into a new block in one critical section
    fn commit(&self, proof: u64, previous_hash: String) -> Block {
        let mut chain = self.chain.lock();
        let transactions = std::mem::take(&mut *self.pending_transactions.lock());
        let block = chain.append(proof, previous_hash, transactions);

        debug!("Found proof {} for block {}", proof, block.index);
        info!(
            "Mined block {} with {} transactions",
            block.index,
            block.transactions.len()
        );
        block
    }

    /// Gets a snapshot of the entire chain
    pub fn get_chain(&self) -> Vec<Block> {
        self.chain.lock().blocks().to_vec()
    }

    /// Gets the latest block
    pub fn latest_block(&self) -> Result<Block, BlockchainError> {
        self.chain.lock().latest().cloned()
    }

    /// Gets a snapshot of the pending transactions
    pub fn pending_transactions(&self) -> Vec<TransactionRecord> {
        self.pending_transactions.lock().clone()
    }

    /// Validates a snapshot of the chain, reporting the first failure
    pub fn validate(&self) -> Result<(), ValidationError> {
        validator::validate(&self.get_chain())
    }

    /// Returns true if the chain is valid
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}
