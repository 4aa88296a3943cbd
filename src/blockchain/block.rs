use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use utoipa::ToSchema;

use super::transaction::TransactionRecord;

/// Proof stored in the genesis block
pub const GENESIS_PROOF: u64 = 1;

/// Previous-hash sentinel stored in the genesis block
pub const GENESIS_PREVIOUS_HASH: &str = "0";

/// Represents a block in the blockchain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Block {
    /// Index of the block in the chain, starting at 1
    pub index: u64,

    /// Timestamp when the block was created
    #[schema(value_type = String, example = "2023-01-01T12:00:00Z")]
    pub timestamp: DateTime<Utc>,

    /// Proof of work
    pub proof: u64,

    /// Hash of the previous block
    pub previous_hash: String,

    /// Transactions committed in this block
    pub transactions: Vec<TransactionRecord>,
}

impl Block {
    /// Creates a new block stamped with the current time
    pub fn new(
        index: u64,
        proof: u64,
        previous_hash: String,
        transactions: Vec<TransactionRecord>,
    ) -> Self {
        Block {
            index,
            timestamp: Utc::now(),
            proof,
            previous_hash,
            transactions,
        }
    }

    /// Creates the first block of every chain
    pub fn genesis() -> Self {
        Block::new(1, GENESIS_PROOF, GENESIS_PREVIOUS_HASH.to_string(), Vec::new())
    }

    /// Calculates the hash of the block
    ///
    /// Every field goes through a JSON object encoding with sorted keys, so the
    /// same block always produces the same digest.
    ///
    /// # Returns
    ///
    /// The SHA-256 hash of the block as a hexadecimal string
    pub fn hash(&self) -> String {
        let block_data = serde_json::json!({
            "index": self.index,
            "previous_hash": self.previous_hash,
            "proof": self.proof,
            "timestamp": self.timestamp,
            "transactions": self.transactions,
        });

        hex::encode(Sha256::digest(block_data.to_string().as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::account::Account;

    fn record(amount: u64) -> TransactionRecord {
        TransactionRecord {
            sender: Account::new("A", 1000 - amount),
            receiver: Account::new("B", 1000 + amount),
            amount,
        }
    }

    #[test]
    fn test_genesis_block() {
        let genesis = Block::genesis();

        assert_eq!(genesis.index, 1);
        assert_eq!(genesis.proof, GENESIS_PROOF);
        assert_eq!(genesis.previous_hash, GENESIS_PREVIOUS_HASH);
        assert!(genesis.transactions.is_empty());
    }

    #[test]
    fn test_hash_is_deterministic() {
        let block = Block::new(2, 533, "abc".to_string(), vec![record(300)]);

        let hash = block.hash();
        assert_eq!(hash.len(), 64); // SHA-256 hash is 64 characters in hex
        assert_eq!(hash, block.clone().hash());

        // A round trip through JSON yields the same digest
        let decoded: Block = serde_json::from_str(&serde_json::to_string(&block).unwrap()).unwrap();
        assert_eq!(decoded.hash(), hash);
    }

    #[test]
    fn test_every_field_contributes_to_hash() {
        let block = Block::new(2, 533, "abc".to_string(), vec![record(300)]);
        let hash = block.hash();

        let mut changed = block.clone();
        changed.index = 3;
        assert_ne!(changed.hash(), hash);

        let mut changed = block.clone();
        changed.proof = 534;
        assert_ne!(changed.hash(), hash);

        let mut changed = block.clone();
        changed.previous_hash = "abd".to_string();
        assert_ne!(changed.hash(), hash);

        let mut changed = block.clone();
        changed.timestamp = changed.timestamp + chrono::Duration::seconds(1);
        assert_ne!(changed.hash(), hash);

        let mut changed = block;
        changed.transactions = vec![record(301)];
        assert_ne!(changed.hash(), hash);
    }
}
