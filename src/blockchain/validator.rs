use log::{debug, warn};
use thiserror::Error;

use super::block::Block;
use super::proof_of_work::meets_difficulty;

/// Reasons a chain fails validation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Chain is empty")]
    Empty,

    #[error("Block {index} does not link to the hash of its predecessor")]
    BrokenLink { index: u64 },

    #[error("Block {index} carries a proof that misses the difficulty target")]
    InvalidProof { index: u64 },
}

/// Checks hash linkage and proof of work across the chain.
///
/// Stops at the first failing block. Transactions are only covered through the
/// hash of their block, so the last block's transactions are not checked.
pub fn validate(chain: &[Block]) -> Result<(), ValidationError> {
    if chain.is_empty() {
        return Err(ValidationError::Empty);
    }

    for pair in chain.windows(2) {
        let (previous_block, block) = (&pair[0], &pair[1]);

        if block.previous_hash != previous_block.hash() {
            warn!("Block {} has a broken hash link", block.index);
            return Err(ValidationError::BrokenLink { index: block.index });
        }

        if !meets_difficulty(block.proof, previous_block.proof) {
            warn!("Block {} has an invalid proof {}", block.index, block.proof);
            return Err(ValidationError::InvalidProof { index: block.index });
        }
    }

    debug!("Validated chain of {} blocks", chain.len());
    Ok(())
}

/// Returns true if the chain passes [`validate`]
pub fn is_valid(chain: &[Block]) -> bool {
    validate(chain).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::proof_of_work::solve;

    fn mined_chain(length: usize) -> Vec<Block> {
        let mut chain = vec![Block::genesis()];
        while chain.len() < length {
            let previous = &chain[chain.len() - 1];
            let block = Block::new(
                previous.index + 1,
                solve(previous.proof),
                previous.hash(),
                Vec::new(),
            );
            chain.push(block);
        }
        chain
    }

    fn failing_proof(previous_proof: u64, from: u64) -> u64 {
        let mut proof = from;
        while meets_difficulty(proof, previous_proof) {
            proof += 1;
        }
        proof
    }

    #[test]
    fn test_valid_chains() {
        assert!(is_valid(&mined_chain(1)));
        assert!(is_valid(&mined_chain(3)));
    }

    #[test]
    fn test_empty_chain() {
        assert_eq!(validate(&[]), Err(ValidationError::Empty));
        assert!(!is_valid(&[]));
    }

    #[test]
    fn test_tampered_previous_hash() {
        let mut chain = mined_chain(3);
        chain[2].previous_hash = "0".repeat(64);

        assert_eq!(validate(&chain), Err(ValidationError::BrokenLink { index: 3 }));
    }

    #[test]
    fn test_tampered_proof_on_last_block() {
        let mut chain = mined_chain(2);
        chain[1].proof = failing_proof(chain[0].proof, chain[1].proof + 1);

        assert_eq!(validate(&chain), Err(ValidationError::InvalidProof { index: 2 }));
    }

    #[test]
    fn test_tampered_proof_breaks_next_link() {
        let mut chain = mined_chain(3);
        chain[1].proof = failing_proof(chain[0].proof, chain[1].proof + 1);

        // Block 2's hash changed, so block 3 no longer links to it
        assert_eq!(validate(&chain), Err(ValidationError::InvalidProof { index: 2 }));
        assert_eq!(
            validate(&chain[1..]),
            Err(ValidationError::BrokenLink { index: 3 })
        );
    }

    #[test]
    fn test_tampered_transactions_on_last_block_go_unnoticed() {
        use crate::blockchain::account::Account;
        use crate::blockchain::transaction::TransactionRecord;

        let mut chain = mined_chain(2);
        chain[1].transactions.push(TransactionRecord {
            sender: Account::new("A", 0),
            receiver: Account::new("B", 2000),
            amount: 1000,
        });

        assert!(is_valid(&chain));
    }
}
