//! Proof-of-work search.
//!
//! A proof `n` seals a block when the SHA-256 hex digest of the decimal string
//! of `n² - previous_proof²` starts with [`TARGET`]. The difference is computed
//! as an exact big integer, so it may be negative and never overflows.

use num_bigint::BigInt;
use rayon::prelude::*;
use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;

/// Required digest prefix
pub const TARGET: &str = "0000";

/// Number of leading zero hex characters required
pub const DIFFICULTY: usize = TARGET.len();

/// Candidates tried between two cancellation checks
pub const CANCEL_CHECK_INTERVAL: u64 = 1024;

/// Candidates handed to the worker pool per parallel round
pub const PARALLEL_BATCH: u64 = 1 << 14;

/// Hex digest of `proof² - previous_proof²`
pub fn digest(proof: u64, previous_proof: u64) -> String {
    let proof = BigInt::from(proof);
    let previous_proof = BigInt::from(previous_proof);
    let operation = &proof * &proof - &previous_proof * &previous_proof;

    hex::encode(Sha256::digest(operation.to_string().as_bytes()))
}

/// Checks whether `proof` seals a block following one sealed with `previous_proof`
pub fn meets_difficulty(proof: u64, previous_proof: u64) -> bool {
    digest(proof, previous_proof).starts_with(TARGET)
}

/// Finds the smallest proof, starting at 1, that satisfies the difficulty target.
///
/// Runs until a proof is found.
pub fn solve(previous_proof: u64) -> u64 {
    let mut proof = 1;
    while !meets_difficulty(proof, previous_proof) {
        proof += 1;
    }
    proof
}

/// Same search as [`solve`], giving up once `token` is cancelled.
pub fn solve_until(previous_proof: u64, token: &CancellationToken) -> Option<u64> {
    let mut proof = 1;
    loop {
        if proof % CANCEL_CHECK_INTERVAL == 1 && token.is_cancelled() {
            return None;
        }
        if meets_difficulty(proof, previous_proof) {
            return Some(proof);
        }
        proof += 1;
    }
}

/// Shards the search over the rayon pool.
///
/// Candidates are handed out in consecutive batches and the lowest winner of
/// the first successful batch is returned, so the result equals [`solve`].
pub fn solve_parallel(previous_proof: u64) -> u64 {
    let mut start: u64 = 1;
    loop {
        let end = start.saturating_add(PARALLEL_BATCH);
        if let Some(proof) = search_batch(start, end, previous_proof) {
            return proof;
        }
        start = end;
    }
}

/// Same search as [`solve_parallel`], giving up once `token` is cancelled.
pub fn solve_parallel_until(previous_proof: u64, token: &CancellationToken) -> Option<u64> {
    let mut start: u64 = 1;
    loop {
        if token.is_cancelled() {
            return None;
        }
        let end = start.saturating_add(PARALLEL_BATCH);
        if let Some(proof) = search_batch(start, end, previous_proof) {
            return Some(proof);
        }
        start = end;
    }
}

fn search_batch(start: u64, end: u64, previous_proof: u64) -> Option<u64> {
    (start..end)
        .into_par_iter()
        .find_first(|&proof| meets_difficulty(proof, previous_proof))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_of_negative_difference() {
        // 1² - 3² = -8
        let expected = hex::encode(Sha256::digest(b"-8"));
        assert_eq!(digest(1, 3), expected);
    }

    #[test]
    fn test_digest_does_not_overflow() {
        let hash = digest(u64::MAX, 0);
        let expected = hex::encode(Sha256::digest(
            (BigInt::from(u64::MAX) * BigInt::from(u64::MAX)).to_string().as_bytes(),
        ));
        assert_eq!(hash, expected);
    }

    #[test]
    fn test_solve_finds_smallest_proof() {
        let proof = solve(1);

        assert!(meets_difficulty(proof, 1));
        assert!(digest(proof, 1).starts_with("0000"));
        assert!((1..proof).all(|candidate| !meets_difficulty(candidate, 1)));
    }

    #[test]
    fn test_parallel_matches_sequential() {
        for previous_proof in [1, 533, 45293] {
            assert_eq!(solve_parallel(previous_proof), solve(previous_proof));
        }
    }

    #[test]
    fn test_cancellable_variants() {
        let token = CancellationToken::new();
        assert_eq!(solve_until(1, &token), Some(solve(1)));
        assert_eq!(solve_parallel_until(1, &token), Some(solve(1)));

        token.cancel();
        assert_eq!(solve_until(1, &token), None);
        assert_eq!(solve_parallel_until(1, &token), None);
    }
}
