//! Proof-of-work search.
//!
//! `find_block` is a synchronous, CPU-bound loop. It is meant to be run on
//! a blocking worker (`tokio::task::spawn_blocking`) with cancellation
//! observed between proof attempts — see `puddlecoin-node` for the
//! cancellation wiring. Nothing in this module touches shared state; it
//! takes its inputs by value and returns a finished `Block`.

use puddlecoin_core::{Block, Transaction};

/// Returned by `find_block` when the caller's cancellation signal fired
/// before a solution was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

/// Search proofs starting from 0 until the resulting hash satisfies
/// `difficulty`, then return the finished block. `should_continue` is
/// polled once per attempt so a caller can cancel an in-flight search; it
/// never allocates or blocks.
pub fn find_block(
    index: u64,
    previous_hash: &str,
    timestamp: u64,
    transactions: Vec<Transaction>,
    difficulty: u32,
    mut should_continue: impl FnMut() -> bool,
) -> Result<Block, Cancelled> {
    let mut proof: u64 = 0;
    loop {
        if !should_continue() {
            return Err(Cancelled);
        }

        let hash = Block::calculate_hash(
            index,
            previous_hash,
            timestamp,
            &transactions,
            difficulty,
            proof,
        );
        if Block::hash_matches_difficulty(&hash, difficulty) {
            return Ok(Block {
                index,
                timestamp,
                transactions,
                previous_hash: previous_hash.to_string(),
                hash,
                difficulty,
                proof,
            });
        }
        proof += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_a_block_at_zero_difficulty_immediately() {
        let block = find_block(1, "prev", 1000, vec![], 0, || true).unwrap();
        assert_eq!(block.proof, 0);
        assert!(block.satisfies_own_difficulty());
    }

    #[test]
    fn finds_a_block_satisfying_low_difficulty() {
        let block = find_block(1, "prev", 1000, vec![], 4, || true).unwrap();
        assert!(block.satisfies_own_difficulty());
    }

    #[test]
    fn cancellation_stops_the_search() {
        let mut attempts = 0;
        let result = find_block(1, "prev", 1000, vec![], 64, || {
            attempts += 1;
            attempts < 5
        });
        assert_eq!(result, Err(Cancelled));
    }
}
