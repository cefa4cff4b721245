//! The `Block` type and its hash derivation.
//!
//! Chain-level validation (linkage, timestamps, PoW, retargeting) lives in
//! `puddlecoin-consensus`, which treats `Block` as a value type and layers
//! consensus rules on top of it.

use serde::{Deserialize, Serialize};

use puddlecoin_crypto::{hex_to_binary, sha256_hex};

use crate::transaction::Transaction;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub index: u64,
    pub timestamp: u64,
    pub transactions: Vec<Transaction>,
    pub previous_hash: String,
    pub hash: String,
    pub difficulty: u32,
    pub proof: u64,
}

impl Block {
    /// Build a block, computing `hash` from the other fields.
    pub fn new(
        index: u64,
        timestamp: u64,
        transactions: Vec<Transaction>,
        previous_hash: String,
        difficulty: u32,
        proof: u64,
    ) -> Self {
        let hash = Self::calculate_hash(
            index,
            &previous_hash,
            timestamp,
            &transactions,
            difficulty,
            proof,
        );
        Block {
            index,
            timestamp,
            transactions,
            previous_hash,
            hash,
            difficulty,
            proof,
        }
    }

    /// `SHA-256` over the ASCII concatenation of every header field. The
    /// transaction list contributes the concatenation of each
    /// transaction's own `id` (the canonical serialization this
    /// implementation picked over emulating the source language's
    /// sequence-to-string coercion — see DESIGN.md).
    pub fn calculate_hash(
        index: u64,
        previous_hash: &str,
        timestamp: u64,
        transactions: &[Transaction],
        difficulty: u32,
        proof: u64,
    ) -> String {
        let transactions_content: String =
            transactions.iter().map(|tx| tx.id.as_str()).collect();
        sha256_hex(format!(
            "{index}{previous_hash}{timestamp}{transactions_content}{difficulty}{proof}"
        ))
    }

    pub fn calculate_own_hash(&self) -> String {
        Self::calculate_hash(
            self.index,
            &self.previous_hash,
            self.timestamp,
            &self.transactions,
            self.difficulty,
            self.proof,
        )
    }

    /// Whether `hash`'s binary expansion begins with `difficulty` zero bits.
    pub fn hash_matches_difficulty(hash: &str, difficulty: u32) -> bool {
        match hex_to_binary(hash) {
            Ok(binary) => {
                let required = difficulty as usize;
                binary.len() >= required && binary[..required].chars().all(|c| c == '0')
            }
            Err(_) => false,
        }
    }

    pub fn satisfies_own_difficulty(&self) -> bool {
        Self::hash_matches_difficulty(&self.hash, self.difficulty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn difficulty_zero_accepts_any_hash() {
        assert!(Block::hash_matches_difficulty("ffffffff", 0));
    }

    #[test]
    fn difficulty_checks_leading_zero_bits() {
        // "0f..." -> binary "0000 1111..." => 4 leading zero bits
        assert!(Block::hash_matches_difficulty("0fffffff", 4));
        assert!(!Block::hash_matches_difficulty("0fffffff", 5));
    }
}
