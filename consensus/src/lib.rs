//! Chain engine for PuddleCoin: the `Block` header's consensus rules —
//! difficulty retargeting, proof-of-work search, chain append and
//! fork-choice replacement — layered on top of `puddlecoin-core`'s block
//! and ledger types.

pub mod chain;
pub mod difficulty;
pub mod genesis;
pub mod mining;

pub use chain::{Chain, ChainError};
pub use difficulty::{next_difficulty, BLOCK_GENERATION_INTERVAL, DIFFICULTY_ADJUSTMENT_INTERVAL};
pub use genesis::GENESIS_BLOCK;
pub use mining::{find_block, Cancelled};
