//! Mining as a cancellable blocking task.
//!
//! `find_block`'s proof search is a synchronous CPU loop; running it
//! directly on the async executor would starve every other connection.
//! `mine_blocking` moves it to `spawn_blocking` and polls a shared
//! cancellation flag between proof attempts so an incoming peer block
//! at the same height can abort a stale search.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use puddlecoin_consensus::{find_block, Cancelled};
use puddlecoin_core::{Block, Transaction};

/// A flag shared between the node and an in-flight mining task. Setting
/// it stops the search at the next proof attempt.
#[derive(Clone, Default)]
pub struct MiningCancelToken(Arc<AtomicBool>);

impl MiningCancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    fn should_continue(&self) -> bool {
        !self.0.load(Ordering::SeqCst)
    }
}

/// Run the proof search on a blocking worker, observing `token` between
/// attempts. Returns `Ok(None)` if cancelled.
pub async fn mine_blocking(
    index: u64,
    previous_hash: String,
    timestamp: u64,
    transactions: Vec<Transaction>,
    difficulty: u32,
    token: MiningCancelToken,
) -> Result<Option<Block>, tokio::task::JoinError> {
    tokio::task::spawn_blocking(move || {
        match find_block(index, &previous_hash, timestamp, transactions, difficulty, {
            let token = token.clone();
            move || token.should_continue()
        }) {
            Ok(block) => Some(block),
            Err(Cancelled) => None,
        }
    })
    .await
}
