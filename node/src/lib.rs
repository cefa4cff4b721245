//! The `Node` aggregate: the single owner of chain, UTXO set, mempool and
//! peer set. Every external command (HTTP) and every inbound gossip
//! message is a method call against one `Node`; there is no global
//! mutable state anywhere in this crate.

pub mod mining;

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use puddlecoin_consensus::{Chain, ChainError};
use puddlecoin_core::{Transaction, TxIn, TxOut, UTxO, COINBASE_AMOUNT};
use puddlecoin_crypto::{pub_from_priv, CryptoError};
use puddlecoin_mempool::{Mempool, MempoolError};
use puddlecoin_network::{GossipHandler, GossipMessage, PeerError, PeerHandle, PeerSet};
use puddlecoin_wallet::{create_transaction, WalletError};

use crate::mining::{mine_blocking, MiningCancelToken};

#[derive(Debug, Error)]
pub enum NodeError {
    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Mempool(#[from] MempoolError),

    #[error(transparent)]
    Wallet(#[from] WalletError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Peer(#[from] PeerError),

    #[error("no block satisfied the requested difficulty before mining was cancelled")]
    MineFailed,

    #[error("already connected to peer {0}")]
    AlreadyConnectedToPeer(String),
}

/// Wires crypto, ledger, consensus, mempool, wallet and gossip behind one
/// owner. Construct with [`Node::new`], wrap in an `Arc`, and hand the
/// `Arc` to both the HTTP surface and the peer listener.
pub struct Node {
    chain: RwLock<Chain>,
    mempool: RwLock<Mempool>,
    peers: PeerSet,
    priv_key: String,
    address: String,
    mining_token: Mutex<Option<MiningCancelToken>>,
}

impl Node {
    pub fn new(priv_key: String) -> Result<Self, NodeError> {
        let address = pub_from_priv(&priv_key)?;
        Ok(Node {
            chain: RwLock::new(Chain::new()),
            mempool: RwLock::new(Mempool::new()),
            peers: PeerSet::new(),
            priv_key,
            address,
            mining_token: Mutex::new(None),
        })
    }

    pub fn peers(&self) -> &PeerSet {
        &self.peers
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    // --- read-only query commands -----------------------------------

    pub async fn get_chain(&self) -> Vec<puddlecoin_core::Block> {
        self.chain.read().await.blocks().to_vec()
    }

    pub async fn get_block_by_hash(&self, hash: &str) -> Option<puddlecoin_core::Block> {
        self.chain.read().await.block_by_hash(hash).cloned()
    }

    pub async fn get_tx_by_id(&self, id: &str) -> Option<Transaction> {
        let chain = self.chain.read().await;
        for block in chain.blocks() {
            if let Some(tx) = block.transactions.iter().find(|tx| tx.id == id) {
                return Some(tx.clone());
            }
        }
        drop(chain);
        self.mempool.read().await.transactions().iter().find(|tx| tx.id == id).cloned()
    }

    pub async fn get_unspent(&self) -> Vec<UTxO> {
        self.chain.read().await.utxo_set().iter().cloned().collect()
    }

    pub async fn get_my_unspent(&self) -> Vec<UTxO> {
        self.chain.read().await.utxo_set().for_address(&self.address)
    }

    pub async fn get_balance(&self) -> u64 {
        self.chain.read().await.utxo_set().balance_of(&self.address)
    }

    pub async fn get_pool(&self) -> Vec<Transaction> {
        self.mempool.read().await.transactions().to_vec()
    }

    pub async fn get_peers(&self) -> Vec<String> {
        self.peers.ids().await
    }

    // --- mining --------------------------------------------------------

    /// Mine a block including every currently pooled transaction. The pool
    /// is only relieved of them once the block actually appends (via
    /// `append_block`'s `mempool.update`) — on a failed or cancelled mine
    /// the pooled transactions are still there to retry.
    pub async fn mine(&self) -> Result<puddlecoin_core::Block, NodeError> {
        let included = self.mempool.read().await.transactions().to_vec();
        self.mine_with(included).await
    }

    /// Mine a block containing exactly the given transactions (plus the
    /// coinbase), ignoring the pool. Used by the `mine_raw` command.
    pub async fn mine_raw(
        &self,
        transactions: Vec<Transaction>,
    ) -> Result<puddlecoin_core::Block, NodeError> {
        self.mine_with(transactions).await
    }

    /// Build, sign and admit a transaction paying `amount` to `address`,
    /// then immediately mine a block including it (and anything else
    /// already pooled).
    pub async fn mine_tx(
        &self,
        address: &str,
        amount: u64,
    ) -> Result<puddlecoin_core::Block, NodeError> {
        self.send_tx(address, amount).await?;
        self.mine().await
    }

    async fn mine_with(
        &self,
        included: Vec<Transaction>,
    ) -> Result<puddlecoin_core::Block, NodeError> {
        let (index, previous_hash, difficulty) = {
            let chain = self.chain.read().await;
            let last = chain.last_block();
            (last.index + 1, last.hash.clone(), chain.next_difficulty())
        };
        let coinbase = coinbase_transaction(index, &self.address);
        let mut transactions = vec![coinbase];
        transactions.extend(included);

        let token = MiningCancelToken::new();
        *self.mining_token.lock().await = Some(token.clone());
        let timestamp = now_ms();
        let result = mine_blocking(index, previous_hash, timestamp, transactions, difficulty, token)
            .await
            .map_err(|_| NodeError::MineFailed)?;
        *self.mining_token.lock().await = None;
        let block = result.ok_or(NodeError::MineFailed)?;

        self.append_block(block.clone()).await?;
        Ok(block)
    }

    async fn append_block(&self, block: puddlecoin_core::Block) -> Result<(), NodeError> {
        let mut chain = self.chain.write().await;
        chain.add_block(block.clone(), now_ms())?;
        let new_utxo_set = chain.utxo_set().clone();
        drop(chain);

        self.mempool.write().await.update(&new_utxo_set);
        self.peers.broadcast(GossipMessage::Blocks(vec![block])).await;
        Ok(())
    }

    // --- wallet ----------------------------------------------------------

    pub async fn send_tx(&self, address: &str, amount: u64) -> Result<Transaction, NodeError> {
        let (utxo_set, pool) = {
            let chain = self.chain.read().await;
            let pool = self.mempool.read().await.clone();
            (chain.utxo_set().clone(), pool)
        };
        let tx = create_transaction(address, amount, &self.priv_key, &pool, &utxo_set)?;

        self.mempool.write().await.add(tx.clone(), &utxo_set)?;
        let pool_snapshot = self.mempool.read().await.transactions().to_vec();
        self.peers.broadcast(GossipMessage::Pool(pool_snapshot)).await;
        Ok(tx)
    }

    // --- peers -----------------------------------------------------------

    pub async fn add_peer(self: &Arc<Self>, peer_url: String) -> Result<(), NodeError> {
        if self.peers.ids().await.contains(&peer_url) {
            return Err(NodeError::AlreadyConnectedToPeer(peer_url));
        }
        let stream = puddlecoin_network::dial(&peer_url).await?;
        puddlecoin_network::spawn_session(peer_url, stream, self.peers.clone(), self.clone());
        Ok(())
    }

    pub fn stop(&self) -> ! {
        info!("stop command received, terminating process");
        std::process::exit(0);
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the Unix epoch")
        .as_millis() as u64
}

fn coinbase_transaction(block_index: u64, address: &str) -> Transaction {
    let tx_ins = vec![TxIn {
        tx_out_id: String::new(),
        tx_out_index: block_index as u32,
        signature: String::new(),
    }];
    let tx_outs = vec![TxOut { address: address.to_string(), amount: COINBASE_AMOUNT }];
    Transaction::new(tx_ins, tx_outs)
}

#[async_trait::async_trait]
impl GossipHandler for Node {
    async fn latest_block(&self) -> puddlecoin_core::Block {
        self.chain.read().await.last_block().clone()
    }

    async fn full_chain(&self) -> Vec<puddlecoin_core::Block> {
        self.chain.read().await.blocks().to_vec()
    }

    async fn full_pool(&self) -> Vec<Transaction> {
        self.mempool.read().await.transactions().to_vec()
    }

    async fn on_blocks(&self, peer: &PeerHandle, blocks: Vec<puddlecoin_core::Block>) {
        let Some(received_last) = blocks.last().cloned() else {
            return;
        };
        let local_last = self.chain.read().await.last_block().clone();

        if received_last.index <= local_last.index {
            return;
        }

        if local_last.hash == received_last.previous_hash {
            match self.append_block(received_last).await {
                Ok(()) => {}
                Err(err) => warn!(peer = %peer.id, %err, "rejected single-block append from peer"),
            }
        } else if blocks.len() == 1 {
            peer.send(GossipMessage::QueryAll);
        } else {
            let mut chain = self.chain.write().await;
            match chain.replace_chain(blocks) {
                Ok(()) => {
                    let new_utxo_set = chain.utxo_set().clone();
                    let new_last = chain.last_block().clone();
                    drop(chain);
                    self.mempool.write().await.update(&new_utxo_set);
                    self.peers.broadcast(GossipMessage::Blocks(vec![new_last])).await;
                }
                Err(err) => warn!(peer = %peer.id, %err, "rejected candidate chain from peer"),
            }
        }
    }

    async fn on_pool(&self, _peer: &PeerHandle, txs: Vec<Transaction>) {
        let utxo_set = self.chain.read().await.utxo_set().clone();
        let mut admitted_any = false;
        {
            let mut pool = self.mempool.write().await;
            for tx in txs {
                match pool.add(tx, &utxo_set) {
                    Ok(()) => admitted_any = true,
                    Err(err) => warn!(%err, "pooled transaction from peer was not admitted"),
                }
            }
        }
        if admitted_any {
            let snapshot = self.mempool.read().await.transactions().to_vec();
            self.peers.broadcast(GossipMessage::Pool(snapshot)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use puddlecoin_crypto::gen_priv_key;

    #[tokio::test]
    async fn fresh_node_reports_genesis_balance() {
        let node = Node::new(gen_priv_key()).unwrap();
        // The node's own key is distinct from the genesis address, so its
        // balance starts at zero; the genesis address itself is queryable
        // via get_unspent.
        assert_eq!(node.get_balance().await, 0);
        assert_eq!(node.get_chain().await.len(), 1);
        assert_eq!(node.get_unspent().await.len(), 1);
    }

    #[tokio::test]
    async fn mine_increases_own_balance() {
        let node = Node::new(gen_priv_key()).unwrap();
        let block = node.mine().await.unwrap();

        assert_eq!(block.index, 1);
        assert_eq!(node.get_balance().await, COINBASE_AMOUNT);
        assert_eq!(node.get_my_unspent().await.len(), 1);
    }

    #[tokio::test]
    async fn send_tx_then_mine_moves_funds() {
        let node = Node::new(gen_priv_key()).unwrap();
        node.mine().await.unwrap();

        let other = pub_from_priv(&gen_priv_key()).unwrap();
        node.send_tx(&other, 30).await.unwrap();
        assert_eq!(node.get_pool().await.len(), 1);

        node.mine().await.unwrap();

        assert_eq!(node.chain.read().await.utxo_set().balance_of(&other), 30);
        assert_eq!(node.get_balance().await, COINBASE_AMOUNT - 30 + COINBASE_AMOUNT);
    }

    #[tokio::test]
    async fn insufficient_funds_is_surfaced() {
        let node = Node::new(gen_priv_key()).unwrap();
        let other = pub_from_priv(&gen_priv_key()).unwrap();

        let result = node.send_tx(&other, 10_000).await;
        assert!(matches!(result, Err(NodeError::Wallet(WalletError::InsufficientFunds { .. }))));
        assert!(node.get_pool().await.is_empty());
    }
}
