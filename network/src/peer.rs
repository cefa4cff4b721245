//! Peer session lifecycle: a framed, line-delimited JSON connection per
//! peer, the `GossipHandler` seam the node injects itself through, and the
//! `PeerSet` broadcast fan-out.
//!
//! Breaking the natural chain-engine/gossip cycle: this crate never calls
//! into `puddlecoin-consensus` or a mempool directly. Instead the caller
//! (the node orchestrator) implements `GossipHandler` and is handed to
//! every peer session; the session dispatches inbound frames to it and
//! forwards its replies back out over the wire.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, RwLock};
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};
use tracing::{debug, info, warn};

use puddlecoin_core::{Block, Transaction};

use crate::message::{GossipMessage, MessageError};

#[derive(Debug, Error)]
pub enum PeerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("framing error: {0}")]
    Framing(#[from] LinesCodecError),

    #[error("message error: {0}")]
    Message(#[from] MessageError),

    #[error("peer {0} is already connected")]
    AlreadyConnected(String),

    #[error("peer channel closed")]
    ChannelClosed,
}

/// The grace delay between entering `Active` and sending
/// `QUERY_TRANSACTION_POOL`, giving the remote time to finish its own
/// handshake bookkeeping.
pub const POOL_QUERY_GRACE: Duration = Duration::from_millis(500);

/// Handlers the node orchestrator implements so peer sessions never reach
/// into chain/mempool state directly.
#[async_trait::async_trait]
pub trait GossipHandler: Send + Sync {
    async fn latest_block(&self) -> Block;
    async fn full_chain(&self) -> Vec<Block>;
    async fn full_pool(&self) -> Vec<Transaction>;

    /// A peer sent its chain tail or full chain; reconcile per the spec's
    /// `RESPONSE_BLOCKCHAIN` rules. May reply on `peer` and/or broadcast.
    async fn on_blocks(&self, peer: &PeerHandle, blocks: Vec<Block>);

    /// A peer sent (part of) its pool; admit what validates.
    async fn on_pool(&self, peer: &PeerHandle, txs: Vec<Transaction>);
}

/// A lightweight, cloneable reference to one connected peer: an outbound
/// sender the session task drains and forwards over the wire.
#[derive(Clone)]
pub struct PeerHandle {
    pub id: String,
    outbound: mpsc::UnboundedSender<GossipMessage>,
}

impl PeerHandle {
    pub fn send(&self, message: GossipMessage) {
        if self.outbound.send(message).is_err() {
            debug!(peer = %self.id, "dropped outbound message, session already closed");
        }
    }
}

/// The set of currently connected peers, keyed by `"host:port"`.
#[derive(Clone, Default)]
pub struct PeerSet {
    peers: Arc<RwLock<HashMap<String, PeerHandle>>>,
}

impl PeerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, handle: PeerHandle) {
        self.peers.write().await.insert(handle.id.clone(), handle);
    }

    pub async fn remove(&self, id: &str) {
        self.peers.write().await.remove(id);
    }

    pub async fn ids(&self) -> Vec<String> {
        self.peers.read().await.keys().cloned().collect()
    }

    /// Fan out `message` to every connected peer. Send failures are logged
    /// and do not stop the broadcast; there is no retry.
    pub async fn broadcast(&self, message: GossipMessage) {
        for handle in self.peers.read().await.values() {
            handle.send(message.clone());
        }
    }
}

/// Dial `addr`, returning once the TCP handshake succeeds. The caller is
/// expected to hand the stream to `spawn_session` to run the gossip
/// session in the background; kept separate so connect failures (for a
/// command surface's `add_peer`) are reported before anything is spawned.
pub async fn dial(addr: &str) -> Result<TcpStream, PeerError> {
    Ok(TcpStream::connect(addr).await?)
}

/// Run a peer session to completion (until the connection closes) as a
/// background task. `addr` is also used as the peer's id in `peers`.
pub fn spawn_session(
    addr: String,
    stream: TcpStream,
    peers: PeerSet,
    handler: Arc<dyn GossipHandler>,
) -> tokio::task::JoinHandle<Result<(), PeerError>> {
    tokio::spawn(run_session(addr, stream, peers, handler))
}

/// Adopt an already-accepted inbound connection and run its session to
/// completion (for callers that already own a spawned task, e.g. a
/// listener loop).
pub async fn accept(
    addr: String,
    stream: TcpStream,
    peers: PeerSet,
    handler: Arc<dyn GossipHandler>,
) -> Result<(), PeerError> {
    run_session(addr, stream, peers, handler).await
}

async fn run_session(
    id: String,
    stream: TcpStream,
    peers: PeerSet,
    handler: Arc<dyn GossipHandler>,
) -> Result<(), PeerError> {
    let framed = Framed::new(stream, LinesCodec::new_with_max_length(16 * 1024 * 1024));
    let (mut sink, mut stream) = framed.split();

    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel();
    let handle = PeerHandle { id: id.clone(), outbound: outbound_tx };
    peers.insert(handle.clone()).await;
    info!(peer = %id, "peer session opened");

    handle.send(GossipMessage::QueryLatest);
    let grace_handle = handle.clone();
    tokio::spawn(async move {
        tokio::time::sleep(POOL_QUERY_GRACE).await;
        grace_handle.send(GossipMessage::QueryTransactionPool);
    });

    let writer = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            let line = match message.to_line() {
                Ok(line) => line,
                Err(err) => {
                    warn!(%err, "failed to encode outbound gossip message");
                    continue;
                }
            };
            if sink.send(line).await.is_err() {
                break;
            }
        }
    });

    let result = (async {
        while let Some(line) = stream.next().await {
            let line = line?;
            let message = match GossipMessage::from_line(&line) {
                Ok(message) => message,
                Err(err) => {
                    warn!(peer = %id, %err, "dropping malformed gossip frame");
                    continue;
                }
            };
            dispatch(&handle, message, handler.as_ref()).await;
        }
        Ok::<(), PeerError>(())
    })
    .await;

    peers.remove(&id).await;
    writer.abort();
    info!(peer = %id, "peer session closed");
    result
}

async fn dispatch(peer: &PeerHandle, message: GossipMessage, handler: &dyn GossipHandler) {
    match message {
        GossipMessage::QueryLatest => {
            peer.send(GossipMessage::Blocks(vec![handler.latest_block().await]));
        }
        GossipMessage::QueryAll => {
            peer.send(GossipMessage::Blocks(handler.full_chain().await));
        }
        GossipMessage::Blocks(blocks) => {
            handler.on_blocks(peer, blocks).await;
        }
        GossipMessage::QueryTransactionPool => {
            peer.send(GossipMessage::Pool(handler.full_pool().await));
        }
        GossipMessage::Pool(txs) => {
            handler.on_pool(peer, txs).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn peer_set_tracks_insert_and_remove() {
        let peers = PeerSet::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        peers.insert(PeerHandle { id: "127.0.0.1:6000".into(), outbound: tx }).await;
        assert_eq!(peers.ids().await, vec!["127.0.0.1:6000".to_string()]);

        peers.remove("127.0.0.1:6000").await;
        assert!(peers.ids().await.is_empty());
    }

    #[tokio::test]
    async fn broadcast_reaches_every_peer() {
        let peers = PeerSet::new();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        peers.insert(PeerHandle { id: "a".into(), outbound: tx_a }).await;
        peers.insert(PeerHandle { id: "b".into(), outbound: tx_b }).await;

        peers.broadcast(GossipMessage::QueryLatest).await;

        assert_eq!(rx_a.recv().await, Some(GossipMessage::QueryLatest));
        assert_eq!(rx_b.recv().await, Some(GossipMessage::QueryLatest));
    }
}
