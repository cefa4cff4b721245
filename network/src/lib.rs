//! Gossip protocol for PuddleCoin: persistent framed JSON peer
//! connections, the five message types, and the reconciliation state
//! machine described by the data model's peer session rules.

pub mod message;
pub mod peer;

pub use message::{GossipMessage, MessageError};
pub use peer::{
    accept, dial, spawn_session, GossipHandler, PeerError, PeerHandle, PeerSet, POOL_QUERY_GRACE,
};
