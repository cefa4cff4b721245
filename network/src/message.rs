//! The gossip wire envelope and the five message types.
//!
//! The wire shape is `{ "type": u8, "data": string | null }`: `data` is a
//! JSON string holding the nested payload, double-encoded so the envelope
//! itself stays a flat, one-line JSON object per frame. `GossipMessage` is
//! the typed form the rest of the node works with; `Envelope` is only the
//! wire representation, converted at the edges.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use puddlecoin_core::{Block, Transaction};

#[derive(Debug, Error)]
pub enum MessageError {
    #[error("malformed envelope: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown message type {0}")]
    UnknownType(u8),

    #[error("message type {0} carries no data but a payload was present")]
    UnexpectedData(u8),

    #[error("message type {0} requires data but none was present")]
    MissingData(u8),
}

const QUERY_LATEST: u8 = 0;
const QUERY_ALL: u8 = 1;
const RESPONSE_BLOCKCHAIN: u8 = 2;
const QUERY_TRANSACTION_POOL: u8 = 3;
const RESPONSE_TRANSACTION_POOL: u8 = 4;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    msg_type: u8,
    data: Option<String>,
}

/// The five gossip messages, already decoded from their wire envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum GossipMessage {
    QueryLatest,
    QueryAll,
    Blocks(Vec<Block>),
    QueryTransactionPool,
    Pool(Vec<Transaction>),
}

impl GossipMessage {
    /// Encode as a single line of JSON, ready to hand to a line-framed
    /// writer.
    pub fn to_line(&self) -> Result<String, MessageError> {
        let envelope = match self {
            GossipMessage::QueryLatest => Envelope { msg_type: QUERY_LATEST, data: None },
            GossipMessage::QueryAll => Envelope { msg_type: QUERY_ALL, data: None },
            GossipMessage::Blocks(blocks) => Envelope {
                msg_type: RESPONSE_BLOCKCHAIN,
                data: Some(serde_json::to_string(blocks)?),
            },
            GossipMessage::QueryTransactionPool => {
                Envelope { msg_type: QUERY_TRANSACTION_POOL, data: None }
            }
            GossipMessage::Pool(txs) => Envelope {
                msg_type: RESPONSE_TRANSACTION_POOL,
                data: Some(serde_json::to_string(txs)?),
            },
        };
        Ok(serde_json::to_string(&envelope)?)
    }

    /// Decode a single line of JSON into a typed message.
    pub fn from_line(line: &str) -> Result<Self, MessageError> {
        let envelope: Envelope = serde_json::from_str(line)?;
        match envelope.msg_type {
            QUERY_LATEST => Ok(GossipMessage::QueryLatest),
            QUERY_ALL => Ok(GossipMessage::QueryAll),
            RESPONSE_BLOCKCHAIN => {
                let data = envelope
                    .data
                    .ok_or(MessageError::MissingData(RESPONSE_BLOCKCHAIN))?;
                Ok(GossipMessage::Blocks(serde_json::from_str(&data)?))
            }
            QUERY_TRANSACTION_POOL => Ok(GossipMessage::QueryTransactionPool),
            RESPONSE_TRANSACTION_POOL => {
                let data = envelope
                    .data
                    .ok_or(MessageError::MissingData(RESPONSE_TRANSACTION_POOL))?;
                Ok(GossipMessage::Pool(serde_json::from_str(&data)?))
            }
            other => Err(MessageError::UnknownType(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_latest_round_trips() {
        let line = GossipMessage::QueryLatest.to_line().unwrap();
        assert_eq!(GossipMessage::from_line(&line).unwrap(), GossipMessage::QueryLatest);
    }

    #[test]
    fn blocks_round_trip_through_double_encoded_data() {
        let msg = GossipMessage::Blocks(vec![]);
        let line = msg.to_line().unwrap();
        assert!(line.contains("\"type\":2"));
        assert_eq!(GossipMessage::from_line(&line).unwrap(), msg);
    }

    #[test]
    fn unknown_type_is_rejected() {
        let line = r#"{"type":9,"data":null}"#;
        assert!(matches!(GossipMessage::from_line(line), Err(MessageError::UnknownType(9))));
    }

    #[test]
    fn response_blockchain_without_data_is_rejected() {
        let line = r#"{"type":2,"data":null}"#;
        assert!(matches!(
            GossipMessage::from_line(line),
            Err(MessageError::MissingData(RESPONSE_BLOCKCHAIN))
        ));
    }
}
