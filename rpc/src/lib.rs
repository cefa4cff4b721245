//! The HTTP binding of the node's command table. Transport-agnostic by
//! design — everything here does is call a method on `Node`; the
//! interesting logic lives there.

pub mod methods;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde::Serialize;
use thiserror::Error;
use tower_http::cors::CorsLayer;

use puddlecoin_node::{Node, NodeError};
use puddlecoin_wallet::WalletError;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("missing or malformed request body: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Node(#[from] NodeError),
}

impl RpcError {
    fn status(&self) -> StatusCode {
        match self {
            RpcError::BadRequest(_) => StatusCode::BAD_REQUEST,
            RpcError::Node(NodeError::Wallet(WalletError::InsufficientFunds { .. })) => {
                StatusCode::BAD_REQUEST
            }
            RpcError::Node(NodeError::Chain(_)) | RpcError::Node(NodeError::Mempool(_)) => {
                StatusCode::BAD_REQUEST
            }
            RpcError::Node(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for RpcError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(ErrorBody { error: self.to_string() })).into_response()
    }
}

/// Build the command-table router. `node` is the single shared owner of
/// chain/UTXO/mempool/peer state; every handler reaches it through this
/// one `Extension`.
pub fn router(node: Arc<Node>) -> Router {
    Router::new()
        .route("/chain", get(methods::get_chain))
        .route("/block/:hash", get(methods::get_block_by_hash))
        .route("/transaction/:id", get(methods::get_tx_by_id))
        .route("/unspent", get(methods::get_unspent))
        .route("/my-unspent", get(methods::get_my_unspent))
        .route("/balance", get(methods::get_balance))
        .route("/address", get(methods::get_address))
        .route("/pool", get(methods::get_pool))
        .route("/peers", get(methods::get_peers))
        .route("/mine", post(methods::mine))
        .route("/mine-raw", post(methods::mine_raw))
        .route("/mine-tx", post(methods::mine_tx))
        .route("/send-tx", post(methods::send_tx))
        .route("/add-peer", post(methods::add_peer))
        .route("/stop", post(methods::stop))
        .layer(Extension(node))
        .layer(CorsLayer::permissive())
}
