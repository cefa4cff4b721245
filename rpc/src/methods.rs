//! Command handlers. Each mirrors one row of the command table: parse
//! input, call the matching `Node` method, serialize the result.

use std::sync::Arc;

use axum::extract::Path;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use puddlecoin_core::{Block, Transaction, UTxO};
use puddlecoin_node::Node;

use crate::RpcError;

pub async fn get_chain(Extension(node): Extension<Arc<Node>>) -> Json<Vec<Block>> {
    Json(node.get_chain().await)
}

pub async fn get_block_by_hash(
    Extension(node): Extension<Arc<Node>>,
    Path(hash): Path<String>,
) -> Json<Option<Block>> {
    Json(node.get_block_by_hash(&hash).await)
}

pub async fn get_tx_by_id(
    Extension(node): Extension<Arc<Node>>,
    Path(id): Path<String>,
) -> Json<Option<Transaction>> {
    Json(node.get_tx_by_id(&id).await)
}

pub async fn get_unspent(Extension(node): Extension<Arc<Node>>) -> Json<Vec<UTxO>> {
    Json(node.get_unspent().await)
}

pub async fn get_my_unspent(Extension(node): Extension<Arc<Node>>) -> Json<Vec<UTxO>> {
    Json(node.get_my_unspent().await)
}

pub async fn get_balance(Extension(node): Extension<Arc<Node>>) -> Json<u64> {
    Json(node.get_balance().await)
}

pub async fn get_address(Extension(node): Extension<Arc<Node>>) -> Json<String> {
    Json(node.address().to_string())
}

pub async fn get_pool(Extension(node): Extension<Arc<Node>>) -> Json<Vec<Transaction>> {
    Json(node.get_pool().await)
}

pub async fn get_peers(Extension(node): Extension<Arc<Node>>) -> Json<Vec<String>> {
    Json(node.get_peers().await)
}

pub async fn mine(Extension(node): Extension<Arc<Node>>) -> Result<Json<Block>, RpcError> {
    Ok(Json(node.mine().await?))
}

#[derive(Debug, Deserialize)]
pub struct MineRawRequest {
    transactions: Vec<Transaction>,
}

pub async fn mine_raw(
    Extension(node): Extension<Arc<Node>>,
    body: Result<Json<MineRawRequest>, axum::extract::rejection::JsonRejection>,
) -> Result<Json<Block>, RpcError> {
    let Json(request) = body.map_err(|err| RpcError::BadRequest(err.to_string()))?;
    Ok(Json(node.mine_raw(request.transactions).await?))
}

#[derive(Debug, Deserialize)]
pub struct AddressAmountRequest {
    address: String,
    amount: u64,
}

pub async fn mine_tx(
    Extension(node): Extension<Arc<Node>>,
    body: Result<Json<AddressAmountRequest>, axum::extract::rejection::JsonRejection>,
) -> Result<Json<Block>, RpcError> {
    let Json(request) = body.map_err(|err| RpcError::BadRequest(err.to_string()))?;
    Ok(Json(node.mine_tx(&request.address, request.amount).await?))
}

pub async fn send_tx(
    Extension(node): Extension<Arc<Node>>,
    body: Result<Json<AddressAmountRequest>, axum::extract::rejection::JsonRejection>,
) -> Result<Json<Transaction>, RpcError> {
    let Json(request) = body.map_err(|err| RpcError::BadRequest(err.to_string()))?;
    Ok(Json(node.send_tx(&request.address, request.amount).await?))
}

#[derive(Debug, Deserialize)]
pub struct AddPeerRequest {
    peer: String,
}

#[derive(Debug, Serialize)]
pub struct Ack {
    ok: bool,
}

pub async fn add_peer(
    Extension(node): Extension<Arc<Node>>,
    body: Result<Json<AddPeerRequest>, axum::extract::rejection::JsonRejection>,
) -> Result<Json<Ack>, RpcError> {
    let Json(request) = body.map_err(|err| RpcError::BadRequest(err.to_string()))?;
    node.add_peer(request.peer).await?;
    Ok(Json(Ack { ok: true }))
}

pub async fn stop(Extension(node): Extension<Arc<Node>>) -> Json<Ack> {
    node.stop()
}
