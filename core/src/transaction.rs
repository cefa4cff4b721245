//! Transaction, TxIn, TxOut and UTxO — the entities in the data model.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use puddlecoin_crypto::{is_valid_address, sha256_hex};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransactionError {
    #[error("transaction has no inputs")]
    NoInputs,

    #[error("transaction has no outputs")]
    NoOutputs,

    #[error("output address is not a valid address: {0}")]
    InvalidAddress(String),

    #[error("output amount must be a positive integer, got {0}")]
    NonPositiveAmount(u64),

    #[error("transaction id does not match its derivation")]
    IdMismatch,
}

/// A reference to a previous output, with the signature that authorizes
/// spending it. `signature` is empty for the coinbase input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxIn {
    pub tx_out_id: String,
    pub tx_out_index: u32,
    pub signature: String,
}

impl TxIn {
    pub fn is_coinbase_shape(&self) -> bool {
        self.tx_out_id.is_empty() && self.signature.is_empty()
    }

    /// The identity of the UTxO this input references.
    pub fn outpoint(&self) -> (String, u32) {
        (self.tx_out_id.clone(), self.tx_out_index)
    }
}

/// A newly created output: an amount paid to an address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxOut {
    pub address: String,
    pub amount: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub tx_ins: Vec<TxIn>,
    pub tx_outs: Vec<TxOut>,
}

impl Transaction {
    /// Build a transaction from its inputs/outputs, computing `id`.
    pub fn new(tx_ins: Vec<TxIn>, tx_outs: Vec<TxOut>) -> Self {
        let id = Self::derive_id(&tx_ins, &tx_outs);
        Transaction { id, tx_ins, tx_outs }
    }

    /// `SHA-256` over the concatenation of `${txOutId}${txOutIndex}` for
    /// every input, followed by `${address}${amount}` for every output.
    /// Signatures are never covered, so signing the id can never be
    /// self-referential.
    pub fn derive_id(tx_ins: &[TxIn], tx_outs: &[TxOut]) -> String {
        let mut ins_content = String::new();
        for tx_in in tx_ins {
            ins_content.push_str(&tx_in.tx_out_id);
            ins_content.push_str(&tx_in.tx_out_index.to_string());
        }
        let mut outs_content = String::new();
        for tx_out in tx_outs {
            outs_content.push_str(&tx_out.address);
            outs_content.push_str(&tx_out.amount.to_string());
        }
        sha256_hex(format!("{ins_content}{outs_content}"))
    }

    pub fn get_transaction_id(&self) -> String {
        Self::derive_id(&self.tx_ins, &self.tx_outs)
    }

    /// Structural validation: nonempty inputs/outputs, valid addresses,
    /// positive amounts, and an id that matches its derivation. Does not
    /// touch the UTXO set or verify signatures — see `ledger` for that.
    pub fn validate_structure(&self) -> Result<(), TransactionError> {
        if self.tx_ins.is_empty() {
            return Err(TransactionError::NoInputs);
        }
        if self.tx_outs.is_empty() {
            return Err(TransactionError::NoOutputs);
        }
        for tx_out in &self.tx_outs {
            if !is_valid_address(&tx_out.address) {
                return Err(TransactionError::InvalidAddress(tx_out.address.clone()));
            }
            if tx_out.amount == 0 {
                return Err(TransactionError::NonPositiveAmount(tx_out.amount));
            }
        }
        if self.get_transaction_id() != self.id {
            return Err(TransactionError::IdMismatch);
        }
        Ok(())
    }

    pub fn is_coinbase_shape(&self) -> bool {
        self.tx_ins.len() == 1 && self.tx_ins[0].is_coinbase_shape()
    }
}

/// An unspent transaction output: the live, spendable record. Identity is
/// the pair `(tx_out_id, tx_out_index)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UTxO {
    pub tx_out_id: String,
    pub tx_out_index: u32,
    pub address: String,
    pub amount: u64,
}

impl UTxO {
    pub fn outpoint(&self) -> (String, u32) {
        (self.tx_out_id.clone(), self.tx_out_index)
    }
}
