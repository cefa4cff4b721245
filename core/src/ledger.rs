//! The UTXO engine: block-level transaction validation and the UTXO set
//! state transition (`process_transactions`).

use std::collections::HashMap;

use puddlecoin_crypto::verify;
use thiserror::Error;

use crate::transaction::{Transaction, TransactionError, UTxO};
use crate::COINBASE_AMOUNT;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("malformed transaction: {0}")]
    Malformed(#[from] TransactionError),

    #[error("transaction input references unknown UTxO {0}:{1}")]
    UnknownUTxO(String, u32),

    #[error("signature does not verify for input {0}:{1}")]
    InvalidSignature(String, u32),

    #[error("sum of inputs ({inputs}) does not equal sum of outputs ({outputs})")]
    ConservationViolation { inputs: u64, outputs: u64 },

    #[error("block has no transactions")]
    NoTransactions,

    #[error("invalid coinbase transaction: {0}")]
    BadCoinbase(String),

    #[error("duplicate UTxO reference within block: {0}:{1}")]
    DoubleSpendInBlock(String, u32),
}

/// The set of live, spendable outputs, keyed by `(tx_out_id, tx_out_index)`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UtxoSet {
    entries: HashMap<(String, u32), UTxO>,
}

impl UtxoSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, tx_out_id: &str, tx_out_index: u32) -> Option<&UTxO> {
        self.entries.get(&(tx_out_id.to_string(), tx_out_index))
    }

    pub fn contains(&self, tx_out_id: &str, tx_out_index: u32) -> bool {
        self.entries.contains_key(&(tx_out_id.to_string(), tx_out_index))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &UTxO> {
        self.entries.values()
    }

    /// All UTxOs paying `address`, in an unspecified but stable order.
    pub fn for_address(&self, address: &str) -> Vec<UTxO> {
        let mut out: Vec<UTxO> = self
            .entries
            .values()
            .filter(|u| u.address == address)
            .cloned()
            .collect();
        out.sort_by(|a, b| (a.tx_out_id.clone(), a.tx_out_index).cmp(&(b.tx_out_id.clone(), b.tx_out_index)));
        out
    }

    pub fn balance_of(&self, address: &str) -> u64 {
        self.entries
            .values()
            .filter(|u| u.address == address)
            .map(|u| u.amount)
            .sum()
    }

    fn insert(&mut self, utxo: UTxO) {
        self.entries.insert(utxo.outpoint(), utxo);
    }

    fn remove(&mut self, tx_out_id: &str, tx_out_index: u32) -> Option<UTxO> {
        self.entries.remove(&(tx_out_id.to_string(), tx_out_index))
    }
}

/// Validate `txs` as a complete block at `block_index` against `utxo_set`
/// (the set as it stood immediately before this block) and return the
/// UTXO set that results from applying it. On any failure the input set is
/// untouched — there is no partial mutation.
pub fn process_transactions(
    txs: &[Transaction],
    utxo_set: &UtxoSet,
    block_index: u64,
) -> Result<UtxoSet, LedgerError> {
    if txs.is_empty() {
        return Err(LedgerError::NoTransactions);
    }

    validate_coinbase(&txs[0], block_index)?;
    check_no_duplicate_inputs(txs)?;

    for tx in &txs[1..] {
        validate_transaction(tx, utxo_set)?;
    }

    let mut next = utxo_set.clone();
    for tx in txs {
        if !tx.is_coinbase_shape() {
            for tx_in in &tx.tx_ins {
                next.remove(&tx_in.tx_out_id, tx_in.tx_out_index);
            }
        }
        for (index, tx_out) in tx.tx_outs.iter().enumerate() {
            next.insert(UTxO {
                tx_out_id: tx.id.clone(),
                tx_out_index: index as u32,
                address: tx_out.address.clone(),
                amount: tx_out.amount,
            });
        }
    }

    Ok(next)
}

/// Exactly one TxIn (`txOutId=""`, `txOutIndex=blockIndex`, empty signature)
/// and exactly one TxOut of `COINBASE_AMOUNT`, with an id matching its
/// derivation.
fn validate_coinbase(tx: &Transaction, block_index: u64) -> Result<(), LedgerError> {
    if tx.tx_ins.len() != 1 {
        return Err(LedgerError::BadCoinbase(format!(
            "expected exactly one input, got {}",
            tx.tx_ins.len()
        )));
    }
    let tx_in = &tx.tx_ins[0];
    if !tx_in.tx_out_id.is_empty() {
        return Err(LedgerError::BadCoinbase("coinbase txOutId must be empty".into()));
    }
    if tx_in.tx_out_index != block_index as u32 {
        return Err(LedgerError::BadCoinbase(format!(
            "coinbase txOutIndex {} does not match block index {}",
            tx_in.tx_out_index, block_index
        )));
    }
    if !tx_in.signature.is_empty() {
        return Err(LedgerError::BadCoinbase("coinbase signature must be empty".into()));
    }
    if tx.tx_outs.len() != 1 {
        return Err(LedgerError::BadCoinbase(format!(
            "expected exactly one output, got {}",
            tx.tx_outs.len()
        )));
    }
    if tx.tx_outs[0].amount != COINBASE_AMOUNT {
        return Err(LedgerError::BadCoinbase(format!(
            "coinbase amount {} does not match COINBASE_AMOUNT {}",
            tx.tx_outs[0].amount, COINBASE_AMOUNT
        )));
    }
    if !puddlecoin_crypto::is_valid_address(&tx.tx_outs[0].address) {
        return Err(LedgerError::BadCoinbase(format!(
            "invalid coinbase address {}",
            tx.tx_outs[0].address
        )));
    }
    if tx.get_transaction_id() != tx.id {
        return Err(LedgerError::BadCoinbase("id does not match derivation".into()));
    }
    Ok(())
}

/// No two TxIns anywhere in the block reference the same outpoint.
fn check_no_duplicate_inputs(txs: &[Transaction]) -> Result<(), LedgerError> {
    let mut seen = std::collections::HashSet::new();
    for tx in txs {
        for tx_in in &tx.tx_ins {
            let key = tx_in.outpoint();
            if !seen.insert(key.clone()) {
                return Err(LedgerError::DoubleSpendInBlock(key.0, key.1));
            }
        }
    }
    Ok(())
}

/// Structural validity, id derivation, every input references a live UTxO
/// with a verifying signature, and conservation of value.
pub fn validate_transaction(tx: &Transaction, utxo_set: &UtxoSet) -> Result<(), LedgerError> {
    tx.validate_structure()?;

    let mut input_total: u64 = 0;
    for tx_in in &tx.tx_ins {
        let referenced = utxo_set
            .get(&tx_in.tx_out_id, tx_in.tx_out_index)
            .ok_or_else(|| LedgerError::UnknownUTxO(tx_in.tx_out_id.clone(), tx_in.tx_out_index))?;

        if !verify(&referenced.address, &tx.id, &tx_in.signature) {
            return Err(LedgerError::InvalidSignature(
                tx_in.tx_out_id.clone(),
                tx_in.tx_out_index,
            ));
        }
        input_total += referenced.amount;
    }

    let output_total: u64 = tx.tx_outs.iter().map(|o| o.amount).sum();
    if input_total != output_total {
        return Err(LedgerError::ConservationViolation {
            inputs: input_total,
            outputs: output_total,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::{TxIn, TxOut};
    use puddlecoin_crypto::{gen_priv_key, pub_from_priv, sign};

    fn coinbase(block_index: u64, address: &str) -> Transaction {
        let tx_ins = vec![TxIn {
            tx_out_id: String::new(),
            tx_out_index: block_index as u32,
            signature: String::new(),
        }];
        let tx_outs = vec![TxOut { address: address.to_string(), amount: COINBASE_AMOUNT }];
        Transaction::new(tx_ins, tx_outs)
    }

    #[test]
    fn process_transactions_applies_coinbase_to_empty_set() {
        let priv_key = gen_priv_key();
        let address = pub_from_priv(&priv_key).unwrap();
        let tx = coinbase(0, &address);

        let result = process_transactions(&[tx.clone()], &UtxoSet::new(), 0).unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(result.balance_of(&address), COINBASE_AMOUNT);
        assert_eq!(result.get(&tx.id, 0).unwrap().amount, COINBASE_AMOUNT);
    }

    #[test]
    fn process_transactions_rejects_wrong_coinbase_index() {
        let priv_key = gen_priv_key();
        let address = pub_from_priv(&priv_key).unwrap();
        let tx = coinbase(1, &address);

        let result = process_transactions(&[tx], &UtxoSet::new(), 0);
        assert!(matches!(result, Err(LedgerError::BadCoinbase(_))));
    }

    #[test]
    fn process_transactions_spends_and_creates_new_utxos() {
        let priv_key = gen_priv_key();
        let address = pub_from_priv(&priv_key).unwrap();
        let receiver_priv = gen_priv_key();
        let receiver = pub_from_priv(&receiver_priv).unwrap();

        let cb = coinbase(0, &address);
        let utxo_set = process_transactions(&[cb.clone()], &UtxoSet::new(), 0).unwrap();

        let spend_in = TxIn {
            tx_out_id: cb.id.clone(),
            tx_out_index: 0,
            signature: String::new(),
        };
        let spend_outs = vec![TxOut { address: receiver.clone(), amount: COINBASE_AMOUNT }];
        let mut spend = Transaction::new(vec![spend_in], spend_outs);
        let sig = sign(&priv_key, &spend.id).unwrap();
        spend.tx_ins[0].signature = sig;

        let cb1 = coinbase(1, &address);
        let next = process_transactions(&[cb1, spend.clone()], &utxo_set, 1).unwrap();

        assert!(!next.contains(&cb.id, 0));
        assert_eq!(next.balance_of(&receiver), COINBASE_AMOUNT);
        assert_eq!(next.balance_of(&address), COINBASE_AMOUNT); // block 1's coinbase
    }

    #[test]
    fn duplicate_input_in_block_is_rejected() {
        let priv_key = gen_priv_key();
        let address = pub_from_priv(&priv_key).unwrap();
        let receiver_priv = gen_priv_key();
        let receiver = pub_from_priv(&receiver_priv).unwrap();

        let cb = coinbase(0, &address);
        let utxo_set = process_transactions(&[cb.clone()], &UtxoSet::new(), 0).unwrap();

        let make_spend = || {
            let spend_in = TxIn {
                tx_out_id: cb.id.clone(),
                tx_out_index: 0,
                signature: String::new(),
            };
            let spend_outs = vec![TxOut { address: receiver.clone(), amount: COINBASE_AMOUNT }];
            let mut spend = Transaction::new(vec![spend_in], spend_outs);
            let sig = sign(&priv_key, &spend.id).unwrap();
            spend.tx_ins[0].signature = sig;
            spend
        };

        let cb1 = coinbase(1, &address);
        let result = process_transactions(&[cb1, make_spend(), make_spend()], &utxo_set, 1);
        assert!(matches!(result, Err(LedgerError::DoubleSpendInBlock(_, _))));
    }
}
