//! The transaction pool: an insertion-ordered list of transactions
//! awaiting inclusion, admitted against the live UTXO set and pruned as
//! the chain advances.

use thiserror::Error;
use tracing::{debug, info};

use puddlecoin_core::ledger::validate_transaction;
use puddlecoin_core::{LedgerError, Transaction, UtxoSet};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MempoolError {
    #[error("transaction does not validate against the UTXO set: {0}")]
    InvalidPoolTx(#[from] LedgerError),

    #[error("transaction input {0}:{1} conflicts with a transaction already in the pool")]
    DoubleSpendInPool(String, u32),
}

/// The pending-transaction pool. Ordering is insertion order; the miner
/// treats it as an unordered set of candidates.
#[derive(Debug, Clone, Default)]
pub struct Mempool {
    transactions: Vec<Transaction>,
}

impl Mempool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    /// Admit `tx` iff it validates against `utxo_set` and none of its
    /// inputs collide with an input already in the pool.
    pub fn add(&mut self, tx: Transaction, utxo_set: &UtxoSet) -> Result<(), MempoolError> {
        if let Err(err) = validate_transaction(&tx, utxo_set) {
            debug!(tx_id = %tx.id, %err, "rejected pool admission");
            return Err(err.into());
        }

        for pooled in &self.transactions {
            for pooled_in in &pooled.tx_ins {
                for candidate_in in &tx.tx_ins {
                    if pooled_in.outpoint() == candidate_in.outpoint() {
                        debug!(
                            tx_id = %tx.id,
                            tx_out_id = %candidate_in.tx_out_id,
                            tx_out_index = candidate_in.tx_out_index,
                            "rejected pool admission, conflicts with pooled input"
                        );
                        return Err(MempoolError::DoubleSpendInPool(
                            candidate_in.tx_out_id.clone(),
                            candidate_in.tx_out_index,
                        ));
                    }
                }
            }
        }

        info!(tx_id = %tx.id, "admitted transaction to pool");
        self.transactions.push(tx);
        Ok(())
    }

    /// Drop every pooled transaction that now references a UTxO missing
    /// from `new_utxo_set`. Called whenever the chain advances.
    pub fn update(&mut self, new_utxo_set: &UtxoSet) {
        self.transactions.retain(|tx| {
            let still_valid = tx
                .tx_ins
                .iter()
                .all(|tx_in| new_utxo_set.contains(&tx_in.tx_out_id, tx_in.tx_out_index));
            if !still_valid {
                info!(tx_id = %tx.id, "evicted transaction from pool, spent input vanished");
            }
            still_valid
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use puddlecoin_core::{TxIn, TxOut, COINBASE_AMOUNT};
    use puddlecoin_crypto::{gen_priv_key, pub_from_priv, sign};

    fn funded_utxo_set() -> (String, String, UtxoSet) {
        let priv_key = gen_priv_key();
        let address = pub_from_priv(&priv_key).unwrap();
        let tx_ins = vec![TxIn { tx_out_id: String::new(), tx_out_index: 0, signature: String::new() }];
        let tx_outs = vec![TxOut { address: address.clone(), amount: COINBASE_AMOUNT }];
        let coinbase = Transaction::new(tx_ins, tx_outs);
        let utxo_set =
            puddlecoin_core::ledger::process_transactions(&[coinbase], &UtxoSet::new(), 0).unwrap();
        (priv_key, address, utxo_set)
    }

    fn spend(priv_key: &str, address: &str, utxo_set: &UtxoSet, receiver: &str) -> Transaction {
        let utxo = utxo_set.for_address(address).into_iter().next().unwrap();
        let tx_in = TxIn { tx_out_id: utxo.tx_out_id, tx_out_index: utxo.tx_out_index, signature: String::new() };
        let tx_out = TxOut { address: receiver.to_string(), amount: COINBASE_AMOUNT };
        let mut tx = Transaction::new(vec![tx_in], vec![tx_out]);
        let sig = sign(priv_key, &tx.id).unwrap();
        tx.tx_ins[0].signature = sig;
        tx
    }

    #[test]
    fn admits_a_valid_transaction() {
        let (priv_key, address, utxo_set) = funded_utxo_set();
        let receiver = pub_from_priv(&gen_priv_key()).unwrap();
        let mut pool = Mempool::new();

        pool.add(spend(&priv_key, &address, &utxo_set, &receiver), &utxo_set).unwrap();
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn rejects_second_spend_of_same_input() {
        let (priv_key, address, utxo_set) = funded_utxo_set();
        let receiver_a = pub_from_priv(&gen_priv_key()).unwrap();
        let receiver_b = pub_from_priv(&gen_priv_key()).unwrap();
        let mut pool = Mempool::new();

        pool.add(spend(&priv_key, &address, &utxo_set, &receiver_a), &utxo_set).unwrap();
        let result = pool.add(spend(&priv_key, &address, &utxo_set, &receiver_b), &utxo_set);

        assert!(matches!(result, Err(MempoolError::DoubleSpendInPool(_, _))));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn update_prunes_transactions_whose_input_vanished() {
        let (priv_key, address, utxo_set) = funded_utxo_set();
        let receiver = pub_from_priv(&gen_priv_key()).unwrap();
        let mut pool = Mempool::new();
        pool.add(spend(&priv_key, &address, &utxo_set, &receiver), &utxo_set).unwrap();

        pool.update(&UtxoSet::new());

        assert!(pool.is_empty());
    }
}
