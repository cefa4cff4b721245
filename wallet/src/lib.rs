//! Builds and signs a spend transaction from a private key, the live UTXO
//! set, and the current pool (so it never reuses an output some other
//! pending transaction already claims).

use thiserror::Error;

use puddlecoin_core::{Transaction, TxIn, TxOut, UTxO, UtxoSet};
use puddlecoin_crypto::{pub_from_priv, sign, CryptoError};
use puddlecoin_mempool::Mempool;

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("private key error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: u64, available: u64 },
}

/// Build and sign a transaction paying `amount` to `receiver` from the
/// funds controlled by `priv_key`.
///
/// 1. Derive the sender's own address.
/// 2. Consider only unspent outputs not already referenced by any pooled
///    transaction's inputs (so a just-submitted spend is never reused).
/// 3. Greedily accumulate in iteration order until the amount is covered.
/// 4. Emit `[receiver]` plus a change output back to the sender if the
///    accumulated total overshoots `amount`.
/// 5. Compute the id, then sign each input over it.
pub fn create_transaction(
    receiver: &str,
    amount: u64,
    priv_key: &str,
    pool: &Mempool,
    utxo_set: &UtxoSet,
) -> Result<Transaction, WalletError> {
    let own_address = pub_from_priv(priv_key)?;

    let pooled_outpoints: std::collections::HashSet<(String, u32)> = pool
        .transactions()
        .iter()
        .flat_map(|tx| tx.tx_ins.iter().map(|tx_in| tx_in.outpoint()))
        .collect();

    let available: Vec<UTxO> = utxo_set
        .for_address(&own_address)
        .into_iter()
        .filter(|utxo| !pooled_outpoints.contains(&utxo.outpoint()))
        .collect();

    let mut acc = 0u64;
    let mut selected = Vec::new();
    for utxo in available {
        if acc >= amount {
            break;
        }
        acc += utxo.amount;
        selected.push(utxo);
    }

    if acc < amount {
        return Err(WalletError::InsufficientFunds { needed: amount, available: acc });
    }

    let tx_ins: Vec<TxIn> = selected
        .iter()
        .map(|utxo| TxIn {
            tx_out_id: utxo.tx_out_id.clone(),
            tx_out_index: utxo.tx_out_index,
            signature: String::new(),
        })
        .collect();

    let mut tx_outs = vec![TxOut { address: receiver.to_string(), amount }];
    let change = acc - amount;
    if change > 0 {
        tx_outs.push(TxOut { address: own_address, amount: change });
    }

    let mut tx = Transaction::new(tx_ins, tx_outs);
    for tx_in in &mut tx.tx_ins {
        tx_in.signature = sign(priv_key, &tx.id)?;
    }

    Ok(tx)
}

/// Sum of every unspent output paying `address`.
pub fn balance_of(address: &str, utxo_set: &UtxoSet) -> u64 {
    utxo_set.balance_of(address)
}

#[cfg(test)]
mod tests {
    use super::*;
    use puddlecoin_core::{TxIn as CoreTxIn, TxOut as CoreTxOut, COINBASE_AMOUNT};
    use puddlecoin_crypto::gen_priv_key;

    fn funded(priv_key: &str) -> UtxoSet {
        let address = pub_from_priv(priv_key).unwrap();
        let tx_ins = vec![CoreTxIn { tx_out_id: String::new(), tx_out_index: 0, signature: String::new() }];
        let tx_outs = vec![CoreTxOut { address, amount: COINBASE_AMOUNT }];
        let coinbase = Transaction::new(tx_ins, tx_outs);
        puddlecoin_core::ledger::process_transactions(&[coinbase], &UtxoSet::new(), 0).unwrap()
    }

    #[test]
    fn builds_a_spend_with_change() {
        let priv_key = gen_priv_key();
        let utxo_set = funded(&priv_key);
        let receiver = pub_from_priv(&gen_priv_key()).unwrap();
        let pool = Mempool::new();

        let tx = create_transaction(&receiver, 30, &priv_key, &pool, &utxo_set).unwrap();

        assert_eq!(tx.tx_outs.len(), 2);
        assert_eq!(tx.tx_outs[0].amount, 30);
        assert_eq!(tx.tx_outs[1].amount, COINBASE_AMOUNT - 30);
    }

    #[test]
    fn spend_of_exact_balance_has_no_change_output() {
        let priv_key = gen_priv_key();
        let utxo_set = funded(&priv_key);
        let receiver = pub_from_priv(&gen_priv_key()).unwrap();
        let pool = Mempool::new();

        let tx = create_transaction(&receiver, COINBASE_AMOUNT, &priv_key, &pool, &utxo_set).unwrap();

        assert_eq!(tx.tx_outs.len(), 1);
    }

    #[test]
    fn insufficient_funds_is_rejected() {
        let priv_key = gen_priv_key();
        let utxo_set = funded(&priv_key);
        let receiver = pub_from_priv(&gen_priv_key()).unwrap();
        let pool = Mempool::new();

        let result = create_transaction(&receiver, 10_000, &priv_key, &pool, &utxo_set);
        assert!(matches!(result, Err(WalletError::InsufficientFunds { .. })));
    }

    #[test]
    fn excludes_utxos_already_claimed_by_the_pool() {
        let priv_key = gen_priv_key();
        let utxo_set = funded(&priv_key);
        let receiver = pub_from_priv(&gen_priv_key()).unwrap();

        let first = create_transaction(&receiver, 30, &priv_key, &Mempool::new(), &utxo_set).unwrap();
        let mut pool = Mempool::new();
        pool.add(first, &utxo_set).unwrap();

        let result = create_transaction(&receiver, 30, &priv_key, &pool, &utxo_set);
        assert!(matches!(result, Err(WalletError::InsufficientFunds { .. })));
    }
}
