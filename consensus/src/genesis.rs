//! The fixed genesis block. Every node starts its chain with this exact
//! block; `Chain::replace_chain` checks candidate chains against it
//! byte-for-byte rather than recomputing its hash.

use once_cell::sync::Lazy;

use puddlecoin_core::{Block, Transaction, TxIn, TxOut};

pub static GENESIS_BLOCK: Lazy<Block> = Lazy::new(|| Block {
    index: 0,
    timestamp: 1_734_667_274_522,
    transactions: vec![Transaction {
        id: "e655f6a5f26dc9b4cac6e46f52336428287759cf81ef5ff10854f69d68f43fa3".to_string(),
        tx_ins: vec![TxIn {
            tx_out_id: String::new(),
            tx_out_index: 0,
            signature: String::new(),
        }],
        tx_outs: vec![TxOut {
            address: "04bfcab8722991ae774db48f934ca79cfb7dd991229153b9f732ba5334aafcd8e7266e47076996b55a14bf9913ee3145ce0cfc1372ada8ada74bd287450313534a".to_string(),
            amount: 50,
        }],
    }],
    previous_hash: String::new(),
    hash: "45dcbece109d098f2764e371d20e29c5ef3dcc10d985c6bc8d563d1fbdc82d9e".to_string(),
    difficulty: 0,
    proof: 0,
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genesis_is_well_formed() {
        let genesis = &*GENESIS_BLOCK;
        assert_eq!(genesis.index, 0);
        assert!(genesis.previous_hash.is_empty());
        assert_eq!(genesis.transactions.len(), 1);
    }
}
