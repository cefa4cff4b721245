//! End-to-end scenarios that need more than one `Node`, or a real peer
//! connection, to exercise: double-spend admission and fork resolution
//! over an actual socket.

use std::sync::Arc;
use std::time::Duration;

use puddlecoin_core::COINBASE_AMOUNT;
use puddlecoin_crypto::{gen_priv_key, pub_from_priv};
use puddlecoin_node::{Node, NodeError};
use puddlecoin_mempool::MempoolError;

#[tokio::test]
async fn second_spend_of_the_same_output_is_rejected() {
    let node = Node::new(gen_priv_key()).unwrap();
    node.mine().await.unwrap();

    let receiver_a = pub_from_priv(&gen_priv_key()).unwrap();
    let receiver_b = pub_from_priv(&gen_priv_key()).unwrap();

    node.send_tx(&receiver_a, 30).await.unwrap();
    let second = node.send_tx(&receiver_b, 30).await;

    assert!(matches!(
        second,
        Err(NodeError::Mempool(MempoolError::DoubleSpendInPool(_, _)))
    ));
    assert_eq!(node.get_pool().await.len(), 1);
}

/// Two nodes mine independently, forming two different single-block
/// chains off the same genesis. Once connected, the lighter chain is
/// expected to replace itself with the heavier one and the losing
/// coinbase disappears from both nodes' UTxO sets.
#[tokio::test]
async fn nodes_converge_on_the_heavier_chain_after_connecting() {
    let node_a = Arc::new(Node::new(gen_priv_key()).unwrap());
    let node_b = Arc::new(Node::new(gen_priv_key()).unwrap());

    // A mines twice, B mines once: A's chain is both longer and heavier.
    node_a.mine().await.unwrap();
    node_a.mine().await.unwrap();
    node_b.mine().await.unwrap();

    assert_eq!(node_a.get_chain().await.len(), 3);
    assert_eq!(node_b.get_chain().await.len(), 2);
    let b_losing_coinbase_receiver = node_b.address().to_string();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let b_addr = listener.local_addr().unwrap().to_string();
    {
        let node_b = node_b.clone();
        tokio::spawn(async move {
            if let Ok((stream, remote)) = listener.accept().await {
                let _ = puddlecoin_network::accept(remote.to_string(), stream, node_b.peers().clone(), node_b)
                    .await;
            }
        });
    }

    node_a.add_peer(b_addr).await.unwrap();

    // Gossip is asynchronous; give the handshake and reconciliation a
    // moment to run their course.
    tokio::time::sleep(Duration::from_millis(300)).await;

    let chain_a = node_a.get_chain().await;
    let chain_b = node_b.get_chain().await;
    assert_eq!(chain_a.len(), 3);
    assert_eq!(chain_b.len(), 3, "node B should have adopted node A's heavier chain");
    assert_eq!(chain_a.last().unwrap().hash, chain_b.last().unwrap().hash);

    // B's losing coinbase (from its single mined block) no longer funds
    // an output anywhere in the converged UTxO set.
    let unspent = node_b.get_unspent().await;
    let b_balance: u64 = unspent
        .iter()
        .filter(|u| u.address == b_losing_coinbase_receiver)
        .map(|u| u.amount)
        .sum();
    assert_eq!(b_balance, 0);
    assert_eq!(node_a.get_balance().await, COINBASE_AMOUNT * 2);
}
