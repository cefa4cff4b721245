//! PuddleCoin node entry point.
//!
//! Construction order mirrors the way the node is meant to come up: load the
//! wallet key (creating one on first run), build the `Node` (which in turn
//! constructs the genesis block and UTxO set), start the peer listener, then
//! start accepting HTTP commands.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};

use puddlecoin_crypto::keyfile;
use puddlecoin_node::Node;

/// Command line arguments for the PuddleCoin node.
///
/// Every flag has a matching environment variable (the flag wins if both are
/// set), matching the node's documented environment surface.
#[derive(Parser)]
#[clap(name = "puddlecoin")]
#[clap(about = "PuddleCoin - a minimal proof-of-work UTXO cryptocurrency node")]
struct Cli {
    /// HTTP port for the command surface
    #[clap(long, env = "HTTP_PORT", default_value = "3000")]
    http_port: u16,

    /// TCP port for the peer gossip listener
    #[clap(long, env = "P2P_PORT", default_value = "5000")]
    p2p_port: u16,

    /// Path to the wallet private key file; created on first run if missing
    #[clap(long, env = "PRIVATE_KEY", default_value = "wallet/private_key")]
    private_key: PathBuf,

    /// Peers to dial immediately at startup, e.g. --peer 127.0.0.1:5001
    #[clap(long = "peer")]
    peers: Vec<String>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let priv_key = match keyfile::load_or_create(&cli.private_key) {
        Ok(key) => key,
        Err(err) => {
            error!(%err, path = %cli.private_key.display(), "failed to load wallet key");
            std::process::exit(1);
        }
    };

    let node = match Node::new(priv_key) {
        Ok(node) => Arc::new(node),
        Err(err) => {
            error!(%err, "failed to construct node");
            std::process::exit(1);
        }
    };
    info!(address = %node.address(), "wallet loaded");

    let p2p_listener = match tokio::net::TcpListener::bind(("0.0.0.0", cli.p2p_port)).await {
        Ok(listener) => listener,
        Err(err) => {
            error!(%err, port = cli.p2p_port, "failed to bind peer listener");
            std::process::exit(1);
        }
    };
    info!(port = cli.p2p_port, "peer listener bound");

    {
        let node = node.clone();
        tokio::spawn(async move {
            loop {
                match p2p_listener.accept().await {
                    Ok((stream, remote)) => {
                        let addr = remote.to_string();
                        let node = node.clone();
                        tokio::spawn(async move {
                            if let Err(err) =
                                puddlecoin_network::accept(addr.clone(), stream, node.peers().clone(), node).await
                            {
                                warn!(peer = %addr, %err, "peer session ended with an error");
                            }
                        });
                    }
                    Err(err) => warn!(%err, "failed to accept inbound peer connection"),
                }
            }
        });
    }

    for peer in cli.peers {
        if let Err(err) = node.add_peer(peer.clone()).await {
            warn!(peer = %peer, %err, "failed to dial initial peer");
        }
    }

    let app = puddlecoin_rpc::router(node);
    let http_addr = SocketAddr::from(([0, 0, 0, 0], cli.http_port));
    info!(addr = %http_addr, "starting HTTP command surface");

    if let Err(err) = axum::Server::bind(&http_addr)
        .serve(app.into_make_service())
        .await
    {
        error!(%err, "HTTP server exited with an error");
        std::process::exit(1);
    }
}
