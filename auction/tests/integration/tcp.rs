//! Nodes talking over real sockets on the loopback interface.

use std::net::SocketAddr;
use std::sync::Arc;

use auction::{AuctionNode, FanOut, NodeIdentity, RequestHandler, TcpTransport};
use tokio_util::sync::CancellationToken;

use crate::common::price;

struct TcpNode {
    node: AuctionNode<TcpTransport>,
    addr: SocketAddr,
}

async fn start_node(seed: u8, shutdown: &CancellationToken) -> TcpNode {
    let identity = NodeIdentity::from_seed([seed; 32]);
    let loopback = SocketAddr::from(([127, 0, 0, 1], 0));
    let (transport, server) = TcpTransport::bind(identity.peer_key(), loopback)
        .await
        .unwrap();
    let addr = transport.local_addr();
    let node = AuctionNode::new(identity, transport, FanOut::Sequential);
    let handler: Arc<dyn RequestHandler> = Arc::new(node.handlers().clone());
    tokio::spawn(server.run(handler, shutdown.clone()));
    TcpNode { node, addr }
}

#[tokio::test]
async fn test_three_nodes_over_tcp() {
    let shutdown = CancellationToken::new();
    let a = start_node(1, &shutdown).await;
    let b = start_node(2, &shutdown).await;
    let c = start_node(3, &shutdown).await;

    // B knows A; C knows A and B. A learns both from their hellos.
    assert_eq!(b.node.transport().bootstrap(&[a.addr]).await.len(), 1);
    assert_eq!(
        c.node.transport().bootstrap(&[a.addr, b.addr]).await.len(),
        2
    );
    for n in [&a, &b, &c] {
        n.node.refresh_peers().await.unwrap();
    }
    assert_eq!(a.node.registry().len(), 2);
    assert_eq!(b.node.registry().len(), 2);
    assert_eq!(c.node.registry().len(), 2);

    let report = a
        .node
        .create_auction("auction1", "Pic#1", price("75"))
        .await
        .unwrap();
    assert_eq!(report.delivered(), 2);

    c.node
        .make_bid("auction1", price("75.5"), "Client#3")
        .await
        .unwrap();
    b.node
        .make_bid("auction1", price("80"), "Client#2")
        .await
        .unwrap();

    let close = a.node.close_auction("auction1").await.unwrap();
    assert_eq!(close.local.winner.as_deref(), Some("Client#2"));
    assert_eq!(close.peers.delivered(), 2);
    for n in [&a, &b, &c] {
        let auction = n.node.store().get("auction1").unwrap();
        assert_eq!(auction.current_price, price("80"));
        assert_eq!(auction.highest_bidder.as_deref(), Some("Client#2"));
    }

    shutdown.cancel();
}

#[tokio::test]
async fn test_stopped_peer_fails_broadcast() {
    let shutdown = CancellationToken::new();
    let a = start_node(1, &shutdown).await;

    let peer_shutdown = CancellationToken::new();
    let b = start_node(2, &peer_shutdown).await;

    a.node.transport().bootstrap(&[b.addr]).await;
    a.node.refresh_peers().await.unwrap();

    peer_shutdown.cancel();
    // Let the listener and the pooled connection task observe the cancel.
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    let err = a
        .node
        .create_auction("auction1", "Pic#1", price("75"))
        .await
        .unwrap_err();
    assert_eq!(err.peer(), Some(&b.node.peer_key()));
    assert!(a.node.store().contains("auction1"));

    shutdown.cancel();
}
