//! Full auction life cycle across three nodes.

use auction::{FanOut, Price};

use crate::common::{price, NetworkHarness};

async fn run_pic1_auction(harness: &NetworkHarness) {
    let (a, b) = tokio::join!(
        harness
            .node(0)
            .create_auction("auction1", "Pic#1", price("75")),
        harness
            .node(1)
            .create_auction("auction2", "Pic#2", price("60")),
    );
    assert_eq!(a.unwrap().delivered(), 2);
    assert_eq!(b.unwrap().delivered(), 2);

    let (a, b) = tokio::join!(
        harness.node(1).make_bid("auction1", price("75"), "Client#2"),
        harness
            .node(2)
            .make_bid("auction1", price("75.5"), "Client#3"),
    );
    // Equal to the starting price: rejected everywhere.
    let equal = a.unwrap();
    assert!(!equal.local.is_accepted());
    assert!(equal
        .peers
        .acks
        .iter()
        .all(|ack| matches!(&ack.outcome, auction::PeerOutcome::Acked(a) if !a.success)));
    assert!(b.unwrap().local.is_accepted());

    let raise = harness
        .node(1)
        .make_bid("auction1", price("80"), "Client#2")
        .await
        .unwrap();
    assert!(raise.local.is_accepted());
    assert_eq!(raise.peers.delivered(), 2);
}

#[tokio::test]
async fn test_single_auction_life_cycle() {
    let harness = NetworkHarness::new(3).await;
    run_pic1_auction(&harness).await;

    let report = harness.node(0).close_auction("auction1").await.unwrap();
    assert!(report.local.success);
    assert_eq!(report.local.winner.as_deref(), Some("Client#2"));
    assert_eq!(report.local.price, Some(price("80")));

    for peer in [harness.peer_key(1), harness.peer_key(2)] {
        let view = report.peers.ack_for(&peer).unwrap();
        assert_eq!(view.winner.as_deref(), Some("Client#2"));
        assert_eq!(view.price, Some(price("80")));
    }

    for view in harness.views("auction1") {
        let auction = view.unwrap();
        assert_eq!(auction.current_price, price("80"));
        assert_eq!(auction.highest_bidder.as_deref(), Some("Client#2"));
        assert_eq!(auction.starting_price, price("75"));
    }
    for view in harness.views("auction2") {
        let auction = view.unwrap();
        assert_eq!(auction.current_price, price("60"));
        assert!(auction.highest_bidder.is_none());
    }
}

#[tokio::test]
async fn test_life_cycle_with_concurrent_fan_out() {
    let harness = NetworkHarness::with_fan_out(3, FanOut::Concurrent).await;
    run_pic1_auction(&harness).await;

    let report = harness.node(0).close_auction("auction1").await.unwrap();
    assert_eq!(report.peers.attempted(), 2);
    assert!(report.peers.failed_peers().is_empty());
    assert!(harness
        .views("auction1")
        .into_iter()
        .all(|v| v.unwrap().highest_bidder.as_deref() == Some("Client#2")));
}

#[tokio::test]
async fn test_close_of_unknown_auction_on_every_node() {
    let harness = NetworkHarness::new(3).await;

    let report = harness.node(2).close_auction("ghost").await.unwrap();

    assert!(!report.local.success);
    assert_eq!(report.local.message.as_deref(), Some("Auction not found"));
    assert_eq!(report.peers.delivered(), 2);
    for ack in &report.peers.acks {
        let auction::PeerOutcome::Acked(view) = &ack.outcome else {
            panic!("peer {} failed", ack.peer);
        };
        assert!(!view.success);
        assert!(view.price.is_none());
    }
}

#[tokio::test]
async fn test_every_node_is_client_and_server() {
    let harness = NetworkHarness::new(3).await;

    for (index, id) in ["a", "b", "c"].into_iter().enumerate() {
        harness
            .node(index)
            .create_auction(id, format!("Item {id}"), Price::from_atomic(1_000_000))
            .await
            .unwrap();
    }

    for node in 0..harness.num_nodes() {
        assert_eq!(harness.node(node).store().ids(), vec!["a", "b", "c"]);
    }
    // Each node received one create from each of the two others.
    for node in 0..harness.num_nodes() {
        assert_eq!(
            harness
                .network()
                .deliveries_to(&harness.peer_key(node))
                .len(),
            2
        );
    }
}
