//! Unreachable peers and the two fan-out policies.

use auction::{AuctionError, FanOut, PeerOutcome};

use crate::common::{price, NetworkHarness};

#[tokio::test]
async fn test_sequential_broadcast_stops_at_unreachable_peer() {
    let harness = NetworkHarness::new(4).await;
    assert_eq!(
        harness.node(0).registry().snapshot(),
        vec![harness.peer_key(1), harness.peer_key(2), harness.peer_key(3)]
    );
    harness.network().set_unreachable(harness.peer_key(2), true);

    let err = harness
        .node(0)
        .create_auction("auction1", "Pic#1", price("75"))
        .await
        .unwrap_err();

    match &err {
        AuctionError::BroadcastAborted {
            peer, delivered, ..
        } => {
            assert_eq!(*peer, harness.peer_key(2));
            assert_eq!(*delivered, 1);
        }
        other => panic!("unexpected error: {other}"),
    }
    // Local mutation is kept; only the peer before the failure has it.
    assert!(harness.view(0, "auction1").is_some());
    assert!(harness.view(1, "auction1").is_some());
    assert!(harness.view(2, "auction1").is_none());
    assert!(harness.view(3, "auction1").is_none());
}

#[tokio::test]
async fn test_sequential_bid_stops_at_unreachable_peer() {
    let harness = NetworkHarness::new(4).await;
    harness
        .node(0)
        .create_auction("auction1", "Pic#1", price("75"))
        .await
        .unwrap();
    harness.network().set_unreachable(harness.peer_key(2), true);

    let err = harness
        .node(0)
        .make_bid("auction1", price("80"), "Client#1")
        .await
        .unwrap_err();

    match &err {
        AuctionError::BroadcastAborted {
            peer, delivered, ..
        } => {
            assert_eq!(*peer, harness.peer_key(2));
            assert_eq!(*delivered, 1);
        }
        other => panic!("unexpected error: {other}"),
    }
    let price_at = |i| harness.view(i, "auction1").unwrap().current_price;
    assert_eq!(price_at(0), price("80"));
    assert_eq!(price_at(1), price("80"));
    assert_eq!(price_at(2), price("75"));
    assert_eq!(price_at(3), price("75"));
    assert_eq!(
        harness.view(1, "auction1").unwrap().highest_bidder.as_deref(),
        Some("Client#1")
    );
}

#[tokio::test]
async fn test_concurrent_broadcast_reaches_remaining_peers() {
    let harness = NetworkHarness::with_fan_out(4, FanOut::Concurrent).await;
    harness.network().set_unreachable(harness.peer_key(2), true);

    let report = harness
        .node(0)
        .create_auction("auction1", "Pic#1", price("75"))
        .await
        .unwrap();

    assert_eq!(report.attempted(), 3);
    assert_eq!(report.delivered(), 2);
    assert_eq!(report.failed_peers(), vec![harness.peer_key(2)]);
    let failure = report
        .acks
        .iter()
        .find(|a| a.peer == harness.peer_key(2))
        .unwrap();
    assert!(matches!(&failure.outcome, PeerOutcome::Failed(reason) if reason.contains("unreachable")));

    assert!(harness.view(1, "auction1").is_some());
    assert!(harness.view(2, "auction1").is_none());
    assert!(harness.view(3, "auction1").is_some());
}

#[tokio::test]
async fn test_recovered_peer_misses_earlier_updates() {
    let harness = NetworkHarness::with_fan_out(3, FanOut::Concurrent).await;
    harness
        .node(0)
        .create_auction("auction1", "Pic#1", price("75"))
        .await
        .unwrap();

    harness.network().set_unreachable(harness.peer_key(2), true);
    let report = harness
        .node(0)
        .make_bid("auction1", price("80"), "Client#1")
        .await
        .unwrap();
    assert_eq!(report.peers.failed_peers(), vec![harness.peer_key(2)]);
    harness.network().set_unreachable(harness.peer_key(2), false);

    // No retry: node 2 keeps its stale view.
    assert_eq!(
        harness.view(2, "auction1").unwrap().current_price,
        price("75")
    );
    assert_eq!(
        harness.view(1, "auction1").unwrap().current_price,
        price("80")
    );

    let close = harness.node(0).close_auction("auction1").await.unwrap();
    let stale = close.peers.ack_for(&harness.peer_key(2)).unwrap();
    assert!(stale.winner.is_none());
    assert_eq!(stale.price, Some(price("75")));
}

#[tokio::test]
async fn test_sequential_delivery_order_follows_registry() {
    let harness = NetworkHarness::new(4).await;

    harness
        .node(3)
        .create_auction("auction1", "Pic#1", price("75"))
        .await
        .unwrap();

    let order: Vec<_> = harness
        .network()
        .deliveries()
        .into_iter()
        .map(|d| d.to)
        .collect();
    assert_eq!(
        order,
        vec![harness.peer_key(0), harness.peer_key(1), harness.peer_key(2)]
    );
}
