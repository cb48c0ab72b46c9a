//! Replicas apply requests in arrival order and may disagree.

use crate::common::{price, NetworkHarness};

#[tokio::test]
async fn test_distinct_bids_converge_in_any_order() {
    let harness = NetworkHarness::new(2).await;
    harness.seed_auction("auction1", "Pic#1", "75").await;

    // Node 0 sees the low bid first, node 1 the high one.
    assert!(harness.deliver_bid(0, "auction1", "76", "Client#A").await.success);
    assert!(harness.deliver_bid(0, "auction1", "80", "Client#B").await.success);

    assert!(harness.deliver_bid(1, "auction1", "80", "Client#B").await.success);
    let late = harness.deliver_bid(1, "auction1", "76", "Client#A").await;
    assert_eq!(late.message.as_deref(), Some("Bid too low"));

    let views = harness.views("auction1");
    assert_eq!(views[0], views[1]);
    assert_eq!(
        views[0].as_ref().unwrap().highest_bidder.as_deref(),
        Some("Client#B")
    );
}

#[tokio::test]
async fn test_tied_bids_leave_replicas_divergent() {
    let harness = NetworkHarness::new(2).await;
    harness.seed_auction("auction1", "Pic#1", "75").await;

    // X receives B, C, A.
    assert!(harness.deliver_bid(0, "auction1", "80", "Client#B").await.success);
    assert!(!harness.deliver_bid(0, "auction1", "80", "Client#C").await.success);
    assert!(!harness.deliver_bid(0, "auction1", "76", "Client#A").await.success);

    // Y receives C, B, A.
    assert!(harness.deliver_bid(1, "auction1", "80", "Client#C").await.success);
    assert!(!harness.deliver_bid(1, "auction1", "80", "Client#B").await.success);
    assert!(!harness.deliver_bid(1, "auction1", "76", "Client#A").await.success);

    let x = harness.view(0, "auction1").unwrap();
    let y = harness.view(1, "auction1").unwrap();
    assert_eq!(x.current_price, price("80"));
    assert_eq!(y.current_price, price("80"));
    assert_eq!(x.highest_bidder.as_deref(), Some("Client#B"));
    assert_eq!(y.highest_bidder.as_deref(), Some("Client#C"));

    // Closing reports whatever each node holds.
    assert_eq!(
        harness.deliver_close(0, "auction1").await.winner.as_deref(),
        Some("Client#B")
    );
    assert_eq!(
        harness.deliver_close(1, "auction1").await.winner.as_deref(),
        Some("Client#C")
    );
}

#[tokio::test]
async fn test_bid_before_create_is_lost() {
    let harness = NetworkHarness::new(2).await;

    // The bid overtakes the create on node 1.
    let early = harness.deliver_bid(1, "auction1", "80", "Client#B").await;
    assert_eq!(early.message.as_deref(), Some("Auction not found"));
    harness.seed_auction("auction1", "Pic#1", "75").await;
    assert!(harness.deliver_bid(0, "auction1", "80", "Client#B").await.success);

    assert_eq!(
        harness.view(0, "auction1").unwrap().highest_bidder.as_deref(),
        Some("Client#B")
    );
    assert!(harness.view(1, "auction1").unwrap().highest_bidder.is_none());
}

#[tokio::test]
async fn test_late_create_resets_replica() {
    let harness = NetworkHarness::new(2).await;
    harness.seed_auction("auction1", "Pic#1", "75").await;
    harness.deliver_bid(1, "auction1", "80", "Client#B").await;

    // A duplicate create arriving after the bid wipes it on that node only.
    harness.deliver_create(1, "auction1", "Pic#1", "75").await;

    assert!(harness.view(1, "auction1").unwrap().highest_bidder.is_none());
    assert!(harness.view(0, "auction1").unwrap().highest_bidder.is_none());
}
