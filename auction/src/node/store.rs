use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::marketplace::{validate_bid, Auction, Bid, BidDecision};

#[derive(Default)]
struct StoreInner {
    auctions: HashMap<String, Auction>,
    /// Ids this node has seen a close for. Informational only.
    closed: HashSet<String>,
}

/// One node's auction replica.
///
/// Cloning shares the underlying map. Every method takes the lock for its own
/// duration only, so nothing here is held across an `.await`.
#[derive(Clone, Default)]
pub struct AuctionStore {
    inner: Arc<RwLock<StoreInner>>,
}

impl AuctionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite unconditionally. Returns the replaced entry, if any.
    ///
    /// Re-creating an id also clears any close observation for it.
    pub fn put(&self, auction: Auction) -> Option<Auction> {
        let mut inner = self.inner.write();
        inner.closed.remove(&auction.id);
        inner.auctions.insert(auction.id.clone(), auction)
    }

    pub fn get(&self, id: &str) -> Option<Auction> {
        self.inner.read().auctions.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.inner.read().auctions.contains_key(id)
    }

    /// Validate `bid` against the stored auction and apply it if accepted.
    ///
    /// Lookup, validation and mutation happen under one write lock.
    pub fn apply_bid(&self, bid: &Bid) -> BidDecision {
        let mut inner = self.inner.write();
        let decision = validate_bid(inner.auctions.get(&bid.auction_id), bid);
        if let BidDecision::Accept {
            new_price,
            new_bidder,
        } = &decision
        {
            if let Some(auction) = inner.auctions.get_mut(&bid.auction_id) {
                auction.record_bid(*new_price, new_bidder.clone());
            }
        }
        decision
    }

    /// Record that a close was observed and return the auction as it stands.
    pub fn mark_closed(&self, id: &str) -> Option<Auction> {
        let mut inner = self.inner.write();
        let auction = inner.auctions.get(id).cloned()?;
        inner.closed.insert(id.to_string());
        Some(auction)
    }

    pub fn is_closed(&self, id: &str) -> bool {
        self.inner.read().closed.contains(id)
    }

    pub fn len(&self) -> usize {
        self.inner.read().auctions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().auctions.is_empty()
    }

    /// All auction ids, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.inner.read().auctions.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Copy of every auction, sorted by id.
    pub fn snapshot(&self) -> Vec<Auction> {
        let mut auctions: Vec<Auction> = self.inner.read().auctions.values().cloned().collect();
        auctions.sort_by(|a, b| a.id.cmp(&b.id));
        auctions
    }
}
