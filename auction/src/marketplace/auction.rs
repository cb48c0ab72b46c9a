use serde::{Deserialize, Serialize};

use super::Price;

/// Caller-chosen auction identifier.
pub type AuctionId = String;

/// Caller-supplied bidder identifier. Not authenticated.
pub type BidderId = String;

/// One node's view of an auction.
///
/// The field names match the JSON payload of the `createAuction` RPC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Auction {
    pub id: AuctionId,
    /// Descriptive label, fixed at creation.
    pub item: String,
    /// Fixed at creation.
    pub starting_price: Price,
    /// Highest accepted price seen by this node, or the starting price.
    pub current_price: Price,
    /// `None` until a bid is accepted.
    pub highest_bidder: Option<BidderId>,
}

impl Auction {
    /// A fresh auction with no bids.
    pub fn new(id: impl Into<AuctionId>, item: impl Into<String>, starting_price: Price) -> Self {
        Self {
            id: id.into(),
            item: item.into(),
            starting_price,
            current_price: starting_price,
            highest_bidder: None,
        }
    }

    pub const fn has_bids(&self) -> bool {
        self.highest_bidder.is_some()
    }

    /// Whether `highest_bidder` is set exactly when the price has moved.
    pub const fn is_consistent(&self) -> bool {
        self.highest_bidder.is_some() == (self.current_price.atomic() > self.starting_price.atomic())
    }

    pub(crate) fn record_bid(&mut self, price: Price, bidder: BidderId) {
        self.current_price = price;
        self.highest_bidder = Some(bidder);
    }
}

/// A bid on an auction. Transient: only its effect on the auction is kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bid {
    pub auction_id: AuctionId,
    pub price: Price,
    pub bidder: BidderId,
}

impl Bid {
    pub fn new(auction_id: impl Into<AuctionId>, price: Price, bidder: impl Into<BidderId>) -> Self {
        Self {
            auction_id: auction_id.into(),
            price,
            bidder: bidder.into(),
        }
    }
}
