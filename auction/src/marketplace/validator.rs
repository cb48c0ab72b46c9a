//! Pure bid acceptance rule.

use std::fmt;

use serde::Serialize;

use super::{Auction, Bid, BidderId, Price};

/// Why a bid was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// The auction id is unknown at this node.
    AuctionNotFound,
    /// The bid does not exceed the current price.
    BidTooLow,
}

impl RejectReason {
    /// Message carried in a rejected acknowledgement.
    pub const fn message(self) -> &'static str {
        match self {
            Self::AuctionNotFound => "Auction not found",
            Self::BidTooLow => "Bid too low",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Outcome of [`validate_bid`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum BidDecision {
    Accept { new_price: Price, new_bidder: BidderId },
    Reject { reason: RejectReason },
}

impl BidDecision {
    pub const fn is_accepted(&self) -> bool {
        matches!(self, Self::Accept { .. })
    }

    pub const fn reject_reason(&self) -> Option<RejectReason> {
        match self {
            Self::Accept { .. } => None,
            Self::Reject { reason } => Some(*reason),
        }
    }
}

/// Decide whether `bid` may update `auction`.
///
/// The comparison is strictly greater-than: a bid equal to the current price
/// loses to whoever is already recorded. Whether the auction was closed is
/// not considered.
pub fn validate_bid(auction: Option<&Auction>, bid: &Bid) -> BidDecision {
    let Some(auction) = auction else {
        return BidDecision::Reject {
            reason: RejectReason::AuctionNotFound,
        };
    };

    if bid.price <= auction.current_price {
        return BidDecision::Reject {
            reason: RejectReason::BidTooLow,
        };
    }

    BidDecision::Accept {
        new_price: bid.price,
        new_bidder: bid.bidder.clone(),
    }
}
