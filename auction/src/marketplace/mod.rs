pub mod auction;
pub mod price;
pub mod validator;

pub use auction::{Auction, AuctionId, Bid, BidderId};
pub use price::Price;
pub use validator::{validate_bid, BidDecision, RejectReason};
