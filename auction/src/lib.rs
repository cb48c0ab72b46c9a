pub mod config;
pub mod error;
pub mod identity;
pub mod marketplace;
pub mod node;
pub mod rpc;
pub mod traits;
pub mod transport;
pub mod util;

#[cfg(any(test, feature = "test-support"))]
pub mod mocks;

pub use config::NodeConfig;
pub use error::{AuctionError, AuctionResult};
pub use identity::{NodeIdentity, PeerKey};
pub use marketplace::{validate_bid, Auction, AuctionId, Bid, BidDecision, BidderId, Price, RejectReason};
pub use node::{AuctionNode, AuctionStore, BidReport, CloseReport, PeerRegistry};
pub use rpc::{
    Ack, BroadcastCoordinator, BroadcastReport, CloseAck, FanOut, PeerAck, PeerOutcome,
    RpcHandlers, RpcMethod, RpcRequest,
};
pub use traits::{RequestHandler, RpcTransport};
pub use transport::{LocalNetwork, LocalTransport, TcpServer, TcpTransport};
