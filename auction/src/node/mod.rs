//! A single auction node: its replica, its peer view and the caller-facing
//! actions that mutate the replica and then tell everyone else.

pub mod registry;
pub mod store;

pub use registry::PeerRegistry;
pub use store::AuctionStore;

use serde::Serialize;
use tracing::{debug, info};

use crate::config::{NodeConfig, CURRENCY};
use crate::error::AuctionResult;
use crate::identity::{NodeIdentity, PeerKey};
use crate::marketplace::{Auction, Bid, BidDecision, Price};
use crate::rpc::{
    Ack, BroadcastCoordinator, BroadcastReport, CloseAck, FanOut, RpcHandlers, RpcRequest,
};
use crate::traits::{RequestHandler, RpcTransport};

/// Outcome of [`AuctionNode::make_bid`]: the local decision plus what each
/// peer answered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BidReport {
    pub local: BidDecision,
    pub peers: BroadcastReport<Ack>,
}

/// Outcome of [`AuctionNode::close_auction`]: this node's own view plus each
/// peer's view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CloseReport {
    pub local: CloseAck,
    pub peers: BroadcastReport<CloseAck>,
}

/// One participant in the auction network.
///
/// Every action is applied to the local store first and then broadcast. A
/// failed broadcast never rolls the local change back.
pub struct AuctionNode<T: RpcTransport> {
    identity: NodeIdentity,
    store: AuctionStore,
    registry: PeerRegistry,
    handlers: RpcHandlers,
    broadcaster: BroadcastCoordinator<T>,
}

impl<T: RpcTransport> AuctionNode<T> {
    pub fn new(identity: NodeIdentity, transport: T, fan_out: FanOut) -> Self {
        let local = identity.peer_key();
        let store = AuctionStore::new();
        let registry = PeerRegistry::new(local);
        let handlers = RpcHandlers::new(store.clone(), local);
        let broadcaster = BroadcastCoordinator::new(transport, registry.clone(), fan_out);
        Self {
            identity,
            store,
            registry,
            handlers,
            broadcaster,
        }
    }

    /// Build a node using the fan-out policy and request timeout from `config`.
    pub fn with_config(identity: NodeIdentity, transport: T, config: &NodeConfig) -> Self {
        let mut node = Self::new(identity, transport, config.fan_out);
        node.broadcaster = node
            .broadcaster
            .with_request_timeout(config.request_timeout());
        node
    }

    pub fn peer_key(&self) -> PeerKey {
        self.identity.peer_key()
    }

    pub const fn store(&self) -> &AuctionStore {
        &self.store
    }

    pub const fn registry(&self) -> &PeerRegistry {
        &self.registry
    }

    /// The inbound side of this node, for registering with a transport.
    pub const fn handlers(&self) -> &RpcHandlers {
        &self.handlers
    }

    pub const fn transport(&self) -> &T {
        self.broadcaster.transport()
    }

    pub fn add_peer(&self, peer: PeerKey) -> bool {
        self.registry.add(peer)
    }

    /// Pull the transport's membership view into the registry.
    pub async fn refresh_peers(&self) -> AuctionResult<usize> {
        let known = self.broadcaster.transport().known_peers().await?;
        let added = self.registry.extend(known);
        if added > 0 {
            debug!(
                "[{}] Learned {} new peer(s), {} known",
                self.peer_key().short(),
                added,
                self.registry.len()
            );
        }
        Ok(added)
    }

    /// Create an auction locally and announce it to every known peer.
    pub async fn create_auction(
        &self,
        id: impl Into<String>,
        item: impl Into<String>,
        starting_price: Price,
    ) -> AuctionResult<BroadcastReport<Ack>> {
        let auction = Auction::new(id, item, starting_price);
        self.handlers.handle_create(auction.clone());
        info!(
            "Auction {} for {} created at {} {}",
            auction.id, auction.item, auction.starting_price, CURRENCY
        );
        self.broadcaster
            .broadcast(&RpcRequest::CreateAuction(auction))
            .await
    }

    /// Apply a bid locally and forward it to every known peer.
    ///
    /// The bid is forwarded even when the local replica rejects it; each
    /// peer decides against its own view.
    pub async fn make_bid(
        &self,
        auction_id: impl Into<String>,
        price: Price,
        bidder: impl Into<String>,
    ) -> AuctionResult<BidReport> {
        let bid = Bid::new(auction_id, price, bidder);
        let local = self.store.apply_bid(&bid);
        match &local {
            BidDecision::Accept { .. } => info!(
                "{} placed a bid of {} {} on auction {}",
                bid.bidder, bid.price, CURRENCY, bid.auction_id
            ),
            BidDecision::Reject { reason } => info!(
                "{} placed a bid of {} {} on auction {} (rejected locally: {})",
                bid.bidder, bid.price, CURRENCY, bid.auction_id, reason
            ),
        }
        let peers = self.broadcaster.broadcast(&RpcRequest::MakeBid(bid)).await?;
        Ok(BidReport { local, peers })
    }

    /// Snapshot the local view of an auction and ask every peer for theirs.
    pub async fn close_auction(&self, auction_id: impl Into<String>) -> AuctionResult<CloseReport> {
        let auction_id = auction_id.into();
        let local = self.handlers.handle_close(&auction_id);
        info!("Auction {} closed", auction_id);
        let peers = self
            .broadcaster
            .broadcast(&RpcRequest::CloseAuction(auction_id))
            .await?;
        Ok(CloseReport { local, peers })
    }

    /// Serve one inbound request addressed to this node.
    pub async fn handle_request(&self, method: &str, payload: &[u8]) -> Vec<u8> {
        self.handlers.handle(method, payload).await
    }
}
