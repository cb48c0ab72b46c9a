//! Inbound handlers for `createAuction`, `makeBid` and `closeAuction`.

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::messages::{Ack, CloseAck, RpcRequest};
use crate::config::CURRENCY;
use crate::identity::PeerKey;
use crate::marketplace::{Auction, Bid, BidDecision, RejectReason};
use crate::node::AuctionStore;
use crate::traits::RequestHandler;

/// The handler set a node exposes to its peers.
///
/// Every handler answers with an acknowledgement; nothing here fails at the
/// transport level.
#[derive(Clone)]
pub struct RpcHandlers {
    store: AuctionStore,
    local: PeerKey,
}

impl RpcHandlers {
    pub const fn new(store: AuctionStore, local: PeerKey) -> Self {
        Self { store, local }
    }

    /// Store the auction, replacing any previous entry with the same id.
    pub fn handle_create(&self, auction: Auction) -> Ack {
        info!(
            "[{}] Auction {} created for {} starting at {} {}",
            self.local.short(),
            auction.id,
            auction.item,
            auction.starting_price,
            CURRENCY
        );
        if !auction.is_consistent() {
            warn!(
                "[{}] Auction {} arrived with price {} and bidder {:?}",
                self.local.short(),
                auction.id,
                auction.current_price,
                auction.highest_bidder
            );
        }
        if let Some(previous) = self.store.put(auction) {
            debug!(
                "[{}] Auction {} overwrote an existing entry",
                self.local.short(),
                previous.id
            );
        }
        Ack::ok()
    }

    /// Validate the bid against the local replica and apply it if accepted.
    pub fn handle_bid(&self, bid: &Bid) -> Ack {
        match self.store.apply_bid(bid) {
            BidDecision::Accept {
                new_price,
                new_bidder,
            } => {
                info!(
                    "[{}] New bid of {} {} from {} on auction {}",
                    self.local.short(),
                    new_price,
                    CURRENCY,
                    new_bidder,
                    bid.auction_id
                );
                Ack::ok()
            }
            BidDecision::Reject { reason } => {
                debug!(
                    "[{}] Rejected bid of {} from {} on auction {}: {}",
                    self.local.short(),
                    bid.price,
                    bid.bidder,
                    bid.auction_id,
                    reason
                );
                Ack::rejected(reason.message())
            }
        }
    }

    /// Report the local view of the auction. Later bids are still accepted.
    pub fn handle_close(&self, auction_id: &str) -> CloseAck {
        match self.store.mark_closed(auction_id) {
            Some(auction) => {
                info!(
                    "[{}] Auction {} closed. Winner: {}, Price: {} {}",
                    self.local.short(),
                    auction_id,
                    auction.highest_bidder.as_deref().unwrap_or("none"),
                    auction.current_price,
                    CURRENCY
                );
                CloseAck::closed(&auction)
            }
            None => {
                debug!(
                    "[{}] Close for unknown auction {}",
                    self.local.short(),
                    auction_id
                );
                CloseAck::rejected(RejectReason::AuctionNotFound.message())
            }
        }
    }

    /// Apply an already-decoded request and encode its acknowledgement.
    pub fn respond(&self, request: RpcRequest) -> Vec<u8> {
        match request {
            RpcRequest::CreateAuction(auction) => self.handle_create(auction).to_bytes(),
            RpcRequest::MakeBid(bid) => self.handle_bid(&bid).to_bytes(),
            RpcRequest::CloseAuction(id) => self.handle_close(&id).to_bytes(),
        }
    }
}

#[async_trait]
impl RequestHandler for RpcHandlers {
    async fn handle(&self, method: &str, payload: &[u8]) -> Vec<u8> {
        match RpcRequest::decode(method, payload) {
            Ok(request) => self.respond(request),
            Err(e) => {
                warn!(
                    "[{}] Malformed {} request ({} bytes): {}",
                    self.local.short(),
                    method,
                    payload.len(),
                    e
                );
                Ack::rejected(format!("Malformed request: {e}")).to_bytes()
            }
        }
    }
}
