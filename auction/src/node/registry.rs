//! Known remote peers, in the order they were learned.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::identity::PeerKey;

/// Set of remote peers reachable for RPC.
///
/// Grows as peers are learned from the transport's membership view and never
/// shrinks. The local node's own key is never admitted.
#[derive(Clone)]
pub struct PeerRegistry {
    local: PeerKey,
    peers: Arc<RwLock<Vec<PeerKey>>>,
}

impl PeerRegistry {
    pub fn new(local: PeerKey) -> Self {
        Self {
            local,
            peers: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Add a peer. Returns `true` if it was not already known.
    pub fn add(&self, peer: PeerKey) -> bool {
        if peer == self.local {
            return false;
        }
        let mut peers = self.peers.write();
        if peers.contains(&peer) {
            return false;
        }
        peers.push(peer);
        debug!("Peer {} added to registry ({} known)", peer.short(), peers.len());
        true
    }

    /// Add several peers, returning how many were new.
    pub fn extend<I>(&self, peers: I) -> usize
    where
        I: IntoIterator<Item = PeerKey>,
    {
        peers.into_iter().filter(|peer| self.add(*peer)).count()
    }

    pub fn contains(&self, peer: &PeerKey) -> bool {
        self.peers.read().contains(peer)
    }

    /// Peers in insertion order, as of now.
    pub fn snapshot(&self) -> Vec<PeerKey> {
        self.peers.read().clone()
    }

    pub fn len(&self) -> usize {
        self.peers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.read().is_empty()
    }

    pub const fn local(&self) -> &PeerKey {
        &self.local
    }
}
