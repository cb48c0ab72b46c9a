//! In-process network: several nodes sharing one runtime.
//!
//! Requests are handed straight to the target's [`RequestHandler`]. Peers
//! can be marked unreachable and every delivery is logged in order.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::error::{AuctionError, AuctionResult};
use crate::identity::{NodeIdentity, PeerKey};
use crate::node::AuctionNode;
use crate::rpc::{FanOut, RpcMethod};
use crate::traits::{RequestHandler, RpcTransport};

/// One request that reached its target's handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub from: PeerKey,
    pub to: PeerKey,
    pub method: RpcMethod,
    pub sequence_number: u64,
}

#[derive(Default)]
struct NetworkInner {
    endpoints: RwLock<HashMap<PeerKey, Arc<dyn RequestHandler>>>,
    /// Join order.
    members: RwLock<Vec<PeerKey>>,
    unreachable: RwLock<HashSet<PeerKey>>,
    deliveries: Mutex<Vec<Delivery>>,
    delivery_counter: AtomicU64,
}

/// Shared in-process network. Cloning gives another handle to the same
/// network.
#[derive(Clone, Default)]
pub struct LocalNetwork {
    inner: Arc<NetworkInner>,
}

impl LocalNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `handler` as the endpoint for `peer`.
    pub fn register(&self, peer: PeerKey, handler: Arc<dyn RequestHandler>) {
        let replaced = self.inner.endpoints.write().insert(peer, handler).is_some();
        if !replaced {
            self.inner.members.write().push(peer);
        }
        debug!("Peer {} joined the local network", peer.short());
    }

    /// A transport that sends on behalf of `local`.
    pub fn transport_for(&self, local: PeerKey) -> LocalTransport {
        LocalTransport {
            network: self.clone(),
            local,
        }
    }

    /// Create a node, register its handlers, and return it.
    ///
    /// The node's registry starts empty; call
    /// [`AuctionNode::refresh_peers`] once every node has joined.
    pub fn add_node(&self, identity: NodeIdentity, fan_out: FanOut) -> AuctionNode<LocalTransport> {
        let local = identity.peer_key();
        let node = AuctionNode::new(identity, self.transport_for(local), fan_out);
        self.register(local, Arc::new(node.handlers().clone()));
        node
    }

    pub fn members(&self) -> Vec<PeerKey> {
        self.inner.members.read().clone()
    }

    /// Make requests to `peer` fail (or succeed again).
    pub fn set_unreachable(&self, peer: PeerKey, unreachable: bool) {
        let mut set = self.inner.unreachable.write();
        if unreachable {
            set.insert(peer);
        } else {
            set.remove(&peer);
        }
    }

    /// Every delivery so far, in the order handlers were reached.
    pub fn deliveries(&self) -> Vec<Delivery> {
        self.inner.deliveries.lock().clone()
    }

    /// Deliveries that reached `peer`.
    pub fn deliveries_to(&self, peer: &PeerKey) -> Vec<Delivery> {
        self.inner
            .deliveries
            .lock()
            .iter()
            .filter(|d| &d.to == peer)
            .cloned()
            .collect()
    }

    fn endpoint(&self, peer: &PeerKey) -> AuctionResult<Arc<dyn RequestHandler>> {
        if self.inner.unreachable.read().contains(peer) {
            return Err(AuctionError::PeerUnreachable {
                peer: *peer,
                reason: "marked unreachable".into(),
            });
        }
        self.inner
            .endpoints
            .read()
            .get(peer)
            .cloned()
            .ok_or_else(|| AuctionError::PeerUnreachable {
                peer: *peer,
                reason: "not on this network".into(),
            })
    }

    fn record(&self, from: PeerKey, to: PeerKey, method: RpcMethod) {
        let sequence_number = self.inner.delivery_counter.fetch_add(1, Ordering::SeqCst);
        self.inner.deliveries.lock().push(Delivery {
            from,
            to,
            method,
            sequence_number,
        });
    }
}

/// [`RpcTransport`] over a [`LocalNetwork`].
#[derive(Clone)]
pub struct LocalTransport {
    network: LocalNetwork,
    local: PeerKey,
}

impl LocalTransport {
    pub const fn network(&self) -> &LocalNetwork {
        &self.network
    }
}

#[async_trait]
impl RpcTransport for LocalTransport {
    async fn request(
        &self,
        peer: &PeerKey,
        method: RpcMethod,
        payload: Vec<u8>,
    ) -> AuctionResult<Vec<u8>> {
        let handler = match self.network.endpoint(peer) {
            Ok(handler) => handler,
            Err(e) => {
                warn!(
                    "[{}] {} to {} not delivered: {}",
                    self.local.short(),
                    method,
                    peer.short(),
                    e
                );
                return Err(e);
            }
        };
        self.network.record(self.local, *peer, method);
        // Give other tasks a chance to interleave, as a real network would.
        tokio::task::yield_now().await;
        Ok(handler.handle(method.as_str(), &payload).await)
    }

    async fn known_peers(&self) -> AuctionResult<Vec<PeerKey>> {
        Ok(self
            .network
            .members()
            .into_iter()
            .filter(|peer| *peer != self.local)
            .collect())
    }
}
