//! Mock RPC transport for testing.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{AuctionError, AuctionResult};
use crate::identity::PeerKey;
use crate::rpc::RpcMethod;
use crate::traits::RpcTransport;

/// A recorded request for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub peer: PeerKey,
    pub method: RpcMethod,
    pub payload: Vec<u8>,
    pub sequence_number: u64,
}

const DEFAULT_RESPONSE: &[u8] = br#"{"success":true}"#;

/// Mock transport that records requests and answers from canned responses.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    /// Requests that reached a peer, in send order.
    requests: Arc<RwLock<Vec<RecordedRequest>>>,
    /// Simulated membership view.
    peers: Arc<RwLock<Vec<PeerKey>>>,
    /// Peers whose requests fail immediately.
    failing: Arc<RwLock<HashSet<PeerKey>>>,
    /// Peers whose requests never complete.
    hanging: Arc<RwLock<HashSet<PeerKey>>>,
    /// Response body per method; `{"success":true}` when unset.
    responses: Arc<RwLock<HashMap<RpcMethod, Vec<u8>>>>,
    request_counter: Arc<AtomicU64>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a peer to the simulated membership view.
    pub async fn add_peer(&self, peer: PeerKey) {
        self.peers.write().await.push(peer);
    }

    /// Make every request to `peer` fail as unreachable.
    pub async fn set_failing_peer(&self, peer: PeerKey) {
        self.failing.write().await.insert(peer);
    }

    /// Make every request to `peer` wait forever.
    pub async fn set_hanging_peer(&self, peer: PeerKey) {
        self.hanging.write().await.insert(peer);
    }

    /// Answer every `method` request with `body`.
    pub async fn set_response(&self, method: RpcMethod, body: Vec<u8>) {
        self.responses.write().await.insert(method, body);
    }

    /// Get all recorded requests.
    pub async fn get_requests(&self) -> Vec<RecordedRequest> {
        self.requests.read().await.clone()
    }

    pub async fn request_count(&self) -> usize {
        self.requests.read().await.len()
    }

    pub async fn clear_requests(&self) {
        self.requests.write().await.clear();
    }
}

#[async_trait]
impl RpcTransport for MockTransport {
    async fn request(
        &self,
        peer: &PeerKey,
        method: RpcMethod,
        payload: Vec<u8>,
    ) -> AuctionResult<Vec<u8>> {
        if self.failing.read().await.contains(peer) {
            return Err(AuctionError::PeerUnreachable {
                peer: *peer,
                reason: "simulated failure".into(),
            });
        }
        if self.hanging.read().await.contains(peer) {
            std::future::pending::<()>().await;
        }

        let sequence_number = self.request_counter.fetch_add(1, Ordering::SeqCst);
        self.requests.write().await.push(RecordedRequest {
            peer: *peer,
            method,
            payload,
            sequence_number,
        });

        Ok(self
            .responses
            .read()
            .await
            .get(&method)
            .cloned()
            .unwrap_or_else(|| DEFAULT_RESPONSE.to_vec()))
    }

    async fn known_peers(&self) -> AuctionResult<Vec<PeerKey>> {
        Ok(self.peers.read().await.clone())
    }
}
