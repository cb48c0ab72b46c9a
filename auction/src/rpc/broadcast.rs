//! Fan-out of a locally applied action to every known peer.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::messages::{RpcMethod, RpcRequest};
use crate::config::MAX_PAYLOAD_SIZE;
use crate::error::{AuctionError, AuctionResult};
use crate::identity::PeerKey;
use crate::node::PeerRegistry;
use crate::traits::RpcTransport;
use crate::util::json_from_limited_slice;

/// How a broadcast reaches the peer set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FanOut {
    /// One peer at a time, in registry order. The first failure aborts the
    /// broadcast and later peers are never contacted.
    #[default]
    Sequential,
    /// All peers at once; every peer's outcome is collected.
    Concurrent,
}

impl fmt::Display for FanOut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sequential => f.write_str("sequential"),
            Self::Concurrent => f.write_str("concurrent"),
        }
    }
}

impl FromStr for FanOut {
    type Err = AuctionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sequential" => Ok(Self::Sequential),
            "concurrent" => Ok(Self::Concurrent),
            other => Err(AuctionError::Config(format!(
                "Unknown fan-out policy '{other}' (expected sequential or concurrent)"
            ))),
        }
    }
}

/// What happened when one peer was contacted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum PeerOutcome<R> {
    Acked(R),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeerAck<R> {
    pub peer: PeerKey,
    pub outcome: PeerOutcome<R>,
}

/// Per-peer acknowledgements for one broadcast, in contact order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BroadcastReport<R> {
    pub method: RpcMethod,
    pub acks: Vec<PeerAck<R>>,
}

impl<R> BroadcastReport<R> {
    pub const fn empty(method: RpcMethod) -> Self {
        Self {
            method,
            acks: Vec::new(),
        }
    }

    /// Number of peers contacted.
    pub fn attempted(&self) -> usize {
        self.acks.len()
    }

    /// Number of peers that returned an acknowledgement.
    pub fn delivered(&self) -> usize {
        self.acks
            .iter()
            .filter(|a| matches!(a.outcome, PeerOutcome::Acked(_)))
            .count()
    }

    /// The acknowledgement a given peer returned, if any.
    pub fn ack_for(&self, peer: &PeerKey) -> Option<&R> {
        self.acks.iter().find(|a| &a.peer == peer).and_then(|a| match &a.outcome {
            PeerOutcome::Acked(ack) => Some(ack),
            PeerOutcome::Failed(_) => None,
        })
    }

    /// Peers whose request failed at the transport level.
    pub fn failed_peers(&self) -> Vec<PeerKey> {
        self.acks
            .iter()
            .filter(|a| matches!(a.outcome, PeerOutcome::Failed(_)))
            .map(|a| a.peer)
            .collect()
    }
}

/// Sends an action to every peer in the registry.
///
/// There is no quorum: a completed broadcast means delivery was attempted to
/// every peer known when it started, nothing more. Failed peers are not
/// retried and the caller's local mutation is never rolled back.
#[derive(Clone)]
pub struct BroadcastCoordinator<T: RpcTransport> {
    transport: T,
    registry: PeerRegistry,
    fan_out: FanOut,
    request_timeout: Option<Duration>,
}

impl<T: RpcTransport> BroadcastCoordinator<T> {
    pub const fn new(transport: T, registry: PeerRegistry, fan_out: FanOut) -> Self {
        Self {
            transport,
            registry,
            fan_out,
            request_timeout: None,
        }
    }

    /// Bound every peer request. `None` waits indefinitely.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub const fn fan_out(&self) -> FanOut {
        self.fan_out
    }

    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Serialize `request` once and send it to every registry peer.
    ///
    /// With [`FanOut::Sequential`] the first failing peer ends the broadcast
    /// with [`AuctionError::BroadcastAborted`]. With [`FanOut::Concurrent`]
    /// failures are recorded in the report and `Ok` is returned.
    pub async fn broadcast<R: DeserializeOwned>(
        &self,
        request: &RpcRequest,
    ) -> AuctionResult<BroadcastReport<R>> {
        let method = request.method();
        let payload = request.encode()?;
        let peers = self.registry.snapshot();

        if peers.is_empty() {
            debug!("No peers known, {} stays local", method);
            return Ok(BroadcastReport::empty(method));
        }

        debug!(
            "Broadcasting {} ({} bytes) to {} peers ({})",
            method,
            payload.len(),
            peers.len(),
            self.fan_out
        );

        let report = match self.fan_out {
            FanOut::Sequential => self.broadcast_sequential(method, &payload, &peers).await?,
            FanOut::Concurrent => self.broadcast_concurrent(method, &payload, &peers).await,
        };

        info!(
            "Broadcast of {} completed: {} of {} peers acknowledged",
            method,
            report.delivered(),
            report.attempted()
        );
        Ok(report)
    }

    async fn broadcast_sequential<R: DeserializeOwned>(
        &self,
        method: RpcMethod,
        payload: &[u8],
        peers: &[PeerKey],
    ) -> AuctionResult<BroadcastReport<R>> {
        let mut report = BroadcastReport::empty(method);
        for peer in peers {
            match self.call_peer(peer, method, payload).await {
                Ok(ack) => report.acks.push(PeerAck {
                    peer: *peer,
                    outcome: PeerOutcome::Acked(ack),
                }),
                Err(e) => {
                    warn!(
                        "Broadcast of {} aborted at peer {} ({} of {} acknowledged): {}",
                        method,
                        peer.short(),
                        report.delivered(),
                        peers.len(),
                        e
                    );
                    return Err(AuctionError::BroadcastAborted {
                        method: method.to_string(),
                        peer: *peer,
                        delivered: report.delivered(),
                        source: Box::new(e),
                    });
                }
            }
        }
        Ok(report)
    }

    async fn broadcast_concurrent<R: DeserializeOwned>(
        &self,
        method: RpcMethod,
        payload: &[u8],
        peers: &[PeerKey],
    ) -> BroadcastReport<R> {
        let results = futures::future::join_all(
            peers
                .iter()
                .map(|peer| self.call_peer::<R>(peer, method, payload)),
        )
        .await;

        let acks = peers
            .iter()
            .zip(results)
            .map(|(peer, result)| PeerAck {
                peer: *peer,
                outcome: match result {
                    Ok(ack) => PeerOutcome::Acked(ack),
                    Err(e) => {
                        warn!("Peer {} failed {}: {}", peer.short(), method, e);
                        PeerOutcome::Failed(e.to_string())
                    }
                },
            })
            .collect();

        BroadcastReport { method, acks }
    }

    async fn call_peer<R: DeserializeOwned>(
        &self,
        peer: &PeerKey,
        method: RpcMethod,
        payload: &[u8],
    ) -> AuctionResult<R> {
        let request = self.transport.request(peer, method, payload.to_vec());
        let response = match self.request_timeout {
            Some(limit) => tokio::time::timeout(limit, request).await.map_err(|_| {
                AuctionError::Timeout {
                    peer: *peer,
                    millis: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                }
            })??,
            None => request.await?,
        };
        json_from_limited_slice(&response, MAX_PAYLOAD_SIZE)
    }
}
