//! Request/response transport abstraction for testable network operations.

use async_trait::async_trait;

use crate::error::AuctionResult;
use crate::identity::PeerKey;
use crate::rpc::RpcMethod;

/// Outbound side of the network: one request, one response.
///
/// This trait lets the broadcast path run against an in-process network or
/// a mock as easily as against real sockets.
#[async_trait]
pub trait RpcTransport: Send + Sync + Clone {
    /// Send `payload` to `peer` as `method` and wait for the response bytes.
    ///
    /// An `Err` means the request did not complete at the transport level
    /// (unreachable, connection dropped). Business-level rejections arrive
    /// as `Ok` acknowledgements.
    async fn request(
        &self,
        peer: &PeerKey,
        method: RpcMethod,
        payload: Vec<u8>,
    ) -> AuctionResult<Vec<u8>>;

    /// Peers currently in the transport's membership view.
    async fn known_peers(&self) -> AuctionResult<Vec<PeerKey>>;
}

/// Inbound side of the network.
///
/// Implementations must always produce a response body; decode failures and
/// unknown methods become structured rejections rather than errors.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn handle(&self, method: &str, payload: &[u8]) -> Vec<u8>;
}
