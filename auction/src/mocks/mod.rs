//! Mock implementations for testing.
//!
//! These stand in for the network so the node and broadcast logic can be
//! unit tested without sockets.

pub mod transport;

pub use transport::{MockTransport, RecordedRequest};

use crate::identity::{NodeIdentity, PeerKey};

/// Deterministic identity for tests: the same `id` always yields the same key.
pub fn make_test_identity(id: u8) -> NodeIdentity {
    NodeIdentity::from_seed([id; 32])
}

/// Public key of [`make_test_identity`] for the same `id`.
pub fn make_test_peer_key(id: u8) -> PeerKey {
    make_test_identity(id).peer_key()
}
