//! Node identity: an Ed25519 keypair whose verifying key names the node on
//! the network.

use std::fmt;

use ed25519_dalek::SigningKey;
use serde::{Deserialize, Serialize};

use crate::error::{AuctionError, AuctionResult};

/// Public identity of a peer (Ed25519 verifying key bytes).
///
/// Rendered as lowercase hex on the wire and in logs.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct PeerKey([u8; 32]);

impl PeerKey {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse a hex-encoded 32-byte key.
    pub fn from_hex(s: &str) -> AuctionResult<Self> {
        let bytes = hex::decode(s.trim())
            .map_err(|e| AuctionError::Identity(format!("Invalid peer key hex: {e}")))?;
        let bytes: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
            AuctionError::Identity(format!(
                "Invalid peer key length: expected 32, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(bytes))
    }

    /// First eight hex characters, for compact log lines.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Display for PeerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for PeerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerKey({})", self.short())
    }
}

impl From<PeerKey> for String {
    fn from(key: PeerKey) -> Self {
        key.to_hex()
    }
}

impl TryFrom<String> for PeerKey {
    type Error = AuctionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

/// The keypair a node is known by.
#[derive(Clone)]
pub struct NodeIdentity {
    signing_key: SigningKey,
}

impl NodeIdentity {
    /// Generate a fresh random identity.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut rand::thread_rng()),
        }
    }

    /// Deterministic identity from a 32-byte seed.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(&seed),
        }
    }

    pub fn peer_key(&self) -> PeerKey {
        PeerKey(self.signing_key.verifying_key().to_bytes())
    }
}

impl fmt::Debug for NodeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeIdentity")
            .field("peer_key", &self.peer_key())
            .finish_non_exhaustive()
    }
}
