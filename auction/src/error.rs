use crate::identity::PeerKey;

/// Domain-specific error types for the auction node.
#[derive(Debug, thiserror::Error)]
pub enum AuctionError {
    #[error("Serialization failed: {0}")]
    Serialization(String),

    #[error("Transport operation failed: {0}")]
    Transport(String),

    #[error("Peer {peer} unreachable: {reason}")]
    PeerUnreachable { peer: PeerKey, reason: String },

    #[error("Request to peer {peer} timed out after {millis} ms")]
    Timeout { peer: PeerKey, millis: u64 },

    #[error("Broadcast of {method} aborted at peer {peer} after {delivered} acknowledgement(s)")]
    BroadcastAborted {
        method: String,
        peer: PeerKey,
        delivered: usize,
        source: Box<AuctionError>,
    },

    #[error("Invalid price: {0}")]
    InvalidPrice(String),

    #[error("Invalid identity: {0}")]
    Identity(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AuctionError {
    /// The peer this error is attributed to, if it came from talking to one.
    pub fn peer(&self) -> Option<&PeerKey> {
        match self {
            Self::PeerUnreachable { peer, .. }
            | Self::Timeout { peer, .. }
            | Self::BroadcastAborted { peer, .. } => Some(peer),
            _ => None,
        }
    }
}

/// Convenience type alias.
pub type AuctionResult<T> = Result<T, AuctionError>;
