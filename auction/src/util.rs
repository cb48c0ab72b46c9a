//! Utility functions shared across the auction crate.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{AuctionError, AuctionResult};

/// Deserialize JSON data with a size limit to prevent oversized payloads.
pub fn json_from_limited_slice<T: DeserializeOwned>(
    data: &[u8],
    max_bytes: usize,
) -> AuctionResult<T> {
    if data.len() > max_bytes {
        return Err(AuctionError::Validation(format!(
            "JSON payload too large: {} bytes (max {})",
            data.len(),
            max_bytes
        )));
    }
    serde_json::from_slice(data)
        .map_err(|e| AuctionError::Serialization(format!("JSON deserialization failed: {e}")))
}

/// Serialize a value to JSON bytes.
pub fn to_json_bytes<T: Serialize>(value: &T) -> AuctionResult<Vec<u8>> {
    serde_json::to_vec(value)
        .map_err(|e| AuctionError::Serialization(format!("JSON serialization failed: {e}")))
}
