//! Wire types for the three RPC methods.
//!
//! Requests are decoded into an explicit [`RpcRequest`] variant before any
//! handler runs, so a payload that does not match its method is rejected in
//! one place.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::MAX_PAYLOAD_SIZE;
use crate::error::{AuctionError, AuctionResult};
use crate::marketplace::{Auction, AuctionId, Bid, BidderId, Price};
use crate::util::{json_from_limited_slice, to_json_bytes};

/// The RPC methods every node exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RpcMethod {
    CreateAuction,
    MakeBid,
    CloseAuction,
}

impl RpcMethod {
    pub const ALL: [Self; 3] = [Self::CreateAuction, Self::MakeBid, Self::CloseAuction];

    /// Method name as it appears on the wire.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CreateAuction => "createAuction",
            Self::MakeBid => "makeBid",
            Self::CloseAuction => "closeAuction",
        }
    }
}

impl fmt::Display for RpcMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RpcMethod {
    type Err = AuctionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| AuctionError::Validation(format!("Unknown RPC method '{s}'")))
    }
}

/// A decoded inbound or outbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RpcRequest {
    CreateAuction(Auction),
    MakeBid(Bid),
    /// Carries the raw auction id.
    CloseAuction(AuctionId),
}

impl RpcRequest {
    pub const fn method(&self) -> RpcMethod {
        match self {
            Self::CreateAuction(_) => RpcMethod::CreateAuction,
            Self::MakeBid(_) => RpcMethod::MakeBid,
            Self::CloseAuction(_) => RpcMethod::CloseAuction,
        }
    }

    /// Payload bytes: JSON for create and bid, the bare UTF-8 id for close.
    pub fn encode(&self) -> AuctionResult<Vec<u8>> {
        match self {
            Self::CreateAuction(auction) => to_json_bytes(auction),
            Self::MakeBid(bid) => to_json_bytes(bid),
            Self::CloseAuction(id) => Ok(id.as_bytes().to_vec()),
        }
    }

    /// Decode a payload received under `method`.
    pub fn decode(method: &str, payload: &[u8]) -> AuctionResult<Self> {
        let method: RpcMethod = method.parse()?;
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(AuctionError::Validation(format!(
                "{method} payload too large: {} bytes (max {MAX_PAYLOAD_SIZE})",
                payload.len()
            )));
        }
        match method {
            RpcMethod::CreateAuction => {
                json_from_limited_slice(payload, MAX_PAYLOAD_SIZE).map(Self::CreateAuction)
            }
            RpcMethod::MakeBid => json_from_limited_slice(payload, MAX_PAYLOAD_SIZE).map(Self::MakeBid),
            RpcMethod::CloseAuction => std::str::from_utf8(payload)
                .map(|id| Self::CloseAuction(id.to_string()))
                .map_err(|e| {
                    AuctionError::Serialization(format!("Auction id is not valid UTF-8: {e}"))
                }),
        }
    }
}

/// Acknowledgement for `createAuction` and `makeBid`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Ack {
    pub const fn ok() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        encode_response(self)
    }

    pub fn from_bytes(data: &[u8]) -> AuctionResult<Self> {
        json_from_limited_slice(data, MAX_PAYLOAD_SIZE)
    }
}

/// Acknowledgement for `closeAuction`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseAck {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner: Option<BidderId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Price>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl CloseAck {
    /// Snapshot of `auction` as this node sees it.
    pub fn closed(auction: &Auction) -> Self {
        Self {
            success: true,
            winner: auction.highest_bidder.clone(),
            price: Some(auction.current_price),
            message: None,
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            winner: None,
            price: None,
            message: Some(message.into()),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        encode_response(self)
    }

    pub fn from_bytes(data: &[u8]) -> AuctionResult<Self> {
        json_from_limited_slice(data, MAX_PAYLOAD_SIZE)
    }
}

/// Fallback body if an acknowledgement ever fails to serialize.
const INTERNAL_ERROR_BODY: &[u8] = br#"{"success":false,"message":"Internal error"}"#;

fn encode_response<T: Serialize>(value: &T) -> Vec<u8> {
    to_json_bytes(value).unwrap_or_else(|_| INTERNAL_ERROR_BODY.to_vec())
}
