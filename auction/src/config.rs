//! Configuration constants and node settings.
//!
//! This module centralizes magic numbers, environment variable names and the
//! [`NodeConfig`] a node is started with.

use std::net::SocketAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AuctionError, AuctionResult};
use crate::rpc::FanOut;

/// Number of fractional digits carried by a [`crate::Price`] (USDt convention).
pub const PRICE_DECIMALS: u32 = 6;

/// Atomic units per whole currency unit.
pub const PRICE_SCALE: u64 = 10u64.pow(PRICE_DECIMALS);

/// Currency label used in log lines.
pub const CURRENCY: &str = "USDt";

/// Maximum size of a single RPC payload (request or acknowledgement).
pub const MAX_PAYLOAD_SIZE: usize = 64 * 1024;

/// Maximum size of a TCP frame, payload plus framing metadata.
pub const MAX_FRAME_SIZE: usize = 2 * MAX_PAYLOAD_SIZE;

/// Time allowed for the hello/welcome handshake on a new connection.
pub const HANDSHAKE_TIMEOUT_SECS: u64 = 5;

/// Maximum attempts to reach a single bootstrap contact.
pub const BOOTSTRAP_MAX_RETRIES: u32 = 10;

/// Initial delay between bootstrap attempts (doubles on each retry).
pub const BOOTSTRAP_INITIAL_DELAY_MS: u64 = 100;

/// Default listen address; port 0 lets the OS choose.
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:0";

/// Environment variable for the listen address.
pub const LISTEN_ADDR_ENV: &str = "AUCTION_LISTEN_ADDR";

/// Environment variable for bootstrap contacts (comma separated `host:port`).
pub const BOOTSTRAP_ENV: &str = "AUCTION_BOOTSTRAP";

/// Environment variable selecting the broadcast fan-out policy.
pub const FANOUT_ENV: &str = "AUCTION_FANOUT";

/// Environment variable for the per-peer request timeout in milliseconds.
pub const REQUEST_TIMEOUT_ENV: &str = "AUCTION_REQUEST_TIMEOUT_MS";

/// Settings for one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Address the RPC endpoint binds to.
    pub listen_addr: String,
    /// Contacts dialled at startup to join the network.
    pub bootstrap: Vec<String>,
    /// How broadcasts reach the peer set.
    pub fan_out: FanOut,
    /// Per-peer request timeout. `None` waits indefinitely.
    pub request_timeout_ms: Option<u64>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            bootstrap: Vec::new(),
            fan_out: FanOut::default(),
            request_timeout_ms: None,
        }
    }
}

impl NodeConfig {
    /// Build a config from the process environment.
    pub fn from_env() -> AuctionResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a config from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> AuctionResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(addr) = lookup(LISTEN_ADDR_ENV) {
            config.listen_addr = addr.trim().to_string();
        }
        if let Some(contacts) = lookup(BOOTSTRAP_ENV) {
            config.bootstrap = contacts
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ToString::to_string)
                .collect();
        }
        if let Some(policy) = lookup(FANOUT_ENV) {
            config.fan_out = policy.parse()?;
        }
        if let Some(ms) = lookup(REQUEST_TIMEOUT_ENV) {
            let ms = ms.trim().parse::<u64>().map_err(|e| {
                AuctionError::Config(format!("{REQUEST_TIMEOUT_ENV} must be an integer: {e}"))
            })?;
            config.request_timeout_ms = (ms > 0).then_some(ms);
        }

        config.validate()?;
        Ok(config)
    }

    /// Check that every address parses.
    pub fn validate(&self) -> AuctionResult<()> {
        self.listen_socket_addr()?;
        self.bootstrap_addrs()?;
        Ok(())
    }

    pub fn listen_socket_addr(&self) -> AuctionResult<SocketAddr> {
        self.listen_addr.parse().map_err(|e| {
            AuctionError::Config(format!("Invalid listen address '{}': {e}", self.listen_addr))
        })
    }

    pub fn bootstrap_addrs(&self) -> AuctionResult<Vec<SocketAddr>> {
        self.bootstrap
            .iter()
            .map(|contact| {
                contact.parse().map_err(|e| {
                    AuctionError::Config(format!("Invalid bootstrap contact '{contact}': {e}"))
                })
            })
            .collect()
    }

    /// The per-request bound, if any. Zero means no timeout.
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }
}
