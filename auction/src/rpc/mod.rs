//! The peer-to-peer RPC surface: wire messages, inbound handlers and the
//! outbound broadcast.

pub mod broadcast;
pub mod handlers;
pub mod messages;

pub use broadcast::{BroadcastCoordinator, BroadcastReport, FanOut, PeerAck, PeerOutcome};
pub use handlers::RpcHandlers;
pub use messages::{Ack, CloseAck, RpcMethod, RpcRequest};
