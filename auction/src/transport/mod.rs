//! Concrete [`crate::traits::RpcTransport`] implementations.

pub mod local;
pub mod tcp;

pub use local::{Delivery, LocalNetwork, LocalTransport};
pub use tcp::{read_frame, write_frame, Frame, TcpServer, TcpTransport};
