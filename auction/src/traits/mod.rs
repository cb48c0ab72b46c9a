//! Trait abstractions for dependency injection and testability.
//!
//! The transport is an external collaborator; these traits are the narrow
//! interface the node consumes, so the coordination logic can be unit tested
//! without opening sockets.

pub mod transport;

// Re-export all traits for crate-internal use.
// The public API surface is controlled by lib.rs re-exports.
pub use transport::{RequestHandler, RpcTransport};
