pub mod harness;

pub use harness::{price, NetworkHarness};
