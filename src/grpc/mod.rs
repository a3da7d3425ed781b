//! Yellowstone gRPC subscription
//!
//! - `client`: the stream supervisor (connect, subscribe, reconnect)
//! - `types`: connection settings and transaction filters

pub mod client;
pub mod types;

pub use client::StreamSupervisor;
pub use types::{ClientConfig, TransactionFilter};
