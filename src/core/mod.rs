//! Decode path of the indexer
//!
//! - `formatter`: stream update → canonical transaction
//! - `flattener`: canonical transaction → ordered execution trace
//! - `swap`: decoded trace → swaps with their transfer legs
//! - `pipeline`: all of the above for one message

pub mod flattener;
pub mod formatter;
pub mod pipeline;
pub mod swap;
pub mod transaction;

pub use flattener::{flatten, resolve_accounts};
pub use formatter::TransactionFormatter;
pub use pipeline::SwapDecoder;
pub use swap::{extract_swaps, Swap, TransferInfo};
pub use transaction::*;
