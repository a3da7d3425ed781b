// Decode path
pub mod core;
pub mod error;
pub mod instr; // instruction decoders

// Enrichment, batching and persistence
pub mod batch;
pub mod enrich;
pub mod sink;

// Yellowstone subscription and reconnects
pub mod grpc;

pub mod config;

// Main API re-exports
pub use batch::{BatchConfig, BatchManager, ProcessingMode};
pub use config::IndexerConfig;
pub use core::{Swap, SwapDecoder};
pub use enrich::{Enricher, EnrichmentStage, Trade};
pub use error::{IndexerError, Result};
pub use grpc::StreamSupervisor;
pub use instr::{InstructionParser, ParsedInstruction};
pub use sink::{HasuraSink, TradeSink};
