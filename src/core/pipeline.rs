//! Per-message decode path: format → flatten → parse → extract.

use super::formatter::TransactionFormatter;
use super::swap::{extract_swaps, Swap};
use crate::error::Result;
use crate::instr::InstructionParser;
use yellowstone_grpc_proto::prelude::SubscribeUpdateTransaction;

/// Turns one streamed transaction into the swaps it contains.
///
/// Pure and synchronous; a failure only affects the message being decoded.
#[derive(Debug, Clone)]
pub struct SwapDecoder {
    formatter: TransactionFormatter,
    parser: InstructionParser,
}

impl SwapDecoder {
    pub fn new(parser: InstructionParser) -> Self {
        Self { formatter: TransactionFormatter::new(), parser }
    }

    pub fn decode(
        &self,
        update: &SubscribeUpdateTransaction,
        timestamp_ms: i64,
    ) -> Result<Vec<Swap>> {
        let Some(tx) = self.formatter.format(update, timestamp_ms)? else {
            return Ok(Vec::new());
        };
        let instructions = self.parser.parse_transaction(&tx)?;
        Ok(extract_swaps(&instructions, tx.block_time))
    }
}

impl Default for SwapDecoder {
    fn default() -> Self {
        Self::new(InstructionParser::with_raydium_amm())
    }
}
