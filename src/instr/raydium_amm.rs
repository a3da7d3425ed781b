//! Raydium AMM V4 instruction decoder
//!
//! Only the two swap instructions are decoded; every other opcode falls back
//! to `Unknown`. Payloads are a one-byte opcode followed by two little-endian
//! u64 arguments.

use super::utils::*;
use super::{unknown, NamedAccount, ParsedInstruction};
use crate::core::transaction::{AccountMeta, FlattenedInstruction};
use crate::error::{IndexerError, Result};

/// Raydium AMM V4 opcodes
pub mod discriminators {
    pub const SWAP_BASE_IN: u8 = 9;
    pub const SWAP_BASE_OUT: u8 = 11;
}

/// opcode + two u64 arguments
pub const SWAP_DATA_LEN: usize = 17;

/// Account count of a swap sent directly to the program. Routed swaps
/// (aggregators and the AMM routing program) leave out `ammTargetOrders`.
pub const ACCOUNTS_WITH_TARGET_ORDERS: usize = 18;

const SWAP_ACCOUNT_ROLES: [&str; 18] = [
    "tokenProgram",
    "amm",
    "ammAuthority",
    "ammOpenOrders",
    "ammTargetOrders",
    "poolCoinTokenAccount",
    "poolPcTokenAccount",
    "serumMarket",
    "serumBids",
    "serumAsks",
    "serumCoinVaultAccount",
    "serumPcVaultAccount",
    "serumVaultSigner",
    "serumReqQueue",
    "serumEventQueue",
    "userSourceTokenAccount",
    "userDestinationTokenAccount",
    "userSourceOwner",
];

const TARGET_ORDERS_POSITION: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapBaseInArgs {
    pub amount_in: u64,
    pub minimum_amount_out: u64,
}

impl SwapBaseInArgs {
    pub fn to_bytes(&self) -> Vec<u8> {
        encode_swap(discriminators::SWAP_BASE_IN, self.amount_in, self.minimum_amount_out)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapBaseOutArgs {
    pub max_amount_in: u64,
    pub amount_out: u64,
}

impl SwapBaseOutArgs {
    pub fn to_bytes(&self) -> Vec<u8> {
        encode_swap(discriminators::SWAP_BASE_OUT, self.max_amount_in, self.amount_out)
    }
}

fn encode_swap(opcode: u8, first: u64, second: u64) -> Vec<u8> {
    let mut data = Vec::with_capacity(SWAP_DATA_LEN);
    data.push(opcode);
    data.extend_from_slice(&first.to_le_bytes());
    data.extend_from_slice(&second.to_le_bytes());
    data
}

/// Decode an instruction of the Raydium AMM V4 program.
pub fn decode(ix: &FlattenedInstruction) -> Result<ParsedInstruction> {
    match read_u8(&ix.data, 0) {
        Some(discriminators::SWAP_BASE_IN) => {
            let (amount_in, minimum_amount_out) = read_swap_args(&ix.data, "swapBaseIn")?;
            Ok(ParsedInstruction::SwapBaseIn {
                args: SwapBaseInArgs { amount_in, minimum_amount_out },
                accounts: label_swap_accounts(&ix.accounts)?,
            })
        }
        Some(discriminators::SWAP_BASE_OUT) => {
            let (max_amount_in, amount_out) = read_swap_args(&ix.data, "swapBaseOut")?;
            Ok(ParsedInstruction::SwapBaseOut {
                args: SwapBaseOutArgs { max_amount_in, amount_out },
                accounts: label_swap_accounts(&ix.accounts)?,
            })
        }
        _ => Ok(unknown(ix)),
    }
}

fn read_swap_args(data: &[u8], name: &str) -> Result<(u64, u64)> {
    match (read_u64_le(data, 1), read_u64_le(data, 9)) {
        (Some(first), Some(second)) => Ok((first, second)),
        _ => Err(IndexerError::Decode(format!(
            "{} payload is {} bytes, expected {}",
            name,
            data.len(),
            SWAP_DATA_LEN
        ))),
    }
}

/// Label swap accounts by position.
///
/// `ammTargetOrders` is only present when exactly 18 accounts are passed;
/// otherwise it is dropped from the role table and later roles shift down.
pub fn label_swap_accounts(accounts: &[AccountMeta]) -> Result<Vec<NamedAccount>> {
    let with_target_orders = accounts.len() == ACCOUNTS_WITH_TARGET_ORDERS;
    let roles = SWAP_ACCOUNT_ROLES
        .iter()
        .enumerate()
        .filter(|(i, _)| with_target_orders || *i != TARGET_ORDERS_POSITION)
        .map(|(_, role)| *role);

    roles
        .enumerate()
        .map(|(position, name)| {
            accounts
                .get(position)
                .map(|meta| NamedAccount { name, meta: *meta })
                .ok_or_else(|| {
                    IndexerError::Decode(format!(
                        "swap account {} missing at position {} ({} accounts)",
                        name,
                        position,
                        accounts.len()
                    ))
                })
        })
        .collect()
}
