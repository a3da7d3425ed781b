//! Program ids and well-known addresses

use solana_sdk::pubkey;
use solana_sdk::pubkey::Pubkey;

/// Raydium AMM V4 program ID (string format, used in subscription filters)
pub const RAYDIUM_AMM_V4_PROGRAM_ID_STR: &str = "675kPX9MHTjS2zt1qfr1NYHuzeLXfQM9H24wFSUt1Mp8";

/// Raydium AMM V4 program ID as Pubkey constant
pub const RAYDIUM_AMM_V4_PROGRAM_ID: Pubkey =
    pubkey!("675kPX9MHTjS2zt1qfr1NYHuzeLXfQM9H24wFSUt1Mp8");

/// Wrapped SOL mint
pub const WRAPPED_SOL_MINT: Pubkey = pubkey!("So11111111111111111111111111111111111111112");

/// pump.fun mint authority, present in the authority list of every pump.fun token
pub const PUMP_FUN_AUTHORITY: Pubkey = pubkey!("TSLvdd1pWpHVjahSpsvCXUbgwsL3JAcvokwaKt1eokM");

/// Returns true for the SPL Token and Token-2022 programs.
#[inline]
pub fn is_token_program(program_id: &Pubkey) -> bool {
    program_id.to_bytes() == spl_token::ID.to_bytes()
        || program_id.to_bytes() == spl_token_2022::ID.to_bytes()
}
