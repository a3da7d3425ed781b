//! Instruction decoding helpers

use crate::core::transaction::AccountMeta;
use solana_sdk::pubkey::Pubkey;

/// Read a little-endian u64 from instruction data
#[inline(always)]
pub fn read_u64_le(data: &[u8], offset: usize) -> Option<u64> {
    let bytes: [u8; 8] = data.get(offset..offset + 8)?.try_into().ok()?;
    Some(u64::from_le_bytes(bytes))
}

/// Read a single byte from instruction data
#[inline(always)]
pub fn read_u8(data: &[u8], offset: usize) -> Option<u8> {
    data.get(offset).copied()
}

/// Get the pubkey at an account position
#[inline(always)]
pub fn get_account(accounts: &[AccountMeta], index: usize) -> Option<Pubkey> {
    accounts.get(index).map(|meta| meta.pubkey)
}
