//! Token transfer decoder
//!
//! Used by the swap extractor on the instructions that follow a swap. Layout is
//! `[u8 opcode][u64 LE amount]` with accounts `source, destination, authority`.

use super::utils::*;
use crate::core::transaction::FlattenedInstruction;
use crate::error::{IndexerError, Result};
use solana_sdk::pubkey::Pubkey;

/// SPL Token `Transfer` opcode
pub const TRANSFER_DISCRIMINATOR: u8 = 3;

pub const TRANSFER_DATA_LEN: usize = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferArgs {
    pub amount: u64,
    pub source: Pubkey,
    pub destination: Pubkey,
    pub authority: Pubkey,
}

/// Decode an SPL Token `Transfer`. Any other token instruction is a decode error.
pub fn decode_transfer(ix: &FlattenedInstruction) -> Result<TransferArgs> {
    match read_u8(&ix.data, 0) {
        Some(TRANSFER_DISCRIMINATOR) => {}
        other => {
            return Err(IndexerError::Decode(format!(
                "expected transfer opcode {}, got {:?}",
                TRANSFER_DISCRIMINATOR, other
            )))
        }
    }

    let amount = read_u64_le(&ix.data, 1).ok_or_else(|| {
        IndexerError::Decode(format!(
            "transfer payload is {} bytes, expected {}",
            ix.data.len(),
            TRANSFER_DATA_LEN
        ))
    })?;

    match (
        get_account(&ix.accounts, 0),
        get_account(&ix.accounts, 1),
        get_account(&ix.accounts, 2),
    ) {
        (Some(source), Some(destination), Some(authority)) => {
            Ok(TransferArgs { amount, source, destination, authority })
        }
        _ => Err(IndexerError::Decode(format!(
            "transfer needs 3 accounts, got {}",
            ix.accounts.len()
        ))),
    }
}

pub fn encode_transfer_data(amount: u64) -> Vec<u8> {
    let mut data = Vec::with_capacity(TRANSFER_DATA_LEN);
    data.push(TRANSFER_DISCRIMINATOR);
    data.extend_from_slice(&amount.to_le_bytes());
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transaction::AccountMeta;

    fn transfer_ix(data: Vec<u8>, account_count: usize) -> FlattenedInstruction {
        FlattenedInstruction {
            program_id: Pubkey::new_from_array(spl_token::ID.to_bytes()),
            accounts: (0..account_count)
                .map(|i| AccountMeta {
                    pubkey: Pubkey::new_from_array([i as u8 + 1; 32]),
                    is_signer: i == 2,
                    is_writable: i < 2,
                })
                .collect(),
            data,
            parent_program_id: None,
        }
    }

    #[test]
    fn test_transfer_amount_round_trip() {
        let amounts = [0u64, 1, 255, 256, 1_000_000_007, u32::MAX as u64, u64::MAX - 1, u64::MAX];
        for amount in amounts {
            let decoded = decode_transfer(&transfer_ix(encode_transfer_data(amount), 3)).unwrap();
            assert_eq!(decoded.amount, amount);
        }

        // a spread of bit patterns across the whole range
        let mut amount = 1u64;
        for shift in 0..64 {
            let value = amount.rotate_left(shift) ^ (shift as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
            let decoded = decode_transfer(&transfer_ix(encode_transfer_data(value), 3)).unwrap();
            assert_eq!(decoded.amount, value);
            amount = amount.wrapping_mul(3).wrapping_add(1);
        }
    }

    #[test]
    fn test_transfer_accounts() {
        let decoded = decode_transfer(&transfer_ix(encode_transfer_data(10), 3)).unwrap();
        assert_eq!(decoded.source, Pubkey::new_from_array([1; 32]));
        assert_eq!(decoded.destination, Pubkey::new_from_array([2; 32]));
        assert_eq!(decoded.authority, Pubkey::new_from_array([3; 32]));
    }

    #[test]
    fn test_malformed_transfers() {
        assert!(decode_transfer(&transfer_ix(vec![3, 1, 2], 3)).is_err());
        assert!(decode_transfer(&transfer_ix(encode_transfer_data(10), 2)).is_err());
        assert!(decode_transfer(&transfer_ix(Vec::new(), 3)).is_err());
    }

    #[test]
    fn test_other_token_instructions_are_not_transfers() {
        // Approve (4), MintTo (7), Burn (8) share the [opcode][u64] shape
        for opcode in [4u8, 7, 8] {
            let mut data = vec![opcode];
            data.extend_from_slice(&777u64.to_le_bytes());
            assert!(matches!(
                decode_transfer(&transfer_ix(data, 3)),
                Err(IndexerError::Decode(_))
            ));
        }
    }
}
