//! Swap extraction
//!
//! Picks the AMM swaps out of a decoded execution trace and attaches the token
//! transfers the AMM performed right after each swap.

use crate::instr::program_ids::{is_token_program, RAYDIUM_AMM_V4_PROGRAM_ID};
use crate::instr::{decode_transfer, DecodedInstruction};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;

/// Number of instructions following a swap that may hold its transfer legs.
pub const TRANSFER_LEGS: usize = 2;

/// One token movement of a swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferInfo {
    /// `[source, destination]` token accounts
    pub accounts: [Pubkey; 2],
    pub amount: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Swap {
    /// Pool coin vault
    pub vault_a: Pubkey,
    /// Pool pc vault
    pub vault_b: Pubkey,
    pub transfer_info: Vec<TransferInfo>,
    /// Ingestion time, ms since epoch
    pub timestamp: i64,
}

impl Swap {
    /// Amount of the first leg that touched `vault`.
    pub fn amount_through(&self, vault: &Pubkey) -> Option<u64> {
        self.transfer_info
            .iter()
            .find(|t| t.accounts.contains(vault))
            .map(|t| t.amount)
    }
}

pub fn extract_swaps(instructions: &[DecodedInstruction], timestamp: i64) -> Vec<Swap> {
    let mut swaps = Vec::new();

    for (i, ix) in instructions.iter().enumerate() {
        if ix.raw.program_id != RAYDIUM_AMM_V4_PROGRAM_ID || !ix.parsed.is_swap() {
            continue;
        }

        let (Some(vault_a), Some(vault_b)) = (
            ix.parsed.account("poolCoinTokenAccount"),
            ix.parsed.account("poolPcTokenAccount"),
        ) else {
            debug!("Skipping {} without pool vaults", ix.parsed.name());
            continue;
        };

        let end = (i + 1 + TRANSFER_LEGS).min(instructions.len());
        let transfer_info: Vec<TransferInfo> = instructions[i + 1..end]
            .iter()
            .filter(|leg| is_token_program(&leg.raw.program_id))
            .filter_map(|leg| match decode_transfer(&leg.raw) {
                Ok(args) => Some(TransferInfo {
                    accounts: [args.source, args.destination],
                    amount: args.amount,
                }),
                Err(e) => {
                    warn!("Skipping transfer leg of swap on {}: {}", vault_a, e);
                    None
                }
            })
            .collect();

        if transfer_info.is_empty() {
            debug!("Dropping swap on {} with no transfer legs", vault_a);
            continue;
        }

        swaps.push(Swap { vault_a, vault_b, transfer_info, timestamp });
    }

    swaps
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::transaction::{AccountMeta, FlattenedInstruction};
    use crate::instr::{encode_transfer_data, InstructionParser, SwapBaseInArgs};

    pub(crate) fn key(seed: u8) -> Pubkey {
        Pubkey::new_from_array([seed; 32])
    }

    fn metas(keys: &[Pubkey]) -> Vec<AccountMeta> {
        keys.iter()
            .map(|k| AccountMeta { pubkey: *k, is_signer: false, is_writable: true })
            .collect()
    }

    fn decoded(raw: FlattenedInstruction) -> DecodedInstruction {
        let parsed = InstructionParser::with_raydium_amm().parse(&raw).unwrap();
        DecodedInstruction { raw, parsed }
    }

    /// 17-account swap whose coin vault is `key(5)` and pc vault `key(6)`.
    fn swap(amount_in: u64) -> DecodedInstruction {
        let accounts: Vec<Pubkey> = (1..=17).map(key).collect();
        decoded(FlattenedInstruction {
            program_id: RAYDIUM_AMM_V4_PROGRAM_ID,
            accounts: metas(&accounts),
            data: SwapBaseInArgs { amount_in, minimum_amount_out: 0 }.to_bytes(),
            parent_program_id: None,
        })
    }

    fn transfer(program_id: Pubkey, source: Pubkey, destination: Pubkey, amount: u64) -> DecodedInstruction {
        decoded(FlattenedInstruction {
            program_id,
            accounts: metas(&[source, destination, key(99)]),
            data: encode_transfer_data(amount),
            parent_program_id: Some(RAYDIUM_AMM_V4_PROGRAM_ID),
        })
    }

    fn token_program() -> Pubkey {
        Pubkey::new_from_array(spl_token::ID.to_bytes())
    }

    #[test]
    fn test_swap_with_two_legs() {
        let trace = vec![
            swap(100),
            transfer(token_program(), key(40), key(5), 100),
            transfer(token_program(), key(6), key(41), 250),
        ];

        let swaps = extract_swaps(&trace, 7);
        assert_eq!(swaps.len(), 1);
        let swap = &swaps[0];
        assert_eq!(swap.vault_a, key(5));
        assert_eq!(swap.vault_b, key(6));
        assert_eq!(swap.timestamp, 7);
        assert_eq!(swap.transfer_info.len(), 2);
        assert_eq!(swap.amount_through(&key(5)), Some(100));
        assert_eq!(swap.amount_through(&key(6)), Some(250));
    }

    #[test]
    fn test_short_tail_is_tolerated() {
        let trace = vec![swap(1), transfer(token_program(), key(40), key(5), 1)];
        let swaps = extract_swaps(&trace, 0);
        assert_eq!(swaps.len(), 1);
        assert_eq!(swaps[0].transfer_info.len(), 1);

        // nothing after the swap at all
        assert!(extract_swaps(&[swap(1)], 0).is_empty());
    }

    #[test]
    fn test_non_token_followers_are_not_legs() {
        let trace = vec![
            swap(1),
            transfer(Pubkey::new_unique(), key(40), key(5), 1),
            transfer(token_program(), key(6), key(41), 2),
        ];
        let swaps = extract_swaps(&trace, 0);
        assert_eq!(swaps[0].transfer_info.len(), 1);
        assert_eq!(swaps[0].transfer_info[0].amount, 2);
    }

    #[test]
    fn test_approve_after_swap_is_not_a_leg() {
        let mut approve = transfer(token_program(), key(5), key(50), 0);
        approve.raw.data = vec![4];
        approve.raw.data.extend_from_slice(&777u64.to_le_bytes());

        let trace = vec![swap(1), approve, transfer(token_program(), key(6), key(41), 2)];
        let swaps = extract_swaps(&trace, 0);
        assert_eq!(swaps.len(), 1);
        assert_eq!(swaps[0].transfer_info.len(), 1);
        assert_eq!(swaps[0].amount_through(&key(5)), None);
        assert_eq!(swaps[0].amount_through(&key(6)), Some(2));
    }

    #[test]
    fn test_non_swap_instructions_are_ignored() {
        let trace = vec![
            transfer(token_program(), key(1), key(2), 5),
            transfer(token_program(), key(2), key(3), 5),
        ];
        assert!(extract_swaps(&trace, 0).is_empty());
    }

    #[test]
    fn test_consecutive_swaps() {
        let trace = vec![
            swap(1),
            transfer(token_program(), key(40), key(5), 1),
            transfer(token_program(), key(6), key(41), 2),
            swap(3),
            transfer(token_program(), key(42), key(5), 3),
            transfer(token_program(), key(6), key(43), 4),
        ];
        let swaps = extract_swaps(&trace, 0);
        assert_eq!(swaps.len(), 2);
        assert_eq!(swaps[1].amount_through(&key(5)), Some(3));
    }
}
