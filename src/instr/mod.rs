//! Instruction parser
//!
//! Decodes flattened instructions through an explicit registry mapping a
//! program id to its decode function. Programs without a decoder, and opcodes a
//! decoder does not recognise, come out as [`ParsedInstruction::Unknown`].

pub mod program_ids;
pub mod raydium_amm;
pub mod transfer;
pub mod utils;

pub use raydium_amm::{SwapBaseInArgs, SwapBaseOutArgs};
pub use transfer::{decode_transfer, encode_transfer_data, TransferArgs};
pub use utils::*;

use crate::core::flattener::flatten;
use crate::core::transaction::{AccountMeta, CanonicalTransaction, FlattenedInstruction};
use crate::error::Result;
use solana_sdk::pubkey::Pubkey;
use std::collections::HashMap;

/// An account labelled with the role it plays in the instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NamedAccount {
    pub name: &'static str,
    pub meta: AccountMeta,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedInstruction {
    /// Instruction from a program without a decoder, or with an unhandled opcode.
    /// `data` is the base58 payload.
    Unknown { accounts: Vec<AccountMeta>, data: String },
    SwapBaseIn { args: SwapBaseInArgs, accounts: Vec<NamedAccount> },
    SwapBaseOut { args: SwapBaseOutArgs, accounts: Vec<NamedAccount> },
    Transfer(TransferArgs),
}

impl ParsedInstruction {
    pub fn name(&self) -> &'static str {
        match self {
            ParsedInstruction::Unknown { .. } => "unknown",
            ParsedInstruction::SwapBaseIn { .. } => "swapBaseIn",
            ParsedInstruction::SwapBaseOut { .. } => "swapBaseOut",
            ParsedInstruction::Transfer(_) => "transfer",
        }
    }

    #[inline]
    pub fn is_swap(&self) -> bool {
        matches!(self, ParsedInstruction::SwapBaseIn { .. } | ParsedInstruction::SwapBaseOut { .. })
    }

    /// Labelled accounts of a swap; empty for every other variant.
    pub fn named_accounts(&self) -> &[NamedAccount] {
        match self {
            ParsedInstruction::SwapBaseIn { accounts, .. }
            | ParsedInstruction::SwapBaseOut { accounts, .. } => accounts,
            ParsedInstruction::Unknown { .. } | ParsedInstruction::Transfer(_) => &[],
        }
    }

    /// Look up a labelled account by role name.
    pub fn account(&self, name: &str) -> Option<Pubkey> {
        self.named_accounts().iter().find(|a| a.name == name).map(|a| a.meta.pubkey)
    }
}

/// A flattened instruction together with its decoded form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedInstruction {
    pub raw: FlattenedInstruction,
    pub parsed: ParsedInstruction,
}

pub type DecodeFn = fn(&FlattenedInstruction) -> Result<ParsedInstruction>;

#[derive(Debug, Clone, Default)]
pub struct InstructionParser {
    decoders: HashMap<Pubkey, DecodeFn>,
}

impl InstructionParser {
    /// A parser with no decoders; every instruction decodes to `Unknown`.
    pub fn new() -> Self {
        Self { decoders: HashMap::new() }
    }

    /// A parser with the Raydium AMM V4 decoder registered.
    pub fn with_raydium_amm() -> Self {
        Self::new().with_decoder(program_ids::RAYDIUM_AMM_V4_PROGRAM_ID, raydium_amm::decode)
    }

    pub fn with_decoder(mut self, program_id: Pubkey, decoder: DecodeFn) -> Self {
        self.register(program_id, decoder);
        self
    }

    pub fn register(&mut self, program_id: Pubkey, decoder: DecodeFn) {
        self.decoders.insert(program_id, decoder);
    }

    #[inline]
    pub fn parse(&self, ix: &FlattenedInstruction) -> Result<ParsedInstruction> {
        match self.decoders.get(&ix.program_id) {
            Some(decode) => decode(ix),
            None => Ok(unknown(ix)),
        }
    }

    /// Flatten a transaction and decode every instruction of the trace, in order.
    pub fn parse_transaction(&self, tx: &CanonicalTransaction) -> Result<Vec<DecodedInstruction>> {
        flatten(tx)?
            .into_iter()
            .map(|raw| {
                let parsed = self.parse(&raw)?;
                Ok(DecodedInstruction { raw, parsed })
            })
            .collect()
    }
}

/// Fallback decoding shared by every decoder.
pub fn unknown(ix: &FlattenedInstruction) -> ParsedInstruction {
    ParsedInstruction::Unknown {
        accounts: ix.accounts.clone(),
        data: bs58::encode(&ix.data).into_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flattened(program_id: Pubkey, data: Vec<u8>, accounts: usize) -> FlattenedInstruction {
        FlattenedInstruction {
            program_id,
            accounts: (0..accounts)
                .map(|i| AccountMeta {
                    pubkey: Pubkey::new_from_array([i as u8 + 1; 32]),
                    is_signer: false,
                    is_writable: true,
                })
                .collect(),
            data,
            parent_program_id: None,
        }
    }

    #[test]
    fn test_unregistered_program_is_unknown() {
        let parser = InstructionParser::new();
        let mut data = vec![9u8];
        data.extend_from_slice(&[0u8; 16]);
        let ix = flattened(program_ids::RAYDIUM_AMM_V4_PROGRAM_ID, data.clone(), 18);

        match parser.parse(&ix).unwrap() {
            ParsedInstruction::Unknown { accounts, data: encoded } => {
                assert_eq!(accounts.len(), 18);
                assert_eq!(encoded, bs58::encode(&data).into_string());
            }
            other => panic!("expected Unknown, got {:?}", other),
        }
    }

    #[test]
    fn test_registered_program_dispatches() {
        let parser = InstructionParser::with_raydium_amm();
        let data = SwapBaseInArgs { amount_in: 5, minimum_amount_out: 4 }.to_bytes();
        let ix = flattened(program_ids::RAYDIUM_AMM_V4_PROGRAM_ID, data, 17);

        let parsed = parser.parse(&ix).unwrap();
        assert_eq!(parsed.name(), "swapBaseIn");
        assert!(parsed.is_swap());
        assert_eq!(parsed.account("poolCoinTokenAccount"), Some(ix.accounts[4].pubkey));

        // Same bytes from another program stay unknown.
        let other = flattened(Pubkey::new_unique(), ix.data.clone(), 17);
        assert_eq!(parser.parse(&other).unwrap().name(), "unknown");
    }

    #[test]
    fn test_custom_decoder_registration() {
        fn always_transfer(ix: &FlattenedInstruction) -> Result<ParsedInstruction> {
            decode_transfer(ix).map(ParsedInstruction::Transfer)
        }
        let program = Pubkey::new_unique();
        let parser = InstructionParser::new().with_decoder(program, always_transfer);
        let ix = flattened(program, encode_transfer_data(77), 3);

        match parser.parse(&ix).unwrap() {
            ParsedInstruction::Transfer(args) => assert_eq!(args.amount, 77),
            other => panic!("expected Transfer, got {:?}", other),
        }
    }
}
