//! Canonical transaction model
//!
//! One shape for both legacy and v0 messages, produced by
//! [`TransactionFormatter`](super::formatter::TransactionFormatter) and consumed by the
//! flattener. Every binary field is already decoded into a typed value.

use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageVersion {
    Legacy,
    V0,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MessageHeader {
    pub num_required_signatures: u8,
    pub num_readonly_signed_accounts: u8,
    pub num_readonly_unsigned_accounts: u8,
}

/// An instruction whose program and accounts are still positional indexes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledInstruction {
    pub program_id_index: usize,
    pub accounts: Vec<u8>,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressTableLookup {
    pub account_key: Pubkey,
    pub writable_indexes: Vec<u8>,
    pub readonly_indexes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalMessage {
    pub version: MessageVersion,
    pub header: MessageHeader,
    pub recent_blockhash: Hash,
    pub account_keys: Vec<Pubkey>,
    pub instructions: Vec<CompiledInstruction>,
    /// Always empty for legacy messages
    pub address_table_lookups: Vec<AddressTableLookup>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UiTokenAmount {
    pub amount: String,
    pub decimals: u8,
    pub ui_amount: f64,
}

impl UiTokenAmount {
    pub fn zero() -> Self {
        Self { amount: "0".to_string(), decimals: 0, ui_amount: 0.0 }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TokenBalance {
    pub account_index: u32,
    pub mint: String,
    pub owner: String,
    pub program_id: String,
    pub ui_token_amount: UiTokenAmount,
}

/// Accounts loaded from address lookup tables, in the order the runtime appends them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadedAddresses {
    pub writable: Vec<Pubkey>,
    pub readonly: Vec<Pubkey>,
}

/// CPI instructions emitted while executing the top-level instruction at `index`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InnerInstructionGroup {
    pub index: usize,
    pub instructions: Vec<CompiledInstruction>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalMeta {
    /// Bincode-encoded `TransactionError`, as carried on the wire
    pub err: Option<Vec<u8>>,
    pub fee: u64,
    pub pre_balances: Vec<u64>,
    pub post_balances: Vec<u64>,
    pub pre_token_balances: Vec<TokenBalance>,
    pub post_token_balances: Vec<TokenBalance>,
    pub log_messages: Vec<String>,
    pub loaded_addresses: Option<LoadedAddresses>,
    pub inner_instructions: Vec<InnerInstructionGroup>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalTransaction {
    pub slot: u64,
    /// Ingestion time in milliseconds since the Unix epoch
    pub block_time: i64,
    pub signatures: Vec<Signature>,
    pub message: CanonicalMessage,
    pub meta: CanonicalMeta,
}

impl CanonicalTransaction {
    #[inline]
    pub fn signature(&self) -> Option<&Signature> {
        self.signatures.first()
    }
}

/// A resolved account reference with its signer/writable flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountMeta {
    pub pubkey: Pubkey,
    pub is_signer: bool,
    pub is_writable: bool,
}

/// One entry of the execution trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlattenedInstruction {
    pub program_id: Pubkey,
    pub accounts: Vec<AccountMeta>,
    pub data: Vec<u8>,
    /// Program of the top-level instruction that invoked this one (CPI only)
    pub parent_program_id: Option<Pubkey>,
}
