//! Transaction formatter
//!
//! Normalizes a streamed `SubscribeUpdateTransaction` into a
//! [`CanonicalTransaction`], regardless of whether the message is legacy or v0.

use super::transaction::*;
use crate::error::{IndexerError, Result};
use log::debug;
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use yellowstone_grpc_proto::prelude::{
    CompiledInstruction as GrpcCompiledInstruction, Message, SubscribeUpdateTransaction,
    TokenBalance as GrpcTokenBalance, TransactionStatusMeta,
};

#[derive(Debug, Default, Clone, Copy)]
pub struct TransactionFormatter;

impl TransactionFormatter {
    pub fn new() -> Self {
        Self
    }

    /// Format a raw update received at `timestamp_ms`.
    ///
    /// Returns `Ok(None)` when the update carries no message or no meta; such
    /// updates are dropped without being treated as an error.
    pub fn format(
        &self,
        update: &SubscribeUpdateTransaction,
        timestamp_ms: i64,
    ) -> Result<Option<CanonicalTransaction>> {
        let Some(info) = &update.transaction else {
            debug!("Dropping update at slot {}: no transaction info", update.slot);
            return Ok(None);
        };
        let Some(raw_meta) = &info.meta else {
            debug!("Dropping update at slot {}: no meta", update.slot);
            return Ok(None);
        };
        let Some(tx) = &info.transaction else {
            debug!("Dropping update at slot {}: no transaction", update.slot);
            return Ok(None);
        };
        let Some(raw_message) = &tx.message else {
            debug!("Dropping update at slot {}: no message", update.slot);
            return Ok(None);
        };

        let meta = self.format_meta(raw_meta)?;
        let message = self.format_message(raw_message)?;
        let signatures = tx
            .signatures
            .iter()
            .map(|s| to_signature(s))
            .collect::<Result<Vec<_>>>()?;

        Ok(Some(CanonicalTransaction {
            slot: update.slot,
            block_time: timestamp_ms,
            signatures,
            message,
            meta,
        }))
    }

    fn format_message(&self, message: &Message) -> Result<CanonicalMessage> {
        let header = message
            .header
            .as_ref()
            .map(|h| MessageHeader {
                num_required_signatures: h.num_required_signatures as u8,
                num_readonly_signed_accounts: h.num_readonly_signed_accounts as u8,
                num_readonly_unsigned_accounts: h.num_readonly_unsigned_accounts as u8,
            })
            .unwrap_or_default();

        let recent_blockhash = if message.recent_blockhash.is_empty() {
            Hash::default()
        } else {
            let bytes: [u8; 32] = message.recent_blockhash.as_slice().try_into().map_err(|_| {
                IndexerError::Format(format!(
                    "blockhash must be 32 bytes, got {}",
                    message.recent_blockhash.len()
                ))
            })?;
            Hash::new_from_array(bytes)
        };

        let account_keys =
            message.account_keys.iter().map(|k| to_pubkey(k)).collect::<Result<Vec<_>>>()?;

        let instructions = message.instructions.iter().map(compile_instruction).collect();

        let (version, address_table_lookups) = if message.versioned {
            let lookups = message
                .address_table_lookups
                .iter()
                .map(|lookup| {
                    Ok(AddressTableLookup {
                        account_key: to_pubkey(&lookup.account_key)?,
                        writable_indexes: lookup.writable_indexes.clone(),
                        readonly_indexes: lookup.readonly_indexes.clone(),
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            (MessageVersion::V0, lookups)
        } else {
            (MessageVersion::Legacy, Vec::new())
        };

        Ok(CanonicalMessage {
            version,
            header,
            recent_blockhash,
            account_keys,
            instructions,
            address_table_lookups,
        })
    }

    fn format_meta(&self, meta: &TransactionStatusMeta) -> Result<CanonicalMeta> {
        let loaded_addresses = if meta.loaded_writable_addresses.is_empty()
            && meta.loaded_readonly_addresses.is_empty()
        {
            None
        } else {
            Some(LoadedAddresses {
                writable: meta
                    .loaded_writable_addresses
                    .iter()
                    .map(|k| to_pubkey(k))
                    .collect::<Result<Vec<_>>>()?,
                readonly: meta
                    .loaded_readonly_addresses
                    .iter()
                    .map(|k| to_pubkey(k))
                    .collect::<Result<Vec<_>>>()?,
            })
        };

        let inner_instructions = meta
            .inner_instructions
            .iter()
            .map(|group| InnerInstructionGroup {
                index: group.index as usize,
                instructions: group
                    .instructions
                    .iter()
                    .map(|ix| CompiledInstruction {
                        program_id_index: ix.program_id_index as usize,
                        accounts: ix.accounts.clone(),
                        data: ix.data.clone(),
                    })
                    .collect(),
            })
            .collect();

        Ok(CanonicalMeta {
            err: meta.err.as_ref().map(|e| e.err.clone()),
            fee: meta.fee,
            pre_balances: meta.pre_balances.clone(),
            post_balances: meta.post_balances.clone(),
            pre_token_balances: meta.pre_token_balances.iter().map(format_token_balance).collect(),
            post_token_balances: meta.post_token_balances.iter().map(format_token_balance).collect(),
            log_messages: meta.log_messages.clone(),
            loaded_addresses,
            inner_instructions,
        })
    }
}

fn compile_instruction(ix: &GrpcCompiledInstruction) -> CompiledInstruction {
    CompiledInstruction {
        program_id_index: ix.program_id_index as usize,
        accounts: ix.accounts.clone(),
        data: ix.data.clone(),
    }
}

fn format_token_balance(balance: &GrpcTokenBalance) -> TokenBalance {
    TokenBalance {
        account_index: balance.account_index,
        mint: balance.mint.clone(),
        owner: balance.owner.clone(),
        program_id: balance.program_id.clone(),
        ui_token_amount: balance
            .ui_token_amount
            .as_ref()
            .map(|amount| UiTokenAmount {
                amount: amount.amount.clone(),
                decimals: amount.decimals as u8,
                ui_amount: amount.ui_amount,
            })
            .unwrap_or_else(UiTokenAmount::zero),
    }
}

#[inline]
fn to_pubkey(bytes: &[u8]) -> Result<Pubkey> {
    Pubkey::try_from(bytes)
        .map_err(|_| IndexerError::Format(format!("pubkey must be 32 bytes, got {}", bytes.len())))
}

#[inline]
fn to_signature(bytes: &[u8]) -> Result<Signature> {
    let array: [u8; 64] = bytes.try_into().map_err(|_| {
        IndexerError::Format(format!("signature must be 64 bytes, got {}", bytes.len()))
    })?;
    Ok(Signature::from(array))
}
