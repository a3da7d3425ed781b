//! Instruction flattener
//!
//! Rebuilds the execution trace of a transaction: top-level instructions
//! interleaved with the CPI instructions they triggered, with every account
//! index resolved to an [`AccountMeta`].

use super::transaction::*;
use crate::error::{IndexerError, Result};
use solana_sdk::pubkey::Pubkey;

/// Resolve every account position of the message.
///
/// Static keys get their flags from the header partitions; for v0 messages the
/// lookup-table writable accounts follow, then the lookup-table readonly ones.
pub fn resolve_accounts(
    message: &CanonicalMessage,
    loaded: Option<&LoadedAddresses>,
) -> Vec<AccountMeta> {
    let total = message.account_keys.len();
    let required = message.header.num_required_signatures as usize;
    let readonly_signed = message.header.num_readonly_signed_accounts as usize;
    let readonly_unsigned = message.header.num_readonly_unsigned_accounts as usize;

    let mut accounts: Vec<AccountMeta> = message
        .account_keys
        .iter()
        .enumerate()
        .map(|(idx, pubkey)| {
            let is_writable = idx < required.saturating_sub(readonly_signed)
                || (idx >= required && idx < total.saturating_sub(readonly_unsigned));
            AccountMeta { pubkey: *pubkey, is_signer: idx < required, is_writable }
        })
        .collect();

    if message.version == MessageVersion::V0 {
        if let Some(loaded) = loaded {
            accounts.reserve(loaded.writable.len() + loaded.readonly.len());
            accounts.extend(loaded.writable.iter().map(|pubkey| AccountMeta {
                pubkey: *pubkey,
                is_signer: false,
                is_writable: true,
            }));
            accounts.extend(loaded.readonly.iter().map(|pubkey| AccountMeta {
                pubkey: *pubkey,
                is_signer: false,
                is_writable: false,
            }));
        }
    }

    accounts
}

/// Flatten a transaction into its full ordered instruction list.
///
/// The output length is the number of top-level instructions plus the number
/// of inner instructions whose owning top-level instruction exists.
pub fn flatten(tx: &CanonicalTransaction) -> Result<Vec<FlattenedInstruction>> {
    let accounts = resolve_accounts(&tx.message, tx.meta.loaded_addresses.as_ref());
    let top_level = &tx.message.instructions;

    let mut groups: Vec<&InnerInstructionGroup> = tx.meta.inner_instructions.iter().collect();
    groups.sort_by_key(|group| group.index);

    let inner_count: usize = groups.iter().map(|g| g.instructions.len()).sum();
    let mut result = Vec::with_capacity(top_level.len() + inner_count);

    // Next top-level instruction to emit. Only ever moves forward.
    let mut cursor = 0usize;

    for group in groups {
        while cursor <= group.index && cursor < top_level.len() {
            result.push(to_flattened(&top_level[cursor], &accounts, None)?);
            cursor += 1;
        }

        let Some(parent) = top_level.get(group.index) else {
            log::debug!(
                "Skipping {} inner instructions of missing top-level instruction {}",
                group.instructions.len(),
                group.index
            );
            continue;
        };
        let parent_program_id = program_id(parent, &accounts)?;

        for ix in &group.instructions {
            result.push(to_flattened(ix, &accounts, Some(parent_program_id))?);
        }
    }

    while cursor < top_level.len() {
        result.push(to_flattened(&top_level[cursor], &accounts, None)?);
        cursor += 1;
    }

    Ok(result)
}

#[inline]
fn program_id(ix: &CompiledInstruction, accounts: &[AccountMeta]) -> Result<Pubkey> {
    accounts
        .get(ix.program_id_index)
        .map(|meta| meta.pubkey)
        .ok_or(IndexerError::AccountIndexOutOfRange {
            index: ix.program_id_index,
            len: accounts.len(),
        })
}

fn to_flattened(
    ix: &CompiledInstruction,
    accounts: &[AccountMeta],
    parent_program_id: Option<Pubkey>,
) -> Result<FlattenedInstruction> {
    let keys = ix
        .accounts
        .iter()
        .map(|&idx| {
            accounts.get(idx as usize).copied().ok_or(IndexerError::AccountIndexOutOfRange {
                index: idx as usize,
                len: accounts.len(),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(FlattenedInstruction {
        program_id: program_id(ix, accounts)?,
        accounts: keys,
        data: ix.data.clone(),
        parent_program_id,
    })
}
