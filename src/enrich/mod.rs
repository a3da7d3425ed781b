//! Enrichment stage
//!
//! Turns raw [`Swap`]s into priced [`Trade`]s:
//!
//! 1. vault accounts are looked up in chunks of 50 swaps (two accounts each);
//! 2. swaps not traded against wrapped SOL, or whose token vault moved nothing, are dropped;
//! 3. prices and metadata for the distinct traded mints are fetched in chunks of 49,
//!    both lookups of a chunk running concurrently;
//! 4. swaps without a price are dropped, missing metadata is left empty.

pub mod accounts;
pub mod metadata;
pub mod price;
pub mod retry;

pub use accounts::{RpcAccountLookup, TokenAccountInfo};
pub use metadata::{format_token_metadata, DasMetadataClient, TokenMetadata};
pub use price::JupiterPriceClient;
pub use retry::{with_retry, RetryPolicy};

use crate::core::swap::Swap;
use crate::error::Result;
use crate::instr::program_ids::WRAPPED_SOL_MINT;
use async_trait::async_trait;
use futures::future::{try_join, try_join_all};
use log::debug;
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::time::Instant;

/// Swaps per account lookup (two vaults each, 100 addresses per call).
pub const SWAPS_PER_ACCOUNT_LOOKUP: usize = 50;

/// Mints per price/metadata request. Larger price requests get much slower.
pub const MINTS_PER_PRICE_LOOKUP: usize = 49;

#[async_trait]
pub trait AccountLookup: Send + Sync {
    /// One entry per key, in order; `None` when the account is missing or not a token account.
    async fn token_accounts(&self, keys: &[Pubkey]) -> Result<Vec<Option<TokenAccountInfo>>>;
}

#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn prices(&self, mints: &[Pubkey]) -> Result<HashMap<Pubkey, f64>>;
}

#[async_trait]
pub trait MetadataSource: Send + Sync {
    async fn metadata(&self, mints: &[Pubkey]) -> Result<HashMap<Pubkey, TokenMetadata>>;
}

/// A swap priced in USD.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    /// The non-SOL token of the pool
    pub mint: Pubkey,
    pub price_usd: f64,
    /// Raw token amount moved through the token vault
    pub amount: u64,
    pub token_decimals: u8,
    pub metadata: TokenMetadata,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Default)]
pub struct Enrichment {
    pub trades: Vec<Trade>,
    pub accounts_latency: Duration,
    pub prices_latency: Duration,
}

#[async_trait]
pub trait Enricher: Send + Sync {
    async fn enrich(&self, swaps: &[Swap]) -> Result<Enrichment>;
}

/// A swap whose traded token is known.
#[derive(Debug, Clone, Copy)]
struct ResolvedSwap {
    mint: Pubkey,
    amount: u64,
    decimals: u8,
    timestamp: i64,
}

pub struct EnrichmentStage<A, P, M> {
    accounts: A,
    prices: P,
    metadata: M,
}

impl<A, P, M> EnrichmentStage<A, P, M>
where
    A: AccountLookup,
    P: PriceSource,
    M: MetadataSource,
{
    pub fn new(accounts: A, prices: P, metadata: M) -> Self {
        Self { accounts, prices, metadata }
    }

    async fn resolve_swaps(&self, swaps: &[Swap]) -> Result<Vec<ResolvedSwap>> {
        let lookups = swaps.chunks(SWAPS_PER_ACCOUNT_LOOKUP).map(|chunk| async move {
            let keys: Vec<Pubkey> = chunk.iter().flat_map(|s| [s.vault_a, s.vault_b]).collect();
            let infos = self.accounts.token_accounts(&keys).await?;
            let resolved: Vec<ResolvedSwap> = chunk
                .iter()
                .enumerate()
                .filter_map(|(i, swap)| {
                    resolve_swap(
                        swap,
                        infos.get(2 * i).copied().flatten(),
                        infos.get(2 * i + 1).copied().flatten(),
                    )
                })
                .collect();
            Ok::<_, crate::error::IndexerError>(resolved)
        });

        Ok(try_join_all(lookups).await?.into_iter().flatten().collect())
    }

    async fn lookup_mints(
        &self,
        mints: &[Pubkey],
    ) -> Result<(HashMap<Pubkey, f64>, HashMap<Pubkey, TokenMetadata>)> {
        let batches = mints
            .chunks(MINTS_PER_PRICE_LOOKUP)
            .map(|batch| try_join(self.prices.prices(batch), self.metadata.metadata(batch)));

        let mut prices = HashMap::with_capacity(mints.len());
        let mut metadata = HashMap::with_capacity(mints.len());
        for (batch_prices, batch_metadata) in try_join_all(batches).await? {
            prices.extend(batch_prices);
            metadata.extend(batch_metadata);
        }
        Ok((prices, metadata))
    }
}

fn resolve_swap(
    swap: &Swap,
    a: Option<TokenAccountInfo>,
    b: Option<TokenAccountInfo>,
) -> Option<ResolvedSwap> {
    let (a, b) = (a?, b?);
    let (token, token_vault) = if a.mint == WRAPPED_SOL_MINT {
        (b, swap.vault_b)
    } else if b.mint == WRAPPED_SOL_MINT {
        (a, swap.vault_a)
    } else {
        debug!("Skipping swap on {}: not traded against wrapped SOL", swap.vault_a);
        return None;
    };

    let amount = swap.amount_through(&token_vault).filter(|amount| *amount > 0)?;
    Some(ResolvedSwap {
        mint: token.mint,
        amount,
        decimals: token.decimals,
        timestamp: swap.timestamp,
    })
}

#[async_trait]
impl<A, P, M> Enricher for EnrichmentStage<A, P, M>
where
    A: AccountLookup,
    P: PriceSource,
    M: MetadataSource,
{
    async fn enrich(&self, swaps: &[Swap]) -> Result<Enrichment> {
        if swaps.is_empty() {
            return Ok(Enrichment::default());
        }

        let started = Instant::now();
        let resolved = self.resolve_swaps(swaps).await?;
        let accounts_latency = started.elapsed();

        let mut seen = HashSet::new();
        let mints: Vec<Pubkey> =
            resolved.iter().map(|r| r.mint).filter(|mint| seen.insert(*mint)).collect();

        let started = Instant::now();
        let (prices, metadata) = if mints.is_empty() {
            (HashMap::new(), HashMap::new())
        } else {
            self.lookup_mints(&mints).await?
        };
        let prices_latency = started.elapsed();

        let trades = resolved
            .into_iter()
            .filter_map(|r| {
                let Some(price_usd) = prices.get(&r.mint).copied() else {
                    debug!("No price for {}, dropping trade", r.mint);
                    return None;
                };
                Some(Trade {
                    mint: r.mint,
                    price_usd,
                    amount: r.amount,
                    token_decimals: r.decimals,
                    metadata: metadata.get(&r.mint).cloned().unwrap_or_default(),
                    timestamp: r.timestamp,
                })
            })
            .collect();

        Ok(Enrichment { trades, accounts_latency, prices_latency })
    }
}
