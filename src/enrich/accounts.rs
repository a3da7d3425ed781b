//! Vault account lookup
//!
//! Pool vaults are plain SPL Token accounts. They are fetched with
//! `jsonParsed` encoding so the node resolves the mint decimals for us.

use super::retry::{with_retry, RetryPolicy};
use super::AccountLookup;
use crate::error::{IndexerError, Result};
use async_trait::async_trait;
use log::debug;
use serde::Deserialize;
use serde_json::json;
use solana_account_decoder::parse_account_data::ParsedAccount;
use solana_account_decoder::{UiAccount, UiAccountData};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_rpc_client_api::client_error::{Error as ClientError, ErrorKind as ClientErrorKind};
use solana_rpc_client_api::request::RpcRequest;
use solana_rpc_client_api::response::Response;
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;
use std::sync::Arc;

/// Max addresses accepted by one `getMultipleAccounts` call.
pub const MAX_ACCOUNTS_PER_REQUEST: usize = 100;

/// Token account fields the enrichment needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenAccountInfo {
    pub mint: Pubkey,
    pub owner: Pubkey,
    pub amount: u64,
    pub decimals: u8,
}

#[derive(Debug, Deserialize)]
struct ParsedTokenAccount {
    info: ParsedTokenAccountInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ParsedTokenAccountInfo {
    mint: String,
    owner: String,
    token_amount: ParsedTokenAmount,
}

#[derive(Debug, Deserialize)]
struct ParsedTokenAmount {
    amount: String,
    decimals: u8,
}

/// Extract the token account fields from a `jsonParsed` account.
///
/// Returns `None` for accounts that are not parsed token accounts.
pub fn token_account_info(account: &UiAccount) -> Option<TokenAccountInfo> {
    let UiAccountData::Json(ParsedAccount { parsed, .. }) = &account.data else {
        return None;
    };
    let parsed: ParsedTokenAccount = serde_json::from_value(parsed.clone()).ok()?;
    Some(TokenAccountInfo {
        mint: Pubkey::from_str(&parsed.info.mint).ok()?,
        owner: Pubkey::from_str(&parsed.info.owner).ok()?,
        amount: parsed.info.token_amount.amount.parse().ok()?,
        decimals: parsed.info.token_amount.decimals,
    })
}

pub struct RpcAccountLookup {
    rpc: Arc<RpcClient>,
    retry: RetryPolicy,
}

impl RpcAccountLookup {
    pub fn new(rpc_url: impl Into<String>) -> Self {
        Self::with_client(Arc::new(RpcClient::new(rpc_url.into())), RetryPolicy::default())
    }

    pub fn with_client(rpc: Arc<RpcClient>, retry: RetryPolicy) -> Self {
        Self { rpc, retry }
    }

    async fn get_multiple_parsed_accounts(
        &self,
        keys: &[String],
    ) -> Result<Vec<Option<UiAccount>>> {
        let params = json!([keys, { "encoding": "jsonParsed", "commitment": "confirmed" }]);
        let response: Response<Vec<Option<UiAccount>>> = self
            .rpc
            .send(RpcRequest::GetMultipleAccounts, params)
            .await
            .map_err(client_error)?;
        Ok(response.value)
    }
}

#[async_trait]
impl AccountLookup for RpcAccountLookup {
    async fn token_accounts(&self, keys: &[Pubkey]) -> Result<Vec<Option<TokenAccountInfo>>> {
        if keys.len() > MAX_ACCOUNTS_PER_REQUEST {
            return Err(IndexerError::Rpc(format!(
                "getMultipleAccounts takes at most {} addresses, got {}",
                MAX_ACCOUNTS_PER_REQUEST,
                keys.len()
            )));
        }
        let keys: Vec<String> = keys.iter().map(|k| k.to_string()).collect();

        let accounts =
            with_retry(self.retry, "getMultipleAccounts", || self.get_multiple_parsed_accounts(&keys))
                .await?;

        Ok(accounts
            .iter()
            .zip(&keys)
            .map(|(account, key)| {
                let info = account.as_ref().and_then(token_account_info);
                if info.is_none() {
                    debug!("{} is not a parsed token account", key);
                }
                info
            })
            .collect())
    }
}

fn client_error(e: ClientError) -> IndexerError {
    match e.kind() {
        ClientErrorKind::Io(_) | ClientErrorKind::Reqwest(_) => IndexerError::Network(e.to_string()),
        _ => IndexerError::Rpc(e.to_string()),
    }
}
