//! Token metadata from the DAS `getAssets` API

use super::retry::{with_retry, RetryPolicy};
use super::MetadataSource;
use crate::error::{IndexerError, Result};
use crate::instr::program_ids::PUMP_FUN_AUTHORITY;
use async_trait::async_trait;
use log::{debug, warn};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::json;
use solana_sdk::pubkey::Pubkey;
use std::collections::HashMap;
use std::str::FromStr;

/// Best-effort description of a traded token. Every field may be empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenMetadata {
    pub name: String,
    pub symbol: String,
    pub description: String,
    pub image_uri: Option<String>,
    pub external_url: Option<String>,
    pub supply: Option<u64>,
    pub is_pump_token: bool,
}

/// Raw `getAssets` reply. Entries are decoded one by one in
/// [`GetAssetsResponse::into_metadata`], so a malformed asset only loses its own metadata.
#[derive(Debug, Deserialize)]
pub struct GetAssetsResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub result: Vec<serde_json::Value>,
    pub error: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DasAsset {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub content: DasContent,
    #[serde(default, deserialize_with = "null_as_default")]
    pub authorities: Vec<DasAuthority>,
    pub token_info: Option<DasTokenInfo>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DasContent {
    #[serde(default, deserialize_with = "null_as_default")]
    pub files: Vec<DasFile>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub metadata: DasMetadata,
    pub links: Option<DasLinks>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DasMetadata {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub symbol: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DasFile {
    #[serde(default, deserialize_with = "null_as_default")]
    pub uri: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub mime: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DasLinks {
    pub image: Option<String>,
    pub external_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DasAuthority {
    pub address: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DasTokenInfo {
    pub supply: Option<u64>,
}

/// DAS returns `null` for unset fields as often as it omits them.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Shape an asset into [`TokenMetadata`]; an unindexed token gets empty metadata.
pub fn format_token_metadata(asset: Option<&DasAsset>) -> TokenMetadata {
    let Some(asset) = asset else {
        return TokenMetadata::default();
    };
    let content = &asset.content;
    let links = content.links.as_ref();

    let image_uri = links.and_then(|l| l.image.clone()).or_else(|| {
        content
            .files
            .iter()
            .find(|f| f.mime.starts_with("image") && !f.uri.is_empty())
            .map(|f| f.uri.clone())
    });

    let pump_authority = PUMP_FUN_AUTHORITY.to_string();

    TokenMetadata {
        name: content.metadata.name.clone(),
        symbol: content.metadata.symbol.clone(),
        description: content.metadata.description.clone(),
        image_uri,
        external_url: links.and_then(|l| l.external_url.clone()),
        supply: asset.token_info.as_ref().and_then(|t| t.supply),
        is_pump_token: asset.authorities.iter().any(|a| a.address == pump_authority),
    }
}

impl GetAssetsResponse {
    /// Metadata keyed by mint.
    ///
    /// `null` results (assets not indexed yet) and assets that fail to decode are
    /// skipped; their mints end up with empty metadata.
    pub fn into_metadata(self) -> HashMap<Pubkey, TokenMetadata> {
        self.result
            .into_iter()
            .filter(|value| !value.is_null())
            .filter_map(|value| match serde_json::from_value::<DasAsset>(value) {
                Ok(asset) => Some(asset),
                Err(e) => {
                    warn!("Ignoring malformed DAS asset: {}", e);
                    None
                }
            })
            .filter_map(|asset| match Pubkey::from_str(&asset.id) {
                Ok(mint) => Some((mint, format_token_metadata(Some(&asset)))),
                Err(_) => {
                    debug!("Ignoring asset with invalid id {}", asset.id);
                    None
                }
            })
            .collect()
    }
}

pub struct DasMetadataClient {
    rpc_url: String,
    http: reqwest::Client,
    retry: RetryPolicy,
}

impl DasMetadataClient {
    pub fn new(rpc_url: impl Into<String>) -> Self {
        Self::with_client(rpc_url, reqwest::Client::new(), RetryPolicy::fast())
    }

    pub fn with_client(rpc_url: impl Into<String>, http: reqwest::Client, retry: RetryPolicy) -> Self {
        Self { rpc_url: rpc_url.into(), http, retry }
    }

    async fn fetch(&self, body: &serde_json::Value) -> Result<GetAssetsResponse> {
        let response = self
            .http
            .post(&self.rpc_url)
            .json(body)
            .send()
            .await?
            .error_for_status()?
            .json::<GetAssetsResponse>()
            .await?;
        Ok(response)
    }
}

#[async_trait]
impl MetadataSource for DasMetadataClient {
    async fn metadata(&self, mints: &[Pubkey]) -> Result<HashMap<Pubkey, TokenMetadata>> {
        let ids: Vec<String> = mints.iter().map(|m| m.to_string()).collect();
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "getAssets",
            "params": { "ids": ids, "options": { "showFungible": true } },
        });

        let response = with_retry(self.retry, "DAS getAssets", || self.fetch(&body)).await?;
        if let Some(error) = response.error {
            return Err(IndexerError::Rpc(format!("getAssets: {}", error)));
        }
        Ok(response.into_metadata())
    }
}
