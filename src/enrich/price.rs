//! Jupiter price lookup

use super::retry::{with_retry, RetryPolicy};
use super::PriceSource;
use crate::error::Result;
use async_trait::async_trait;
use log::debug;
use serde::Deserialize;
use solana_sdk::pubkey::Pubkey;
use std::collections::HashMap;
use std::str::FromStr;

#[derive(Debug, Deserialize)]
pub struct PriceResponse {
    #[serde(default)]
    pub data: HashMap<String, Option<PriceEntry>>,
}

#[derive(Debug, Deserialize)]
pub struct PriceEntry {
    pub price: PriceValue,
}

/// Jupiter has served prices both as JSON numbers and as decimal strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PriceValue {
    Number(f64),
    Text(String),
}

impl PriceValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PriceValue::Number(n) => Some(*n),
            PriceValue::Text(s) => s.parse().ok(),
        }
    }
}

impl PriceResponse {
    /// Usable prices keyed by mint. Unindexed (`null`) and unparseable entries are skipped.
    pub fn into_prices(self) -> HashMap<Pubkey, f64> {
        self.data
            .into_iter()
            .filter_map(|(id, entry)| {
                let price = entry?.price.as_f64()?;
                match Pubkey::from_str(&id) {
                    Ok(mint) => Some((mint, price)),
                    Err(_) => {
                        debug!("Ignoring price for invalid mint {}", id);
                        None
                    }
                }
            })
            .collect()
    }
}

pub struct JupiterPriceClient {
    base_url: String,
    http: reqwest::Client,
    retry: RetryPolicy,
}

impl JupiterPriceClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, reqwest::Client::new(), RetryPolicy::fast())
    }

    pub fn with_client(base_url: impl Into<String>, http: reqwest::Client, retry: RetryPolicy) -> Self {
        Self { base_url: base_url.into().trim_end_matches('/').to_string(), http, retry }
    }

    pub fn price_url(&self, mints: &[Pubkey]) -> String {
        let ids: Vec<String> = mints.iter().map(|m| m.to_string()).collect();
        format!("{}/price?ids={}", self.base_url, ids.join(","))
    }

    async fn fetch(&self, url: &str) -> Result<PriceResponse> {
        let response = self
            .http
            .get(url)
            .header("Content-Type", "application/json")
            .send()
            .await?
            .error_for_status()?
            .json::<PriceResponse>()
            .await?;
        Ok(response)
    }
}

#[async_trait]
impl PriceSource for JupiterPriceClient {
    async fn prices(&self, mints: &[Pubkey]) -> Result<HashMap<Pubkey, f64>> {
        let url = self.price_url(mints);
        let response = with_retry(self.retry, "Jupiter price lookup", || self.fetch(&url)).await?;
        Ok(response.into_prices())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instr::program_ids::WRAPPED_SOL_MINT;

    #[test]
    fn test_number_string_and_null_prices() {
        let mint_a = Pubkey::new_from_array([1; 32]);
        let mint_b = Pubkey::new_from_array([2; 32]);
        let body = serde_json::json!({
            "data": {
                mint_a.to_string(): { "id": mint_a.to_string(), "price": 1.25 },
                mint_b.to_string(): { "id": mint_b.to_string(), "type": "derivedPrice", "price": "0.000042" },
                WRAPPED_SOL_MINT.to_string(): null
            },
            "timeTaken": 0.003
        });

        let prices = serde_json::from_value::<PriceResponse>(body).unwrap().into_prices();
        assert_eq!(prices.len(), 2);
        assert_eq!(prices[&mint_a], 1.25);
        assert!((prices[&mint_b] - 0.000042).abs() < f64::EPSILON);
    }

    #[test]
    fn test_price_url() {
        let client = JupiterPriceClient::new("https://api.jup.ag/price/v2/");
        let url = client.price_url(&[WRAPPED_SOL_MINT, WRAPPED_SOL_MINT]);
        assert_eq!(
            url,
            format!("https://api.jup.ag/price/v2/price?ids={},{}", WRAPPED_SOL_MINT, WRAPPED_SOL_MINT)
        );
    }
}
