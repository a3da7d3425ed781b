//! Hasura GraphQL sink

use super::{TradeRow, TradeSink};
use crate::enrich::Trade;
use crate::error::{IndexerError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

pub const INSERT_TRADE_HISTORY_MANY: &str = "mutation InsertTradeHistoryMany($trades: [api_trade_history_insert_input!]!) {
  insert_api_trade_history(objects: $trades) {
    affected_rows
  }
}";

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<InsertData>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct InsertData {
    insert_api_trade_history: Option<AffectedRows>,
}

#[derive(Debug, Deserialize)]
struct AffectedRows {
    affected_rows: u64,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

pub struct HasuraSink {
    graphql_url: String,
    admin_secret: String,
    http: reqwest::Client,
}

impl HasuraSink {
    /// `base_url` without the `/v1/graphql` path.
    pub fn new(base_url: &str, admin_secret: impl Into<String>) -> Self {
        Self {
            graphql_url: format!("{}/v1/graphql", base_url.trim_end_matches('/')),
            admin_secret: admin_secret.into(),
            http: reqwest::Client::new(),
        }
    }

    pub fn graphql_url(&self) -> &str {
        &self.graphql_url
    }
}

fn affected_rows(response: GraphQlResponse) -> Result<u64> {
    if !response.errors.is_empty() {
        let messages: Vec<String> = response.errors.into_iter().map(|e| e.message).collect();
        return Err(IndexerError::Sink(messages.join("; ")));
    }
    Ok(response
        .data
        .and_then(|d| d.insert_api_trade_history)
        .map_or(0, |r| r.affected_rows))
}

#[async_trait]
impl TradeSink for HasuraSink {
    async fn insert_trades(&self, trades: &[Trade]) -> Result<u64> {
        if trades.is_empty() {
            return Ok(0);
        }
        let rows: Vec<TradeRow> = trades.iter().map(TradeRow::from).collect();
        let body = json!({
            "query": INSERT_TRADE_HISTORY_MANY,
            "operationName": "InsertTradeHistoryMany",
            "variables": { "trades": rows },
        });

        let response = self
            .http
            .post(&self.graphql_url)
            .header("x-hasura-admin-secret", &self.admin_secret)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json::<GraphQlResponse>()
            .await?;

        affected_rows(response)
    }
}
