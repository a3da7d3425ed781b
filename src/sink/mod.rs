//! Trade persistence
//!
//! Trades are written as `api.trade_history` rows. Token metadata travels as a
//! PostgreSQL composite literal so the whole row fits one bulk insert.

pub mod hasura;

pub use hasura::HasuraSink;

use crate::enrich::Trade;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat};
use serde::Serialize;

pub const MAX_NAME_LEN: usize = 255;
pub const MAX_SYMBOL_LEN: usize = 10;

#[async_trait]
pub trait TradeSink: Send + Sync {
    /// Insert the trades and return the number of affected rows.
    async fn insert_trades(&self, trades: &[Trade]) -> Result<u64>;
}

/// `api_trade_history_insert_input`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeRow {
    pub token_mint: String,
    pub volume_usd: String,
    pub token_price_usd: String,
    pub created_at: String,
    pub token_metadata: String,
}

impl From<&Trade> for TradeRow {
    fn from(trade: &Trade) -> Self {
        let m = &trade.metadata;
        let token_metadata = to_pg_composite(&[
            CompositeValue::text(truncate(&m.name, MAX_NAME_LEN)),
            CompositeValue::text(truncate(&m.symbol, MAX_SYMBOL_LEN)),
            CompositeValue::text(&m.description),
            CompositeValue::opt_text(m.image_uri.as_deref()),
            CompositeValue::opt_text(m.external_url.as_deref()),
            CompositeValue::text(&trade.token_decimals.to_string()),
            m.supply.map_or(CompositeValue::Null, |s| CompositeValue::Number(s.to_string())),
            CompositeValue::Bool(m.is_pump_token),
        ]);

        TradeRow {
            token_mint: trade.mint.to_string(),
            volume_usd: volume_usd(trade).to_string(),
            token_price_usd: trade.price_usd.to_string(),
            created_at: format_timestamp(trade.timestamp),
            token_metadata,
        }
    }
}

/// USD value of the traded amount.
pub fn volume_usd(trade: &Trade) -> f64 {
    trade.amount as f64 * trade.price_usd / 10f64.powi(trade.token_decimals as i32)
}

fn format_timestamp(timestamp_ms: i64) -> String {
    DateTime::from_timestamp_millis(timestamp_ms)
        .unwrap_or_default()
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// One field of a composite literal.
#[derive(Debug, Clone, PartialEq)]
pub enum CompositeValue {
    Null,
    Text(String),
    Number(String),
    Bool(bool),
}

impl CompositeValue {
    pub fn text(s: &str) -> Self {
        CompositeValue::Text(s.to_string())
    }

    pub fn opt_text(s: Option<&str>) -> Self {
        s.map_or(CompositeValue::Null, Self::text)
    }
}

/// Render `(v1,v2,...)`. Text is double-quoted with backslash escapes, nulls are empty.
pub fn to_pg_composite(values: &[CompositeValue]) -> String {
    let fields: Vec<String> = values
        .iter()
        .map(|value| match value {
            CompositeValue::Null => String::new(),
            CompositeValue::Text(s) => format!("\"{}\"", escape(s)),
            CompositeValue::Number(n) => n.clone(),
            CompositeValue::Bool(b) => b.to_string(),
        })
        .collect();
    format!("({})", fields.join(","))
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::TokenMetadata;
    use solana_sdk::pubkey::Pubkey;

    fn trade(metadata: TokenMetadata) -> Trade {
        Trade {
            mint: Pubkey::new_from_array([1; 32]),
            price_usd: 0.5,
            amount: 2_500_000,
            token_decimals: 6,
            metadata,
            timestamp: 1_700_000_000_123,
        }
    }

    #[test]
    fn test_composite_escaping() {
        let literal = to_pg_composite(&[
            CompositeValue::text("a \"quoted\"\\path"),
            CompositeValue::text("line\nbreak\ttab\r"),
            CompositeValue::Null,
            CompositeValue::Number("42".into()),
            CompositeValue::Bool(false),
        ]);
        assert_eq!(
            literal,
            r#"("a \"quoted\"\\path","line\nbreak\ttab\r",,42,false)"#
        );
    }

    #[test]
    fn test_trade_row() {
        let row = TradeRow::from(&trade(TokenMetadata {
            name: "Token".into(),
            symbol: "TKN".into(),
            description: "".into(),
            image_uri: Some("https://img".into()),
            external_url: None,
            supply: Some(1_000),
            is_pump_token: true,
        }));

        assert_eq!(row.token_mint, Pubkey::new_from_array([1; 32]).to_string());
        assert_eq!(row.volume_usd, "1.25");
        assert_eq!(row.token_price_usd, "0.5");
        assert_eq!(row.created_at, "2023-11-14T22:13:20.123Z");
        assert_eq!(row.token_metadata, r#"("Token","TKN","","https://img",,"6",1000,true)"#);
    }

    #[test]
    fn test_name_and_symbol_truncated() {
        let row = TradeRow::from(&trade(TokenMetadata {
            name: "n".repeat(300),
            symbol: "ÄBCDEFGHIJKLMNOP".into(),
            ..Default::default()
        }));

        let expected = format!(r#"("{}","ÄBCDEFGHIJ","",,,"6",,false)"#, "n".repeat(255));
        assert_eq!(row.token_metadata, expected);
    }
}
