//! Environment configuration
//!
//! Values come from the process environment, optionally seeded from a `.env`
//! file. `local` and `test` environments always write to the local Hasura
//! instance.

use crate::batch::{BatchConfig, ProcessingMode};
use crate::error::{IndexerError, Result};
use crate::grpc::ClientConfig;
use std::collections::HashMap;
use std::str::FromStr;

pub const GRPC_PORT: u16 = 10000;
pub const LOCAL_HASURA_URL: &str = "http://localhost:8090";
pub const LOCAL_HASURA_SECRET: &str = "password";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Local,
    Test,
    Production,
}

impl FromStr for Environment {
    type Err = IndexerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "local" => Ok(Environment::Local),
            "test" => Ok(Environment::Test),
            "production" => Ok(Environment::Production),
            other => Err(IndexerError::Config(format!("invalid NODE_ENV {:?}", other))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct IndexerConfig {
    pub environment: Environment,
    pub hasura_url: String,
    pub hasura_admin_secret: String,
    pub quicknode_endpoint: String,
    pub quicknode_token: String,
    pub jupiter_url: String,
    pub batch: BatchConfig,
    pub client: ClientConfig,
}

impl IndexerConfig {
    /// Load `.env` (if present) and read the process environment.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_vars(&std::env::vars().collect())
    }

    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self> {
        let get = |key: &str| vars.get(key).map(String::as_str).filter(|v| !v.is_empty());
        let required = |key: &str| {
            get(key)
                .map(str::to_string)
                .ok_or_else(|| IndexerError::Config(format!("missing environment variable {}", key)))
        };

        let environment = get("NODE_ENV").map(Environment::from_str).transpose()?.unwrap_or_default();

        let batch = BatchConfig {
            processing_mode: get("PROCESSING_MODE")
                .map(ProcessingMode::from_str)
                .transpose()?
                .unwrap_or_default(),
            max_batch_size: parse_or(get("MAX_BATCH_SIZE"), "MAX_BATCH_SIZE", 100)?,
            min_batch_frequency_ms: parse_or(get("MIN_BATCH_FREQUENCY"), "MIN_BATCH_FREQUENCY", 500)?,
            max_concurrent_flushes: parse_or(
                get("MAX_CONCURRENT_FLUSHES"),
                "MAX_CONCURRENT_FLUSHES",
                8,
            )?,
        };
        if batch.max_batch_size == 0 {
            return Err(IndexerError::Config("MAX_BATCH_SIZE must be at least 1".to_string()));
        }

        Ok(Self {
            environment,
            hasura_url: get("HASURA_URL").unwrap_or(LOCAL_HASURA_URL).to_string(),
            hasura_admin_secret: required("HASURA_ADMIN_SECRET")?,
            quicknode_endpoint: required("QUICKNODE_ENDPOINT")?
                .trim_end_matches('/')
                .to_string(),
            quicknode_token: required("QUICKNODE_TOKEN")?,
            jupiter_url: required("JUPITER_URL")?,
            batch,
            client: ClientConfig::default(),
        })
    }

    pub fn grpc_endpoint(&self) -> String {
        format!("{}:{}", self.quicknode_endpoint, GRPC_PORT)
    }

    /// JSON-RPC endpoint, also serving the DAS API.
    pub fn rpc_url(&self) -> String {
        format!("{}/{}", self.quicknode_endpoint, self.quicknode_token)
    }

    /// Hasura base URL and admin secret for this environment.
    pub fn hasura(&self) -> (&str, &str) {
        match self.environment {
            Environment::Production => (&self.hasura_url, &self.hasura_admin_secret),
            Environment::Local | Environment::Test => (LOCAL_HASURA_URL, LOCAL_HASURA_SECRET),
        }
    }
}

fn parse_or<T: FromStr>(value: Option<&str>, key: &str, default: T) -> Result<T> {
    match value {
        None => Ok(default),
        Some(v) => v
            .parse()
            .map_err(|_| IndexerError::Config(format!("{} must be a number, got {:?}", key, v))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(extra: &[(&str, &str)]) -> HashMap<String, String> {
        let mut vars: HashMap<String, String> = [
            ("HASURA_ADMIN_SECRET", "secret"),
            ("QUICKNODE_ENDPOINT", "https://example.solana-mainnet.quiknode.pro"),
            ("QUICKNODE_TOKEN", "abc123"),
            ("JUPITER_URL", "https://api.jup.ag/price/v2"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        for (k, v) in extra {
            vars.insert(k.to_string(), v.to_string());
        }
        vars
    }

    #[test]
    fn test_defaults() {
        let config = IndexerConfig::from_vars(&vars(&[])).unwrap();

        assert_eq!(config.environment, Environment::Local);
        assert_eq!(config.batch.processing_mode, ProcessingMode::Parallel);
        assert_eq!(config.batch.max_batch_size, 100);
        assert_eq!(config.batch.min_batch_frequency_ms, 500);
        assert_eq!(config.batch.max_concurrent_flushes, 8);
        assert_eq!(config.grpc_endpoint(), "https://example.solana-mainnet.quiknode.pro:10000");
        assert_eq!(config.rpc_url(), "https://example.solana-mainnet.quiknode.pro/abc123");
        assert_eq!(config.hasura(), (LOCAL_HASURA_URL, LOCAL_HASURA_SECRET));
    }

    #[test]
    fn test_production_uses_configured_hasura() {
        let config = IndexerConfig::from_vars(&vars(&[
            ("NODE_ENV", "production"),
            ("HASURA_URL", "https://hasura.internal"),
            ("PROCESSING_MODE", "queue"),
            ("MAX_BATCH_SIZE", "50"),
        ]))
        .unwrap();

        assert_eq!(config.hasura(), ("https://hasura.internal", "secret"));
        assert_eq!(config.batch.processing_mode, ProcessingMode::Queue);
        assert_eq!(config.batch.max_batch_size, 50);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let mut missing = vars(&[]);
        missing.remove("QUICKNODE_TOKEN");
        assert!(IndexerConfig::from_vars(&missing).is_err());

        assert!(IndexerConfig::from_vars(&vars(&[("MAX_BATCH_SIZE", "many")])).is_err());
        assert!(IndexerConfig::from_vars(&vars(&[("MAX_BATCH_SIZE", "0")])).is_err());
        assert!(IndexerConfig::from_vars(&vars(&[("NODE_ENV", "staging")])).is_err());
        assert!(IndexerConfig::from_vars(&vars(&[("PROCESSING_MODE", "batch")])).is_err());
    }
}
