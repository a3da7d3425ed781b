use crate::instr::program_ids::RAYDIUM_AMM_V4_PROGRAM_ID_STR;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Connection timeout (ms); 0 disables it
    pub connection_timeout_ms: u64,
    /// Use TLS with the platform's native roots
    pub enable_tls: bool,
    /// Fixed pause between a failed cycle and the next connection attempt
    pub reconnect_delay_ms: u64,
    pub max_decoding_message_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connection_timeout_ms: 8000,
            enable_tls: true,
            reconnect_delay_ms: 1000,
            max_decoding_message_size: 1024 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionFilter {
    pub account_include: Vec<String>,
    pub account_exclude: Vec<String>,
    pub account_required: Vec<String>,
    pub vote: Option<bool>,
    pub failed: Option<bool>,
}

impl TransactionFilter {
    /// Non-vote, successful transactions only.
    pub fn new() -> Self {
        Self {
            account_include: Vec::new(),
            account_exclude: Vec::new(),
            account_required: Vec::new(),
            vote: Some(false),
            failed: Some(false),
        }
    }

    /// Every successful, non-vote transaction touching the Raydium AMM V4 program.
    pub fn raydium_amm() -> Self {
        Self::new().include_account(RAYDIUM_AMM_V4_PROGRAM_ID_STR)
    }

    pub fn include_account(mut self, account: impl Into<String>) -> Self {
        self.account_include.push(account.into());
        self
    }
}

impl Default for TransactionFilter {
    fn default() -> Self {
        Self::new()
    }
}
