use super::types::*;
use crate::batch::BatchManager;
use crate::core::SwapDecoder;
use crate::error::{IndexerError, Result};
use futures::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tonic::transport::ClientTlsConfig;
use yellowstone_grpc_client::GeyserGrpcClient;
use yellowstone_grpc_proto::prelude::*;

/// Owns the Yellowstone subscription and feeds every transaction into the batch manager.
///
/// Any connection, subscription or stream failure ends the current cycle; a new
/// cycle with a fresh connection id starts after `reconnect_delay_ms`, forever.
pub struct StreamSupervisor {
    endpoint: String,
    token: Option<String>,
    config: ClientConfig,
    filter: TransactionFilter,
    decoder: SwapDecoder,
    batch: Arc<BatchManager>,
    connections: AtomicU64,
}

impl StreamSupervisor {
    pub fn new(
        endpoint: String,
        token: Option<String>,
        config: ClientConfig,
        decoder: SwapDecoder,
        batch: Arc<BatchManager>,
    ) -> Self {
        Self {
            endpoint,
            token,
            config,
            filter: TransactionFilter::raydium_amm(),
            decoder,
            batch,
            connections: AtomicU64::new(0),
        }
    }

    /// `conn_1`, `conn_2`, ...
    pub fn next_connection_id(&self) -> String {
        format!("conn_{}", self.connections.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Run subscription cycles until the process exits.
    pub async fn run(&self) {
        let delay = Duration::from_millis(self.config.reconnect_delay_ms);
        loop {
            let connection_id = self.next_connection_id();
            info!("[{}] Starting new Geyser connection", connection_id);

            if let Err(e) = self.run_once(&connection_id).await {
                warn!("[{}] Error in indexer, restarting in {:?}...", connection_id, delay);
                error!("[{}] {}", connection_id, e);
            }
            tokio::time::sleep(delay).await;
        }
    }

    /// One connect → subscribe → consume cycle. Only returns on failure or stream end.
    pub async fn run_once(&self, connection_id: &str) -> Result<()> {
        let _ = rustls::crypto::ring::default_provider().install_default();

        let mut builder = GeyserGrpcClient::build_from_shared(self.endpoint.clone())
            .map_err(grpc_error)?
            .x_token(self.token.clone())
            .map_err(grpc_error)?
            .max_decoding_message_size(self.config.max_decoding_message_size);

        if self.config.connection_timeout_ms > 0 {
            builder =
                builder.connect_timeout(Duration::from_millis(self.config.connection_timeout_ms));
        }

        if self.config.enable_tls {
            let tls_config = ClientTlsConfig::new().with_native_roots();
            builder = builder.tls_config(tls_config).map_err(grpc_error)?;
        }

        debug!("[{}] Connecting to {}", connection_id, self.endpoint);
        let mut client = builder.connect().await.map_err(grpc_error)?;

        let (mut subscribe_tx, mut stream) = client
            .subscribe_with_request(Some(self.subscribe_request()))
            .await
            .map_err(grpc_error)?;
        info!(
            "[{}] Subscription started at {}",
            connection_id,
            chrono::Utc::now().to_rfc3339()
        );

        while let Some(message) = stream.next().await {
            let update = message.map_err(|status| {
                IndexerError::Grpc(format!("stream error: {}", status))
            })?;

            match update.update_oneof {
                Some(subscribe_update::UpdateOneof::Transaction(tx)) => {
                    self.handle_transaction(connection_id, &tx);
                }
                Some(subscribe_update::UpdateOneof::Ping(_)) => {
                    subscribe_tx
                        .send(SubscribeRequest {
                            ping: Some(SubscribeRequestPing { id: 1 }),
                            ..Default::default()
                        })
                        .await
                        .map_err(grpc_error)?;
                }
                _ => {}
            }
        }

        info!("[{}] Stream ended", connection_id);
        Err(IndexerError::StreamEnded)
    }

    pub fn subscribe_request(&self) -> SubscribeRequest {
        let mut transactions = HashMap::new();
        transactions.insert(
            "client".to_string(),
            SubscribeRequestFilterTransactions {
                vote: self.filter.vote,
                failed: self.filter.failed,
                signature: None,
                account_include: self.filter.account_include.clone(),
                account_exclude: self.filter.account_exclude.clone(),
                account_required: self.filter.account_required.clone(),
            },
        );

        SubscribeRequest {
            transactions,
            commitment: Some(CommitmentLevel::Confirmed as i32),
            ..Default::default()
        }
    }

    /// Decode one transaction and hand its swaps to the batch manager.
    ///
    /// Decode failures only drop this transaction.
    pub fn handle_transaction(&self, connection_id: &str, update: &SubscribeUpdateTransaction) {
        let timestamp = chrono::Utc::now().timestamp_millis();
        match self.decoder.decode(update, timestamp) {
            Ok(swaps) if swaps.is_empty() => {}
            Ok(swaps) => {
                self.batch.push(swaps);
                let batch = Arc::clone(&self.batch);
                tokio::spawn(async move {
                    batch.process_if_needed().await;
                });
            }
            Err(e) => {
                warn!(
                    "[{}] Dropping transaction at slot {}: {}",
                    connection_id, update.slot, e
                );
            }
        }
    }
}

fn grpc_error(e: impl std::fmt::Display) -> IndexerError {
    IndexerError::Grpc(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::BatchConfig;
    use crate::core::pipeline::tests::swap_update;
    use crate::core::Swap;
    use crate::enrich::{Enricher, Enrichment, Trade};
    use crate::sink::TradeSink;
    use async_trait::async_trait;

    struct NoopEnricher;

    #[async_trait]
    impl Enricher for NoopEnricher {
        async fn enrich(&self, _swaps: &[Swap]) -> Result<Enrichment> {
            Ok(Enrichment::default())
        }
    }

    struct NoopSink;

    #[async_trait]
    impl TradeSink for NoopSink {
        async fn insert_trades(&self, trades: &[Trade]) -> Result<u64> {
            Ok(trades.len() as u64)
        }
    }

    fn supervisor() -> StreamSupervisor {
        supervisor_at("https://example.quiknode.pro:10000")
    }

    fn supervisor_at(endpoint: &str) -> StreamSupervisor {
        let batch = BatchManager::new(BatchConfig::default(), Arc::new(NoopEnricher), Arc::new(NoopSink));
        StreamSupervisor::new(
            endpoint.to_string(),
            Some("token".to_string()),
            ClientConfig::default(),
            SwapDecoder::default(),
            batch,
        )
    }

    #[tokio::test]
    async fn test_connection_ids_increase() {
        let s = supervisor();
        assert_eq!(s.next_connection_id(), "conn_1");
        assert_eq!(s.next_connection_id(), "conn_2");
        assert_eq!(s.next_connection_id(), "conn_3");
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_cycles_reconnect_after_fixed_delay() {
        // not a URI: every cycle fails before any network I/O
        let s = supervisor_at("not a valid endpoint");

        let result = tokio::time::timeout(Duration::from_millis(2_500), s.run()).await;

        assert!(result.is_err());
        // cycles start at 0ms, 1000ms and 2000ms
        assert_eq!(s.connections.load(Ordering::Relaxed), 3);
        assert_eq!(s.next_connection_id(), "conn_4");
    }

    #[tokio::test]
    async fn test_subscribe_request_filters_amm_transactions() {
        let request = supervisor().subscribe_request();

        assert_eq!(request.commitment, Some(CommitmentLevel::Confirmed as i32));
        let filter = &request.transactions["client"];
        assert_eq!(filter.vote, Some(false));
        assert_eq!(filter.failed, Some(false));
        assert_eq!(
            filter.account_include,
            vec!["675kPX9MHTjS2zt1qfr1NYHuzeLXfQM9H24wFSUt1Mp8".to_string()]
        );
        assert!(request.accounts.is_empty());
        assert!(request.ping.is_none());
    }

    #[tokio::test]
    async fn test_handle_transaction_queues_swaps() {
        let s = supervisor();
        s.handle_transaction("conn_1", &swap_update(0));
        assert_eq!(s.batch.pending_len(), 1);

        // malformed update is dropped without touching the queue
        let mut bad = swap_update(0);
        if let Some(tx) = bad.transaction.as_mut().and_then(|i| i.transaction.as_mut()) {
            if let Some(message) = tx.message.as_mut() {
                message.instructions[0].accounts.push(200);
            }
        }
        s.handle_transaction("conn_1", &bad);
        assert_eq!(s.batch.pending_len(), 1);
    }
}
