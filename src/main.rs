use amm_trade_indexer::enrich::{DasMetadataClient, JupiterPriceClient, RpcAccountLookup};
use amm_trade_indexer::{
    BatchManager, EnrichmentStage, HasuraSink, IndexerConfig, StreamSupervisor, SwapDecoder,
};
use anyhow::Context;
use log::info;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = IndexerConfig::from_env().context("invalid configuration")?;
    info!(
        "Starting indexer ({:?}, {:?} mode, batch size {}, every {}ms)",
        config.environment,
        config.batch.processing_mode,
        config.batch.max_batch_size,
        config.batch.min_batch_frequency_ms
    );

    let rpc_url = config.rpc_url();
    let enricher = EnrichmentStage::new(
        RpcAccountLookup::new(rpc_url.clone()),
        JupiterPriceClient::new(config.jupiter_url.clone()),
        DasMetadataClient::new(rpc_url),
    );
    let (hasura_url, hasura_secret) = config.hasura();
    let sink = HasuraSink::new(hasura_url, hasura_secret);

    let batch = BatchManager::new(config.batch.clone(), Arc::new(enricher), Arc::new(sink));

    let supervisor = StreamSupervisor::new(
        config.grpc_endpoint(),
        Some(config.quicknode_token.clone()),
        config.client.clone(),
        SwapDecoder::default(),
        batch,
    );
    supervisor.run().await;

    Ok(())
}
