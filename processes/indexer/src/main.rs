//! 'main' for the Lightproof indexer process

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use config::{Config, Environment, File};
use tracing::info;
use tracing_subscriber::EnvFilter;

use lightproof_common::IncrementalMerkleAnnotator;
use lightproof_module_accumulator_store::AccumulatorStore;
use lightproof_module_firehose_client::{FirehoseClient, FirehoseConfig};
use lightproof_module_stream_ingestor::{
    BootstrapPlanner, IngestorConfig, RetiredNodeLog, StreamIngestor,
};

#[derive(Parser, Debug)]
#[command(name = "lightproof-indexer")]
#[command(about = "Firehose-fed incremental Merkle accumulator indexer")]
struct Args {
    /// Config file name, without extension
    #[arg(short, long, default_value = "indexer")]
    config: String,

    /// Override the resolved start height for the first subscription
    #[arg(long)]
    start_block: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,fjall=warn")),
        )
        .init();

    let args = Args::parse();

    info!("Lightproof indexer process");

    let config = Arc::new(
        Config::builder()
            .add_source(File::with_name(&args.config))
            .add_source(Environment::with_prefix("LIGHTPROOF"))
            .build()?,
    );

    let store = Arc::new(AccumulatorStore::new(config.clone())?);
    let annotator = Arc::new(IncrementalMerkleAnnotator);

    let firehose_config = FirehoseConfig::try_load(&config, "firehose")?;
    let ingestor_config = IngestorConfig::try_load(&config, "ingestor")?;

    let client = FirehoseClient::new(firehose_config);
    let planner = BootstrapPlanner::new(
        client.clone(),
        annotator.clone(),
        store.clone(),
        ingestor_config.clone(),
    );
    let ingestor = StreamIngestor::new(
        client,
        planner,
        store.clone(),
        annotator,
        RetiredNodeLog::new(store),
        ingestor_config,
    );

    ingestor.run(args.start_block).await
}
