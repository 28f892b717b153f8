//! # lshserver
//!
//! Run with: `cargo run --bin lshserver -- --signatures ./signatures.jsonl --threshold 0.5`
//!
//! The index is built completely before the listener is bound; any build
//! error terminates the process.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use minhash_lsh::server;
use minhash_lsh::{JsonLinesSource, QueryService, ServerConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let config = ServerConfig::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    config.validate().context("invalid configuration")?;

    info!("reading signatures from {:?}", config.signatures);
    let mut source = JsonLinesSource::open(&config.signatures)
        .with_context(|| format!("could not open {:?}", config.signatures))?;
    let (index, report) = config
        .index_builder()
        .build(&mut source)
        .context("failed to build LSH index")?;
    info!(
        records = report.records,
        dim = report.dimension,
        seed = report.seed,
        bands = report.params.num_bands,
        rows = report.params.rows_per_band,
        "index ready in {:?}",
        report.elapsed
    );

    let service = QueryService::new(Arc::new(index))?.with_max_payload_bytes(config.max_payload_bytes);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("could not bind {}", config.bind))?;
    server::serve(listener, service).await?;

    Ok(())
}
