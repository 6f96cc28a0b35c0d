mod aggregator;
mod app;
mod config;
mod domain;
mod infra;
mod util;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use crate::{
    aggregator::ValuationAggregator,
    app::{build_app, AppState},
    config::Config,
    infra::{PriceTableCache, UpstreamHttpClient},
    util::{logging::setup_logging, version},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    setup_logging(&config.log_level, config.log_json);

    let endpoints = config.endpoints().context("invalid upstream base URL")?;
    let client = Arc::new(
        UpstreamHttpClient::with_endpoints(endpoints, config.upstream_timeout())
            .context("failed to build upstream HTTP client")?,
    );
    info!(
        inventory = %client.endpoints().inventory,
        catalog = %client.endpoints().catalog,
        values = %client.endpoints().values,
        timeout_secs = config.upstream_timeout_secs,
        "upstream client ready"
    );

    let prices = PriceTableCache::with_ttl(client.clone(), config.price_table_ttl());
    let aggregator = ValuationAggregator::new(client, prices)
        .with_accessory_asset_type(config.accessory_asset_type);
    let router = build_app(AppState::new(aggregator));

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(
        %addr,
        version = %version::version_label(),
        price_table_ttl_secs = config.price_table_ttl_secs,
        accessory_asset_type = config.accessory_asset_type,
        "listening"
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
