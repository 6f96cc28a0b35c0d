//! Command-line and environment configuration.

use std::{
    net::{IpAddr, SocketAddr},
    time::Duration,
};

use clap::Parser;

use crate::domain::{AssetTypeId, HAT_ASSET_TYPE};
use crate::infra::http::{
    UpstreamEndpoints, DEFAULT_CATALOG_URL, DEFAULT_INVENTORY_URL, DEFAULT_VALUES_URL,
};
use crate::infra::{cache::DEFAULT_TTL, UpstreamError};

/// Player inventory value proxy
#[derive(Clone, Debug, Parser)]
#[command(name = "item-value-proxy")]
#[command(version, about, long_about = None)]
pub struct Config {
    /// Address to bind the HTTP server to
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Log level or full filter directive (e.g. `info,item_value_proxy=debug`)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON
    #[arg(long, env = "LOG_JSON")]
    pub log_json: bool,

    /// Seconds a fetched price table is reused before refreshing
    #[arg(long, env = "PRICE_TABLE_TTL_SECS", default_value_t = DEFAULT_TTL.as_secs())]
    pub price_table_ttl_secs: u64,

    /// Timeout applied to every upstream request, in seconds
    #[arg(
        long,
        env = "UPSTREAM_TIMEOUT_SECS",
        default_value_t = 5,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub upstream_timeout_secs: u64,

    /// Inventory asset type listed as accessories (8 = hats)
    #[arg(long, env = "ACCESSORY_ASSET_TYPE", default_value_t = HAT_ASSET_TYPE)]
    pub accessory_asset_type: AssetTypeId,

    #[arg(long, env = "INVENTORY_BASE_URL", default_value = DEFAULT_INVENTORY_URL)]
    pub inventory_base_url: String,

    #[arg(long, env = "CATALOG_BASE_URL", default_value = DEFAULT_CATALOG_URL)]
    pub catalog_base_url: String,

    #[arg(long, env = "VALUES_BASE_URL", default_value = DEFAULT_VALUES_URL)]
    pub values_base_url: String,
}

impl Config {
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn price_table_ttl(&self) -> Duration {
        Duration::from_secs(self.price_table_ttl_secs)
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }

    pub fn endpoints(&self) -> Result<UpstreamEndpoints, UpstreamError> {
        UpstreamEndpoints::parse(
            &self.inventory_base_url,
            &self.catalog_base_url,
            &self.values_base_url,
        )
    }
}
