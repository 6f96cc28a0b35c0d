//! Upstream collaborators: the HTTP client for the inventory/catalog and
//! valuation providers, and the price-table cache in front of the latter.

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{
    AssetTypeId, CatalogPrices, Collectible, OwnedAccessory, OwnedBundle, PriceTable, UserId,
};

pub mod cache;
pub mod dto;
pub mod http;

pub use cache::{CacheStatus, PriceTableCache};
pub use http::UpstreamHttpClient;

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("http request error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {status} from {url}")]
    Status {
        status: reqwest::StatusCode,
        url: String,
    },
    #[error("api error: {0}")]
    Api(String),
}

/// Names the upstream call an error came from, for logs and error bodies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UpstreamCall {
    Collectibles,
    Bundles,
    Accessories,
    CatalogPrices,
    PriceTable,
}

impl UpstreamCall {
    pub fn as_str(self) -> &'static str {
        match self {
            UpstreamCall::Collectibles => "collectibles",
            UpstreamCall::Bundles => "bundles",
            UpstreamCall::Accessories => "accessories",
            UpstreamCall::CatalogPrices => "catalog_prices",
            UpstreamCall::PriceTable => "price_table",
        }
    }
}

impl fmt::Display for UpstreamCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-user listings and catalog lookups from the inventory/catalog provider.
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    async fn fetch_collectibles(&self, user_id: UserId) -> Result<Vec<Collectible>, UpstreamError>;

    async fn fetch_bundles(&self, user_id: UserId) -> Result<Vec<OwnedBundle>, UpstreamError>;

    async fn fetch_accessories(
        &self,
        user_id: UserId,
        asset_type: AssetTypeId,
    ) -> Result<Vec<OwnedAccessory>, UpstreamError>;

    /// Sale prices for `asset_ids`. Ids without a price are absent from the map.
    async fn fetch_catalog_prices(&self, asset_ids: &[u64]) -> Result<CatalogPrices, UpstreamError>;
}

/// The community valuation provider's global price table.
#[async_trait]
pub trait PriceTableSource: Send + Sync {
    async fn fetch_price_table(&self) -> Result<PriceTable, UpstreamError>;
}
