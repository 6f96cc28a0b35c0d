//! Combines the per-user listings and the price table into one valuation.

use std::{collections::HashSet, future::Future, sync::Arc, time::SystemTime};

use thiserror::Error;
use tracing::{debug, error, warn};

use crate::domain::{
    summarize, value_accessories, value_bundles, value_limiteds, AssetTypeId, BundleValueTable,
    CatalogPrices, InvalidUserId, OwnedAccessory, UserId, ValuationResult, HAT_ASSET_TYPE,
};
use crate::infra::{
    cache::CacheError, CacheStatus, PriceTableCache, UpstreamCall, UpstreamClient, UpstreamError,
};

#[derive(Debug, Error)]
pub enum ValuationError {
    #[error(transparent)]
    InvalidUserId(#[from] InvalidUserId),
    #[error("{call} upstream unavailable: {source}")]
    UpstreamUnavailable {
        call: UpstreamCall,
        #[source]
        source: UpstreamError,
    },
    #[error("internal error: {0}")]
    Internal(String),
}

/// Freshness of the price table a valuation was computed against.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PriceTableInfo {
    pub status: CacheStatus,
    pub fetched_at: SystemTime,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValuationReport {
    pub valuation: ValuationResult,
    pub price_table: PriceTableInfo,
}

pub struct ValuationAggregator {
    upstream: Arc<dyn UpstreamClient>,
    prices: PriceTableCache,
    bundles: BundleValueTable,
    accessory_asset_type: AssetTypeId,
}

impl ValuationAggregator {
    pub fn new(upstream: Arc<dyn UpstreamClient>, prices: PriceTableCache) -> Self {
        Self {
            upstream,
            prices,
            bundles: BundleValueTable::builtin(),
            accessory_asset_type: HAT_ASSET_TYPE,
        }
    }

    pub fn with_accessory_asset_type(mut self, asset_type: AssetTypeId) -> Self {
        self.accessory_asset_type = asset_type;
        self
    }

    pub fn price_cache(&self) -> &PriceTableCache {
        &self.prices
    }

    /// Collectibles and the price table are required; bundles, accessories
    /// and catalog prices degrade to empty contributions when they fail.
    pub async fn compute_valuation(&self, raw_user_id: &str) -> Result<ValuationReport, ValuationError> {
        let user_id: UserId = raw_user_id.parse()?;

        let (collectibles, prices) = tokio::join!(
            self.upstream.fetch_collectibles(user_id),
            self.prices.get()
        );

        let collectibles = collectibles.map_err(|source| {
            error!(%user_id, call = %UpstreamCall::Collectibles, error = %source, "required upstream call failed");
            ValuationError::UpstreamUnavailable {
                call: UpstreamCall::Collectibles,
                source,
            }
        })?;
        let prices = prices.map_err(|err| {
            error!(%user_id, call = %UpstreamCall::PriceTable, error = %err, "required upstream call failed");
            match err {
                CacheError::Upstream(source) => ValuationError::UpstreamUnavailable {
                    call: UpstreamCall::PriceTable,
                    source,
                },
                CacheError::RefreshFailed(detail) => ValuationError::UpstreamUnavailable {
                    call: UpstreamCall::PriceTable,
                    source: UpstreamError::Api(detail),
                },
                CacheError::RefreshTask(join) => ValuationError::Internal(join.to_string()),
            }
        })?;
        let limiteds = value_limiteds(&collectibles, &prices.data);

        let bundles = optional(
            user_id,
            UpstreamCall::Bundles,
            self.upstream.fetch_bundles(user_id),
        )
        .await;
        let bundle_items = value_bundles(&bundles, &self.bundles);

        let accessories = optional(
            user_id,
            UpstreamCall::Accessories,
            self.upstream
                .fetch_accessories(user_id, self.accessory_asset_type),
        )
        .await;
        let asset_ids = unique_asset_ids(&accessories);
        let catalog = if asset_ids.is_empty() {
            CatalogPrices::new()
        } else {
            optional(
                user_id,
                UpstreamCall::CatalogPrices,
                self.upstream.fetch_catalog_prices(&asset_ids),
            )
            .await
        };
        let accessory_items = value_accessories(&accessories, &catalog);

        let valuation = summarize(user_id, limiteds, bundle_items, accessory_items);
        debug!(
            %user_id,
            total_value = valuation.total_value,
            total_rap = valuation.total_rap,
            items = valuation.items.len(),
            "valuation computed"
        );

        Ok(ValuationReport {
            valuation,
            price_table: PriceTableInfo {
                status: prices.status,
                fetched_at: prices.fetched_at,
            },
        })
    }
}

async fn optional<T, F>(user_id: UserId, call: UpstreamCall, fetch: F) -> T
where
    T: Default,
    F: Future<Output = Result<T, UpstreamError>>,
{
    match fetch.await {
        Ok(value) => value,
        Err(err) => {
            warn!(%user_id, %call, error = %err, "optional upstream call failed; treating as empty");
            T::default()
        }
    }
}

/// Asset ids in first-seen order, without duplicates.
fn unique_asset_ids(accessories: &[OwnedAccessory]) -> Vec<u64> {
    let mut seen = HashSet::with_capacity(accessories.len());
    accessories
        .iter()
        .map(|accessory| accessory.asset_id)
        .filter(|id| seen.insert(*id))
        .collect()
}
