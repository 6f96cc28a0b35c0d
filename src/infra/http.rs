//! Thin asynchronous client for the inventory, catalog and item-value APIs.
//!
//! - Follows cursor pagination on the per-user listings, up to a page cap.
//! - Batches catalog price lookups and performs the catalog's csrf handshake.
//! - Applies one client-wide timeout to every upstream call.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header::HeaderValue, Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::dto::{
    AccessoryDto, BundleDto, CatalogDetailsRequest, CatalogDetailsResponse, CollectibleDto,
    ItemDetailsDto, PageDto,
};
use super::{PriceTableSource, UpstreamClient, UpstreamError};
use crate::domain::{
    AssetTypeId, CatalogPrices, Collectible, OwnedAccessory, OwnedBundle, PriceTable, UserId,
};
use crate::util::version;

pub const DEFAULT_INVENTORY_URL: &str = "https://inventory.roblox.com/";
pub const DEFAULT_CATALOG_URL: &str = "https://catalog.roblox.com/";
pub const DEFAULT_VALUES_URL: &str = "https://api.rolimons.com/";

const PAGE_LIMIT: &str = "100";
const MAX_PAGES: usize = 10;
const CATALOG_BATCH_SIZE: usize = 100;
const CSRF_HEADER: &str = "x-csrf-token";

/// Base URLs of the three upstream hosts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpstreamEndpoints {
    pub inventory: Url,
    pub catalog: Url,
    pub values: Url,
}

impl UpstreamEndpoints {
    pub fn parse(inventory: &str, catalog: &str, values: &str) -> Result<Self, UpstreamError> {
        Ok(Self {
            inventory: Url::parse(inventory)?,
            catalog: Url::parse(catalog)?,
            values: Url::parse(values)?,
        })
    }
}

#[derive(Clone, Debug)]
pub struct UpstreamHttpClient {
    http: Client,
    endpoints: UpstreamEndpoints,
    csrf_token: std::sync::Arc<Mutex<Option<HeaderValue>>>,
}

impl UpstreamHttpClient {
    pub fn with_endpoints(
        endpoints: UpstreamEndpoints,
        timeout: Duration,
    ) -> Result<Self, UpstreamError> {
        let http = Client::builder()
            .user_agent(version::user_agent())
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            endpoints,
            csrf_token: Default::default(),
        })
    }

    pub fn endpoints(&self) -> &UpstreamEndpoints {
        &self.endpoints
    }

    async fn fetch_paged<T, R>(&self, url: Url) -> Result<Vec<R>, UpstreamError>
    where
        T: DeserializeOwned,
        R: From<T>,
    {
        let mut items = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_PAGES {
            let mut page_url = url.clone();
            {
                let mut query = page_url.query_pairs_mut();
                query
                    .append_pair("limit", PAGE_LIMIT)
                    .append_pair("sortOrder", "Asc");
                if let Some(cursor) = cursor.as_deref() {
                    query.append_pair("cursor", cursor);
                }
            }

            let page: PageDto<T> = self.get_json(page_url).await?;
            items.extend(page.data.into_iter().map(R::from));

            match page.next_page_cursor.filter(|next| !next.is_empty()) {
                Some(next) => cursor = Some(next),
                None => return Ok(items),
            }
        }

        warn!(
            %url,
            pages = MAX_PAGES,
            items = items.len(),
            "listing truncated at page limit"
        );
        Ok(items)
    }

    async fn get_json<T>(&self, url: Url) -> Result<T, UpstreamError>
    where
        T: DeserializeOwned,
    {
        debug!(%url, "upstream GET");
        let response = self.http.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Status {
                status,
                url: url.to_string(),
            });
        }
        Ok(response.json().await?)
    }

    /// Posts one catalog details batch. A 403 carrying a fresh csrf token is
    /// answered once with that token; the token is kept for later batches.
    async fn post_catalog_batch(
        &self,
        url: &Url,
        ids: &[u64],
    ) -> Result<CatalogDetailsResponse, UpstreamError> {
        let body = CatalogDetailsRequest::assets(ids);
        let mut token = self.csrf_token.lock().await.clone();

        for attempt in 0..2 {
            let mut request = self.http.post(url.clone()).json(&body);
            if let Some(token) = token.as_ref() {
                request = request.header(CSRF_HEADER, token.clone());
            }

            let response = request.send().await?;
            let status = response.status();

            if status == StatusCode::FORBIDDEN && attempt == 0 {
                if let Some(fresh) = response.headers().get(CSRF_HEADER).cloned() {
                    debug!("catalog issued a new csrf token");
                    *self.csrf_token.lock().await = Some(fresh.clone());
                    token = Some(fresh);
                    continue;
                }
            }

            if !status.is_success() {
                return Err(UpstreamError::Status {
                    status,
                    url: url.to_string(),
                });
            }
            return Ok(response.json().await?);
        }

        Err(UpstreamError::Api("catalog rejected the csrf token".into()))
    }
}

fn join(base: &Url, path: &str) -> Result<Url, UpstreamError> {
    Ok(base.join(path)?)
}

#[async_trait]
impl UpstreamClient for UpstreamHttpClient {
    async fn fetch_collectibles(&self, user_id: UserId) -> Result<Vec<Collectible>, UpstreamError> {
        let url = join(
            &self.endpoints.inventory,
            &format!("v1/users/{user_id}/assets/collectibles"),
        )?;
        self.fetch_paged::<CollectibleDto, _>(url).await
    }

    async fn fetch_bundles(&self, user_id: UserId) -> Result<Vec<OwnedBundle>, UpstreamError> {
        let url = join(&self.endpoints.catalog, &format!("v1/users/{user_id}/bundles"))?;
        self.fetch_paged::<BundleDto, _>(url).await
    }

    async fn fetch_accessories(
        &self,
        user_id: UserId,
        asset_type: AssetTypeId,
    ) -> Result<Vec<OwnedAccessory>, UpstreamError> {
        let url = join(
            &self.endpoints.inventory,
            &format!("v2/users/{user_id}/inventory/{asset_type}"),
        )?;
        self.fetch_paged::<AccessoryDto, _>(url).await
    }

    async fn fetch_catalog_prices(&self, asset_ids: &[u64]) -> Result<CatalogPrices, UpstreamError> {
        let mut prices = CatalogPrices::new();
        if asset_ids.is_empty() {
            return Ok(prices);
        }

        let url = join(&self.endpoints.catalog, "v1/catalog/items/details")?;
        let mut last_error = None;
        for batch in asset_ids.chunks(CATALOG_BATCH_SIZE) {
            match self.post_catalog_batch(&url, batch).await {
                Ok(details) => details.collect_into(&mut prices),
                Err(err) => {
                    warn!(error = %err, batch = batch.len(), "catalog batch failed");
                    last_error = Some(err);
                }
            }
        }

        // Partial results are kept; only a lookup where every batch failed is an error.
        match last_error {
            Some(err) if prices.is_empty() => Err(err),
            _ => Ok(prices),
        }
    }
}

#[async_trait]
impl PriceTableSource for UpstreamHttpClient {
    async fn fetch_price_table(&self) -> Result<PriceTable, UpstreamError> {
        let url = join(&self.endpoints.values, "items/v1/itemdetails")?;
        let details: ItemDetailsDto = self.get_json(url).await?;
        details.into_price_table()
    }
}
