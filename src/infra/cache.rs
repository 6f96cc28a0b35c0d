//! Time-bounded in-memory cache for the community price table.
//!
//! Refreshes are single-flight: one caller fetches while the others wait on
//! the refresh lock and then reuse its result, including a failed one. A
//! failed refresh falls back to the last good table when one exists.

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, SystemTime},
};

use serde::Serialize;
use thiserror::Error;
use tokio::{
    sync::{Mutex, RwLock},
    task::JoinError,
    time::Instant,
};
use tracing::{info, warn};

use super::{PriceTableSource, UpstreamError};
use crate::domain::PriceTable;

/// How long a fetched price table is served before a refresh is triggered.
pub const DEFAULT_TTL: Duration = Duration::from_secs(10 * 60);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    Fresh,
    Cached,
    Stale,
}

#[derive(Clone, Debug)]
pub struct CachedPayload<T> {
    pub data: T,
    pub fetched_at: SystemTime,
    pub status: CacheStatus,
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
    #[error("price table refresh task failed: {0}")]
    RefreshTask(#[from] JoinError),
    /// A refresh this caller waited on failed; it was not retried.
    #[error("price table refresh failed: {0}")]
    RefreshFailed(String),
}

struct Cached<T> {
    value: T,
    fetched_at: SystemTime,
    loaded_at: Instant,
}

impl<T: Clone> Cached<T> {
    fn new(value: T) -> Self {
        Self {
            value,
            fetched_at: SystemTime::now(),
            loaded_at: Instant::now(),
        }
    }

    fn payload(&self, status: CacheStatus) -> CachedPayload<T> {
        CachedPayload {
            data: self.value.clone(),
            fetched_at: self.fetched_at,
            status,
        }
    }

    fn if_fresh(&self, ttl: Duration) -> Option<CachedPayload<T>> {
        (self.loaded_at.elapsed() <= ttl).then(|| self.payload(CacheStatus::Cached))
    }

    fn stale(&self) -> CachedPayload<T> {
        self.payload(CacheStatus::Stale)
    }
}

struct Inner {
    source: Arc<dyn PriceTableSource>,
    ttl: Duration,
    entry: RwLock<Option<Cached<Arc<PriceTable>>>>,
    /// Held for the whole refresh; carries the error of the last attempt.
    refresh: Arc<Mutex<Option<String>>>,
    /// Finished refresh attempts, bumped before the refresh lock is released.
    attempts: AtomicU64,
}

impl Inner {
    async fn fresh(&self) -> Option<CachedPayload<Arc<PriceTable>>> {
        self.entry
            .read()
            .await
            .as_ref()
            .and_then(|entry| entry.if_fresh(self.ttl))
    }

    async fn store(&self, table: PriceTable) -> CachedPayload<Arc<PriceTable>> {
        let entry = Cached::new(Arc::new(table));
        let payload = entry.payload(CacheStatus::Fresh);
        *self.entry.write().await = Some(entry);
        payload
    }
}

/// Shared handle; clones refer to the same cached entry.
#[derive(Clone)]
pub struct PriceTableCache {
    inner: Arc<Inner>,
}

impl PriceTableCache {
    pub fn with_ttl(source: Arc<dyn PriceTableSource>, ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                source,
                ttl,
                entry: RwLock::new(None),
                refresh: Arc::new(Mutex::new(None)),
                attempts: AtomicU64::new(0),
            }),
        }
    }

    pub async fn get(&self) -> Result<CachedPayload<Arc<PriceTable>>, CacheError> {
        if let Some(payload) = self.inner.fresh().await {
            return Ok(payload);
        }

        let seen = self.inner.attempts.load(Ordering::Acquire);
        let mut guard = Arc::clone(&self.inner.refresh).lock_owned().await;
        if let Some(payload) = self.inner.fresh().await {
            return Ok(payload);
        }
        if self.inner.attempts.load(Ordering::Acquire) != seen {
            if let Some(detail) = (*guard).clone() {
                drop(guard);
                return self.fall_back(CacheError::RefreshFailed(detail)).await;
            }
        }

        // The refresh owns the lock, so a caller that goes away mid-fetch
        // neither aborts it nor lets a second fetch start.
        let inner = Arc::clone(&self.inner);
        let refresh = tokio::spawn(async move {
            let started = Instant::now();
            let outcome = match inner.source.fetch_price_table().await {
                Ok(table) => {
                    info!(
                        entries = table.len(),
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "price table refreshed"
                    );
                    *guard = None;
                    Ok(inner.store(table).await)
                }
                Err(err) => {
                    *guard = Some(err.to_string());
                    Err(err)
                }
            };
            inner.attempts.fetch_add(1, Ordering::Release);
            drop(guard);
            outcome
        });

        match refresh.await {
            Ok(Ok(payload)) => Ok(payload),
            Ok(Err(err)) => self.fall_back(CacheError::Upstream(err)).await,
            Err(err) => self.fall_back(CacheError::RefreshTask(err)).await,
        }
    }

    /// Drops the cached table so the next `get` refetches it.
    pub async fn invalidate(&self) {
        let dropped = self.inner.entry.write().await.take().is_some();
        info!(dropped, "price table cache invalidated");
    }

    async fn fall_back(
        &self,
        err: CacheError,
    ) -> Result<CachedPayload<Arc<PriceTable>>, CacheError> {
        let stale = self.inner.entry.read().await.as_ref().map(Cached::stale);
        match stale {
            Some(payload) => {
                warn!(error = %err, "price table refresh failed; serving stale copy");
                Ok(payload)
            }
            None => Err(err),
        }
    }
}
