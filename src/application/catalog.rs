//! Product cache: serves the last successful spreadsheet fetch within a
//! freshness window and degrades to stale-or-empty on refresh failure.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use metrics::counter;
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::products::ProductRecord;

const SOURCE: &str = "application::catalog";

const METRIC_CACHE_HIT: &str = "vetrina_catalog_cache_hit_total";
const METRIC_CACHE_MISS: &str = "vetrina_catalog_cache_miss_total";
const METRIC_REFRESH: &str = "vetrina_catalog_refresh_total";
const METRIC_REFRESH_FAILED: &str = "vetrina_catalog_refresh_failed_total";

/// Failure modes of the upstream catalog source.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("credentials missing or malformed: {message}")]
    Auth { message: String },
    #[error("catalog source unavailable: {message}")]
    Unavailable { message: String },
}

impl SourceError {
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }
}

/// Seam over the spreadsheet reader so the cache can be exercised
/// without network access.
#[async_trait]
pub trait ProductSource: Send + Sync {
    async fn fetch_records(&self) -> Result<Vec<ProductRecord>, SourceError>;
}

struct CacheEntry {
    products: Arc<Vec<ProductRecord>>,
    fetched_at: Instant,
}

/// TTL cache over a [`ProductSource`].
///
/// `products()` never fails: within the freshness window it returns the
/// stored snapshot; past it, one caller refreshes while concurrent
/// callers wait on the gate and reuse the winner's result; on refresh
/// failure the previous snapshot (or an empty one) is served.
pub struct CatalogService {
    source: Arc<dyn ProductSource>,
    ttl: Duration,
    entry: RwLock<Option<CacheEntry>>,
    refresh_gate: tokio::sync::Mutex<()>,
}

impl CatalogService {
    pub fn new(source: Arc<dyn ProductSource>, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            entry: RwLock::new(None),
            refresh_gate: tokio::sync::Mutex::new(()),
        }
    }

    /// Current product snapshot, refreshing when stale.
    pub async fn products(&self) -> Arc<Vec<ProductRecord>> {
        if let Some(fresh) = self.fresh_snapshot() {
            counter!(METRIC_CACHE_HIT).increment(1);
            return fresh;
        }
        counter!(METRIC_CACHE_MISS).increment(1);

        let _gate = self.refresh_gate.lock().await;

        // Another caller may have completed the refresh while we waited.
        if let Some(fresh) = self.fresh_snapshot() {
            return fresh;
        }

        counter!(METRIC_REFRESH).increment(1);
        match self.source.fetch_records().await {
            Ok(records) => {
                let products = Arc::new(records);
                debug!(
                    target = "vetrina::catalog",
                    count = products.len(),
                    "catalog refreshed"
                );
                *rw_write(&self.entry, SOURCE, "store_refresh") = Some(CacheEntry {
                    products: products.clone(),
                    fetched_at: Instant::now(),
                });
                products
            }
            Err(err) => {
                counter!(METRIC_REFRESH_FAILED).increment(1);
                warn!(
                    target = "vetrina::catalog",
                    error = %err,
                    "catalog refresh failed, serving stale data"
                );
                self.stale_snapshot()
            }
        }
    }

    /// Stored snapshot when still within the freshness window.
    fn fresh_snapshot(&self) -> Option<Arc<Vec<ProductRecord>>> {
        let guard = rw_read(&self.entry, SOURCE, "fresh_snapshot");
        guard
            .as_ref()
            .filter(|entry| entry.fetched_at.elapsed() < self.ttl)
            .map(|entry| entry.products.clone())
    }

    /// Stored snapshot regardless of age; empty when never fetched.
    fn stale_snapshot(&self) -> Arc<Vec<ProductRecord>> {
        let guard = rw_read(&self.entry, SOURCE, "stale_snapshot");
        guard
            .as_ref()
            .map(|entry| entry.products.clone())
            .unwrap_or_default()
    }
}

fn rw_read<'a, T>(
    lock: &'a RwLock<T>,
    target: &'static str,
    op: &'static str,
) -> RwLockReadGuard<'a, T> {
    match lock.read() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!(
                op,
                target_module = target,
                lock_kind = "rwlock.read",
                result = "poisoned_recovered",
                "Recovered from poisoned cache lock"
            );
            poisoned.into_inner()
        }
    }
}

fn rw_write<'a, T>(
    lock: &'a RwLock<T>,
    target: &'static str,
    op: &'static str,
) -> RwLockWriteGuard<'a, T> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!(
                op,
                target_module = target,
                lock_kind = "rwlock.write",
                result = "poisoned_recovered",
                "Recovered from poisoned cache lock"
            );
            poisoned.into_inner()
        }
    }
}
