//! In-memory caching for catalog snapshots.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use tracing::debug;

use super::{Catalog, CatalogError, CatalogSource};

/// Wraps a [`CatalogSource`] and reuses the parsed catalog until the TTL
/// expires or [`CachedCatalog::invalidate`] is called.
pub struct CachedCatalog<S> {
    inner: Arc<S>,
    cache: Cache<(), Arc<Catalog>>,
}

impl<S> Clone for CachedCatalog<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            cache: self.cache.clone(),
        }
    }
}

impl<S: CatalogSource> CachedCatalog<S> {
    /// Cache `source` for `ttl`.
    #[must_use]
    pub fn new(source: S, ttl: Duration) -> Self {
        let cache = Cache::builder().max_capacity(1).time_to_live(ttl).build();
        Self {
            inner: Arc::new(source),
            cache,
        }
    }

    #[cfg(test)]
    fn source(&self) -> &S {
        &self.inner
    }

    /// Drop the cached copy so the next load reads the source.
    pub async fn invalidate(&self) {
        self.cache.invalidate(&()).await;
    }
}

impl<S: CatalogSource> CatalogSource for CachedCatalog<S> {
    async fn load(&self) -> Result<Arc<Catalog>, CatalogError> {
        if let Some(catalog) = self.cache.get(&()).await {
            debug!("Cache hit for catalog");
            return Ok(catalog);
        }

        let catalog = self.inner.load().await?;
        self.cache.insert((), Arc::clone(&catalog)).await;
        Ok(catalog)
    }

    async fn reload(&self) -> Result<Arc<Catalog>, CatalogError> {
        self.invalidate().await;
        self.load().await
    }
}
