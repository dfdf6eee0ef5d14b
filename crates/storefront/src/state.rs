//! Application state shared across handlers.

use std::sync::Arc;

use crate::catalog::{CachedCatalog, JsonFileCatalog};
use crate::config::{StoreSettings, StorefrontConfig};

/// Catalog source used by the HTTP storefront.
pub type StorefrontCatalog = CachedCatalog<JsonFileCatalog>;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like the catalog and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    catalog: StorefrontCatalog,
}

impl AppState {
    /// Create a new application state.
    ///
    /// The catalog is not read until the first request (or an explicit warm-up
    /// via [`crate::catalog::CatalogSource::load`]).
    #[must_use]
    pub fn new(config: StorefrontConfig) -> Self {
        let catalog = CachedCatalog::new(
            JsonFileCatalog::new(config.catalog.path.clone()),
            config.catalog.ttl,
        );

        Self {
            inner: Arc::new(AppStateInner { config, catalog }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Store display settings.
    #[must_use]
    pub fn settings(&self) -> StoreSettings {
        self.inner.config.store
    }

    /// Get a reference to the cached catalog.
    #[must_use]
    pub fn catalog(&self) -> &StorefrontCatalog {
        &self.inner.catalog
    }
}
