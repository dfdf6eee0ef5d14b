//! CLI command implementations.

pub mod cart;
pub mod catalog;

use std::path::PathBuf;
use std::sync::Arc;

use quickshop_storefront::cart::{CartManager, FileStorage};
use quickshop_storefront::catalog::{Catalog, CatalogError, CatalogSource, JsonFileCatalog};
use quickshop_storefront::config::{ConfigError, StoreSettings};
use thiserror::Error;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Catalog snapshot could not be loaded.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// Store settings in the environment are invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Product or line item does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The cart operation failed and the cart was reset.
    #[error("Cart {0} failed; the cart was reset")]
    Failed(&'static str),
}

/// Paths shared by every command.
#[derive(Debug, Clone)]
pub struct Context {
    catalog: JsonFileCatalog,
    storage: FileStorage,
}

impl Context {
    /// Build a context from the catalog file and cart state directory.
    pub fn new(catalog_path: PathBuf, state_dir: PathBuf) -> Self {
        Self {
            catalog: JsonFileCatalog::new(catalog_path),
            storage: FileStorage::new(state_dir),
        }
    }

    /// Catalog snapshot source.
    pub const fn catalog_source(&self) -> &JsonFileCatalog {
        &self.catalog
    }

    /// Load the catalog snapshot.
    pub async fn load_catalog(&self) -> Result<Arc<Catalog>, CommandError> {
        Ok(self.catalog.load().await?)
    }

    /// Restore the persisted cart.
    pub async fn cart_manager(&self) -> Result<CartManager<FileStorage>, CommandError> {
        let catalog = self.load_catalog().await?;
        self.restore(catalog).await
    }

    /// Restore the persisted cart ahead of a refresh.
    ///
    /// The refresh reloads the snapshot itself and clears the cart when that
    /// fails, so an unreadable snapshot must not stop it from running.
    pub async fn refresh_manager(&self) -> Result<CartManager<FileStorage>, CommandError> {
        let catalog = self.catalog.load().await.unwrap_or_default();
        self.restore(catalog).await
    }

    async fn restore(&self, catalog: Arc<Catalog>) -> Result<CartManager<FileStorage>, CommandError> {
        let settings = StoreSettings::from_env()?;
        Ok(CartManager::restore(self.storage.clone(), catalog, settings).await)
    }
}
