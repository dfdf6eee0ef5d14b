//! Product catalog loaded from the static snapshot.
//!
//! # Architecture
//!
//! - The catalog is a read-only snapshot (`products.json`) written by the
//!   payment processor sync job; the storefront never mutates it
//! - [`CatalogSource`] abstracts where the snapshot comes from
//! - [`JsonFileCatalog`] reads it from disk
//! - [`CachedCatalog`] keeps the parsed snapshot in memory via `moka`
//!   (TTL from configuration) so page views do not re-read the file
//!
//! # Snapshot Format
//!
//! ```json
//! [
//!   {
//!     "id": "prod_PqR1",
//!     "name": "Linen Shirt",
//!     "description": "Breathable summer shirt",
//!     "images": ["https://files.stripe.com/..."],
//!     "price": { "amount": 80, "currency": "usd" },
//!     "categories": ["clothing"],
//!     "metadata": { "category": "clothing", "sku": "LS-01" }
//!   }
//! ]
//! ```

mod cache;

use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use quickshop_core::{Product, ProductId};
use thiserror::Error;
use tracing::{debug, instrument};

pub use cache::CachedCatalog;

/// Errors that can occur when loading the catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Snapshot file could not be read.
    #[error("failed to read catalog {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Snapshot file is not valid JSON in the expected shape.
    #[error("failed to parse catalog: {0}")]
    Parse(#[from] serde_json::Error),

    /// Two records share the same product ID.
    #[error("duplicate product id in catalog: {0}")]
    DuplicateProduct(ProductId),

    /// A product has a negative price.
    #[error("product {0} has a negative price")]
    NegativePrice(ProductId),
}

/// The read-only set of purchasable products.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    products: Vec<Product>,
    index: HashMap<ProductId, usize>,
}

impl Catalog {
    /// Build a catalog from snapshot records.
    ///
    /// Category slugs are normalized (lowercase, trimmed).
    ///
    /// # Errors
    ///
    /// Returns an error on duplicate IDs or negative prices.
    pub fn new(mut products: Vec<Product>) -> Result<Self, CatalogError> {
        let mut index = HashMap::with_capacity(products.len());
        for (position, product) in products.iter_mut().enumerate() {
            if product.price.is_negative() {
                return Err(CatalogError::NegativePrice(product.id.clone()));
            }
            product.normalize_categories();
            if index.insert(product.id.clone(), position).is_some() {
                return Err(CatalogError::DuplicateProduct(product.id.clone()));
            }
        }
        Ok(Self { products, index })
    }

    /// Parse a catalog from snapshot JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or fails validation.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let products: Vec<Product> = serde_json::from_str(json)?;
        Self::new(products)
    }

    /// Look up a product by ID.
    #[must_use]
    pub fn get(&self, id: &ProductId) -> Option<&Product> {
        self.index.get(id).and_then(|&i| self.products.get(i))
    }

    /// All products in snapshot order.
    #[must_use]
    pub fn products(&self) -> &[Product] {
        &self.products
    }

    /// Number of products.
    #[must_use]
    pub fn len(&self) -> usize {
        self.products.len()
    }

    /// Whether the catalog has no products.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    /// Category slugs in first-seen order.
    #[must_use]
    pub fn categories(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for category in self.products.iter().flat_map(|p| &p.categories) {
            if !seen.contains(&category.as_str()) {
                seen.push(category.as_str());
            }
        }
        seen
    }

    /// Products in a category (case-insensitive).
    #[must_use]
    pub fn in_category(&self, category: &str) -> Vec<&Product> {
        let wanted = category.trim().to_lowercase();
        self.products
            .iter()
            .filter(|p| p.categories.iter().any(|c| *c == wanted))
            .collect()
    }

    /// Products grouped by category, categories in first-seen order.
    ///
    /// A product with several categories appears in each group.
    #[must_use]
    pub fn by_category(&self) -> Vec<(&str, Vec<&Product>)> {
        self.categories()
            .into_iter()
            .map(|category| (category, self.in_category(category)))
            .collect()
    }
}

/// Supplies the authoritative catalog.
pub trait CatalogSource: Send + Sync {
    /// Load the catalog, possibly from a cache.
    fn load(&self) -> impl Future<Output = Result<Arc<Catalog>, CatalogError>> + Send;

    /// Load the catalog bypassing any cache.
    ///
    /// Defaults to [`CatalogSource::load`] for sources that do not cache.
    fn reload(&self) -> impl Future<Output = Result<Arc<Catalog>, CatalogError>> + Send {
        self.load()
    }
}

/// Reads the catalog snapshot from a JSON file on every load.
#[derive(Debug, Clone)]
pub struct JsonFileCatalog {
    path: PathBuf,
}

impl JsonFileCatalog {
    /// Create a source for the snapshot at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CatalogSource for JsonFileCatalog {
    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn load(&self) -> Result<Arc<Catalog>, CatalogError> {
        let json = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| CatalogError::Io {
                path: self.path.clone(),
                source,
            })?;
        let catalog = Catalog::from_json(&json)?;
        debug!(products = catalog.len(), "Catalog snapshot loaded");
        Ok(Arc::new(catalog))
    }
}

/// A fixed in-memory catalog.
#[derive(Debug, Clone)]
pub struct StaticCatalog(Arc<Catalog>);

impl StaticCatalog {
    /// Wrap an already-built catalog.
    #[must_use]
    pub fn new(catalog: Catalog) -> Self {
        Self(Arc::new(catalog))
    }
}

impl CatalogSource for StaticCatalog {
    async fn load(&self) -> Result<Arc<Catalog>, CatalogError> {
        Ok(Arc::clone(&self.0))
    }
}
