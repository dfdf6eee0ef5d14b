//! Cart state manager.
//!
//! [`CartManager`] holds one visitor's cart, the cart-panel visibility flag
//! and an advisory `is_updating` flag. Every mutation works on a copy of the
//! current cart, persists the result, and only then commits it to memory.
//! Failures are logged and the cart falls back to the empty safe state rather
//! than being left half-mutated.
//!
//! # Lifecycle
//!
//! ```text
//! restore ──> (idle) ──mutation──> (updating) ──> (idle)
//!                 │                      │
//!                 │                      └─ error: log, clear cart + storage
//!                 └─ reset: clear cart + storage
//! ```

use std::sync::Arc;

use quickshop_core::{Cart, CartError, LineItemKey, LineUpdate, ProductId};
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use super::storage::{CartStorage, StorageError, keys};
use crate::catalog::{Catalog, CatalogError, CatalogSource};
use crate::config::StoreSettings;

/// Internal failure of a cart operation.
///
/// Never returned to callers: operations log it and reset the cart.
#[derive(Debug, Error)]
enum OperationError {
    #[error(transparent)]
    Cart(#[from] CartError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// What a mutating call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartOutcome {
    /// The cart changed; carries the affected line key when there is one.
    Applied(Option<LineItemKey>),
    /// The product or line item does not exist; nothing changed.
    NotFound,
    /// The operation failed and the cart was reset to empty.
    Failed,
}

impl CartOutcome {
    /// Whether the cart was changed as requested.
    #[must_use]
    pub const fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }
}

/// One visitor's cart, synchronized with a [`CartStorage`].
#[derive(Debug)]
pub struct CartManager<S> {
    storage: S,
    catalog: Arc<Catalog>,
    settings: StoreSettings,
    cart: Option<Cart>,
    is_showing_cart: bool,
    is_updating: bool,
}

impl<S: CartStorage> CartManager<S> {
    /// Restore a visitor's cart from storage.
    ///
    /// A missing entry yields no cart. A corrupted entry is logged, deleted,
    /// and the manager starts without a cart. Storage read failures are
    /// treated the same way.
    pub async fn restore(storage: S, catalog: Arc<Catalog>, settings: StoreSettings) -> Self {
        let cart = match storage.get(keys::CART).await {
            Ok(Some(json)) => match serde_json::from_str::<Cart>(&json) {
                Ok(cart) => Some(cart),
                Err(e) => {
                    warn!(error = %e, "Discarding unreadable persisted cart");
                    if let Err(e) = storage.remove(keys::CART).await {
                        warn!(error = %e, "Failed to remove unreadable persisted cart");
                    }
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "Failed to read persisted cart");
                None
            }
        };

        let is_showing_cart = match storage.get(keys::CART_PANEL_OPEN).await {
            Ok(value) => value.as_deref() == Some("true"),
            Err(e) => {
                warn!(error = %e, "Failed to read cart panel state");
                false
            }
        };

        Self {
            storage,
            catalog,
            settings,
            cart,
            is_showing_cart,
            is_updating: false,
        }
    }

    // -------------------------------------------------------------------------
    // State
    // -------------------------------------------------------------------------

    /// The current cart, `None` if none has been created or it was reset.
    #[must_use]
    pub const fn cart(&self) -> Option<&Cart> {
        self.cart.as_ref()
    }

    /// Whether the cart panel is visible.
    #[must_use]
    pub const fn is_showing_cart(&self) -> bool {
        self.is_showing_cart
    }

    /// Whether a mutation is in progress. Advisory only.
    #[must_use]
    pub const fn is_updating(&self) -> bool {
        self.is_updating
    }

    /// Catalog the manager resolves products against.
    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Item count, zero when there is no cart.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.cart.as_ref().map_or(0, Cart::item_count)
    }

    // -------------------------------------------------------------------------
    // Operations
    // -------------------------------------------------------------------------

    /// Add `quantity` of a catalog product (0 counts as 1).
    ///
    /// Unknown products are a logged no-op. Reveals the cart panel when
    /// `auto_open_cart` is set.
    #[instrument(skip(self))]
    pub async fn add_to_cart(&mut self, product_id: &ProductId, quantity: u32) -> CartOutcome {
        self.is_updating = true;

        let Some(product) = self.catalog.get(product_id).cloned() else {
            warn!("Product not found");
            self.is_updating = false;
            return CartOutcome::NotFound;
        };

        let mut cart = self.working_copy();
        let result = match cart.add_product(&product, quantity) {
            Ok(key) => self.save_cart(cart).await.map(|()| key),
            Err(e) => Err(e.into()),
        };

        let outcome = match result {
            Ok(key) => {
                debug!(line_key = %key, quantity, "Added to cart");
                if self.settings.auto_open_cart && !self.is_showing_cart {
                    self.toggle_cart(Some(true)).await;
                }
                CartOutcome::Applied(Some(key))
            }
            Err(e) => self.fail("add_to_cart", &e).await,
        };

        self.is_updating = false;
        outcome
    }

    /// Set a line's quantity; `quantity <= 0` removes the line.
    ///
    /// Unknown keys are a no-op.
    #[instrument(skip(self))]
    pub async fn update_item_quantity(&mut self, key: &LineItemKey, quantity: i64) -> CartOutcome {
        self.is_updating = true;

        let Some(mut cart) = self.cart.clone() else {
            self.is_updating = false;
            return CartOutcome::NotFound;
        };

        let result = match cart.set_quantity(key, quantity) {
            Ok(LineUpdate::NotFound) => Ok(None),
            Ok(update) => self.save_cart(cart).await.map(|()| Some(update)),
            Err(e) => Err(e.into()),
        };

        let outcome = match result {
            Ok(None) => {
                debug!("Line item not found");
                CartOutcome::NotFound
            }
            Ok(Some(LineUpdate::Removed(line))) => {
                debug!(product_id = %line.product.id, "Removed line item");
                CartOutcome::Applied(None)
            }
            Ok(Some(_)) => CartOutcome::Applied(Some(key.clone())),
            Err(e) => self.fail("update_item_quantity", &e).await,
        };

        self.is_updating = false;
        outcome
    }

    /// Remove a line. Same as setting its quantity to 0.
    pub async fn remove_item(&mut self, key: &LineItemKey) -> CartOutcome {
        self.update_item_quantity(key, 0).await
    }

    /// Drop every line and clear persisted state.
    ///
    /// The in-memory cart stays present but empty.
    #[instrument(skip(self))]
    pub async fn empty_cart(&mut self) -> CartOutcome {
        self.is_updating = true;

        let mut cart = self.working_copy();
        cart.clear();
        self.clear_cart().await;
        self.cart = Some(cart);

        self.is_updating = false;
        CartOutcome::Applied(None)
    }

    /// Re-synchronize with the authoritative catalog.
    ///
    /// Line snapshots are replaced with fresh product data and lines whose
    /// product vanished are dropped. Returns `false` (after clearing all cart
    /// state) if the catalog cannot be loaded or the cart cannot be saved.
    #[instrument(skip(self, source))]
    pub async fn refresh_cart<C: CatalogSource>(&mut self, source: &C) -> bool {
        self.is_updating = true;

        let ok = match self.try_refresh(source).await {
            Ok(()) => true,
            Err(e) => {
                self.fail("refresh_cart", &e).await;
                false
            }
        };

        self.is_updating = false;
        ok
    }

    /// Flip the cart panel, or set it to `state` when given.
    pub async fn toggle_cart(&mut self, state: Option<bool>) -> bool {
        self.is_showing_cart = state.unwrap_or(!self.is_showing_cart);

        let value = if self.is_showing_cart { "true" } else { "false" };
        if let Err(e) = self
            .storage
            .set(keys::CART_PANEL_OPEN, value.to_string())
            .await
        {
            warn!(error = %e, "Failed to persist cart panel state");
        }
        self.is_showing_cart
    }

    /// Replace the cart wholesale. `None` clears it.
    pub async fn update_cart(&mut self, payload: Option<Cart>) -> CartOutcome {
        match payload {
            Some(cart) => match self.save_cart(cart).await {
                Ok(()) => CartOutcome::Applied(None),
                Err(e) => self.fail("update_cart", &e).await,
            },
            None => {
                self.clear_cart().await;
                CartOutcome::Applied(None)
            }
        }
    }

    /// Forget the cart and its persisted copy.
    pub async fn reset_initial_state(&mut self) {
        self.clear_cart().await;
    }

    // -------------------------------------------------------------------------
    // Helpers
    // -------------------------------------------------------------------------

    /// The current cart, or a fresh one to start mutating.
    fn working_copy(&self) -> Cart {
        self.cart.clone().unwrap_or_default()
    }

    /// Persist `cart` and make it the current cart.
    async fn save_cart(&mut self, cart: Cart) -> Result<(), OperationError> {
        let json = serde_json::to_string(&cart).map_err(StorageError::from)?;
        self.storage.set(keys::CART, json).await?;
        self.cart = Some(cart);
        Ok(())
    }

    /// Delete the persisted copy and null the cart.
    async fn clear_cart(&mut self) {
        if let Err(e) = self.storage.remove(keys::CART).await {
            warn!(error = %e, "Failed to remove persisted cart");
        }
        self.cart = None;
    }

    async fn try_refresh<C: CatalogSource>(&mut self, source: &C) -> Result<(), OperationError> {
        let catalog = source.reload().await?;
        self.catalog = Arc::clone(&catalog);

        let Some(mut cart) = self.cart.clone() else {
            return Ok(());
        };

        let dropped = cart.resync(|id| catalog.get(id).cloned())?;
        if dropped > 0 {
            info!(dropped, "Dropped cart lines for products no longer in catalog");
        }
        self.save_cart(cart).await?;
        Ok(())
    }

    /// Log an operation failure and fall back to the empty safe state.
    async fn fail(&mut self, operation: &str, err: &OperationError) -> CartOutcome {
        error!(operation, error = %err, "Cart operation failed, resetting cart");
        self.clear_cart().await;
        CartOutcome::Failed
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::cart::storage::MemoryStorage;
    use crate::catalog::StaticCatalog;
    use crate::catalog::tests::SNAPSHOT;

    /// A catalog source that always fails.
    struct BrokenSource;

    impl CatalogSource for BrokenSource {
        async fn load(&self) -> Result<Arc<Catalog>, CatalogError> {
            Err(CatalogError::Parse(
                serde_json::from_str::<serde_json::Value>("{").unwrap_err(),
            ))
        }
    }

    /// Storage whose writes always fail.
    struct ReadOnlyStorage;

    impl CartStorage for ReadOnlyStorage {
        async fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Ok(None)
        }

        async fn set(&self, key: &str, _value: String) -> Result<(), StorageError> {
            Err(StorageError::InvalidKey(key.to_string()))
        }

        async fn remove(&self, _key: &str) -> Result<(), StorageError> {
            Ok(())
        }
    }

    fn catalog() -> Arc<Catalog> {
        Arc::new(Catalog::from_json(SNAPSHOT).unwrap())
    }

    async fn manager(storage: MemoryStorage) -> CartManager<MemoryStorage> {
        CartManager::restore(storage, catalog(), StoreSettings::default()).await
    }

    fn id(raw: &str) -> ProductId {
        ProductId::new(raw)
    }

    #[tokio::test]
    async fn test_restore_without_persisted_state() {
        let m = manager(MemoryStorage::new()).await;
        assert!(m.cart().is_none());
        assert!(!m.is_showing_cart());
        assert!(!m.is_updating());
        assert_eq!(m.item_count(), 0);
    }

    #[tokio::test]
    async fn test_add_two_products_and_totals() {
        let mut m = manager(MemoryStorage::new()).await;
        assert!(m.add_to_cart(&id("prod_a"), 2).await.is_applied());
        assert!(m.add_to_cart(&id("prod_b"), 1).await.is_applied());

        let cart = m.cart().unwrap();
        assert_eq!(cart.subtotal().amount, Decimal::new(25, 0));
        assert_eq!(cart.item_count(), 3);
        assert_eq!(cart.product_count(), 2);
        assert!(!m.is_updating());
    }

    #[tokio::test]
    async fn test_add_unknown_product_is_noop() {
        let storage = MemoryStorage::new();
        let mut m = manager(storage.clone()).await;

        assert_eq!(m.add_to_cart(&id("prod_zzz"), 1).await, CartOutcome::NotFound);
        assert!(m.cart().is_none());
        assert_eq!(storage.get(keys::CART).await.unwrap(), None);
        assert!(!m.is_updating());
    }

    #[tokio::test]
    async fn test_repeated_adds_sum_quantities() {
        let mut m = manager(MemoryStorage::new()).await;
        for quantity in [1, 2, 3] {
            m.add_to_cart(&id("prod_a"), quantity).await;
        }
        let cart = m.cart().unwrap();
        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.lines()[0].quantity, 6);
        assert_eq!(cart.product_count(), 1);
    }

    #[tokio::test]
    async fn test_every_mutation_is_persisted() {
        let storage = MemoryStorage::new();
        let mut m = manager(storage.clone()).await;
        let CartOutcome::Applied(Some(key)) = m.add_to_cart(&id("prod_a"), 2).await else {
            panic!("expected applied");
        };

        let persisted: Cart =
            serde_json::from_str(&storage.get(keys::CART).await.unwrap().unwrap()).unwrap();
        assert_eq!(&persisted, m.cart().unwrap());

        m.update_item_quantity(&key, 7).await;
        let persisted: Cart =
            serde_json::from_str(&storage.get(keys::CART).await.unwrap().unwrap()).unwrap();
        assert_eq!(persisted.item_count(), 7);
    }

    #[tokio::test]
    async fn test_update_quantity_zero_removes_line() {
        let mut m = manager(MemoryStorage::new()).await;
        let CartOutcome::Applied(Some(key)) = m.add_to_cart(&id("prod_a"), 2).await else {
            panic!("expected applied");
        };
        m.add_to_cart(&id("prod_b"), 1).await;

        assert_eq!(
            m.update_item_quantity(&key, 0).await,
            CartOutcome::Applied(None)
        );
        let cart = m.cart().unwrap();
        assert_eq!(cart.product_count(), 1);
        assert_eq!(cart.item_count(), 1);
        assert!(cart.line(&key).is_none());
    }

    #[tokio::test]
    async fn test_remove_item_matches_zero_update() {
        let mut m = manager(MemoryStorage::new()).await;
        let CartOutcome::Applied(Some(key)) = m.add_to_cart(&id("prod_a"), 2).await else {
            panic!("expected applied");
        };

        m.remove_item(&key).await;
        let cart = m.cart().unwrap();
        assert!(cart.is_empty());
        assert_eq!(cart.item_count(), 0);
        assert_eq!(m.remove_item(&key).await, CartOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_update_without_cart_is_noop() {
        let mut m = manager(MemoryStorage::new()).await;
        assert_eq!(
            m.update_item_quantity(&LineItemKey::new("item_x"), 3).await,
            CartOutcome::NotFound
        );
        assert!(m.cart().is_none());
    }

    #[tokio::test]
    async fn test_empty_cart_clears_storage() {
        let storage = MemoryStorage::new();
        let mut m = manager(storage.clone()).await;
        m.add_to_cart(&id("prod_a"), 2).await;

        m.empty_cart().await;
        let cart = m.cart().unwrap();
        assert!(cart.is_empty());
        assert_eq!(cart.item_count(), 0);
        assert_eq!(cart.product_count(), 0);
        assert_eq!(storage.get(keys::CART).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_restore_round_trip() {
        let storage = MemoryStorage::new();
        let mut m = manager(storage.clone()).await;
        m.add_to_cart(&id("prod_a"), 2).await;
        m.add_to_cart(&id("prod_c"), 1).await;
        let original = m.cart().cloned().unwrap();

        let restored = manager(storage).await;
        assert_eq!(restored.cart(), Some(&original));
    }

    #[tokio::test]
    async fn test_restore_discards_corrupted_entry() {
        let storage = MemoryStorage::new();
        storage
            .set(keys::CART, "{\"lines\": [".to_string())
            .await
            .unwrap();

        let m = manager(storage.clone()).await;
        assert!(m.cart().is_none());
        assert_eq!(storage.get(keys::CART).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_refresh_resyncs_with_catalog() {
        let storage = MemoryStorage::new();
        let mut m = manager(storage.clone()).await;
        m.add_to_cart(&id("prod_a"), 1).await;
        m.add_to_cart(&id("prod_c"), 1).await;

        // prod_a repriced, prod_c gone
        let updated = Catalog::from_json(
            r#"[{"id": "prod_a", "name": "Product A", "price": {"amount": 12, "currency": "usd"}}]"#,
        )
        .unwrap();
        assert!(m.refresh_cart(&StaticCatalog::new(updated)).await);

        let cart = m.cart().unwrap();
        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.subtotal().amount, Decimal::new(12, 0));
        assert!(m.catalog().get(&id("prod_c")).is_none());
        assert!(!m.is_updating());
    }

    #[tokio::test]
    async fn test_refresh_without_cart_succeeds() {
        let mut m = manager(MemoryStorage::new()).await;
        assert!(m.refresh_cart(&StaticCatalog::new(Catalog::default())).await);
        assert!(m.cart().is_none());
    }

    #[tokio::test]
    async fn test_refresh_failure_clears_state() {
        let storage = MemoryStorage::new();
        let mut m = manager(storage.clone()).await;
        m.add_to_cart(&id("prod_a"), 2).await;

        assert!(!m.refresh_cart(&BrokenSource).await);
        assert!(m.cart().is_none());
        assert_eq!(m.item_count(), 0);
        assert_eq!(storage.get(keys::CART).await.unwrap(), None);
        assert!(!m.is_updating());
    }

    #[tokio::test]
    async fn test_empty_then_failed_refresh_is_usable() {
        let mut m = manager(MemoryStorage::new()).await;
        m.add_to_cart(&id("prod_a"), 2).await;
        m.empty_cart().await;

        assert!(!m.refresh_cart(&BrokenSource).await);
        assert!(m.cart().is_none());

        // Still usable afterwards
        assert!(m.add_to_cart(&id("prod_b"), 1).await.is_applied());
        assert_eq!(m.item_count(), 1);
    }

    #[tokio::test]
    async fn test_save_failure_resets_to_empty() {
        let mut m =
            CartManager::restore(ReadOnlyStorage, catalog(), StoreSettings::default()).await;
        assert_eq!(m.add_to_cart(&id("prod_a"), 1).await, CartOutcome::Failed);
        assert!(m.cart().is_none());
        assert!(!m.is_updating());
    }

    #[tokio::test]
    async fn test_auto_open_reveals_panel() {
        let storage = MemoryStorage::new();
        let settings = StoreSettings {
            auto_open_cart: true,
            ..StoreSettings::default()
        };
        let mut m = CartManager::restore(storage.clone(), catalog(), settings).await;
        assert!(!m.is_showing_cart());

        m.add_to_cart(&id("prod_a"), 1).await;
        assert!(m.is_showing_cart());
        assert_eq!(
            storage.get(keys::CART_PANEL_OPEN).await.unwrap().as_deref(),
            Some("true")
        );
    }

    #[tokio::test]
    async fn test_panel_stays_closed_without_auto_open() {
        let mut m = manager(MemoryStorage::new()).await;
        m.add_to_cart(&id("prod_a"), 1).await;
        assert!(!m.is_showing_cart());
    }

    #[tokio::test]
    async fn test_toggle_cart() {
        let storage = MemoryStorage::new();
        let mut m = manager(storage.clone()).await;
        assert!(m.toggle_cart(None).await);
        assert!(!m.toggle_cart(None).await);
        assert!(!m.toggle_cart(Some(false)).await);
        assert!(m.toggle_cart(Some(true)).await);

        // Panel state survives a restore
        let restored = manager(storage).await;
        assert!(restored.is_showing_cart());
    }

    #[tokio::test]
    async fn test_update_cart_replaces_and_clears() {
        let storage = MemoryStorage::new();
        let mut m = manager(storage.clone()).await;

        let mut replacement = Cart::default();
        replacement
            .add_product(catalog().get(&id("prod_b")).unwrap(), 4)
            .unwrap();
        m.update_cart(Some(replacement.clone())).await;
        assert_eq!(m.cart(), Some(&replacement));

        m.update_cart(None).await;
        assert!(m.cart().is_none());
        assert_eq!(storage.get(keys::CART).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_reset_initial_state() {
        let storage = MemoryStorage::new();
        let mut m = manager(storage.clone()).await;
        m.add_to_cart(&id("prod_a"), 1).await;

        m.reset_initial_state().await;
        assert!(m.cart().is_none());
        assert_eq!(storage.get(keys::CART).await.unwrap(), None);
    }
}
