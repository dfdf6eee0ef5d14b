//! The shopping cart and its line items.
//!
//! A [`Cart`] owns an ordered list of [`CartLineItem`]s plus derived values
//! (item count, product count, subtotal, total, emptiness). Fields are private
//! and every mutation goes through a method that refreshes the derived
//! values before returning, so a cart can never be observed with stale
//! totals.
//!
//! # Invariants
//!
//! - `item_count == sum(line.quantity)`
//! - `product_count == lines.len()`
//! - `is_empty == lines.is_empty()`
//! - every stored quantity is `>= 1`; a quantity of 0 removes the line
//! - at most one line per product
//! - all lines share the cart's currency

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{CurrencyCode, LineItemKey, Price, PriceError, Product, ProductId, VariationId};

/// Errors from cart mutations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    /// Quantity would exceed `u32::MAX`.
    #[error("quantity overflow for line {0}")]
    QuantityOverflow(LineItemKey),

    /// Product is priced in a different currency than the cart.
    #[error("product {product} is priced in {product_currency}, cart uses {cart_currency}")]
    CurrencyMismatch {
        product: ProductId,
        product_currency: CurrencyCode,
        cart_currency: CurrencyCode,
    },

    /// Persisted line item holds a quantity of zero.
    #[error("line {0} has a zero quantity")]
    ZeroQuantity(LineItemKey),

    /// Persisted cart holds two lines with the same key or product.
    #[error("duplicate line for {0}")]
    DuplicateLine(String),

    /// Totals could not be computed.
    #[error("price error: {0}")]
    Price(#[from] PriceError),
}

/// One product entry in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLineItem {
    /// Locally generated key, used for update and removal.
    pub key: LineItemKey,
    /// Snapshot of the product at the time it was added or last refreshed.
    pub product: Product,
    /// Quantity, always at least 1.
    pub quantity: u32,
    /// Optional variation reference.
    #[serde(default)]
    pub variation: Option<VariationId>,
}

impl CartLineItem {
    /// Unit price times quantity.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::Overflow`] if the amount does not fit.
    pub fn line_total(&self) -> Result<Price, PriceError> {
        self.product.price.times(self.quantity)
    }
}

/// Result of setting a line item's quantity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineUpdate {
    /// No line with that key.
    NotFound,
    /// Quantity was `<= 0`, the line was deleted.
    Removed(CartLineItem),
    /// Quantity was changed.
    Updated { previous: u32, current: u32 },
}

/// A shopping cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "CartRecord")]
pub struct Cart {
    lines: Vec<CartLineItem>,
    item_count: u32,
    product_count: u32,
    subtotal: Price,
    total: Price,
    is_empty: bool,
    updated_at: DateTime<Utc>,
}

impl Default for Cart {
    fn default() -> Self {
        Self::new(CurrencyCode::default())
    }
}

impl Cart {
    /// An empty cart that will total in `currency` until a line is added.
    #[must_use]
    pub fn new(currency: CurrencyCode) -> Self {
        Self {
            lines: Vec::new(),
            item_count: 0,
            product_count: 0,
            subtotal: Price::zero(currency),
            total: Price::zero(currency),
            is_empty: true,
            updated_at: Utc::now(),
        }
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    /// Line items in insertion order.
    #[must_use]
    pub fn lines(&self) -> &[CartLineItem] {
        &self.lines
    }

    /// Line item by key.
    #[must_use]
    pub fn line(&self, key: &LineItemKey) -> Option<&CartLineItem> {
        self.lines.iter().find(|line| &line.key == key)
    }

    /// Line item holding the given product.
    #[must_use]
    pub fn line_for_product(&self, product_id: &ProductId) -> Option<&CartLineItem> {
        self.lines.iter().find(|line| &line.product.id == product_id)
    }

    /// Sum of quantities across all lines.
    #[must_use]
    pub const fn item_count(&self) -> u32 {
        self.item_count
    }

    /// Number of distinct lines.
    #[must_use]
    pub const fn product_count(&self) -> u32 {
        self.product_count
    }

    /// Sum of price times quantity.
    #[must_use]
    pub const fn subtotal(&self) -> Price {
        self.subtotal
    }

    /// Amount due. Equal to the subtotal: no shipping, tax or discounts apply.
    #[must_use]
    pub const fn total(&self) -> Price {
        self.total
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.is_empty
    }

    /// Currency the cart totals in.
    #[must_use]
    pub const fn currency(&self) -> CurrencyCode {
        self.subtotal.currency
    }

    /// Time of the last mutation.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    // -------------------------------------------------------------------------
    // Mutations
    // -------------------------------------------------------------------------

    /// Add `quantity` of `product`, merging into an existing line for the same
    /// product. A quantity of 0 is treated as 1.
    ///
    /// Returns the key of the affected line.
    ///
    /// # Errors
    ///
    /// Returns an error on currency mismatch or quantity/price overflow. The
    /// cart is left unchanged on error.
    pub fn add_product(
        &mut self,
        product: &Product,
        quantity: u32,
    ) -> Result<LineItemKey, CartError> {
        let quantity = quantity.max(1);

        if !self.lines.is_empty() && product.price.currency != self.currency() {
            return Err(CartError::CurrencyMismatch {
                product: product.id.clone(),
                product_currency: product.price.currency,
                cart_currency: self.currency(),
            });
        }

        let mut next = self.clone();
        let key = if let Some(line) = next
            .lines
            .iter_mut()
            .find(|line| line.product.id == product.id)
        {
            line.quantity = line
                .quantity
                .checked_add(quantity)
                .ok_or_else(|| CartError::QuantityOverflow(line.key.clone()))?;
            line.key.clone()
        } else {
            let key = LineItemKey::generate();
            next.lines.push(CartLineItem {
                key: key.clone(),
                product: product.clone(),
                quantity,
                variation: None,
            });
            next.product_count += 1;
            key
        };
        next.item_count = next
            .item_count
            .checked_add(quantity)
            .ok_or_else(|| CartError::QuantityOverflow(key.clone()))?;
        next.refresh_totals()?;

        *self = next;
        Ok(key)
    }

    /// Set a line's quantity. Any quantity `<= 0` removes the line.
    ///
    /// The item count is adjusted by the delta between the old and new
    /// quantity; totals are recomputed from the lines.
    ///
    /// # Errors
    ///
    /// Returns an error if `quantity` exceeds `u32::MAX` or the new totals
    /// overflow. The cart is left unchanged on error.
    pub fn set_quantity(
        &mut self,
        key: &LineItemKey,
        quantity: i64,
    ) -> Result<LineUpdate, CartError> {
        let Some(index) = self.lines.iter().position(|line| &line.key == key) else {
            return Ok(LineUpdate::NotFound);
        };

        let mut next = self.clone();
        let outcome = if quantity <= 0 {
            let removed = next.lines.remove(index);
            next.item_count -= removed.quantity;
            next.product_count -= 1;
            LineUpdate::Removed(removed)
        } else {
            let current =
                u32::try_from(quantity).map_err(|_| CartError::QuantityOverflow(key.clone()))?;
            let Some(line) = next.lines.get_mut(index) else {
                return Ok(LineUpdate::NotFound);
            };
            let previous = std::mem::replace(&mut line.quantity, current);
            next.item_count = (next.item_count - previous)
                .checked_add(current)
                .ok_or_else(|| CartError::QuantityOverflow(key.clone()))?;
            LineUpdate::Updated { previous, current }
        };
        next.refresh_totals()?;

        *self = next;
        Ok(outcome)
    }

    /// Remove a line by key.
    ///
    /// Returns the removed line, or `None` if no line had that key.
    pub fn remove(&mut self, key: &LineItemKey) -> Option<CartLineItem> {
        match self.set_quantity(key, 0) {
            Ok(LineUpdate::Removed(line)) => Some(line),
            _ => None,
        }
    }

    /// Drop every line and zero the derived values.
    pub fn clear(&mut self) {
        let currency = self.currency();
        *self = Self::new(currency);
    }

    /// Replace each line's product snapshot using `lookup`.
    ///
    /// Lines whose product no longer exists are dropped. Counts and totals are
    /// recomputed from scratch. Returns the number of dropped lines.
    ///
    /// # Errors
    ///
    /// Returns an error if refreshed prices mix currencies or overflow. The
    /// cart is left unchanged on error.
    pub fn resync<F>(&mut self, mut lookup: F) -> Result<usize, CartError>
    where
        F: FnMut(&ProductId) -> Option<Product>,
    {
        let before = self.lines.len();
        let lines = self
            .lines
            .iter()
            .filter_map(|line| {
                lookup(&line.product.id).map(|product| CartLineItem {
                    product,
                    ..line.clone()
                })
            })
            .collect::<Vec<_>>();
        let dropped = before - lines.len();

        let next = Self::from_lines(lines, self.currency())?;
        *self = next;
        Ok(dropped)
    }

    // -------------------------------------------------------------------------
    // Internal
    // -------------------------------------------------------------------------

    /// Build a cart from raw lines, recomputing every derived value.
    fn from_lines(lines: Vec<CartLineItem>, currency: CurrencyCode) -> Result<Self, CartError> {
        let mut item_count: u32 = 0;
        for (i, line) in lines.iter().enumerate() {
            if line.quantity == 0 {
                return Err(CartError::ZeroQuantity(line.key.clone()));
            }
            let duplicate = lines.iter().skip(i + 1).find(|other| {
                other.key == line.key || other.product.id == line.product.id
            });
            if let Some(other) = duplicate {
                return Err(CartError::DuplicateLine(other.key.to_string()));
            }
            item_count = item_count
                .checked_add(line.quantity)
                .ok_or_else(|| CartError::QuantityOverflow(line.key.clone()))?;
        }

        let mut cart = Self::new(currency);
        cart.product_count = u32::try_from(lines.len()).unwrap_or(u32::MAX);
        cart.item_count = item_count;
        cart.lines = lines;
        cart.refresh_totals()?;
        Ok(cart)
    }

    /// Recompute subtotal, total and emptiness from the lines and stamp the
    /// mutation time.
    fn refresh_totals(&mut self) -> Result<(), CartError> {
        let currency = self
            .lines
            .first()
            .map_or(self.currency(), |line| line.product.price.currency);

        let mut subtotal = Price::zero(currency);
        for line in &self.lines {
            if line.product.price.currency != currency {
                return Err(CartError::CurrencyMismatch {
                    product: line.product.id.clone(),
                    product_currency: line.product.price.currency,
                    cart_currency: currency,
                });
            }
            subtotal = subtotal.checked_add(line.line_total()?)?;
        }

        self.subtotal = subtotal;
        self.total = subtotal;
        self.is_empty = self.lines.is_empty();
        self.updated_at = Utc::now();

        debug_assert_eq!(
            self.item_count,
            self.lines.iter().map(|line| line.quantity).sum::<u32>()
        );
        debug_assert_eq!(self.product_count as usize, self.lines.len());
        Ok(())
    }
}

/// Wire shape of a persisted cart.
///
/// Derived fields are accepted but ignored: they are recomputed from the lines
/// so a hand-edited or stale record can never produce inconsistent totals.
#[derive(Deserialize)]
struct CartRecord {
    #[serde(default)]
    lines: Vec<CartLineItem>,
    subtotal: Option<Price>,
    updated_at: Option<DateTime<Utc>>,
}

impl TryFrom<CartRecord> for Cart {
    type Error = CartError;

    fn try_from(record: CartRecord) -> Result<Self, Self::Error> {
        let currency = record
            .subtotal
            .map_or_else(CurrencyCode::default, |p| p.currency);
        let mut cart = Self::from_lines(record.lines, currency)?;
        if let Some(updated_at) = record.updated_at {
            cart.updated_at = updated_at;
        }
        Ok(cart)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::collections::BTreeMap;

    use rust_decimal::Decimal;

    use super::*;

    fn product(id: &str, cents: i64) -> Product {
        Product {
            id: ProductId::new(id),
            name: format!("Product {id}"),
            description: None,
            images: Vec::new(),
            price: Price::from_cents(cents, CurrencyCode::USD),
            categories: vec!["misc".to_string()],
            metadata: BTreeMap::new(),
        }
    }

    fn assert_consistent(cart: &Cart) {
        let sum: u32 = cart.lines().iter().map(|l| l.quantity).sum();
        assert_eq!(cart.item_count(), sum);
        assert_eq!(cart.product_count() as usize, cart.lines().len());
        assert_eq!(cart.is_empty(), cart.lines().is_empty());
        assert!(cart.lines().iter().all(|l| l.quantity >= 1));
    }

    #[test]
    fn test_new_cart_is_empty() {
        let cart = Cart::default();
        assert!(cart.is_empty());
        assert_eq!(cart.item_count(), 0);
        assert_eq!(cart.subtotal(), Price::zero(CurrencyCode::USD));
        assert_consistent(&cart);
    }

    #[test]
    fn test_two_products_totals() {
        let mut cart = Cart::default();
        cart.add_product(&product("a", 1000), 2).unwrap();
        cart.add_product(&product("b", 500), 1).unwrap();

        assert_eq!(cart.subtotal().amount, Decimal::new(25, 0));
        assert_eq!(cart.total().amount, Decimal::new(25, 0));
        assert_eq!(cart.subtotal().display(), "$25.00");
        assert_eq!(cart.item_count(), 3);
        assert_eq!(cart.product_count(), 2);
        assert!(!cart.is_empty());
        assert_consistent(&cart);
    }

    #[test]
    fn test_repeated_adds_merge_into_one_line() {
        let mut cart = Cart::default();
        let p = product("a", 100);
        let first = cart.add_product(&p, 1).unwrap();
        let second = cart.add_product(&p, 3).unwrap();
        let third = cart.add_product(&p, 2).unwrap();

        assert_eq!(first, second);
        assert_eq!(second, third);
        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.lines()[0].quantity, 6);
        assert_eq!(cart.product_count(), 1);
        assert_consistent(&cart);
    }

    #[test]
    fn test_add_zero_quantity_counts_as_one() {
        let mut cart = Cart::default();
        cart.add_product(&product("a", 100), 0).unwrap();
        assert_eq!(cart.item_count(), 1);
    }

    #[test]
    fn test_add_rejects_other_currency() {
        let mut cart = Cart::default();
        cart.add_product(&product("a", 100), 1).unwrap();
        let mut euro = product("b", 100);
        euro.price.currency = CurrencyCode::EUR;

        let before = cart.clone();
        let err = cart.add_product(&euro, 1).unwrap_err();
        assert!(matches!(err, CartError::CurrencyMismatch { .. }));
        assert_eq!(cart, before);
    }

    #[test]
    fn test_first_line_sets_currency() {
        let mut cart = Cart::default();
        let mut euro = product("b", 250);
        euro.price.currency = CurrencyCode::EUR;
        cart.add_product(&euro, 2).unwrap();
        assert_eq!(cart.currency(), CurrencyCode::EUR);
        assert_eq!(cart.subtotal().display(), "€5.00");
    }

    #[test]
    fn test_set_quantity_updates_by_delta() {
        let mut cart = Cart::default();
        let key = cart.add_product(&product("a", 1000), 2).unwrap();
        cart.add_product(&product("b", 500), 1).unwrap();

        let outcome = cart.set_quantity(&key, 5).unwrap();
        assert_eq!(
            outcome,
            LineUpdate::Updated {
                previous: 2,
                current: 5
            }
        );
        assert_eq!(cart.item_count(), 6);
        assert_eq!(cart.subtotal().amount, Decimal::new(55, 0));
        assert_consistent(&cart);
    }

    #[test]
    fn test_set_quantity_non_positive_removes() {
        for quantity in [0, -1, -100] {
            let mut cart = Cart::default();
            let key = cart.add_product(&product("a", 1000), 2).unwrap();
            cart.add_product(&product("b", 500), 1).unwrap();
            let products_before = cart.product_count();

            let outcome = cart.set_quantity(&key, quantity).unwrap();
            assert!(matches!(outcome, LineUpdate::Removed(ref l) if l.key == key));
            assert_eq!(cart.product_count(), products_before - 1);
            assert_eq!(cart.item_count(), 1);
            assert_consistent(&cart);
        }
    }

    #[test]
    fn test_set_quantity_unknown_key_is_noop() {
        let mut cart = Cart::default();
        cart.add_product(&product("a", 1000), 2).unwrap();
        let before = cart.clone();

        let outcome = cart
            .set_quantity(&LineItemKey::new("item_missing"), 3)
            .unwrap();
        assert_eq!(outcome, LineUpdate::NotFound);
        assert_eq!(cart, before);
    }

    #[test]
    fn test_set_quantity_too_large_leaves_cart_untouched() {
        let mut cart = Cart::default();
        let key = cart.add_product(&product("a", 1000), 2).unwrap();
        let before = cart.clone();

        let err = cart.set_quantity(&key, i64::from(u32::MAX) + 1).unwrap_err();
        assert!(matches!(err, CartError::QuantityOverflow(_)));
        assert_eq!(cart, before);
    }

    #[test]
    fn test_remove_last_line_empties_cart() {
        let mut cart = Cart::default();
        let key = cart.add_product(&product("a", 1000), 2).unwrap();

        let removed = cart.remove(&key).unwrap();
        assert_eq!(removed.quantity, 2);
        assert!(cart.is_empty());
        assert_eq!(cart.subtotal().amount, Decimal::ZERO);
        assert!(cart.remove(&key).is_none());
        assert_consistent(&cart);
    }

    #[test]
    fn test_clear_keeps_currency() {
        let mut cart = Cart::default();
        let mut euro = product("b", 250);
        euro.price.currency = CurrencyCode::EUR;
        cart.add_product(&euro, 2).unwrap();

        cart.clear();
        assert!(cart.is_empty());
        assert_eq!(cart.item_count(), 0);
        assert_eq!(cart.product_count(), 0);
        assert_eq!(cart.currency(), CurrencyCode::EUR);
    }

    #[test]
    fn test_resync_refreshes_prices_and_drops_missing() {
        let mut cart = Cart::default();
        let a_key = cart.add_product(&product("a", 1000), 2).unwrap();
        cart.add_product(&product("gone", 500), 4).unwrap();

        let dropped = cart
            .resync(|id| (id.as_str() == "a").then(|| product("a", 1200)))
            .unwrap();

        assert_eq!(dropped, 1);
        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.lines()[0].key, a_key);
        assert_eq!(cart.subtotal().amount, Decimal::new(24, 0));
        assert_consistent(&cart);
    }

    #[test]
    fn test_serde_round_trip_is_equal() {
        let mut cart = Cart::default();
        cart.add_product(&product("a", 1000), 2).unwrap();
        cart.add_product(&product("b", 500), 1).unwrap();

        let json = serde_json::to_string(&cart).unwrap();
        let restored: Cart = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, cart);
        assert_eq!(serde_json::to_string(&restored).unwrap(), json);
    }

    #[test]
    fn test_deserialize_recomputes_tampered_totals() {
        let mut cart = Cart::default();
        cart.add_product(&product("a", 1000), 2).unwrap();

        let mut value = serde_json::to_value(&cart).unwrap();
        value["item_count"] = serde_json::json!(99);
        value["subtotal"]["amount"] = serde_json::json!("0.01");

        let restored: Cart = serde_json::from_value(value).unwrap();
        assert_eq!(restored.item_count(), 2);
        assert_eq!(restored.subtotal().amount, Decimal::new(20, 0));
    }

    #[test]
    fn test_deserialize_rejects_zero_quantity() {
        let mut cart = Cart::default();
        cart.add_product(&product("a", 1000), 2).unwrap();

        let mut value = serde_json::to_value(&cart).unwrap();
        value["lines"][0]["quantity"] = serde_json::json!(0);

        assert!(serde_json::from_value::<Cart>(value).is_err());
    }
}
