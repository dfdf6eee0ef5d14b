//! Catalog product records.

use std::collections::BTreeMap;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::ProductId;
use super::price::Price;

/// Metadata key holding the stock keeping unit.
pub const METADATA_SKU: &str = "sku";
/// Metadata key flagging a product as discounted.
pub const METADATA_ON_SALE: &str = "on_sale";
/// Metadata key holding the regular (pre-sale) price in the product's currency.
pub const METADATA_COMPARE_AT: &str = "compare_at_price";

/// A purchasable product from the catalog snapshot.
///
/// Read-only reference data: the cart stores a copy of the product on each
/// line item, but never modifies it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Payment processor product ID.
    pub id: ProductId,
    /// Display name.
    pub name: String,
    /// Long description.
    #[serde(default)]
    pub description: Option<String>,
    /// Image URLs, first one is the primary image.
    #[serde(default)]
    pub images: Vec<String>,
    /// Unit price.
    pub price: Price,
    /// Lowercase category slugs.
    #[serde(default)]
    pub categories: Vec<String>,
    /// Free-form string metadata from the payment processor.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl Product {
    /// Primary image URL, if any.
    #[must_use]
    pub fn primary_image(&self) -> Option<&str> {
        self.images.first().map(String::as_str)
    }

    /// Stock keeping unit from metadata.
    #[must_use]
    pub fn sku(&self) -> Option<&str> {
        self.metadata
            .get(METADATA_SKU)
            .map(String::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Regular price when the product is discounted.
    ///
    /// Only returned when it is strictly above the current price.
    #[must_use]
    pub fn compare_at_price(&self) -> Option<Price> {
        let amount = self
            .metadata
            .get(METADATA_COMPARE_AT)
            .and_then(|raw| Decimal::from_str(raw.trim()).ok())?;
        (amount > self.price.amount).then(|| Price::new(amount, self.price.currency))
    }

    /// Whether the product is currently on sale.
    #[must_use]
    pub fn is_on_sale(&self) -> bool {
        let flagged = self
            .metadata
            .get(METADATA_ON_SALE)
            .is_some_and(|v| v.eq_ignore_ascii_case("true") || v == "1");
        flagged || self.compare_at_price().is_some()
    }

    /// Discount against the compare-at price, as a whole percentage.
    #[must_use]
    pub fn sale_percent(&self) -> Option<u32> {
        let regular = self.compare_at_price()?;
        let saved = regular.amount.checked_sub(self.price.amount)?;
        let percent = saved
            .checked_mul(Decimal::ONE_HUNDRED)?
            .checked_div(regular.amount)?
            .round();
        u32::try_from(percent.mantissa()).ok()
    }

    /// Normalize category slugs the way the catalog sync writes them:
    /// lowercase, trimmed, empty entries dropped.
    pub fn normalize_categories(&mut self) {
        self.categories = self
            .categories
            .iter()
            .map(|c| c.trim().to_lowercase())
            .filter(|c| !c.is_empty())
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::price::CurrencyCode;

    fn product(metadata: &[(&str, &str)]) -> Product {
        Product {
            id: ProductId::new("prod_1"),
            name: "Linen Shirt".to_string(),
            description: None,
            images: vec!["https://img/1.jpg".to_string()],
            price: Price::from_cents(8000, CurrencyCode::USD),
            categories: vec![" Clothing ".to_string(), String::new(), "SALE".to_string()],
            metadata: metadata
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        }
    }

    #[test]
    fn test_deserialize_snapshot_record() {
        let json = r#"{
            "id": "prod_Q1",
            "name": "Mug",
            "description": null,
            "images": [],
            "price": {"amount": 12.5, "currency": "eur"},
            "categories": ["kitchen"],
            "metadata": {"category": "kitchen", "sku": "MUG-1"}
        }"#;
        let product: Product = serde_json::from_str(json).expect("parse");
        assert_eq!(product.id.as_str(), "prod_Q1");
        assert_eq!(product.sku(), Some("MUG-1"));
        assert_eq!(product.price.display(), "€12.50");
        assert_eq!(product.primary_image(), None);
    }

    #[test]
    fn test_missing_optional_fields_default() {
        let json = r#"{"id": "p", "name": "Bare", "price": {"amount": 1, "currency": "usd"}}"#;
        let product: Product = serde_json::from_str(json).expect("parse");
        assert!(product.images.is_empty());
        assert!(product.categories.is_empty());
        assert!(product.metadata.is_empty());
    }

    #[test]
    fn test_sale_percent_from_compare_at() {
        let p = product(&[(METADATA_COMPARE_AT, "100.00")]);
        assert!(p.is_on_sale());
        assert_eq!(p.sale_percent(), Some(20));
    }

    #[test]
    fn test_compare_at_below_price_is_ignored() {
        let p = product(&[(METADATA_COMPARE_AT, "50")]);
        assert_eq!(p.compare_at_price(), None);
        assert!(!p.is_on_sale());
    }

    #[test]
    fn test_on_sale_flag_without_compare_at() {
        let p = product(&[(METADATA_ON_SALE, "true")]);
        assert!(p.is_on_sale());
        assert_eq!(p.sale_percent(), None);
    }

    #[test]
    fn test_normalize_categories() {
        let mut p = product(&[]);
        p.normalize_categories();
        assert_eq!(p.categories, vec!["clothing", "sale"]);
    }
}
