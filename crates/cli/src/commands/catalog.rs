//! Catalog inspection commands.
//!
//! # Usage
//!
//! ```bash
//! qs-cli catalog list
//! qs-cli catalog list --category kitchen
//! qs-cli catalog show prod_PqR1
//! qs-cli catalog categories
//! ```

use std::fmt::Write as _;

use quickshop_core::{Product, ProductId};
use quickshop_storefront::catalog::Catalog;

use super::{CommandError, Context};

/// Print every product, or only those in `category`.
#[allow(clippy::print_stdout)]
pub async fn list(ctx: &Context, category: Option<&str>) -> Result<(), CommandError> {
    let catalog = ctx.load_catalog().await?;
    print!("{}", render_list(&catalog, category));
    Ok(())
}

/// Print one product in full.
#[allow(clippy::print_stdout)]
pub async fn show(ctx: &Context, id: &str) -> Result<(), CommandError> {
    let catalog = ctx.load_catalog().await?;
    let product = catalog
        .get(&ProductId::new(id))
        .ok_or_else(|| CommandError::NotFound(format!("product {id}")))?;
    print!("{}", render_product(product));
    Ok(())
}

/// Print categories with product counts.
#[allow(clippy::print_stdout)]
pub async fn categories(ctx: &Context) -> Result<(), CommandError> {
    let catalog = ctx.load_catalog().await?;
    print!("{}", render_categories(&catalog));
    Ok(())
}

fn render_list(catalog: &Catalog, category: Option<&str>) -> String {
    let products: Vec<&Product> = match category {
        Some(category) => catalog.in_category(category),
        None => catalog.products().iter().collect(),
    };

    if products.is_empty() {
        return "No products found.\n".to_string();
    }

    let mut out = String::new();
    for product in products {
        let sale = if product.is_on_sale() { "  [sale]" } else { "" };
        let _ = writeln!(
            out,
            "{:<24} {:>10}  {}{sale}",
            product.id,
            product.price.display(),
            product.name
        );
    }
    out
}

fn render_product(product: &Product) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} ({})", product.name, product.id);
    let _ = write!(out, "Price:      {}", product.price.display());
    if let Some(regular) = product.compare_at_price() {
        let _ = write!(out, " (was {})", regular.display());
    }
    out.push('\n');
    if let Some(sku) = product.sku() {
        let _ = writeln!(out, "SKU:        {sku}");
    }
    if !product.categories.is_empty() {
        let _ = writeln!(out, "Categories: {}", product.categories.join(", "));
    }
    if let Some(description) = &product.description {
        let _ = writeln!(out, "\n{description}");
    }
    out
}

fn render_categories(catalog: &Catalog) -> String {
    let mut out = String::new();
    for (name, products) in catalog.by_category() {
        let _ = writeln!(out, "{name} ({})", products.len());
    }
    out
}
