//! Terminal cart commands.
//!
//! The cart is persisted as JSON under the state directory (default
//! `.quickshop/cart.json`), so consecutive invocations share one cart.
//!
//! # Usage
//!
//! ```bash
//! qs-cli cart add prod_PqR1 -q 2
//! qs-cli cart show
//! qs-cli cart update item_3f2a... 0
//! qs-cli cart refresh
//! ```
//!
//! # Environment Variables
//!
//! - `QUICKSHOP_STATE_DIR` - Where the cart is persisted (default: `.quickshop`)
//! - `QUICKSHOP_AUTO_OPEN_CART` - Open the cart panel after `add`

use std::fmt::Write as _;

use quickshop_core::{Cart, LineItemKey, ProductId};
use quickshop_storefront::cart::{CartManager, CartOutcome, FileStorage};

use super::{CommandError, Context};

/// Print the cart.
#[allow(clippy::print_stdout)]
pub async fn show(ctx: &Context) -> Result<(), CommandError> {
    let manager = ctx.cart_manager().await?;
    print!("{}", render_cart(&manager));
    Ok(())
}

/// Add a product and print the cart.
#[allow(clippy::print_stdout)]
pub async fn add(ctx: &Context, product_id: &str, quantity: u32) -> Result<(), CommandError> {
    let mut manager = ctx.cart_manager().await?;
    let outcome = manager
        .add_to_cart(&ProductId::new(product_id), quantity)
        .await;
    check(outcome, "add", || format!("product {product_id}"))?;
    print!("{}", render_cart(&manager));
    Ok(())
}

/// Set a line's quantity and print the cart.
#[allow(clippy::print_stdout)]
pub async fn update(ctx: &Context, key: &str, quantity: i64) -> Result<(), CommandError> {
    let mut manager = ctx.cart_manager().await?;
    let outcome = manager
        .update_item_quantity(&LineItemKey::new(key), quantity)
        .await;
    check(outcome, "update", || format!("line item {key}"))?;
    print!("{}", render_cart(&manager));
    Ok(())
}

/// Remove a line and print the cart.
#[allow(clippy::print_stdout)]
pub async fn remove(ctx: &Context, key: &str) -> Result<(), CommandError> {
    let mut manager = ctx.cart_manager().await?;
    let outcome = manager.remove_item(&LineItemKey::new(key)).await;
    check(outcome, "remove", || format!("line item {key}"))?;
    print!("{}", render_cart(&manager));
    Ok(())
}

/// Empty the cart.
pub async fn empty(ctx: &Context) -> Result<(), CommandError> {
    let mut manager = ctx.cart_manager().await?;
    manager.empty_cart().await;
    tracing::info!("Cart emptied");
    Ok(())
}

/// Re-synchronize the cart with the catalog and print it.
///
/// A snapshot that cannot be read clears the persisted cart.
#[allow(clippy::print_stdout)]
pub async fn refresh(ctx: &Context) -> Result<(), CommandError> {
    let mut manager = ctx.refresh_manager().await?;
    if !manager.refresh_cart(ctx.catalog_source()).await {
        return Err(CommandError::Failed("refresh"));
    }
    print!("{}", render_cart(&manager));
    Ok(())
}

/// Show, hide or flip the cart panel.
#[allow(clippy::print_stdout)]
pub async fn toggle(ctx: &Context, open: Option<bool>) -> Result<(), CommandError> {
    let mut manager = ctx.cart_manager().await?;
    let open = manager.toggle_cart(open).await;
    println!("Cart panel {}", if open { "open" } else { "closed" });
    Ok(())
}

fn check(
    outcome: CartOutcome,
    operation: &'static str,
    what: impl FnOnce() -> String,
) -> Result<(), CommandError> {
    match outcome {
        CartOutcome::Applied(_) => Ok(()),
        CartOutcome::NotFound => Err(CommandError::NotFound(what())),
        CartOutcome::Failed => Err(CommandError::Failed(operation)),
    }
}

fn render_cart(manager: &CartManager<FileStorage>) -> String {
    match manager.cart() {
        Some(cart) if !cart.is_empty() => render_lines(cart),
        _ => "Cart is empty.\n".to_string(),
    }
}

fn render_lines(cart: &Cart) -> String {
    let mut out = String::new();
    for line in cart.lines() {
        let total = line
            .line_total()
            .map(|p| p.display())
            .unwrap_or_default();
        let _ = writeln!(
            out,
            "{}  {:>3} x {:<24} {:>10} {:>10}",
            line.key,
            line.quantity,
            line.product.name,
            line.product.price.display(),
            total
        );
    }
    let _ = writeln!(
        out,
        "{} item(s), {} product(s). Subtotal {}  Total {}",
        cart.item_count(),
        cart.product_count(),
        cart.subtotal().display(),
        cart.total().display()
    );
    out
}
