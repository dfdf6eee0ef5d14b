//! Cart route handlers.
//!
//! Cart operations use HTMX for dynamic updates without full page reloads.
//! Each request restores the visitor's [`CartManager`] from the session, runs
//! one operation and lets the manager write the cart back.

use std::str::FromStr;
use std::sync::Arc;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form, Json,
    extract::State,
    http::StatusCode,
    response::{AppendHeaders, Html, IntoResponse, Response},
};
use quickshop_core::{Cart, CartLineItem, LineItemKey, ProductId};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use tower_sessions::Session;
use tracing::{instrument, warn};

use crate::cart::{CartManager, CartOutcome, SessionStorage, StorageError};
use crate::catalog::{Catalog, CatalogSource};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::state::AppState;

/// Header telling HTMX listeners to re-fetch cart fragments.
const CART_UPDATED: [(&str, &str); 1] = [("HX-Trigger", "cart-updated")];

/// Cart item display data for templates.
#[derive(Debug, Clone, Serialize)]
pub struct CartItemView {
    pub key: String,
    pub product_id: String,
    pub name: String,
    pub sku: Option<String>,
    pub quantity: u32,
    pub price: String,
    pub line_price: String,
    pub image: Option<String>,
}

/// Cart display data for templates and the JSON API.
#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub items: Vec<CartItemView>,
    pub item_count: u32,
    pub product_count: u32,
    pub subtotal: String,
    pub total: String,
    pub subtotal_amount: Decimal,
    pub total_amount: Decimal,
    pub currency: String,
    pub is_empty: bool,
}

impl CartView {
    /// Create an empty cart.
    #[must_use]
    pub fn empty() -> Self {
        Self::from(&Cart::default())
    }
}

// =============================================================================
// Type Conversions
// =============================================================================

impl From<&Cart> for CartView {
    fn from(cart: &Cart) -> Self {
        Self {
            items: cart.lines().iter().map(CartItemView::from).collect(),
            item_count: cart.item_count(),
            product_count: cart.product_count(),
            subtotal: cart.subtotal().display(),
            total: cart.total().display(),
            subtotal_amount: cart.subtotal().amount,
            total_amount: cart.total().amount,
            currency: cart.currency().code().to_string(),
            is_empty: cart.is_empty(),
        }
    }
}

impl From<Option<&Cart>> for CartView {
    fn from(cart: Option<&Cart>) -> Self {
        cart.map_or_else(Self::empty, Self::from)
    }
}

impl From<&CartLineItem> for CartItemView {
    fn from(line: &CartLineItem) -> Self {
        Self {
            key: line.key.to_string(),
            product_id: line.product.id.to_string(),
            name: line.product.name.clone(),
            sku: line.product.sku().map(String::from),
            quantity: line.quantity,
            price: line.product.price.display(),
            line_price: line
                .line_total()
                .map(|total| total.display())
                .unwrap_or_default(),
            image: line.product.primary_image().map(String::from),
        }
    }
}

// =============================================================================
// Session Helpers
// =============================================================================

/// Restore the visitor's cart manager from the session.
async fn restore_manager(
    state: &AppState,
    session: &Session,
) -> Result<CartManager<SessionStorage>> {
    let catalog = state.catalog().load().await?;
    Ok(restore_with(state, session, catalog).await)
}

async fn restore_with(
    state: &AppState,
    session: &Session,
    catalog: Arc<Catalog>,
) -> CartManager<SessionStorage> {
    CartManager::restore(SessionStorage::new(session.clone()), catalog, state.settings()).await
}

/// Write the session back before answering with a server error.
///
/// The session layer only persists changes on non-5xx responses, and a failed
/// operation has just reset the cart.
async fn save_session(session: &Session) -> Result<()> {
    if session.id().is_some() {
        session.save().await.map_err(StorageError::from)?;
    }
    Ok(())
}

/// Treat an empty form field as absent.
fn empty_string_as_none<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    match s.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

// =============================================================================
// Forms
// =============================================================================

/// Add to cart form data.
#[derive(Debug, Deserialize)]
pub struct AddToCartForm {
    pub product_id: String,
    /// Missing or empty means 1.
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub quantity: Option<u32>,
}

/// Update cart form data.
///
/// `quantity` is the new absolute quantity; zero or less removes the line.
#[derive(Debug, Deserialize)]
pub struct UpdateCartForm {
    pub key: String,
    pub quantity: i64,
}

/// Remove from cart form data.
#[derive(Debug, Deserialize)]
pub struct RemoveFromCartForm {
    pub key: String,
}

/// Toggle cart panel form data.
#[derive(Debug, Default, Deserialize)]
pub struct ToggleCartForm {
    pub open: Option<bool>,
}

// =============================================================================
// Templates
// =============================================================================

/// Cart page template.
#[derive(Template, WebTemplate)]
#[template(path = "cart/show.html")]
pub struct CartShowTemplate {
    pub site_name: String,
    pub cart: CartView,
    pub is_showing_cart: bool,
}

/// Cart items fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_items.html")]
pub struct CartItemsTemplate {
    pub cart: CartView,
}

/// Cart count badge fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_count.html")]
pub struct CartCountTemplate {
    pub count: u32,
}

/// Cart state returned by the JSON API.
#[derive(Debug, Serialize)]
pub struct CartStateResponse {
    #[serde(flatten)]
    pub cart: CartView,
    pub is_showing_cart: bool,
}

/// Cart panel state returned by the toggle endpoint.
#[derive(Debug, Serialize)]
pub struct CartPanelResponse {
    pub open: bool,
}

/// Render the cart items fragment, with the update trigger when the cart
/// changed.
async fn items_fragment(
    session: &Session,
    manager: &CartManager<SessionStorage>,
    outcome: &CartOutcome,
) -> Result<Response> {
    let fragment = CartItemsTemplate {
        cart: CartView::from(manager.cart()),
    };

    Ok(match outcome {
        CartOutcome::Applied(_) => (AppendHeaders(CART_UPDATED), fragment).into_response(),
        CartOutcome::NotFound => fragment.into_response(),
        CartOutcome::Failed => {
            save_session(session).await?;
            (StatusCode::INTERNAL_SERVER_ERROR, AppendHeaders(CART_UPDATED), fragment)
                .into_response()
        }
    })
}

// =============================================================================
// Handlers
// =============================================================================

/// Display cart page.
#[instrument(skip(state, session))]
pub async fn show(State(state): State<AppState>, session: Session) -> Result<impl IntoResponse> {
    let manager = restore_manager(&state, &session).await?;

    Ok(CartShowTemplate {
        site_name: state.config().site_name.clone(),
        cart: CartView::from(manager.cart()),
        is_showing_cart: manager.is_showing_cart(),
    })
}

/// Add item to cart (HTMX).
///
/// Returns the updated count badge and an HTMX trigger so other cart
/// fragments refresh.
#[instrument(skip(state, session))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<AddToCartForm>,
) -> Result<Response> {
    let mut manager = restore_manager(&state, &session).await?;
    let product_id = ProductId::new(form.product_id);

    add_breadcrumb(
        "cart",
        "Add to cart",
        Some(&[("product_id", product_id.as_str())]),
    );

    match manager
        .add_to_cart(&product_id, form.quantity.unwrap_or(1))
        .await
    {
        CartOutcome::Applied(_) => Ok((
            AppendHeaders(CART_UPDATED),
            CartCountTemplate {
                count: manager.item_count(),
            },
        )
            .into_response()),
        CartOutcome::NotFound => Err(AppError::NotFound(format!("product {product_id}"))),
        CartOutcome::Failed => {
            save_session(&session).await?;
            Ok((
                StatusCode::INTERNAL_SERVER_ERROR,
                AppendHeaders(CART_UPDATED),
                Html("<span class=\"text-red-500\">Error adding to cart</span>"),
            )
                .into_response())
        }
    }
}

/// Update cart item quantity (HTMX).
#[instrument(skip(state, session))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<UpdateCartForm>,
) -> Result<Response> {
    let mut manager = restore_manager(&state, &session).await?;
    let outcome = manager
        .update_item_quantity(&LineItemKey::new(form.key), form.quantity)
        .await;
    items_fragment(&session, &manager, &outcome).await
}

/// Remove item from cart (HTMX).
#[instrument(skip(state, session))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<RemoveFromCartForm>,
) -> Result<Response> {
    let mut manager = restore_manager(&state, &session).await?;
    let outcome = manager.remove_item(&LineItemKey::new(form.key)).await;
    items_fragment(&session, &manager, &outcome).await
}

/// Remove every item from the cart (HTMX).
#[instrument(skip(state, session))]
pub async fn empty(State(state): State<AppState>, session: Session) -> Result<Response> {
    let mut manager = restore_manager(&state, &session).await?;
    let outcome = manager.empty_cart().await;
    items_fragment(&session, &manager, &outcome).await
}

/// Re-synchronize the cart with a freshly loaded catalog (HTMX).
///
/// Responds 503 with an empty cart fragment when the catalog cannot be
/// reloaded; the cart has been reset by then.
#[instrument(skip(state, session))]
pub async fn refresh(State(state): State<AppState>, session: Session) -> Result<Response> {
    // The refresh reloads the catalog itself and clears the cart if that fails
    let catalog = match state.catalog().load().await {
        Ok(catalog) => catalog,
        Err(e) => {
            warn!(error = %e, "Catalog unavailable ahead of cart refresh");
            Arc::default()
        }
    };
    let mut manager = restore_with(&state, &session, catalog).await;

    if manager.refresh_cart(state.catalog()).await {
        items_fragment(&session, &manager, &CartOutcome::Applied(None)).await
    } else {
        save_session(&session).await?;
        Ok((
            StatusCode::SERVICE_UNAVAILABLE,
            AppendHeaders(CART_UPDATED),
            CartItemsTemplate {
                cart: CartView::empty(),
            },
        )
            .into_response())
    }
}

/// Show, hide or flip the cart panel.
#[instrument(skip(state, session))]
pub async fn toggle(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<ToggleCartForm>,
) -> Result<Json<CartPanelResponse>> {
    let mut manager = restore_manager(&state, &session).await?;
    let open = manager.toggle_cart(form.open).await;
    Ok(Json(CartPanelResponse { open }))
}

/// Get cart count badge (HTMX).
#[instrument(skip(state, session))]
pub async fn count(State(state): State<AppState>, session: Session) -> Result<impl IntoResponse> {
    let manager = restore_manager(&state, &session).await?;

    Ok(CartCountTemplate {
        count: manager.item_count(),
    })
}

/// Cart state as JSON.
#[instrument(skip(state, session))]
pub async fn api_show(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<CartStateResponse>> {
    let manager = restore_manager(&state, &session).await?;

    Ok(Json(CartStateResponse {
        cart: CartView::from(manager.cart()),
        is_showing_cart: manager.is_showing_cart(),
    }))
}
