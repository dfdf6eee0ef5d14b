//! Product and category route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use quickshop_core::{Product, ProductId};
use serde::Deserialize;
use tracing::instrument;

use crate::catalog::CatalogSource;
use crate::config::{SaleBadge, StoreSettings};
use crate::error::{AppError, Result};
use crate::state::AppState;

/// How many related products the detail page shows.
const RELATED_LIMIT: usize = 4;

/// Product display data for templates.
#[derive(Debug, Clone)]
pub struct ProductView {
    pub id: String,
    pub name: String,
    pub description: String,
    pub price: String,
    pub compare_at_price: Option<String>,
    pub badge: Option<String>,
    pub image: Option<String>,
    pub images: Vec<String>,
    pub sku: Option<String>,
    pub categories: Vec<String>,
}

impl ProductView {
    /// Build the view, applying the store's sale badge style.
    #[must_use]
    pub fn new(product: &Product, settings: StoreSettings) -> Self {
        Self {
            id: product.id.to_string(),
            name: product.name.clone(),
            description: product.description.clone().unwrap_or_default(),
            price: product.price.display(),
            compare_at_price: product.compare_at_price().map(|p| p.display()),
            badge: sale_badge(product, settings.sale_badge),
            image: product.primary_image().map(String::from),
            images: product.images.clone(),
            sku: product.sku().map(String::from),
            categories: product.categories.clone(),
        }
    }
}

/// Badge text for a product card.
fn sale_badge(product: &Product, style: SaleBadge) -> Option<String> {
    if !product.is_on_sale() {
        return None;
    }
    match style {
        SaleBadge::Percent => Some(
            product
                .sale_percent()
                .map_or_else(|| "Sale".to_string(), |p| format!("-{p}%")),
        ),
        SaleBadge::OnSale => Some("Sale".to_string()),
        SaleBadge::Hidden => None,
    }
}

/// Category display data for templates.
#[derive(Debug, Clone)]
pub struct CategoryView {
    pub name: String,
    pub product_count: usize,
}

/// Listing filter query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct ListingQuery {
    pub category: Option<String>,
}

/// Product listing page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/index.html")]
pub struct ProductsIndexTemplate {
    pub site_name: String,
    pub products: Vec<ProductView>,
    pub categories: Vec<String>,
    pub active_category: Option<String>,
}

/// Product detail page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/show.html")]
pub struct ProductShowTemplate {
    pub site_name: String,
    pub product: ProductView,
    pub related_products: Vec<ProductView>,
    pub show_sku: bool,
    pub show_categories: bool,
    pub show_breadcrumbs: bool,
}

/// Category index template.
#[derive(Template, WebTemplate)]
#[template(path = "categories/index.html")]
pub struct CategoriesIndexTemplate {
    pub site_name: String,
    pub categories: Vec<CategoryView>,
}

/// Display product listing page, optionally filtered by category.
#[instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<ListingQuery>,
) -> Result<impl IntoResponse> {
    let catalog = state.catalog().load().await?;
    let settings = state.settings();

    let active_category = query
        .category
        .map(|c| c.trim().to_lowercase())
        .filter(|c| !c.is_empty());

    let products: Vec<ProductView> = match &active_category {
        Some(category) => catalog
            .in_category(category)
            .into_iter()
            .map(|p| ProductView::new(p, settings))
            .collect(),
        None => catalog
            .products()
            .iter()
            .map(|p| ProductView::new(p, settings))
            .collect(),
    };

    Ok(ProductsIndexTemplate {
        site_name: state.config().site_name.clone(),
        products,
        categories: catalog.categories().into_iter().map(String::from).collect(),
        active_category,
    })
}

/// Display product detail page.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let catalog = state.catalog().load().await?;
    let settings = state.settings();
    let id = ProductId::new(id);

    let product = catalog
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))?;

    let related_products: Vec<ProductView> = product
        .categories
        .first()
        .map(|category| {
            catalog
                .in_category(category)
                .into_iter()
                .filter(|p| p.id != product.id)
                .take(RELATED_LIMIT)
                .map(|p| ProductView::new(p, settings))
                .collect()
        })
        .unwrap_or_default();

    Ok(ProductShowTemplate {
        site_name: state.config().site_name.clone(),
        product: ProductView::new(product, settings),
        related_products,
        show_sku: settings.show_sku,
        show_categories: settings.show_categories,
        show_breadcrumbs: settings.show_breadcrumbs,
    })
}

/// Display the category index.
#[instrument(skip(state))]
pub async fn categories(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let catalog = state.catalog().load().await?;

    let categories: Vec<CategoryView> = catalog
        .by_category()
        .into_iter()
        .map(|(name, products)| CategoryView {
            name: name.to_string(),
            product_count: products.len(),
        })
        .collect();

    Ok(CategoriesIndexTemplate {
        site_name: state.config().site_name.clone(),
        categories,
    })
}
