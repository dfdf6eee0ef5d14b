//! Integration tests for catalog pages and health checks.

#![allow(clippy::unwrap_used)]

use axum::http::StatusCode;
use quickshop_integration_tests::{CATALOG, TestContext};

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health() {
    let mut ctx = TestContext::new();
    let resp = ctx.get("/health").await;

    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body, "ok");
    assert!(resp.header("x-request-id").is_some());
}

#[tokio::test]
async fn test_readiness_with_catalog() {
    let mut ctx = TestContext::new();
    assert_eq!(ctx.get("/health/ready").await.status, StatusCode::OK);
}

#[tokio::test]
async fn test_readiness_without_catalog() {
    let mut ctx = TestContext::new();
    ctx.remove_catalog();
    assert_eq!(
        ctx.get("/health/ready").await.status,
        StatusCode::SERVICE_UNAVAILABLE
    );
}

#[tokio::test]
async fn test_invalid_catalog_is_unavailable() {
    let duplicate = r#"[
        {"id": "x", "name": "One", "price": {"amount": 1, "currency": "usd"}},
        {"id": "x", "name": "Two", "price": {"amount": 2, "currency": "usd"}}
    ]"#;
    let mut ctx = TestContext::with_catalog(duplicate, &[]);

    let resp = ctx.get("/products").await;
    assert_eq!(resp.status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(!resp.body.contains("duplicate"));
}

// =============================================================================
// Products
// =============================================================================

#[tokio::test]
async fn test_home_redirects_to_products() {
    let mut ctx = TestContext::new();
    let resp = ctx.get("/").await;

    assert!(resp.status.is_redirection());
    assert_eq!(resp.header("location"), Some("/products"));
}

#[tokio::test]
async fn test_product_listing() {
    let mut ctx = TestContext::new();
    let resp = ctx.get("/products").await;

    assert_eq!(resp.status, StatusCode::OK);
    assert!(resp.body.contains("Linen Shirt"));
    assert!(resp.body.contains("Wool Socks"));
    assert!(resp.body.contains("Stoneware Mug"));
    assert!(resp.body.contains("$18.50"));
}

#[tokio::test]
async fn test_product_listing_by_category() {
    let mut ctx = TestContext::new();
    let resp = ctx.get("/products?category=Kitchen").await;

    assert_eq!(resp.status, StatusCode::OK);
    assert!(resp.body.contains("Stoneware Mug"));
    assert!(!resp.body.contains("Wool Socks"));
}

#[tokio::test]
async fn test_product_detail() {
    let mut ctx = TestContext::new();
    let resp = ctx.get("/products/prod_shirt").await;

    assert_eq!(resp.status, StatusCode::OK);
    assert!(resp.body.contains("Linen Shirt"));
    assert!(resp.body.contains("SKU: LS-01"));
    assert!(resp.body.contains("-20%"));
    assert!(resp.body.contains("$100.00"));
    assert!(resp.body.contains("breadcrumbs"));
    // Related product from the same category
    assert!(resp.body.contains("Wool Socks"));
}

#[tokio::test]
async fn test_product_detail_respects_settings() {
    let mut ctx = TestContext::with_catalog(
        CATALOG,
        &[
            ("QUICKSHOP_SHOW_SKU", "false"),
            ("QUICKSHOP_SHOW_BREADCRUMBS", "false"),
            ("QUICKSHOP_SALE_BADGE", "hidden"),
        ],
    );
    let resp = ctx.get("/products/prod_shirt").await;

    assert_eq!(resp.status, StatusCode::OK);
    assert!(!resp.body.contains("SKU: LS-01"));
    assert!(!resp.body.contains("-20%"));
    assert!(!resp.body.contains("class=\"breadcrumbs\""));
}

#[tokio::test]
async fn test_on_sale_badge_style() {
    let mut ctx = TestContext::with_catalog(CATALOG, &[("QUICKSHOP_SALE_BADGE", "on_sale")]);
    let resp = ctx.get("/products/prod_shirt").await;

    assert!(resp.body.contains("<span class=\"badge\">Sale</span>"));
}

#[tokio::test]
async fn test_unknown_product_is_not_found() {
    let mut ctx = TestContext::new();
    let resp = ctx.get("/products/prod_missing").await;

    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_categories_index() {
    let mut ctx = TestContext::new();
    let resp = ctx.get("/categories").await;

    assert_eq!(resp.status, StatusCode::OK);
    assert!(resp.body.contains("clothing"));
    assert!(resp.body.contains("(2)"));
    assert!(resp.body.contains("kitchen"));
    assert!(resp.body.contains("(1)"));
}
