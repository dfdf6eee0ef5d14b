//! Integration tests for QuickShop.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p quickshop-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `storefront_cart` - Cart routes, session persistence, JSON API
//! - `storefront_catalog` - Product and category pages, health checks
//!
//! The storefront router is driven in-process with `tower::ServiceExt::oneshot`;
//! the session cookie from each response is replayed on the next request, the
//! way a browser would.

use std::path::{Path, PathBuf};

use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Request, StatusCode, header},
};
use quickshop_storefront::config::StorefrontConfig;
use quickshop_storefront::routes;
use quickshop_storefront::state::AppState;
use tempfile::TempDir;
use tower::ServiceExt;

/// Catalog used by most tests.
///
/// `prod_shirt` is on sale (compare-at 100), `prod_mug` has a string price.
pub const CATALOG: &str = r#"[
    {
        "id": "prod_shirt",
        "name": "Linen Shirt",
        "description": "Breathable summer shirt",
        "images": ["https://files.example.com/shirt.jpg"],
        "price": {"amount": 80, "currency": "usd"},
        "categories": ["Clothing"],
        "metadata": {"sku": "LS-01", "compare_at_price": "100"}
    },
    {
        "id": "prod_socks",
        "name": "Wool Socks",
        "price": {"amount": 12, "currency": "usd"},
        "categories": ["clothing"]
    },
    {
        "id": "prod_mug",
        "name": "Stoneware Mug",
        "price": {"amount": "18.50", "currency": "usd"},
        "categories": ["kitchen"]
    }
]"#;

/// A response with its body collected.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl TestResponse {
    /// Parse the body as JSON.
    ///
    /// # Panics
    ///
    /// Panics if the body is not valid JSON.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).expect("response body is not JSON")
    }

    /// Value of a response header, if present.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// One simulated browser talking to an in-process storefront.
pub struct TestContext {
    app: Router,
    dir: TempDir,
    cookie: Option<String>,
}

impl TestContext {
    /// Start a storefront over [`CATALOG`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_catalog(CATALOG, &[])
    }

    /// Start a storefront over `catalog_json` with extra environment settings.
    ///
    /// # Panics
    ///
    /// Panics if the temp directory or configuration cannot be created.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn with_catalog(catalog_json: &str, vars: &[(&str, &str)]) -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let catalog_path = dir.path().join("products.json");
        std::fs::write(&catalog_path, catalog_json).expect("write catalog");

        let config = test_config(&catalog_path, vars);
        let app = routes::app(AppState::new(config));

        Self {
            app,
            dir,
            cookie: None,
        }
    }

    /// Path of the catalog snapshot backing this storefront.
    #[must_use]
    pub fn catalog_path(&self) -> PathBuf {
        self.dir.path().join("products.json")
    }

    /// Overwrite the catalog snapshot on disk.
    ///
    /// Takes effect once the cached copy is reloaded (see `POST /cart/refresh`).
    ///
    /// # Panics
    ///
    /// Panics if the file cannot be written.
    #[allow(clippy::expect_used)]
    pub fn write_catalog(&self, catalog_json: &str) {
        std::fs::write(self.catalog_path(), catalog_json).expect("write catalog");
    }

    /// Delete the catalog snapshot on disk.
    ///
    /// The cached copy keeps serving pages until it expires or a cart refresh
    /// forces a reload.
    ///
    /// # Panics
    ///
    /// Panics if the file cannot be removed.
    #[allow(clippy::expect_used)]
    pub fn remove_catalog(&self) {
        std::fs::remove_file(self.catalog_path()).expect("remove catalog");
    }

    /// Forget the session cookie, as a new visitor would.
    pub fn clear_cookies(&mut self) {
        self.cookie = None;
    }

    /// The current session cookie, to switch back to this visitor later.
    #[must_use]
    pub fn session_cookie(&self) -> Option<String> {
        self.cookie.clone()
    }

    /// Continue as the visitor holding `cookie`.
    pub fn resume_session(&mut self, cookie: Option<String>) {
        self.cookie = cookie;
    }

    /// Issue a GET request.
    pub async fn get(&mut self, uri: &str) -> TestResponse {
        self.send("GET", uri, None).await
    }

    /// Issue a form-encoded POST request.
    pub async fn post_form(&mut self, uri: &str, form: &str) -> TestResponse {
        self.send("POST", uri, Some(form.to_string())).await
    }

    #[allow(clippy::expect_used)]
    async fn send(&mut self, method: &str, uri: &str, form: Option<String>) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = &self.cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let body = match form {
            Some(form) => {
                builder = builder.header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
                Body::from(form)
            }
            None => Body::empty(),
        };
        let request = builder.body(body).expect("build request");

        let response = self
            .app
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");

        if let Some(cookie) = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
        {
            self.cookie = Some(cookie.to_string());
        }

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");

        TestResponse {
            status,
            headers,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        }
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Storefront configuration pointing at a test catalog.
///
/// # Panics
///
/// Panics if the variables do not form a valid configuration.
#[must_use]
#[allow(clippy::expect_used)]
pub fn test_config(catalog_path: &Path, vars: &[(&str, &str)]) -> StorefrontConfig {
    let catalog_path = catalog_path.display().to_string();
    StorefrontConfig::from_lookup(|key| {
        if let Some((_, value)) = vars.iter().find(|(k, _)| *k == key) {
            return Some((*value).to_string());
        }
        match key {
            "QUICKSHOP_BASE_URL" => Some("http://localhost:3000".to_string()),
            "QUICKSHOP_CATALOG_PATH" => Some(catalog_path.clone()),
            _ => None,
        }
    })
    .expect("valid test configuration")
}
