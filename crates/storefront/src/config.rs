//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `QUICKSHOP_BASE_URL` - Public URL for the storefront
//!
//! ## Optional
//! - `QUICKSHOP_HOST` - Bind address (default: 127.0.0.1)
//! - `QUICKSHOP_PORT` - Listen port (default: 3000)
//! - `QUICKSHOP_SITE_NAME` - Site name shown in page titles (default: `QuickShop`)
//! - `QUICKSHOP_CATALOG_PATH` - Catalog snapshot file (default: `data/products.json`)
//! - `QUICKSHOP_CATALOG_TTL_SECS` - How long a loaded catalog is reused (default: 300)
//! - `QUICKSHOP_AUTO_OPEN_CART` - Reveal the cart panel after adding (default: false)
//! - `QUICKSHOP_SHOW_SKU` - Show SKUs on product pages (default: true)
//! - `QUICKSHOP_SHOW_CATEGORIES` - Show category links on product pages (default: true)
//! - `QUICKSHOP_SHOW_BREADCRUMBS` - Show breadcrumbs on product pages (default: true)
//! - `QUICKSHOP_SALE_BADGE` - `percent`, `on_sale` or `hidden` (default: percent)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment tag

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront
    pub base_url: Url,
    /// Site name used in page titles
    pub site_name: String,
    /// Catalog snapshot location and caching
    pub catalog: CatalogConfig,
    /// Display and cart behaviour toggles
    pub store: StoreSettings,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<SecretString>,
    /// Sentry environment tag
    pub sentry_environment: Option<String>,
}

/// Where the catalog snapshot lives and how long it is cached.
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    /// Path to `products.json`
    pub path: PathBuf,
    /// Time-to-live for the in-memory copy
    pub ttl: Duration,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/products.json"),
            ttl: Duration::from_secs(300),
        }
    }
}

/// How sale prices are badged on product cards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SaleBadge {
    /// "-20%"
    #[default]
    Percent,
    /// "Sale"
    OnSale,
    /// No badge
    Hidden,
}

impl FromStr for SaleBadge {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "percent" => Ok(Self::Percent),
            "on_sale" | "onsale" => Ok(Self::OnSale),
            "hidden" => Ok(Self::Hidden),
            other => Err(format!("expected percent, on_sale or hidden, got '{other}'")),
        }
    }
}

/// Store display settings.
///
/// The cart reads only `auto_open_cart`; the remaining toggles are consumed
/// by the product pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct StoreSettings {
    /// Reveal the cart panel right after an item is added
    pub auto_open_cart: bool,
    /// Show the SKU on product pages
    pub show_sku: bool,
    /// Show category links on product pages
    pub show_categories: bool,
    /// Show breadcrumbs on product pages
    pub show_breadcrumbs: bool,
    /// Sale badge style
    pub sale_badge: SaleBadge,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            auto_open_cart: false,
            show_sku: true,
            show_categories: true,
            show_breadcrumbs: true,
            sale_badge: SaleBadge::Percent,
        }
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(&lookup);

        let host = env.parse_or("QUICKSHOP_HOST", IpAddr::from([127, 0, 0, 1]))?;
        let port = env.parse_or("QUICKSHOP_PORT", 3000_u16)?;
        let base_url = env.required("QUICKSHOP_BASE_URL")?;
        let base_url = Url::parse(&base_url).map_err(|e| {
            ConfigError::InvalidEnvVar("QUICKSHOP_BASE_URL".to_string(), e.to_string())
        })?;
        let site_name = env
            .optional("QUICKSHOP_SITE_NAME")
            .unwrap_or_else(|| "QuickShop".to_string());

        let catalog = CatalogConfig::from_env(&env)?;
        let store = StoreSettings::from_env_with(&env)?;

        Ok(Self {
            host,
            port,
            base_url,
            site_name,
            catalog,
            store,
            sentry_dsn: env.optional("SENTRY_DSN").map(SecretString::from),
            sentry_environment: env.optional("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether the storefront is served over HTTPS (secure cookies).
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.scheme() == "https"
    }
}

impl CatalogConfig {
    fn from_env<F: Fn(&str) -> Option<String>>(env: &Env<'_, F>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            path: env
                .optional("QUICKSHOP_CATALOG_PATH")
                .map_or(defaults.path, PathBuf::from),
            ttl: Duration::from_secs(
                env.parse_or("QUICKSHOP_CATALOG_TTL_SECS", defaults.ttl.as_secs())?,
            ),
        })
    }
}

impl StoreSettings {
    /// Load store settings from process environment, falling back to defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a toggle holds an unparseable value.
    pub fn from_env() -> Result<Self, ConfigError> {
        let lookup = |key: &str| std::env::var(key).ok();
        Self::from_env_with(&Env(&lookup))
    }

    fn from_env_with<F: Fn(&str) -> Option<String>>(env: &Env<'_, F>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            auto_open_cart: env.flag_or("QUICKSHOP_AUTO_OPEN_CART", defaults.auto_open_cart)?,
            show_sku: env.flag_or("QUICKSHOP_SHOW_SKU", defaults.show_sku)?,
            show_categories: env.flag_or("QUICKSHOP_SHOW_CATEGORIES", defaults.show_categories)?,
            show_breadcrumbs: env
                .flag_or("QUICKSHOP_SHOW_BREADCRUMBS", defaults.show_breadcrumbs)?,
            sale_badge: env.parse_or("QUICKSHOP_SALE_BADGE", defaults.sale_badge)?,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Thin wrapper over a variable lookup with typed accessors.
struct Env<'a, F>(&'a F);

impl<F: Fn(&str) -> Option<String>> Env<'_, F> {
    /// Get an optional variable, treating empty values as unset.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    /// Get a required variable.
    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key)
            .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
    }

    /// Parse a variable, falling back to a default when unset.
    fn parse_or<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.optional(key).map_or(Ok(default), |raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
        })
    }

    /// Parse a boolean toggle (`true/false`, `1/0`, `yes/no`, `on/off`).
    fn flag_or(&self, key: &str, default: bool) -> Result<bool, ConfigError> {
        self.optional(key).map_or(Ok(default), |raw| parse_flag(&raw).ok_or_else(|| {
            ConfigError::InvalidEnvVar(key.to_string(), format!("expected a boolean, got '{raw}'"))
        }))
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<StorefrontConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        StorefrontConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("QUICKSHOP_BASE_URL", "http://localhost:3000")]).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.site_name, "QuickShop");
        assert_eq!(config.catalog.path, PathBuf::from("data/products.json"));
        assert_eq!(config.catalog.ttl, Duration::from_secs(300));
        assert_eq!(config.store, StoreSettings::default());
        assert!(!config.store.auto_open_cart);
        assert!(config.sentry_dsn.is_none());
        assert!(!config.is_secure());
    }

    #[test]
    fn test_missing_base_url() {
        let err = load(&[]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref k) if k == "QUICKSHOP_BASE_URL"));
    }

    #[test]
    fn test_invalid_port() {
        let err = load(&[
            ("QUICKSHOP_BASE_URL", "http://localhost:3000"),
            ("QUICKSHOP_PORT", "not-a-port"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(ref k, _) if k == "QUICKSHOP_PORT"));
    }

    #[test]
    fn test_store_settings_overrides() {
        let config = load(&[
            ("QUICKSHOP_BASE_URL", "https://shop.example.com"),
            ("QUICKSHOP_AUTO_OPEN_CART", "yes"),
            ("QUICKSHOP_SHOW_SKU", "0"),
            ("QUICKSHOP_SALE_BADGE", "on_sale"),
        ])
        .unwrap();
        assert!(config.store.auto_open_cart);
        assert!(!config.store.show_sku);
        assert!(config.store.show_breadcrumbs);
        assert_eq!(config.store.sale_badge, SaleBadge::OnSale);
        assert!(config.is_secure());
    }

    #[test]
    fn test_invalid_flag() {
        let err = load(&[
            ("QUICKSHOP_BASE_URL", "http://localhost:3000"),
            ("QUICKSHOP_AUTO_OPEN_CART", "sometimes"),
        ])
        .unwrap_err();
        assert!(
            matches!(err, ConfigError::InvalidEnvVar(ref k, _) if k == "QUICKSHOP_AUTO_OPEN_CART")
        );
    }

    #[test]
    fn test_sale_badge_parse() {
        assert_eq!("percent".parse::<SaleBadge>(), Ok(SaleBadge::Percent));
        assert_eq!("onSale".parse::<SaleBadge>(), Ok(SaleBadge::OnSale));
        assert_eq!("HIDDEN".parse::<SaleBadge>(), Ok(SaleBadge::Hidden));
        assert!("loud".parse::<SaleBadge>().is_err());
    }

    #[test]
    fn test_socket_addr() {
        let config = load(&[
            ("QUICKSHOP_BASE_URL", "http://localhost:3000"),
            ("QUICKSHOP_HOST", "0.0.0.0"),
            ("QUICKSHOP_PORT", "8080"),
        ])
        .unwrap();
        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "0.0.0.0");
        assert_eq!(addr.port(), 8080);
    }
}
