//! QuickShop Core - Shared domain types.
//!
//! This crate provides the types used across all QuickShop components:
//! - `storefront` - Public-facing storefront and cart endpoints
//! - `cli` - Command-line tools for inspecting the catalog and driving a cart
//!
//! # Architecture
//!
//! The core crate contains only types and pure state transitions - no I/O,
//! no HTTP, no persistence. Storage and catalog loading live in the
//! storefront crate.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, prices and catalog products
//! - [`cart`] - The cart, its line items and the mutations that keep its
//!   derived totals consistent

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod types;

pub use cart::{Cart, CartError, CartLineItem, LineUpdate};
pub use types::*;
