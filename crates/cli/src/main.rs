//! QuickShop CLI - catalog inspection and a terminal cart.
//!
//! # Usage
//!
//! ```bash
//! # List products, optionally by category
//! qs-cli catalog list --category clothing
//!
//! # Show one product
//! qs-cli catalog show prod_PqR1
//!
//! # Drive a cart persisted under .quickshop/
//! qs-cli cart add prod_PqR1 --quantity 2
//! qs-cli cart update item_3f2a... 5
//! qs-cli cart show
//! qs-cli cart empty
//! ```
//!
//! # Commands
//!
//! - `catalog` - Inspect the catalog snapshot
//! - `cart` - Drive a file-persisted cart

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

use commands::Context;

#[derive(Parser)]
#[command(name = "qs-cli")]
#[command(author, version, about = "QuickShop CLI tools")]
struct Cli {
    /// Catalog snapshot file
    #[arg(
        long,
        global = true,
        env = "QUICKSHOP_CATALOG_PATH",
        default_value = "data/products.json"
    )]
    catalog: PathBuf,

    /// Directory holding the persisted cart
    #[arg(
        long,
        global = true,
        env = "QUICKSHOP_STATE_DIR",
        default_value = ".quickshop"
    )]
    state_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect the catalog snapshot
    Catalog {
        #[command(subcommand)]
        action: CatalogAction,
    },
    /// Drive a file-persisted cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
}

#[derive(Subcommand)]
enum CatalogAction {
    /// List products
    List {
        /// Only products in this category
        #[arg(short, long)]
        category: Option<String>,
    },
    /// Show one product
    Show {
        /// Product ID
        id: String,
    },
    /// List categories with product counts
    Categories,
}

#[derive(Subcommand)]
enum CartAction {
    /// Print the cart
    Show,
    /// Add a product
    Add {
        /// Product ID
        product_id: String,

        /// Quantity to add (0 counts as 1)
        #[arg(short, long, default_value_t = 1)]
        quantity: u32,
    },
    /// Set a line's quantity (0 or less removes it)
    Update {
        /// Line item key
        key: String,

        /// New quantity
        #[arg(allow_hyphen_values = true)]
        quantity: i64,
    },
    /// Remove a line
    Remove {
        /// Line item key
        key: String,
    },
    /// Remove every line
    Empty,
    /// Re-synchronize lines with the catalog
    Refresh,
    /// Show or hide the cart panel (flips it without --open)
    Toggle {
        /// Explicit state
        #[arg(long)]
        open: Option<bool>,
    },
}

#[tokio::main]
async fn main() {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = Context::new(cli.catalog, cli.state_dir);

    match cli.command {
        Commands::Catalog { action } => match action {
            CatalogAction::List { category } => {
                commands::catalog::list(&ctx, category.as_deref()).await?;
            }
            CatalogAction::Show { id } => commands::catalog::show(&ctx, &id).await?,
            CatalogAction::Categories => commands::catalog::categories(&ctx).await?,
        },
        Commands::Cart { action } => match action {
            CartAction::Show => commands::cart::show(&ctx).await?,
            CartAction::Add {
                product_id,
                quantity,
            } => commands::cart::add(&ctx, &product_id, quantity).await?,
            CartAction::Update { key, quantity } => {
                commands::cart::update(&ctx, &key, quantity).await?;
            }
            CartAction::Remove { key } => commands::cart::remove(&ctx, &key).await?,
            CartAction::Empty => commands::cart::empty(&ctx).await?,
            CartAction::Refresh => commands::cart::refresh(&ctx).await?,
            CartAction::Toggle { open } => commands::cart::toggle(&ctx, open).await?,
        },
    }
    Ok(())
}
