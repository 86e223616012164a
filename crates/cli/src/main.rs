//! Shopfront CLI - a command-line storefront.
//!
//! # Usage
//!
//! ```bash
//! # Log in (the password is read from stdin when not given)
//! shop login -e me@example.com
//!
//! # Browse and fill the cart
//! shop products --search lamp
//! shop cart add 12 --quantity 2
//! shop cart dec 40
//!
//! # Place an order and pay for it
//! shop checkout --address 3 --coupon SAVE50
//! shop pay 17
//! ```
//!
//! # Environment Variables
//!
//! See `shopfront_client::config` for the full list; `SHOPFRONT_API_URL` is
//! required. Logs go to stderr and honor `RUST_LOG`.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::io::Write;

use clap::{Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use shopfront_client::{AppError, ClientConfig, Result, Storefront};
use shopfront_core::{AddressId, CartItemId, CategoryId, Email, OrderId, ProductId, Quantity};

mod commands;

#[derive(Parser)]
#[command(name = "shop")]
#[command(author, version, about = "Shopfront command-line storefront")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and save the session
    Login {
        #[arg(short, long)]
        email: Email,
        /// Read from stdin when omitted
        #[arg(short, long)]
        password: Option<String>,
    },
    /// Create an account (does not log in)
    Register {
        #[arg(short, long)]
        email: Email,
        #[arg(short, long)]
        name: String,
        /// Read from stdin when omitted
        #[arg(short, long)]
        password: Option<String>,
    },
    /// Forget the saved session
    Logout,
    /// Show the logged-in user
    Whoami,
    /// List products
    Products {
        /// Page number, starting at 1
        #[arg(short, long, default_value_t = 1)]
        page: u32,
        #[arg(short, long)]
        search: Option<String>,
        #[arg(short, long)]
        category: Option<CategoryId>,
        /// Load every page instead of one
        #[arg(long)]
        all: bool,
    },
    /// Show one product
    Product { id: ProductId },
    /// List categories
    Categories,
    /// Manage the cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Check a coupon against the current cart
    Coupon { code: String },
    /// Turn the cart into an order
    Checkout {
        /// Shipping address ID
        #[arg(short, long)]
        address: Option<AddressId>,
        #[arg(short, long)]
        coupon: Option<String>,
    },
    /// Pay for an order
    Pay {
        order_id: OrderId,
        /// Simulate a declined payment (mock gateway only)
        #[arg(long, conflicts_with_all = ["cancel", "payment_id"])]
        decline: bool,
        /// Simulate closing the payment prompt (mock gateway only)
        #[arg(long, conflicts_with = "payment_id")]
        cancel: bool,
        /// Payment ID from the live gateway
        #[arg(long, requires = "signature")]
        payment_id: Option<String>,
        /// Signature from the live gateway
        #[arg(long, requires = "payment_id")]
        signature: Option<String>,
    },
    /// Show the payment status of an order
    Status {
        order_id: OrderId,
        /// What the payment step reported (`success` or `failed`)
        #[arg(long, default_value = "success")]
        reported: String,
    },
    /// Show order history, or one order
    Orders { id: Option<OrderId> },
    /// Manage saved addresses
    Address {
        #[command(subcommand)]
        action: AddressAction,
    },
}

#[derive(Subcommand)]
enum CartAction {
    /// Show the cart with a shipping estimate
    Show,
    /// Add a product
    Add {
        product_id: ProductId,
        #[arg(short, long, default_value = "1")]
        quantity: Quantity,
    },
    /// Set a line's quantity; zero or less removes it
    Set {
        item_id: CartItemId,
        #[arg(allow_negative_numbers = true)]
        quantity: i64,
    },
    /// Add one unit to a line
    Inc { item_id: CartItemId },
    /// Take one unit off a line
    Dec { item_id: CartItemId },
    /// Remove a line
    Remove { item_id: CartItemId },
    /// Remove everything
    Clear,
}

#[derive(Subcommand)]
enum AddressAction {
    /// List saved addresses
    List,
    /// Save a new address
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        phone: String,
        #[arg(long)]
        line: String,
        #[arg(long)]
        city: String,
        #[arg(long)]
        state: String,
        #[arg(long)]
        zip: String,
        #[arg(long, default_value = "India")]
        country: String,
        /// Make this the default address
        #[arg(long)]
        default: bool,
    },
    /// Delete an address
    Delete { id: AddressId },
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &ClientConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "shopfront_client=info,shopfront_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match ClientConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            init_tracing();
            tracing::error!("Configuration error: {e}");
            std::process::exit(2);
        }
    };

    // Sentry first, so the tracing layer has a client to send to
    let sentry_guard = init_sentry(&config);
    init_tracing();

    let result = match Storefront::from_config(config) {
        Ok(storefront) => run(cli, &storefront).await,
        Err(e) => Err(e),
    };

    let code = emit(result, &mut std::io::stdout().lock(), &mut std::io::stderr().lock());

    // Flush pending Sentry events before exiting
    drop(sentry_guard);
    std::process::exit(code);
}

/// Print the command's output, or its failure, and pick the exit code.
fn emit(result: Result<String>, out: &mut impl Write, err: &mut impl Write) -> i32 {
    match result {
        Ok(output) => {
            let _ = writeln!(out, "{}", output.trim_end());
            0
        }
        Err(e) => {
            let e = e.report();
            let _ = writeln!(err, "{}", e.user_message());
            if e.requires_login() {
                let _ = writeln!(err, "Run `shop login` first.");
            }
            1
        }
    }
}

async fn run(cli: Cli, store: &Storefront) -> Result<String> {
    match cli.command {
        Commands::Login { email, password } => {
            commands::auth::login(store, &email, password).await
        }
        Commands::Register {
            email,
            name,
            password,
        } => commands::auth::register(store, email, name, password).await,
        Commands::Logout => commands::auth::logout(store).await,
        command => {
            store.start().await?;
            run_with_session(command, store).await
        }
    }
}

async fn run_with_session(command: Commands, store: &Storefront) -> Result<String> {
    match command {
        Commands::Whoami => commands::auth::whoami(store),
        Commands::Products {
            page,
            search,
            category,
            all,
        } => {
            let filter = commands::catalog::filter(search, category);
            if all {
                commands::catalog::all_products(store, filter).await
            } else {
                commands::catalog::products(store, &filter, page).await
            }
        }
        Commands::Product { id } => commands::catalog::product(store, id).await,
        Commands::Categories => commands::catalog::categories(store).await,
        Commands::Cart { action } => match action {
            CartAction::Show => commands::cart::show(store),
            CartAction::Add {
                product_id,
                quantity,
            } => commands::cart::add(store, product_id, quantity).await,
            CartAction::Set { item_id, quantity } => {
                commands::cart::set(store, item_id, quantity).await
            }
            CartAction::Inc { item_id } => commands::cart::increment(store, item_id).await,
            CartAction::Dec { item_id } => commands::cart::decrement(store, item_id).await,
            CartAction::Remove { item_id } => commands::cart::remove(store, item_id).await,
            CartAction::Clear => commands::cart::clear(store).await,
        },
        Commands::Coupon { code } => commands::cart::coupon(store, &code).await,
        Commands::Checkout { address, coupon } => {
            commands::checkout::place(store, address, coupon).await
        }
        Commands::Pay {
            order_id,
            decline,
            cancel,
            payment_id,
            signature,
        } => {
            let method = match (payment_id, signature) {
                (Some(payment_id), Some(signature)) => {
                    commands::checkout::Method::Signed { payment_id, signature }
                }
                _ if decline => commands::checkout::Method::MockDecline,
                _ if cancel => commands::checkout::Method::MockCancel,
                _ => commands::checkout::Method::Mock,
            };
            commands::checkout::pay(store, order_id, method).await
        }
        Commands::Status { order_id, reported } => {
            commands::checkout::status(store, order_id, &reported).await
        }
        Commands::Orders { id } => match id {
            Some(id) => commands::orders::show(store, id).await,
            None => commands::orders::list(store).await,
        },
        Commands::Address { action } => match action {
            AddressAction::List => commands::address::list(store).await,
            AddressAction::Add {
                name,
                phone,
                line,
                city,
                state,
                zip,
                country,
                default,
            } => {
                let address = shopfront_client::api::NewAddress {
                    full_name: name,
                    phone_number: phone,
                    start_line: line,
                    city,
                    state,
                    zip_code: zip,
                    country,
                    is_default: default,
                };
                commands::address::add(store, &address).await
            }
            AddressAction::Delete { id } => commands::address::delete(store, id).await,
        },
        Commands::Login { .. } | Commands::Register { .. } | Commands::Logout => Err(
            AppError::Internal("session command dispatched after start".to_string()),
        ),
    }
}
