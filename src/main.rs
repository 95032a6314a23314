//! MedCart client
//!
//! Main entry point for the MedCart terminal client.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use medcart::config;
use medcart::models::{CartStatus, OrderType, Theme};
use medcart::App;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "medcart", about = "Medication cart management client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Override the configured origin, e.g. https://ward.example.org
    #[arg(long, global = true)]
    origin: Option<String>,
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream live notifications until Ctrl-C
    Watch,
    /// List carts with their items
    Carts,
    /// Change the status of a cart
    CartStatus { cart_id: i64, status: CartStatus },
    /// List medications with available stock
    Medications,
    /// List orders, optionally of one type
    Orders {
        #[arg(long = "type")]
        order_type: Option<OrderType>,
    },
    /// Switch the colour theme, flipping it when none is given
    Theme { theme: Option<String> },
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    // Load configuration
    let mut settings = config::load_config().context("Failed to load configuration")?;
    if let Some(origin) = cli.origin {
        settings.api.origin = origin;
    }

    // Initialize logger
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if cli.log_json || settings.log.json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let app = App::new(settings).context("Failed to build client")?;

    match cli.command {
        Commands::Watch => watch(&app).await?,
        Commands::Carts => {
            let carts = app.carts.fetch_carts().await;
            if let Some(error) = app.carts.error() {
                anyhow::bail!(error);
            }
            for cart in carts {
                println!(
                    "#{} [{}] patient {} - {} in {} ({} items)",
                    cart.id,
                    cart.status,
                    cart.patient_id,
                    cart.operation,
                    cart.room_number,
                    cart.items.len()
                );
            }
        }
        Commands::CartStatus { cart_id, status } => {
            let cart = app.carts.update_cart_status(cart_id, status).await?;
            println!("#{} is now {}", cart.id, cart.status);
        }
        Commands::Medications => {
            app.medications.refresh().await;
            if let Some(error) = app.medications.error() {
                anyhow::bail!(error);
            }
            for option in app.medications.options() {
                println!("{:<40} {:>8} {}", option.label, option.available_amount, option.unit);
            }
        }
        Commands::Orders { order_type } => {
            app.orders.fetch_orders().await;
            if let Some(error) = app.orders.error() {
                anyhow::bail!(error);
            }
            let orders = match order_type {
                Some(order_type) => app.orders.get_orders_by_type(order_type),
                None => app.orders.orders(),
            };
            for order in orders {
                println!(
                    "{} {:?} rush={} by {} ({} lines)",
                    order.id,
                    order.order_type,
                    order.is_rush,
                    order.ordered_by.as_deref().unwrap_or("-"),
                    order.items.len()
                );
            }
        }
        Commands::Theme { theme } => {
            let mut prefs = app.theme()?;
            let theme = prefs.toggle(theme.as_deref().map(Theme::normalize))?;
            println!("{}", theme.as_str());
        }
    }

    Ok(())
}

async fn watch(app: &App) -> Result<()> {
    let report = app.init().await;
    for (store, error) in &report.failures {
        warn!(store, error = %error, "store not loaded");
    }

    let channel = app.notifications(|event| {
        if event.is_error() {
            warn!(message = ?event.message, "notification error");
        } else {
            info!(
                event_type = %event.event_type,
                cart_id = ?event.cart_id,
                message = ?event.message,
                "notification"
            );
        }
    })?;

    channel.connect();
    tokio::signal::ctrl_c().await.context("Failed to listen for Ctrl-C")?;
    channel.disconnect().await;
    Ok(())
}
