use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use autodeliver_core::{
    create_delivery_channel, create_order_source, load_config, validate_config, CardInventory,
    Config, DeliveryOrchestrator, ProductMatcher, SqliteCardStore,
};
use autodeliver_server::api::create_router;
use autodeliver_server::state::AppState;

/// Automatic delivery of single-use codes for paid marketplace orders.
#[derive(Debug, Parser)]
#[command(name = "autodeliver", version, about)]
struct Cli {
    /// Path to the configuration file
    #[arg(
        long,
        global = true,
        env = "AUTODELIVER_CONFIG",
        default_value = "config.toml"
    )]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Deliver pending orders
    Run {
        /// Run a single pass, print its summary and exit
        #[arg(long)]
        once: bool,
    },
    /// Import newline-delimited codes into a pool
    Import {
        /// Pool key the codes belong to
        #[arg(long)]
        pool: String,
        /// Text file with one code per line
        #[arg(long)]
        file: PathBuf,
    },
    /// Print per-pool card counts
    Stats,
    /// Release codes claimed by orders that were never delivered
    Recover,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging. Logs go to stderr so command output stays parseable.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run(cli).await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    info!("Loading configuration from {:?}", cli.config);
    let config = load_config(&cli.config)
        .with_context(|| format!("Failed to load config from {:?}", cli.config))?;

    match cli.command {
        Command::Run { once } => run_deliveries(config, once).await,
        Command::Import { pool, file } => import_codes(&config, &pool, &file),
        Command::Stats => print_stats(&config),
        Command::Recover => recover(&config),
    }
}

fn open_store(config: &Config) -> Result<SqliteCardStore> {
    info!("Database path: {:?}", config.database.path);
    SqliteCardStore::from_config(&config.database).context("Failed to open card store")
}

fn import_codes(config: &Config, pool: &str, file: &Path) -> Result<()> {
    let store = open_store(config)?;
    let inserted = store
        .import_file(pool, file)
        .with_context(|| format!("Failed to import codes from {:?}", file))?;
    info!(pool, inserted, "Import finished");
    println!("{}", inserted);
    Ok(())
}

fn print_stats(config: &Config) -> Result<()> {
    let store = open_store(config)?;
    let pools = store.pool_stats().context("Failed to read pool stats")?;
    println!(
        "{}",
        serde_json::to_string_pretty(&pools).context("Failed to serialize pool stats")?
    );
    Ok(())
}

fn recover(config: &Config) -> Result<()> {
    let store = open_store(config)?;
    let released = store
        .release_orphaned_claims()
        .context("Failed to release orphaned claims")?;
    info!(released, "Recovery finished");
    println!("{}", released);
    Ok(())
}

async fn run_deliveries(config: Config, once: bool) -> Result<()> {
    validate_config(&config).context("Configuration validation failed")?;
    info!("Configuration loaded successfully");

    let inventory: Arc<dyn CardInventory> = Arc::new(open_store(&config)?);
    info!("Card store initialized");

    let matcher = Arc::new(
        ProductMatcher::from_config(&config.matcher).context("Failed to load product mapping")?,
    );
    info!("Product matcher loaded with {} rules", matcher.len());

    let order_source = create_order_source(&config.orders)
        .await
        .context("Failed to create order source")?;
    info!("Using order source: {}", order_source.name());

    let channel =
        create_delivery_channel(&config.delivery).context("Failed to create delivery channel")?;
    info!("Using delivery channel: {}", channel.name());

    let orchestrator = DeliveryOrchestrator::new(
        config.orchestrator.clone(),
        Arc::clone(&inventory),
        matcher,
        order_source,
        channel,
    );

    if once {
        let summary = orchestrator.run_once().await.context("Pass failed")?;
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("Failed to serialize summary")?
        );
        return Ok(());
    }

    orchestrator.start().await;

    match config.server.clone() {
        Some(server) => {
            let state = Arc::new(AppState::new(
                config,
                inventory,
                orchestrator.clone(),
            ));
            let app = create_router(state);

            let addr = SocketAddr::new(server.host, server.port);
            info!("Starting status server on {}", addr);

            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .with_context(|| format!("Failed to bind to {}", addr))?;

            // Run server with graceful shutdown
            let served = axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await
                .context("Server error");

            orchestrator.stop().await;
            served?;
        }
        None => {
            info!("No [server] configured, status API disabled");
            shutdown_signal().await;
            orchestrator.stop().await;
        }
    }

    info!("Shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
