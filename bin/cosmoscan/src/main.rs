//! Cosmoscan - Cosmos Hub explorer indexer.
//!
//! # Usage
//!
//! ```bash
//! # Start with default config
//! cosmoscan
//!
//! # Start with environment overrides
//! DATABASE_URL=postgres://localhost/cosmoscan NODE_URL=http://localhost:1317 cosmoscan
//! ```

use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use clap::builder::RangedU64ValueParser;
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::signal;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use cosmoscan_core::metrics::init_metrics;
use cosmoscan_core::services::{ChainParams, CommitterConfig, ParserConfig};
use cosmoscan_node::{DEFAULT_GENESIS_SOURCE, LcdClient, LcdClientConfig};
use cosmoscan_storage::{Database, DatabaseConfig, PgRepositories};

/// Grace period for workers and committer on shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// Cosmoscan CLI - Cosmos Hub explorer indexer.
#[derive(Parser, Debug)]
#[command(name = "cosmoscan")]
#[command(about = "Cosmoscan - Cosmos-SDK chain indexer")]
#[command(version)]
struct Cli {
    /// Node REST (LCD) URL.
    #[arg(long, env = "NODE_URL", default_value = "http://127.0.0.1:1317")]
    node_url: String,

    /// PostgreSQL database URL.
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "postgres://localhost/cosmoscan"
    )]
    database_url: String,

    /// Genesis document: http(s) URL or file path.
    #[arg(long, env = "GENESIS_SOURCE", default_value = DEFAULT_GENESIS_SOURCE)]
    genesis: String,

    /// Number of concurrent fetch workers.
    #[arg(long, env = "FETCHERS", default_value = "5", value_parser = RangedU64ValueParser::<usize>::new().range(1..))]
    fetchers: usize,

    /// Maximum heights per committed batch.
    #[arg(long, env = "BATCH_SIZE", default_value = "50", value_parser = RangedU64ValueParser::<usize>::new().range(1..))]
    batch_size: usize,

    /// Parser name, key of the checkpoint row.
    #[arg(long, env = "PARSER_TITLE", default_value = "hub3")]
    parser_title: String,

    /// Minor-unit denomination of the staking token.
    #[arg(long, env = "MAIN_DENOM", default_value = "uatom")]
    main_denom: String,

    /// Decimals between minor and main units.
    #[arg(long, env = "PRECISION", default_value = "6")]
    precision: u32,

    /// Bech32 prefix of account addresses.
    #[arg(long, env = "ADDRESS_PREFIX", default_value = "cosmos")]
    address_prefix: String,

    /// Length of an account address.
    #[arg(long, env = "ADDRESS_LENGTH", default_value = "45")]
    address_length: usize,

    /// Prometheus metrics port.
    #[arg(long, env = "METRICS_PORT", default_value = "9090")]
    metrics_port: u16,

    /// Enable JSON log output.
    #[arg(long, env = "JSON_LOGS")]
    json_logs: bool,

    /// Run database migrations and exit.
    #[arg(long)]
    migrate_only: bool,

    /// Purge all indexed data from the database and exit.
    ///
    /// This will delete all blocks, transactions, facts and accounts, and
    /// reset every parser checkpoint. Schema/migrations are preserved.
    #[arg(long)]
    purge: bool,

    /// Skip confirmation prompt for destructive operations (like --purge).
    #[arg(long, short = 'y')]
    yes: bool,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,
}

impl Cli {
    fn chain_params(&self) -> ChainParams {
        ChainParams {
            main_denom: self.main_denom.clone(),
            precision: self.precision,
            address_prefix: self.address_prefix.clone(),
            address_length: self.address_length,
        }
    }

    fn parser_config(&self) -> ParserConfig {
        ParserConfig {
            title: self.parser_title.clone(),
            fetchers: self.fetchers,
            committer: CommitterConfig {
                batch_size: self.batch_size,
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.json_logs);

    // Prometheus metrics exporter (optional - failures don't crash the app)
    let metrics_enabled = match format!("0.0.0.0:{}", cli.metrics_port).parse::<std::net::SocketAddr>() {
        Ok(metrics_addr) => {
            match PrometheusBuilder::new()
                .with_http_listener(metrics_addr)
                .install()
            {
                Ok(()) => {
                    init_metrics();
                    true
                }
                Err(e) => {
                    warn!("⚠️  Failed to start metrics exporter: {}. Continuing without metrics.", e);
                    false
                }
            }
        }
        Err(e) => {
            warn!("⚠️  Invalid metrics address: {}. Continuing without metrics.", e);
            false
        }
    };

    // ─────────────────────────────────────────────────────────────────────────
    // 🚀 STARTUP
    // ─────────────────────────────────────────────────────────────────────────
    info!("🚀 Starting Cosmoscan parser");
    debug!(node_url = %cli.node_url, "Node endpoint");
    debug!(database_url = %mask_password(&cli.database_url), "Database endpoint");

    // ─────────────────────────────────────────────────────────────────────────
    // 🗄️ DATABASE
    // ─────────────────────────────────────────────────────────────────────────
    info!("🗄️  Connecting to database...");
    let db = Database::connect(&DatabaseConfig::for_parser(&cli.database_url))
        .await
        .context("Failed to connect to database")?;

    db.migrate().await.context("Failed to run migrations")?;
    info!("🗄️  Database ready (migrations applied)");

    if cli.migrate_only {
        info!("🛑 --migrate-only flag set, exiting");
        return Ok(());
    }

    if cli.purge {
        return handle_purge(&db, cli.yes).await;
    }

    let repositories = Arc::new(PgRepositories::new(&db));

    // ─────────────────────────────────────────────────────────────────────────
    // 📡 NODE
    // ─────────────────────────────────────────────────────────────────────────
    let node = LcdClient::new(LcdClientConfig {
        base_url: cli.node_url.clone(),
        genesis_source: cli.genesis.clone(),
        ..Default::default()
    })
    .context("Failed to create node client")?;

    // ─────────────────────────────────────────────────────────────────────────
    // ⚡ PARSER START
    // ─────────────────────────────────────────────────────────────────────────
    let config = cli.parser_config();
    info!(
        title = %config.title,
        fetchers = config.fetchers,
        batch_size = config.committer.batch_size,
        "⛓️  Parser configured"
    );

    let mut handle = cosmoscan_core::services::Parser::new(
        config,
        cli.chain_params(),
        Arc::new(node),
        repositories,
    )
    .spawn();

    // ─────────────────────────────────────────────────────────────────────────
    // ✅ READY
    // ─────────────────────────────────────────────────────────────────────────
    info!("✅ Cosmoscan ready");
    if metrics_enabled {
        info!(
            "   📊 Metrics:  http://localhost:{}/metrics",
            cli.metrics_port
        );
    } else {
        info!("   📊 Metrics:  disabled");
    }
    info!("   Press Ctrl+C to stop");

    let exited = tokio::select! {
        _ = shutdown_signal() => None,
        result = handle.wait() => Some(result),
    };

    // ─────────────────────────────────────────────────────────────────────────
    // 🛑 SHUTDOWN
    // ─────────────────────────────────────────────────────────────────────────
    let result = match exited {
        Some(result) => result,
        None => {
            info!("🛑 Shutting down...");
            handle.stop(SHUTDOWN_GRACE).await
        }
    };

    db.close().await;

    if let Err(e) = result {
        error!(error = %e, "❌ Parser stopped");
        return Err(e).context("Parser failed");
    }

    info!("🛑 Shutdown complete");
    Ok(())
}

/// Initialize tracing subscriber.
fn init_tracing(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json {
        fmt().with_env_filter(filter).json().init();
    } else {
        fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .init();
    }
}

/// Mask password in database URL for logging.
fn mask_password(url_str: &str) -> String {
    match url::Url::parse(url_str) {
        Ok(mut url) => {
            if url.password().is_some() {
                let _ = url.set_password(Some("****"));
            }
            url.to_string()
        }
        Err(_) => url_str.to_string(),
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
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
}

/// Handle the --purge command.
async fn handle_purge(db: &Database, skip_confirmation: bool) -> Result<()> {
    warn!("⚠️  PURGE MODE: This will delete ALL indexed data!");
    warn!("   - All blocks, transactions and derived facts");
    warn!("   - All accounts");
    warn!("   - Every parser checkpoint will be reset to 0 (genesis re-import)");
    warn!("   - Schema and migrations will be preserved");

    if !skip_confirmation {
        print!("\n🔴 Are you sure you want to purge all data? [y/N] ");
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;

        if !input.trim().eq_ignore_ascii_case("y") {
            info!("❌ Purge cancelled");
            return Ok(());
        }
    }

    info!("🗑️  Purging database...");
    let stats = db.purge().await.context("Failed to purge database")?;

    info!("✅ Database purged successfully");
    info!("   📦 Blocks removed: {}", stats.blocks_removed);
    info!("   📝 Transactions removed: {}", stats.transactions_removed);
    info!("   👤 Accounts removed: {}", stats.accounts_removed);
    info!("   The parser will import genesis on next run");

    Ok(())
}
