//! # Branchbook Ops
//!
//! Runs the background side of Branchbook against one SQLite database:
//! - the notification dispatcher, draining the outbox to SMTP (or the log)
//! - the reconciliation loop, rebuilding branch invoice collections
//!
//! ## Usage
//! ```bash
//! branchbook-ops --config /etc/branchbook/ops.toml
//! RUST_LOG=branchbook=debug branchbook-ops
//! ```

mod config;
mod reconcile;

use std::path::PathBuf;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use branchbook_db::{Database, DbConfig};
use branchbook_notify::{sink_from_settings, NotificationDispatcher};

use crate::config::OpsConfig;
use crate::reconcile::ReconcileLoop;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config_path = match parse_args()? {
        Some(path) => path,
        None => return Ok(()),
    };

    let config = OpsConfig::load(config_path).context("Failed to load configuration")?;
    info!(
        database = %config.database.path.display(),
        list_page_cap = config.invoicing.list_page_cap,
        unlink_on_delete = config.invoicing.unlink_on_delete,
        "Starting Branchbook ops"
    );

    if let Some(parent) = config.database.path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }

    let db = Database::new(
        DbConfig::new(config.database.path.clone()).max_connections(config.database.max_connections),
    )
    .await
    .context("Failed to open database")?;

    let dispatcher = if config.notifications.enabled {
        let sink = sink_from_settings(&config.notifications)
            .context("Failed to configure notification sink")?;
        let (dispatcher, handle) =
            NotificationDispatcher::new(&db, sink, config.notifications.clone());
        Some((tokio::spawn(dispatcher.run()), handle))
    } else {
        warn!("Notifications disabled, queued notices will not be sent");
        None
    };

    let lifecycle = config.lifecycle(&db);

    let reconciler = if config.reconcile.is_enabled() {
        let coordinator = lifecycle.backrefs().clone();
        let (reconcile, handle) = ReconcileLoop::new(coordinator, config.reconcile.interval());
        Some((tokio::spawn(reconcile.run()), handle))
    } else if lifecycle.settings().unlink_on_delete {
        info!("Reconciliation loop disabled, deletes unlink branch collections");
        None
    } else {
        warn!(
            "Reconciliation loop disabled and unlink_on_delete is off, \
             deleted invoice ids stay in branch collections"
        );
        None
    };

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutdown signal received, stopping background tasks");

    if let Some((task, handle)) = dispatcher {
        if let Err(e) = handle.shutdown().await {
            warn!(error = %e, "Dispatcher already stopped");
        }
        task.await.context("Notification dispatcher panicked")?;
    }

    if let Some((task, handle)) = reconciler {
        handle.shutdown().await;
        task.await.context("Reconciliation loop panicked")?;
    }

    db.close().await;
    info!("Branchbook ops stopped");
    Ok(())
}

/// Log level defaults to INFO; `RUST_LOG` overrides it.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,branchbook=debug,sqlx=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Returns the `--config` path, or `None` when `--help` was printed.
fn parse_args() -> anyhow::Result<Option<Option<PathBuf>>> {
    let args: Vec<String> = std::env::args().collect();
    let mut config_path = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                let path = args
                    .get(i + 1)
                    .context("--config requires a path")?;
                config_path = Some(PathBuf::from(path));
                i += 1;
            }
            "--help" | "-h" => {
                println!("Branchbook Ops");
                println!();
                println!("Usage: branchbook-ops [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --config <PATH>  Config file (default: platform config dir/ops.toml)");
                println!("  -h, --help           Show this help message");
                return Ok(None);
            }
            other => anyhow::bail!("Unknown argument: {other}"),
        }
        i += 1;
    }

    Ok(Some(config_path))
}
