// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `switchboard serve` command implementation.
//!
//! Opens the SQLite store, registers the built-in plugins, and runs the
//! bridge until a shutdown signal arrives.

use std::sync::Arc;

use switchboard_bus::{Bridge, Store};
use switchboard_config::SwitchboardConfig;
use switchboard_core::SwitchboardError;
use switchboard_irc::IrcDialer;
use switchboard_plugin::PluginRegistry;
use switchboard_plugin::builtin::register_builtins;
use switchboard_storage::SqliteStorage;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::shutdown;

/// Runs the `switchboard serve` command.
pub async fn run_serve(config: SwitchboardConfig) -> Result<(), SwitchboardError> {
    init_tracing(&config.logging.level);
    let shutdown = shutdown::install_signal_handler();
    serve(config, shutdown).await
}

/// Runs the bridge until `shutdown` is cancelled, then stops it and
/// checkpoints the store.
async fn serve(config: SwitchboardConfig, shutdown: CancellationToken) -> Result<(), SwitchboardError> {
    info!(database = %config.storage.database_path, "starting switchboard serve");

    let storage = Arc::new(SqliteStorage::open(config.storage.clone()).await?);

    let mut registry = PluginRegistry::new();
    register_builtins(&mut registry)?;
    info!(count = registry.len(), "plugin registry initialized");

    let bridge = Bridge::start(
        &config.bus,
        Store::new(storage.clone()),
        Arc::new(registry),
        Arc::new(IrcDialer),
        Arc::new(switchboard_ldap::NoDialer),
    )
    .await?;
    info!("switchboard ready");

    shutdown.cancelled().await;
    bridge.stop().await;

    if let Err(e) = storage.checkpoint().await {
        warn!(error = %e, "WAL checkpoint failed");
    }
    info!("switchboard stopped");
    Ok(())
}

fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("switchboard={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
