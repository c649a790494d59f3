// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Switchboard bridge.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level Switchboard configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SwitchboardConfig {
    /// Message bus and consumer lifecycle settings.
    #[serde(default)]
    pub bus: BusConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Message bus configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BusConfig {
    /// Seconds between periodic reloads of the plugin and account tables.
    /// Zero or negative disables periodic reloads.
    #[serde(default = "default_refresh_secs")]
    pub refresh_secs: i64,

    /// How long a tailing read waits for new records before retrying.
    #[serde(default = "default_tail_idle_timeout_ms")]
    pub tail_idle_timeout_ms: u64,

    /// Pause before reopening a failed tailing read.
    #[serde(default = "default_tail_backoff_ms")]
    pub tail_backoff_ms: u64,

    /// Newly started plugins never see records older than this.
    #[serde(default = "default_rollback_limit_secs")]
    pub rollback_limit_secs: u64,

    /// Maximum number of instances stopped in parallel on shutdown.
    #[serde(default = "default_shutdown_concurrency")]
    pub shutdown_concurrency: usize,

    /// Pause between failed attempts to connect an account.
    #[serde(default = "default_reconnect_backoff_ms")]
    pub reconnect_backoff_ms: u64,

    /// Longest a single write to a chat connection may take before the
    /// connection is dropped and redialed.
    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,

    /// Plugin instances to run: unset runs all, each entry enables a plugin
    /// name and its `name/label` instances, an empty list runs none.
    #[serde(default)]
    pub plugins: Option<Vec<String>>,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            refresh_secs: default_refresh_secs(),
            tail_idle_timeout_ms: default_tail_idle_timeout_ms(),
            tail_backoff_ms: default_tail_backoff_ms(),
            rollback_limit_secs: default_rollback_limit_secs(),
            shutdown_concurrency: default_shutdown_concurrency(),
            reconnect_backoff_ms: default_reconnect_backoff_ms(),
            send_timeout_ms: default_send_timeout_ms(),
            plugins: None,
        }
    }
}

impl BusConfig {
    /// Periodic refresh interval, or `None` when disabled.
    pub fn refresh_interval(&self) -> Option<Duration> {
        u64::try_from(self.refresh_secs)
            .ok()
            .filter(|s| *s > 0)
            .map(Duration::from_secs)
    }

    pub fn tail_idle_timeout(&self) -> Duration {
        Duration::from_millis(self.tail_idle_timeout_ms)
    }

    pub fn tail_backoff(&self) -> Duration {
        Duration::from_millis(self.tail_backoff_ms)
    }

    pub fn rollback_limit(&self) -> Duration {
        Duration::from_secs(self.rollback_limit_secs)
    }

    pub fn reconnect_backoff(&self) -> Duration {
        Duration::from_millis(self.reconnect_backoff_ms)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }
}

fn default_refresh_secs() -> i64 {
    30
}

fn default_tail_idle_timeout_ms() -> u64 {
    2000
}

fn default_tail_backoff_ms() -> u64 {
    100
}

fn default_rollback_limit_secs() -> u64 {
    10
}

fn default_shutdown_concurrency() -> usize {
    16
}

fn default_reconnect_backoff_ms() -> u64 {
    1000
}

fn default_send_timeout_ms() -> u64 {
    30_000
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,

    /// Records kept per log before the oldest are trimmed (0 keeps all).
    #[serde(default = "default_log_capacity")]
    pub log_capacity: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
            log_capacity: default_log_capacity(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("switchboard").join("switchboard.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("switchboard.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

fn default_log_capacity() -> u64 {
    10_000
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
