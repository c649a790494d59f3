// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Temporary storage and fast bus settings for integration tests.

use std::sync::Arc;

use switchboard_config::model::{BusConfig, StorageConfig};
use switchboard_storage::SqliteStorage;
use tempfile::TempDir;

/// Opens a migrated SQLite store in a fresh temporary directory.
///
/// The directory is removed when the returned guard is dropped.
pub async fn temp_storage() -> (Arc<SqliteStorage>, TempDir) {
    let dir = TempDir::new().expect("create temp dir");
    let config = StorageConfig {
        database_path: dir.path().join("test.db").to_string_lossy().into_owned(),
        wal_mode: true,
        log_capacity: 0,
    };
    let storage = SqliteStorage::open(config)
        .await
        .expect("open temp storage");
    (Arc::new(storage), dir)
}

/// Bus settings with short timeouts and periodic refresh disabled.
pub fn test_bus_config() -> BusConfig {
    BusConfig {
        refresh_secs: 0,
        tail_idle_timeout_ms: 50,
        tail_backoff_ms: 10,
        reconnect_backoff_ms: 20,
        shutdown_concurrency: 4,
        ..BusConfig::default()
    }
}
