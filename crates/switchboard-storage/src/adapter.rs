// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the ordered log and state store traits.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::OnceCell;
use tracing::debug;

use switchboard_config::model::StorageConfig;
use switchboard_core::{
    AccountInfo, LdapInfo, LogName, OrderedLog, PluginInfo, Record, RecordId, StateStore,
    SwitchboardError, TailCursor, TailFilter,
};

use crate::database::Database;
use crate::log::SqliteLog;
use crate::queries;

/// SQLite-backed storage for the bridge.
///
/// Holds the writer [`Database`] and the [`SqliteLog`] built on it. The
/// database is opened on the first call to [`SqliteStorage::initialize`].
pub struct SqliteStorage {
    config: StorageConfig,
    log: OnceCell<SqliteLog>,
}

impl SqliteStorage {
    /// Create a new SqliteStorage with the given configuration.
    ///
    /// The database connection is not opened until [`initialize`] is called.
    ///
    /// [`initialize`]: SqliteStorage::initialize
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            log: OnceCell::new(),
        }
    }

    /// Opens the database and applies migrations.
    ///
    /// A failure here means the required tables cannot exist; the bridge
    /// must not start.
    pub async fn initialize(&self) -> Result<(), SwitchboardError> {
        let db = Database::open_with(&self.config.database_path, self.config.wal_mode).await?;
        self.log
            .set(SqliteLog::new(db, self.config.log_capacity))
            .map_err(|_| SwitchboardError::Storage {
                source: "storage already initialized".into(),
            })?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    /// Opens storage at `config.database_path`, ready for use.
    pub async fn open(config: StorageConfig) -> Result<Self, SwitchboardError> {
        let storage = Self::new(config);
        storage.initialize().await?;
        Ok(storage)
    }

    /// The underlying ordered log.
    pub fn log(&self) -> Result<&SqliteLog, SwitchboardError> {
        self.log.get().ok_or_else(|| SwitchboardError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }

    /// The writer database, for administrative queries.
    pub fn db(&self) -> Result<&Database, SwitchboardError> {
        Ok(self.log()?.database())
    }

    /// Checkpoints the WAL. The connection stays usable.
    pub async fn checkpoint(&self) -> Result<(), SwitchboardError> {
        let db = self.db()?;
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")
            })
            .await
            .map_err(crate::database::map_tr_err)?;
        debug!("WAL checkpoint complete");
        Ok(())
    }
}

#[async_trait]
impl OrderedLog for SqliteStorage {
    async fn append(&self, log: LogName, record: &Record) -> Result<RecordId, SwitchboardError> {
        self.log()?.append(log, record).await
    }

    async fn tail_from(
        &self,
        log: LogName,
        filter: TailFilter,
        after: RecordId,
        idle_timeout: Duration,
    ) -> Result<Box<dyn TailCursor>, SwitchboardError> {
        self.log()?.tail_from(log, filter, after, idle_timeout).await
    }

    async fn last_id_before(
        &self,
        log: LogName,
        cutoff: DateTime<Utc>,
    ) -> Result<RecordId, SwitchboardError> {
        self.log()?.last_id_before(log, cutoff).await
    }
}

#[async_trait]
impl StateStore for SqliteStorage {
    async fn list_plugins(&self) -> Result<Vec<PluginInfo>, SwitchboardError> {
        queries::plugins::list_plugins(self.db()?).await
    }

    async fn set_plugin_last_id(&self, name: &str, id: RecordId) -> Result<(), SwitchboardError> {
        queries::plugins::set_last_id(self.db()?, name, id).await
    }

    async fn set_plugin_commands(
        &self,
        name: &str,
        commands: &str,
    ) -> Result<(), SwitchboardError> {
        queries::plugins::set_commands(self.db()?, name, commands).await
    }

    async fn upsert_known_plugin(
        &self,
        name: &str,
        commands: &str,
    ) -> Result<(), SwitchboardError> {
        queries::plugins::upsert_known(self.db()?, name, commands).await
    }

    async fn list_accounts(&self) -> Result<Vec<AccountInfo>, SwitchboardError> {
        queries::accounts::list_accounts(self.db()?).await
    }

    async fn set_account_last_id(
        &self,
        name: &str,
        id: RecordId,
    ) -> Result<(), SwitchboardError> {
        queries::accounts::set_last_id(self.db()?, name, id).await
    }

    async fn list_ldap(&self) -> Result<Vec<LdapInfo>, SwitchboardError> {
        queries::ldap::list_ldap(self.db()?).await
    }

    async fn archive_record(&self, plugin: &str, record: &Record) -> Result<(), SwitchboardError> {
        queries::message_log::insert(self.db()?, plugin, record).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn make_config(path: &str) -> StorageConfig {
        StorageConfig {
            database_path: path.to_string(),
            wal_mode: true,
            log_capacity: 100,
        }
    }

    #[tokio::test]
    async fn initialize_opens_database_at_configured_path() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("init_test.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));

        storage.initialize().await.unwrap();
        assert!(db_path.exists(), "database file should be created");
    }

    #[tokio::test]
    async fn initialize_twice_returns_error() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("double_init.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));

        storage.initialize().await.unwrap();
        assert!(storage.initialize().await.is_err());
    }

    #[tokio::test]
    async fn operations_fail_before_initialize() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("no_init.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));

        assert!(storage.list_plugins().await.is_err());
        assert!(
            storage
                .append(LogName::Incoming, &Record::wake())
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn state_and_log_through_adapter() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("adapter.db");
        let storage = SqliteStorage::open(make_config(db_path.to_str().unwrap()))
            .await
            .unwrap();

        queries::plugins::upsert_plugin(storage.db().unwrap(), "echo", "", "")
            .await
            .unwrap();
        let id = storage
            .append(LogName::Incoming, &Record::message("one", "#c", "n", "hi"))
            .await
            .unwrap();
        storage.set_plugin_last_id("echo", id).await.unwrap();
        let plugins = storage.list_plugins().await.unwrap();
        assert_eq!(plugins[0].last_id, id);

        let mut rec = Record::message("one", "#c", "n", "hi");
        rec.id = id;
        storage.archive_record("log", &rec).await.unwrap();
        let archived = queries::message_log::list(storage.db().unwrap(), "log")
            .await
            .unwrap();
        assert_eq!(archived[0].id, id);

        storage.checkpoint().await.unwrap();
    }
}
