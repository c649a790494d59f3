// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through the writer's tokio-rusqlite background
//! thread. Tailing readers open their own connections with
//! [`Database::open_reader`] so a blocked tail never delays a write.

use switchboard_core::SwitchboardError;
use tracing::debug;

use crate::migrations;

/// Maps a tokio-rusqlite call error into a storage error.
pub fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> SwitchboardError {
    SwitchboardError::Storage {
        source: Box::new(e),
    }
}

/// The writer connection to a Switchboard database file.
#[derive(Clone)]
pub struct Database {
    conn: tokio_rusqlite::Connection,
    path: String,
    wal_mode: bool,
}

impl Database {
    /// Opens (creating if needed) the database at `path` in WAL mode and
    /// applies pending migrations.
    pub async fn open(path: &str) -> Result<Self, SwitchboardError> {
        Self::open_with(path, true).await
    }

    /// Opens the database with an explicit journal mode choice.
    ///
    /// Fails if the schema cannot be created; callers treat that as fatal.
    pub async fn open_with(path: &str, wal_mode: bool) -> Result<Self, SwitchboardError> {
        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(SwitchboardError::storage)?;
            }
        }

        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(|e| SwitchboardError::Storage {
                source: Box::new(e),
            })?;

        conn.call(move |conn| -> Result<(), rusqlite::Error> {
            apply_pragmas(conn, wal_mode)
        })
        .await
        .map_err(map_tr_err)?;

        conn.call(|conn| -> Result<(), SwitchboardError> { migrations::run_migrations(conn) })
            .await
            .map_err(|e| SwitchboardError::Storage {
                source: Box::new(e),
            })?;

        debug!(path, wal_mode, "database opened");
        Ok(Self {
            conn,
            path: path.to_string(),
            wal_mode,
        })
    }

    /// Opens an additional read connection to the same file.
    pub async fn open_reader(&self) -> Result<tokio_rusqlite::Connection, SwitchboardError> {
        let conn = tokio_rusqlite::Connection::open(&self.path)
            .await
            .map_err(|e| SwitchboardError::Storage {
                source: Box::new(e),
            })?;
        let wal_mode = self.wal_mode;
        conn.call(move |conn| -> Result<(), rusqlite::Error> {
            apply_pragmas(conn, wal_mode)?;
            conn.execute_batch("PRAGMA query_only = ON;")
        })
        .await
        .map_err(map_tr_err)?;
        Ok(conn)
    }

    /// The writer connection.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Checkpoints the WAL and closes the writer connection.
    pub async fn close(self) -> Result<(), SwitchboardError> {
        if self.wal_mode {
            self.conn
                .call(|conn| -> Result<(), rusqlite::Error> {
                    conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")
                })
                .await
                .map_err(map_tr_err)?;
            debug!("WAL checkpoint complete");
        }
        self.conn.close().await.map_err(|e| SwitchboardError::Storage {
            source: Box::new(e),
        })
    }
}

fn apply_pragmas(conn: &rusqlite::Connection, wal_mode: bool) -> Result<(), rusqlite::Error> {
    if wal_mode {
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;")?;
    }
    conn.execute_batch("PRAGMA busy_timeout = 5000; PRAGMA foreign_keys = ON;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn open_creates_schema() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("bridge.db");
        let db = Database::open(path.to_str().unwrap()).await.unwrap();
        assert!(path.exists());

        let tables: Vec<String> = db
            .connection()
            .call(|conn| -> Result<Vec<String>, rusqlite::Error> {
                let mut stmt = conn.prepare(
                    "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
                )?;
                let rows = stmt.query_map([], |row| row.get(0))?;
                rows.collect()
            })
            .await
            .unwrap();
        for table in ["accounts", "ldap", "log_records", "message_log", "plugins", "plugins_known"] {
            assert!(tables.iter().any(|t| t == table), "missing table {table}");
        }
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn reopen_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bridge.db");
        let path = path.to_str().unwrap();
        Database::open(path).await.unwrap().close().await.unwrap();
        Database::open(path).await.unwrap().close().await.unwrap();
    }

    #[tokio::test]
    async fn reader_rejects_writes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bridge.db");
        let db = Database::open(path.to_str().unwrap()).await.unwrap();
        let reader = db.open_reader().await.unwrap();
        let result = reader
            .call(|conn| -> Result<usize, rusqlite::Error> {
                conn.execute("INSERT INTO ldap (name, config) VALUES ('x', '')", [])
            })
            .await;
        assert!(result.is_err());
    }
}
