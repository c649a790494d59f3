// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Plugin instance rows and the known-plugin catalog.

use rusqlite::params;
use switchboard_core::{PluginInfo, RecordId, SwitchboardError};

use crate::database::{Database, map_tr_err};

/// Lists every plugin instance row, ordered by name.
pub async fn list_plugins(db: &Database) -> Result<Vec<PluginInfo>, SwitchboardError> {
    db.connection()
        .call(|conn| -> Result<Vec<PluginInfo>, rusqlite::Error> {
            let mut stmt = conn.prepare(
                "SELECT name, config, targets, last_id FROM plugins ORDER BY name ASC",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok(PluginInfo {
                    name: row.get(0)?,
                    config: row.get(1)?,
                    targets: row.get(2)?,
                    last_id: RecordId(row.get(3)?),
                })
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Inserts or replaces the configuration of a plugin instance.
///
/// The stored position is kept when the row already exists.
pub async fn upsert_plugin(
    db: &Database,
    name: &str,
    config: &str,
    targets: &str,
) -> Result<(), SwitchboardError> {
    let name = name.to_string();
    let config = config.to_string();
    let targets = targets.to_string();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO plugins (name, config, targets) VALUES (?1, ?2, ?3)
                 ON CONFLICT(name) DO UPDATE SET config = excluded.config,
                                                 targets = excluded.targets",
                params![name, config, targets],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn delete_plugin(db: &Database, name: &str) -> Result<(), SwitchboardError> {
    let name = name.to_string();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute("DELETE FROM plugins WHERE name = ?1", params![name])?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Records the last record a plugin instance was offered.
pub async fn set_last_id(db: &Database, name: &str, id: RecordId) -> Result<(), SwitchboardError> {
    let name = name.to_string();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "UPDATE plugins SET last_id = ?1 WHERE name = ?2",
                params![id.0, name],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn set_commands(db: &Database, name: &str, commands: &str) -> Result<(), SwitchboardError> {
    let name = name.to_string();
    let commands = commands.to_string();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "UPDATE plugins SET commands = ?1 WHERE name = ?2",
                params![commands, name],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Publishes the command schema of a registered plugin implementation.
pub async fn upsert_known(db: &Database, name: &str, commands: &str) -> Result<(), SwitchboardError> {
    let name = name.to_string();
    let commands = commands.to_string();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO plugins_known (name, commands) VALUES (?1, ?2)
                 ON CONFLICT(name) DO UPDATE SET
                     commands = excluded.commands,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
                params![name, commands],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Reads the published command schema of a plugin implementation.
pub async fn known_commands(db: &Database, name: &str) -> Result<Option<String>, SwitchboardError> {
    let name = name.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<String>, rusqlite::Error> {
            match conn.query_row(
                "SELECT commands FROM plugins_known WHERE name = ?1",
                params![name],
                |row| row.get(0),
            ) {
                Ok(commands) => Ok(Some(commands)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Reads the command schema stored on a plugin instance row.
pub async fn instance_commands(
    db: &Database,
    name: &str,
) -> Result<Option<String>, SwitchboardError> {
    let name = name.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<String>, rusqlite::Error> {
            match conn.query_row(
                "SELECT commands FROM plugins WHERE name = ?1",
                params![name],
                |row| row.get(0),
            ) {
                Ok(commands) => Ok(Some(commands)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}
