// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Account rows: connection settings, channels, and the confirmed position.

use rusqlite::params;
use switchboard_core::{AccountInfo, RecordId, SwitchboardError};

use crate::database::{Database, map_tr_err};

pub async fn list_accounts(db: &Database) -> Result<Vec<AccountInfo>, SwitchboardError> {
    let rows = db
        .connection()
        .call(|conn| -> Result<Vec<(String, String, String, i64)>, rusqlite::Error> {
            let mut stmt = conn.prepare(
                "SELECT name, settings, channels, last_id FROM accounts ORDER BY name ASC",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)?;

    let mut accounts = Vec::with_capacity(rows.len());
    for (name, settings, channels, last_id) in rows {
        let channels: Vec<String> = if channels.trim().is_empty() {
            Vec::new()
        } else {
            serde_json::from_str(&channels).map_err(|e| {
                SwitchboardError::Config(format!("account {name:?}: invalid channels: {e}"))
            })?
        };
        accounts.push(AccountInfo {
            name,
            settings,
            channels,
            last_id: RecordId(last_id),
        });
    }
    Ok(accounts)
}

/// Inserts or replaces an account's settings and channels.
///
/// The confirmed position is kept when the row already exists.
pub async fn upsert_account(
    db: &Database,
    name: &str,
    settings: &str,
    channels: &[String],
) -> Result<(), SwitchboardError> {
    let name = name.to_string();
    let settings = settings.to_string();
    let channels = serde_json::to_string(channels).map_err(SwitchboardError::storage)?;
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO accounts (name, settings, channels) VALUES (?1, ?2, ?3)
                 ON CONFLICT(name) DO UPDATE SET settings = excluded.settings,
                                                 channels = excluded.channels",
                params![name, settings, channels],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn delete_account(db: &Database, name: &str) -> Result<(), SwitchboardError> {
    let name = name.to_string();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute("DELETE FROM accounts WHERE name = ?1", params![name])?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Records the last outgoing record confirmed delivered on an account.
pub async fn set_last_id(db: &Database, name: &str, id: RecordId) -> Result<(), SwitchboardError> {
    let name = name.to_string();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "UPDATE accounts SET last_id = ?1 WHERE name = ?2",
                params![id.0, name],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}
