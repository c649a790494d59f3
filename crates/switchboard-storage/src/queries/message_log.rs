// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Archived chat records kept on behalf of plugins.

use rusqlite::params;
use switchboard_core::{Record, RecordId, SwitchboardError};

use crate::database::{Database, map_tr_err};

/// Stores `record` in the archive under `plugin`.
pub async fn insert(db: &Database, plugin: &str, record: &Record) -> Result<(), SwitchboardError> {
    let plugin = plugin.to_string();
    let account = record.account.clone();
    let record_id = record.id.0;
    let payload = serde_json::to_string(record).map_err(SwitchboardError::storage)?;
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO message_log (plugin, record_id, account, payload)
                 VALUES (?1, ?2, ?3, ?4)",
                params![plugin, record_id, account, payload],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Archived records of `plugin`, oldest first, with their original ids.
pub async fn list(db: &Database, plugin: &str) -> Result<Vec<Record>, SwitchboardError> {
    let plugin = plugin.to_string();
    let rows = db
        .connection()
        .call(move |conn| -> Result<Vec<(i64, String)>, rusqlite::Error> {
            let mut stmt = conn.prepare(
                "SELECT record_id, payload FROM message_log WHERE plugin = ?1 ORDER BY id ASC",
            )?;
            let rows = stmt.query_map(params![plugin], |row| Ok((row.get(0)?, row.get(1)?)))?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)?;
    rows.into_iter()
        .map(|(id, payload)| {
            let mut record: Record =
                serde_json::from_str(&payload).map_err(SwitchboardError::storage)?;
            record.id = RecordId(id);
            Ok(record)
        })
        .collect()
}
