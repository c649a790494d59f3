// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append and range reads over the `log_records` table.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{OptionalExtension, params};
use switchboard_core::{LogName, Record, RecordId, SwitchboardError, TailFilter};

use crate::database::{Database, map_tr_err};

/// Appends `record` to `log`, trimming the log to at most `capacity`
/// records (0 keeps everything). Returns the assigned id.
pub async fn append(
    db: &Database,
    log: LogName,
    record: &Record,
    capacity: u64,
) -> Result<RecordId, SwitchboardError> {
    let payload = serde_json::to_string(record).map_err(SwitchboardError::storage)?;
    let log_name = log.to_string();
    let account = record.account.clone();
    let command = record.command.clone();
    let time = record
        .time
        .unwrap_or_else(Utc::now)
        .to_rfc3339_opts(SecondsFormat::Millis, true);
    let capacity = i64::try_from(capacity).unwrap_or(i64::MAX);

    db.connection()
        .call(move |conn| -> Result<RecordId, rusqlite::Error> {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO log_records (log, account, command, time, payload)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![log_name, account, command, time, payload],
            )?;
            let id = tx.last_insert_rowid();
            if capacity > 0 {
                tx.execute(
                    "DELETE FROM log_records WHERE log = ?1 AND id <= (
                         SELECT id FROM log_records WHERE log = ?1
                         ORDER BY id DESC LIMIT 1 OFFSET ?2
                     )",
                    params![log_name, capacity],
                )?;
            }
            tx.commit()?;
            Ok(RecordId(id))
        })
        .await
        .map_err(map_tr_err)
}

/// Reads up to `limit` records of `log` with `id > after`, oldest first.
pub async fn fetch_after(
    conn: &tokio_rusqlite::Connection,
    log: LogName,
    filter: &TailFilter,
    after: RecordId,
    limit: usize,
) -> Result<Vec<Record>, SwitchboardError> {
    let log_name = log.to_string();
    let account = filter.account.clone();
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);

    let rows = conn
        .call(move |conn| -> Result<Vec<(i64, String)>, rusqlite::Error> {
            let mut stmt = conn.prepare_cached(
                "SELECT id, payload FROM log_records
                 WHERE log = ?1 AND id > ?2 AND (?3 IS NULL OR account = ?3)
                 ORDER BY id ASC LIMIT ?4",
            )?;
            let rows = stmt.query_map(params![log_name, after.0, account, limit], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })?;
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

/// The newest id in `log` whose timestamp is before `cutoff`, or zero.
pub async fn last_id_before(
    conn: &tokio_rusqlite::Connection,
    log: LogName,
    cutoff: DateTime<Utc>,
) -> Result<RecordId, SwitchboardError> {
    let log_name = log.to_string();
    let cutoff = cutoff.to_rfc3339_opts(SecondsFormat::Millis, true);
    conn.call(move |conn| -> Result<RecordId, rusqlite::Error> {
        let id: Option<i64> = conn
            .query_row(
                "SELECT MAX(id) FROM log_records WHERE log = ?1 AND time < ?2",
                params![log_name, cutoff],
                |row| row.get(0),
            )
            .optional()?
            .flatten();
        Ok(RecordId(id.unwrap_or(0)))
    })
    .await
    .map_err(map_tr_err)
}

/// The newest id in `log`, or zero when empty.
pub async fn last_id(
    conn: &tokio_rusqlite::Connection,
    log: LogName,
) -> Result<RecordId, SwitchboardError> {
    let log_name = log.to_string();
    conn.call(move |conn| -> Result<RecordId, rusqlite::Error> {
        let id: Option<i64> = conn.query_row(
            "SELECT MAX(id) FROM log_records WHERE log = ?1",
            params![log_name],
            |row| row.get(0),
        )?;
        Ok(RecordId(id.unwrap_or(0)))
    })
    .await
    .map_err(map_tr_err)
}
