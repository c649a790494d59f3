// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite-backed ordered log with tailing cursors.
//!
//! Appends go through the writer connection. Each cursor owns a separate
//! read connection and re-queries in batches. In-process appends wake blocked
//! cursors immediately; appends made by other processes are picked up on the
//! next idle timeout.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use switchboard_core::{
    LogName, OrderedLog, Record, RecordId, SwitchboardError, TailCursor, TailEvent, TailFilter,
};
use tokio::sync::watch;
use tracing::{debug, trace};

use crate::database::Database;
use crate::queries::records;

const BATCH_SIZE: usize = 64;

/// Ordered `incoming` and `outgoing` logs in one database.
#[derive(Clone)]
pub struct SqliteLog {
    db: Database,
    capacity: u64,
    notify: Arc<Notifiers>,
}

struct Notifiers {
    incoming: watch::Sender<RecordId>,
    outgoing: watch::Sender<RecordId>,
}

impl Notifiers {
    fn get(&self, log: LogName) -> &watch::Sender<RecordId> {
        match log {
            LogName::Incoming => &self.incoming,
            LogName::Outgoing => &self.outgoing,
        }
    }
}

impl SqliteLog {
    /// Wraps `db`; each log keeps at most `capacity` records (0 = unbounded).
    pub fn new(db: Database, capacity: u64) -> Self {
        let (incoming, _) = watch::channel(RecordId::ZERO);
        let (outgoing, _) = watch::channel(RecordId::ZERO);
        Self {
            db,
            capacity,
            notify: Arc::new(Notifiers { incoming, outgoing }),
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Newest id in `log`, or zero when empty.
    pub async fn last_id(&self, log: LogName) -> Result<RecordId, SwitchboardError> {
        records::last_id(self.db.connection(), log).await
    }
}

#[async_trait]
impl OrderedLog for SqliteLog {
    async fn append(&self, log: LogName, record: &Record) -> Result<RecordId, SwitchboardError> {
        let id = records::append(&self.db, log, record, self.capacity).await?;
        trace!(%log, %id, account = %record.account, "record appended");
        self.notify.get(log).send_replace(id);
        Ok(id)
    }

    async fn tail_from(
        &self,
        log: LogName,
        filter: TailFilter,
        after: RecordId,
        idle_timeout: Duration,
    ) -> Result<Box<dyn TailCursor>, SwitchboardError> {
        let conn = self.db.open_reader().await?;
        debug!(%log, %after, account = ?filter.account, "tail opened");
        Ok(Box::new(SqliteTail {
            conn,
            log,
            filter,
            position: after,
            idle_timeout,
            buffer: VecDeque::new(),
            wake: self.notify.get(log).subscribe(),
        }))
    }

    async fn last_id_before(
        &self,
        log: LogName,
        cutoff: DateTime<Utc>,
    ) -> Result<RecordId, SwitchboardError> {
        records::last_id_before(self.db.connection(), log, cutoff).await
    }
}

/// A cursor over one log, owning its own read connection.
pub struct SqliteTail {
    conn: tokio_rusqlite::Connection,
    log: LogName,
    filter: TailFilter,
    position: RecordId,
    idle_timeout: Duration,
    buffer: VecDeque<Record>,
    wake: watch::Receiver<RecordId>,
}

#[async_trait]
impl TailCursor for SqliteTail {
    async fn next(&mut self) -> Result<TailEvent, SwitchboardError> {
        loop {
            if let Some(record) = self.buffer.pop_front() {
                self.position = record.id;
                return Ok(TailEvent::Record(record));
            }

            // Mark seen before querying so an append racing the query still wakes us.
            self.wake.borrow_and_update();
            let batch =
                records::fetch_after(&self.conn, self.log, &self.filter, self.position, BATCH_SIZE)
                    .await?;
            if !batch.is_empty() {
                self.buffer.extend(batch);
                continue;
            }

            match tokio::time::timeout(self.idle_timeout, self.wake.changed()).await {
                Ok(Ok(())) => continue,
                Ok(Err(_)) => return Err(SwitchboardError::Stopped),
                Err(_) => return Ok(TailEvent::TimedOut),
            }
        }
    }

    async fn close(self: Box<Self>) {
        let log = self.log;
        if let Err(e) = self.conn.close().await {
            debug!(%log, error = %e, "tail connection close failed");
        }
    }
}
