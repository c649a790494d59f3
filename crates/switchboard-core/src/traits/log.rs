// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The ordered, append-only record log.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::SwitchboardError;
use crate::types::{LogName, Record, RecordId};

/// Restricts a tail to a subset of records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TailFilter {
    /// Only records for this account.
    pub account: Option<String>,
}

impl TailFilter {
    pub fn all() -> Self {
        TailFilter::default()
    }

    pub fn account(name: impl Into<String>) -> Self {
        TailFilter {
            account: Some(name.into()),
        }
    }
}

/// One step of a tailing read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TailEvent {
    /// The next record after the cursor position.
    Record(Record),
    /// Nothing arrived within the idle timeout; the cursor is still valid.
    TimedOut,
}

/// A tailing read over one log.
///
/// An `Err` from [`TailCursor::next`] means the cursor is no longer usable
/// and must be closed and reopened.
#[async_trait]
pub trait TailCursor: Send {
    /// Waits for the next record or the idle timeout.
    ///
    /// Cancel safe: dropping the returned future before it completes does
    /// not consume a record.
    async fn next(&mut self) -> Result<TailEvent, SwitchboardError>;

    /// Releases the cursor's store resources.
    async fn close(self: Box<Self>);
}

/// Append-only log store with a blocking read-after-position primitive.
///
/// Record ids are unique across both logs and increase in insertion order.
#[async_trait]
pub trait OrderedLog: Send + Sync {
    /// Appends `record`, returning its assigned id.
    async fn append(&self, log: LogName, record: &Record) -> Result<RecordId, SwitchboardError>;

    /// Opens a tail yielding records with `id > after` in store order.
    async fn tail_from(
        &self,
        log: LogName,
        filter: TailFilter,
        after: RecordId,
        idle_timeout: Duration,
    ) -> Result<Box<dyn TailCursor>, SwitchboardError>;

    /// The id of the newest record stored before `cutoff`, or zero.
    async fn last_id_before(
        &self,
        log: LogName,
        cutoff: DateTime<Utc>,
    ) -> Result<RecordId, SwitchboardError>;
}
