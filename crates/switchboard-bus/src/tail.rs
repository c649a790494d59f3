// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The tailing consumer: an endless, restartable read of one log.
//!
//! A [`Tailer`] delivers every record after its position, in store order,
//! into a bounded channel. The position advances only once the receiver has
//! room for the record. Three ways to wait for the next record, cheapest
//! first:
//!
//! - the cursor yields a record before the idle timeout,
//! - the cursor times out but stays valid and is polled again,
//! - the cursor fails and is reopened at the position after a backoff.
//!
//! Only cancellation ends the loop. Rollback requests are observed while
//! reading, while delivering, and during backoff.

use std::sync::Arc;
use std::time::Duration;

use switchboard_core::{
    LogName, OrderedLog, Record, RecordId, SwitchboardError, TailEvent, TailFilter,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::rollback::{self, RollbackReceiver, RollbackRequest};

#[derive(Debug, Clone)]
pub struct TailOptions {
    pub log: LogName,
    pub filter: TailFilter,
    pub idle_timeout: Duration,
    /// Pause before reopening a failed cursor.
    pub backoff: Duration,
}

impl TailOptions {
    pub fn new(log: LogName, filter: TailFilter) -> Self {
        Self {
            log,
            filter,
            idle_timeout: Duration::from_secs(2),
            backoff: Duration::from_millis(100),
        }
    }

    pub fn idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }
}

pub struct Tailer {
    store: Arc<dyn OrderedLog>,
    options: TailOptions,
    position: RecordId,
    rollback: Option<RollbackReceiver>,
    cancel: CancellationToken,
    failures: u32,
}

enum Read {
    Stop,
    Rollback(RollbackRequest),
    Event(Result<TailEvent, SwitchboardError>),
}

enum Deliver<'a> {
    Stop,
    Rollback(RollbackRequest),
    Ready(Result<mpsc::Permit<'a, Record>, mpsc::error::SendError<()>>),
}

/// What to do with the current cursor after a rollback request.
enum Resume {
    Continue,
    Restart,
}

impl Tailer {
    /// A tail yielding records after `position`.
    pub fn new(
        store: Arc<dyn OrderedLog>,
        options: TailOptions,
        position: RecordId,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            store,
            options,
            position,
            rollback: None,
            cancel,
            failures: 0,
        }
    }

    /// Accepts rollback requests from `rx`.
    pub fn with_rollback(mut self, rx: RollbackReceiver) -> Self {
        self.rollback = Some(rx);
        self
    }

    /// Runs the tail on a new task, delivering into a channel of `capacity`.
    /// The task resolves to the final position.
    pub fn spawn(self, capacity: usize) -> (mpsc::Receiver<Record>, JoinHandle<RecordId>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (rx, tokio::spawn(self.run(tx)))
    }

    /// Delivers records into `out` until cancelled or `out` is closed.
    /// Returns the position of the last delivered record.
    pub async fn run(mut self, out: mpsc::Sender<Record>) -> RecordId {
        let log = self.options.log;
        debug!(%log, position = %self.position, account = ?self.options.filter.account, "tail started");

        'open: while !self.cancel.is_cancelled() {
            let store = self.store.clone();
            let open = store.tail_from(
                log,
                self.options.filter.clone(),
                self.position,
                self.options.idle_timeout,
            );
            tokio::pin!(open);
            let opened = loop {
                let req = tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => break 'open,
                    req = next_request(&mut self.rollback) => req,
                    r = &mut open => break r,
                };
                if let Resume::Restart = self.rollback_to(req) {
                    continue 'open;
                }
            };
            let mut cursor = match opened {
                Ok(cursor) => cursor,
                Err(e) => {
                    self.failed(&e);
                    if !self.pause().await {
                        break 'open;
                    }
                    continue 'open;
                }
            };

            loop {
                let step = tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => Read::Stop,
                    req = next_request(&mut self.rollback) => Read::Rollback(req),
                    ev = cursor.next() => Read::Event(ev),
                };
                match step {
                    Read::Stop => {
                        cursor.close().await;
                        break 'open;
                    }
                    Read::Rollback(req) => {
                        if let Resume::Restart = self.rollback_to(req) {
                            cursor.close().await;
                            continue 'open;
                        }
                    }
                    Read::Event(Ok(TailEvent::TimedOut)) => {
                        self.failures = 0;
                        trace!(%log, "tail idle");
                    }
                    Read::Event(Ok(TailEvent::Record(record))) => {
                        self.failures = 0;
                        match self.deliver(&out, record).await {
                            Some(Resume::Continue) => {}
                            Some(Resume::Restart) => {
                                cursor.close().await;
                                continue 'open;
                            }
                            None => {
                                cursor.close().await;
                                break 'open;
                            }
                        }
                    }
                    Read::Event(Err(e)) => {
                        self.failed(&e);
                        cursor.close().await;
                        if !self.pause().await {
                            break 'open;
                        }
                        continue 'open;
                    }
                }
            }
        }

        debug!(%log, position = %self.position, "tail stopped");
        self.position
    }

    /// Hands `record` downstream. `None` means stop.
    async fn deliver(&mut self, out: &mpsc::Sender<Record>, record: Record) -> Option<Resume> {
        loop {
            let step = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => Deliver::Stop,
                req = next_request(&mut self.rollback) => Deliver::Rollback(req),
                permit = out.reserve() => Deliver::Ready(permit),
            };
            match step {
                Deliver::Stop => return None,
                Deliver::Rollback(req) => {
                    if let Resume::Restart = self.rollback_to(req) {
                        return Some(Resume::Restart);
                    }
                }
                Deliver::Ready(Ok(permit)) => {
                    self.position = record.id;
                    permit.send(record);
                    return Some(Resume::Continue);
                }
                Deliver::Ready(Err(_)) => {
                    debug!(log = %self.options.log, "tail receiver closed");
                    return None;
                }
            }
        }
    }

    fn rollback_to(&mut self, first: RollbackRequest) -> Resume {
        let req = match self.rollback.as_mut() {
            Some(rx) => rollback::latest(rx, first),
            None => first,
        };
        let requested = req.position;
        match req.resolve(self.position) {
            Some(position) => {
                debug!(log = %self.options.log, from = %self.position, to = %position, "tail rolled back");
                self.position = position;
                Resume::Restart
            }
            None => {
                trace!(log = %self.options.log, %requested, position = %self.position, "rollback ignored");
                Resume::Continue
            }
        }
    }

    /// Sleeps the backoff. Returns false if cancelled meanwhile.
    async fn pause(&mut self) -> bool {
        let sleep = tokio::time::sleep(self.options.backoff);
        tokio::pin!(sleep);
        loop {
            let req = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return false,
                _ = &mut sleep => return true,
                req = next_request(&mut self.rollback) => req,
            };
            if let Resume::Restart = self.rollback_to(req) {
                return true;
            }
        }
    }

    fn failed(&mut self, e: &SwitchboardError) {
        self.failures += 1;
        let log = self.options.log;
        if self.failures == 1 {
            warn!(%log, position = %self.position, error = %e, "error tailing log");
        } else {
            debug!(%log, position = %self.position, failures = self.failures, error = %e, "error tailing log");
        }
    }
}

async fn next_request(rx: &mut Option<RollbackReceiver>) -> RollbackRequest {
    if let Some(rx) = rx {
        if let Some(req) = rx.recv().await {
            return req;
        }
    }
    std::future::pending().await
}
