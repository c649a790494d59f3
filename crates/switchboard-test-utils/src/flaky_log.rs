// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! An ordered log wrapper that injects tail failures and slow opens.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use switchboard_core::{
    LogName, OrderedLog, Record, RecordId, SwitchboardError, TailCursor, TailEvent, TailFilter,
};
use tokio::sync::watch;

#[derive(Default)]
struct Faults {
    /// Successful reads left before failures begin; `None` when disarmed.
    reads_before: Option<usize>,
    read_failures: usize,
    open_failures: usize,
}

impl Faults {
    fn take_read_failure(&mut self) -> bool {
        if self.read_failures > 0 && self.reads_before == Some(0) {
            self.read_failures -= 1;
            return true;
        }
        false
    }

    fn count_read(&mut self) {
        if let Some(n) = self.reads_before.as_mut() {
            *n = n.saturating_sub(1);
        }
    }
}

pub struct FlakyLog {
    inner: Arc<dyn OrderedLog>,
    faults: Arc<Mutex<Faults>>,
    opens: AtomicUsize,
    held: watch::Sender<bool>,
}

impl FlakyLog {
    pub fn new(inner: Arc<dyn OrderedLog>) -> Self {
        Self {
            inner,
            faults: Arc::default(),
            opens: AtomicUsize::new(0),
            held: watch::Sender::new(false),
        }
    }

    /// Blocks cursor opens until [`FlakyLog::release_opens`].
    pub fn hold_opens(&self) {
        self.held.send_replace(true);
    }

    pub fn release_opens(&self) {
        self.held.send_replace(false);
    }

    /// After `reads` more successful cursor reads, fails the next
    /// `failures` reads.
    pub fn fail_reads_after(&self, reads: usize, failures: usize) {
        let mut faults = self.faults.lock().unwrap();
        faults.reads_before = Some(reads);
        faults.read_failures = failures;
    }

    /// Fails the next `n` attempts to open a cursor.
    pub fn fail_opens(&self, n: usize) {
        self.faults.lock().unwrap().open_failures = n;
    }

    /// Cursor open attempts so far.
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

fn injected() -> SwitchboardError {
    SwitchboardError::storage(std::io::Error::other("injected failure"))
}

#[async_trait]
impl OrderedLog for FlakyLog {
    async fn append(&self, log: LogName, record: &Record) -> Result<RecordId, SwitchboardError> {
        self.inner.append(log, record).await
    }

    async fn tail_from(
        &self,
        log: LogName,
        filter: TailFilter,
        after: RecordId,
        idle_timeout: Duration,
    ) -> Result<Box<dyn TailCursor>, SwitchboardError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let mut held = self.held.subscribe();
        let _ = held.wait_for(|held| !held).await;
        {
            let mut faults = self.faults.lock().unwrap();
            if faults.open_failures > 0 {
                faults.open_failures -= 1;
                return Err(injected());
            }
        }
        let inner = self.inner.tail_from(log, filter, after, idle_timeout).await?;
        Ok(Box::new(FlakyCursor {
            inner,
            faults: self.faults.clone(),
        }))
    }

    async fn last_id_before(
        &self,
        log: LogName,
        cutoff: DateTime<Utc>,
    ) -> Result<RecordId, SwitchboardError> {
        self.inner.last_id_before(log, cutoff).await
    }
}

struct FlakyCursor {
    inner: Box<dyn TailCursor>,
    faults: Arc<Mutex<Faults>>,
}

#[async_trait]
impl TailCursor for FlakyCursor {
    async fn next(&mut self) -> Result<TailEvent, SwitchboardError> {
        if self.faults.lock().unwrap().take_read_failure() {
            return Err(injected());
        }
        let event = self.inner.next().await?;
        if let TailEvent::Record(_) = &event {
            self.faults.lock().unwrap().count_read();
        }
        Ok(event)
    }

    async fn close(self: Box<Self>) {
        self.inner.close().await;
    }
}
