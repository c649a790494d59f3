// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reconciliation of running consumer instances against their descriptors.
//!
//! Both managers keep a map of running instances keyed by name and, on every
//! refresh, bring it in line with the rows of their state table:
//!
//! - a new row starts an instance,
//! - a changed row stops the instance and starts a replacement,
//! - a missing row stops the instance,
//! - an unchanged row gets a chance to apply in-place updates.
//!
//! A failed read of the table leaves the running set untouched.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use switchboard_core::{RecordId, SwitchboardError};
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How a manager starts, compares, updates and stops one kind of instance.
#[async_trait]
pub trait Lifecycle: Send + Sync {
    type Descriptor: Send + Sync;
    type Instance: Send + Sync;

    /// Kind name used in log lines, e.g. `plugin`.
    const KIND: &'static str;

    /// Reads the descriptors that should be running.
    async fn desired(&self) -> Result<Vec<Self::Descriptor>, SwitchboardError>;

    fn name<'a>(&self, desc: &'a Self::Descriptor) -> &'a str;

    /// Whether `inst` must be restarted to reflect `desc`.
    fn changed(&self, inst: &Self::Instance, desc: &Self::Descriptor) -> bool;

    /// Whether `inst` is still running. Dead instances are restarted.
    fn alive(&self, _inst: &Self::Instance) -> bool {
        true
    }

    async fn start(&self, desc: &Self::Descriptor) -> Result<Self::Instance, SwitchboardError>;

    /// Applies changes that do not require a restart.
    async fn update(&self, _inst: &mut Self::Instance, _desc: &Self::Descriptor) {}

    async fn stop(&self, name: &str, inst: Self::Instance);

    /// Log position a freshly started instance resumes from.
    fn position(&self, _inst: &Self::Instance) -> Option<RecordId> {
        None
    }
}

/// Outcome of one reconciliation pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Report {
    pub started: Vec<String>,
    pub restarted: Vec<String>,
    pub stopped: Vec<String>,
    pub failed: Vec<String>,
    /// Oldest resume position among started instances.
    pub rollback: Option<RecordId>,
}

impl Report {
    pub fn is_noop(&self) -> bool {
        self.started.is_empty()
            && self.restarted.is_empty()
            && self.stopped.is_empty()
            && self.failed.is_empty()
    }
}

pub struct Reconciler<L: Lifecycle> {
    lifecycle: L,
    running: BTreeMap<String, L::Instance>,
}

impl<L: Lifecycle> Reconciler<L> {
    pub fn new(lifecycle: L) -> Self {
        Self {
            lifecycle,
            running: BTreeMap::new(),
        }
    }

    pub fn lifecycle(&self) -> &L {
        &self.lifecycle
    }

    pub fn running(&self) -> &BTreeMap<String, L::Instance> {
        &self.running
    }

    pub fn running_mut(&mut self) -> &mut BTreeMap<String, L::Instance> {
        &mut self.running
    }

    /// Brings the running set in line with the desired descriptors.
    ///
    /// Returns `None` without touching anything when the descriptors cannot
    /// be read.
    pub async fn reconcile(&mut self) -> Option<Report> {
        let kind = L::KIND;
        let desired = match self.lifecycle.desired().await {
            Ok(desired) => desired,
            Err(e) => {
                warn!(kind, error = %e, "cannot fetch descriptors");
                return None;
            }
        };

        let mut report = Report::default();
        let wanted: BTreeSet<&str> = desired.iter().map(|d| self.lifecycle.name(d)).collect();
        let removed: Vec<String> = self
            .running
            .keys()
            .filter(|name| !wanted.contains(name.as_str()))
            .cloned()
            .collect();
        for name in removed {
            if let Some(inst) = self.running.remove(&name) {
                info!(kind, %name, "removed, stopping");
                self.lifecycle.stop(&name, inst).await;
                report.stopped.push(name);
            }
        }

        for desc in &desired {
            let name = self.lifecycle.name(desc).to_string();

            let mut restart = false;
            if let Some(inst) = self.running.get_mut(&name) {
                let changed = self.lifecycle.changed(inst, desc);
                let alive = self.lifecycle.alive(inst);
                if !changed && alive {
                    self.lifecycle.update(inst, desc).await;
                    continue;
                }
                if changed {
                    info!(kind, %name, "descriptor changed, restarting");
                } else {
                    info!(kind, %name, "instance died, restarting");
                }
                if let Some(inst) = self.running.remove(&name) {
                    self.lifecycle.stop(&name, inst).await;
                }
                restart = true;
            } else {
                info!(kind, %name, "starting");
            }

            match self.lifecycle.start(desc).await {
                Ok(inst) => {
                    if let Some(pos) = self.lifecycle.position(&inst) {
                        report.rollback = Some(report.rollback.map_or(pos, |r| r.min(pos)));
                    }
                    self.running.insert(name.clone(), inst);
                    if restart {
                        report.restarted.push(name);
                    } else {
                        report.started.push(name);
                    }
                }
                Err(SwitchboardError::NotRegistered { name: spec }) => {
                    debug!(kind, %name, %spec, "not registered, skipping");
                    report.failed.push(name);
                }
                Err(e) => {
                    warn!(kind, %name, error = %e, "failed to start");
                    report.failed.push(name);
                }
            }
        }

        Some(report)
    }

    /// Stops every running instance, at most `concurrency` at a time.
    pub async fn shutdown(&mut self, concurrency: usize) {
        let running = std::mem::take(&mut self.running);
        if running.is_empty() {
            return;
        }
        debug!(kind = L::KIND, count = running.len(), "stopping all instances");
        let lifecycle = &self.lifecycle;
        futures::stream::iter(running)
            .for_each_concurrent(concurrency.max(1), |(name, inst)| async move {
                lifecycle.stop(&name, inst).await;
            })
            .await;
    }
}

/// Periodic refresh timer; never fires when disabled.
pub struct Ticker(Option<Interval>);

impl Ticker {
    pub fn new(period: Option<Duration>) -> Self {
        Ticker(period.map(|period| {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        }))
    }

    pub async fn tick(&mut self) {
        match &mut self.0 {
            Some(interval) => {
                interval.tick().await;
            }
            None => std::future::pending().await,
        }
    }
}

pub(crate) enum Request {
    Refresh(oneshot::Sender<()>),
}

/// Control handle for a manager task.
pub struct ManagerHandle {
    kind: &'static str,
    requests: mpsc::Sender<Request>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ManagerHandle {
    pub(crate) fn new(
        kind: &'static str,
        requests: mpsc::Sender<Request>,
        cancel: CancellationToken,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            kind,
            requests,
            cancel,
            task: Mutex::new(Some(task)),
        }
    }

    /// Reloads descriptors now; resolves once the pass has completed.
    pub async fn refresh(&self) -> Result<(), SwitchboardError> {
        let (ack, done) = oneshot::channel();
        tokio::select! {
            _ = self.cancel.cancelled() => return Err(SwitchboardError::Stopped),
            sent = self.requests.send(Request::Refresh(ack)) => {
                sent.map_err(|_| SwitchboardError::Stopped)?;
            }
        }
        done.await.map_err(|_| SwitchboardError::Stopped)
    }

    /// Stops the manager and every instance it runs. Stopping twice is a
    /// no-op.
    pub async fn stop(&self) {
        self.cancel.cancel();
        let task = self.task.lock().await.take();
        if let Some(task) = task {
            info!(kind = self.kind, "manager stop requested, waiting");
            if let Err(e) = task.await {
                warn!(kind = self.kind, error = %e, "manager task failed");
            }
            info!(kind = self.kind, "manager stopped");
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
