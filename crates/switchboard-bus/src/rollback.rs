// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rollback requests sent to a running tail.
//!
//! A tail that receives a request older than its position abandons the
//! in-flight record and restarts after the requested position. Requests not
//! older than the position are ignored. Each request is acknowledged with
//! whether it was applied.

use switchboard_core::{RecordId, SwitchboardError};
use tokio::sync::{mpsc, oneshot};

#[derive(Debug)]
pub struct RollbackRequest {
    /// The tail restarts with records after this id.
    pub position: RecordId,
    pub ack: oneshot::Sender<bool>,
}

impl RollbackRequest {
    /// Resolves the request against `current`, returning the new position if
    /// the rollback applies.
    pub(crate) fn resolve(self, current: RecordId) -> Option<RecordId> {
        let applied = self.position < current;
        // The requester may have given up waiting.
        let _ = self.ack.send(applied);
        applied.then_some(self.position)
    }

    /// Acknowledges a request superseded by a later one.
    pub(crate) fn supersede(self) {
        let _ = self.ack.send(false);
    }
}

/// The requesting side of a tail's rollback channel.
#[derive(Debug, Clone)]
pub struct RollbackHandle {
    tx: mpsc::Sender<RollbackRequest>,
}

/// The receiving side, owned by the tail.
pub type RollbackReceiver = mpsc::Receiver<RollbackRequest>;

pub fn channel() -> (RollbackHandle, RollbackReceiver) {
    let (tx, rx) = mpsc::channel(8);
    (RollbackHandle { tx }, rx)
}

impl RollbackHandle {
    /// Asks the tail to restart after `position`; resolves once the tail has
    /// observed the request.
    pub async fn request(&self, position: RecordId) -> Result<bool, SwitchboardError> {
        let (ack, done) = oneshot::channel();
        self.tx
            .send(RollbackRequest { position, ack })
            .await
            .map_err(|_| SwitchboardError::Stopped)?;
        done.await.map_err(|_| SwitchboardError::Stopped)
    }
}

/// Takes the most recent pending request, superseding older ones.
pub(crate) fn latest(rx: &mut RollbackReceiver, first: RollbackRequest) -> RollbackRequest {
    let mut latest = first;
    while let Ok(next) = rx.try_recv() {
        latest.supersede();
        latest = next;
    }
    latest
}
