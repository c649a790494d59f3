// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable message bus and consumer lifecycle for the Switchboard bridge.
//!
//! Inbound chat traffic is appended to the incoming log and fanned out to
//! plugins; plugin output is appended to the outgoing log and delivered per
//! account. Both sides are tailing consumers with persisted positions, kept
//! in line with the state tables by a reconciling supervisor.

pub mod accounts;
pub mod bridge;
pub mod outbound;
pub mod plugins;
pub mod rollback;
pub mod supervisor;
pub mod tail;

use std::sync::Arc;

use switchboard_core::{OrderedLog, StateStore};

pub use bridge::Bridge;
pub use supervisor::ManagerHandle;
pub use tail::{TailOptions, Tailer};

/// The ordered log and state tables the bus runs on.
#[derive(Clone)]
pub struct Store {
    pub log: Arc<dyn OrderedLog>,
    pub state: Arc<dyn StateStore>,
}

impl Store {
    /// Uses one backend for both the log and the state tables.
    pub fn new<S>(backend: Arc<S>) -> Self
    where
        S: OrderedLog + StateStore + 'static,
    {
        Self {
            log: backend.clone(),
            state: backend,
        }
    }
}
