// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chat network connections.
//!
//! Wire-level parsing and formatting live behind these traits. A connection
//! accepts records for transmission and yields inbound protocol events as
//! records. A healthy connection answers every `PING` it sends with a `PONG`
//! record carrying the same text.

use std::sync::Arc;

use async_trait::async_trait;

use crate::descriptor::AccountSettings;
use crate::error::SwitchboardError;
use crate::types::Record;

/// A live session with one chat account.
#[async_trait]
pub trait ChatConnection: Send + Sync {
    /// Transmits `record` (messages, `JOIN`, `PART`, `PING`, `QUIT`).
    async fn send(&self, record: &Record) -> Result<(), SwitchboardError>;

    /// The next inbound record, or `None` once the connection is closed.
    ///
    /// Only one task may call this at a time. Cancel safe. Records carry the
    /// sender identity and `as_nick`; the caller fills in `account`.
    async fn recv(&self) -> Option<Record>;

    /// Closes the session. Closing twice is a no-op.
    async fn close(&self) -> Result<(), SwitchboardError>;
}

/// Opens connections for accounts.
#[async_trait]
pub trait ChatDialer: Send + Sync {
    async fn dial(
        &self,
        account: &str,
        settings: &AccountSettings,
    ) -> Result<Arc<dyn ChatConnection>, SwitchboardError>;
}
