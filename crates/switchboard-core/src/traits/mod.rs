// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Seams between the bus and its external collaborators.
//!
//! All traits use `#[async_trait]` so implementations can be held as trait
//! objects by the bus.

pub mod connection;
pub mod log;
pub mod state;

pub use connection::{ChatConnection, ChatDialer};
pub use log::{OrderedLog, TailCursor, TailEvent, TailFilter};
pub use state::StateStore;
