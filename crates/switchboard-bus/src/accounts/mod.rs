// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chat accounts fed from the outgoing log.
//!
//! The manager runs one client per row of the `accounts` table. A changed
//! settings blob restarts the client; a changed channel list is applied to
//! the live connection with `JOIN` and `PART`.

mod client;
mod manager;

pub use manager::start;
