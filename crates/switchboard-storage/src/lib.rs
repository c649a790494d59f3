// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the Switchboard bridge.
//!
//! Provides WAL-mode SQLite storage with embedded migrations, the ordered
//! `incoming`/`outgoing` record logs with tailing cursors, and typed queries
//! for the plugin, account, and directory tables.

pub mod adapter;
pub mod database;
pub mod log;
pub mod migrations;
pub mod queries;

pub use adapter::SqliteStorage;
pub use database::Database;
pub use log::{SqliteLog, SqliteTail};
