// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Switchboard integration tests.
//!
//! Provides mock collaborators and storage helpers for fast, deterministic,
//! CI-runnable tests without external services.
//!
//! # Components
//!
//! - [`MockDialer`] - Scripted chat server with line reads and record injection
//! - [`Recorder`] / [`recording_spec`] - Plugin that records what it handles
//! - [`FlakyLog`] - Ordered log wrapper injecting cursor failures
//! - [`MockLdap`] - In-memory directory server
//! - [`temp_storage`] - Migrated SQLite store in a temporary directory

pub mod flaky_log;
pub mod harness;
pub mod mock_chat;
pub mod mock_ldap;
pub mod recording_plugin;

pub use flaky_log::FlakyLog;
pub use harness::{temp_storage, test_bus_config};
pub use mock_chat::{MockConnection, MockDialer, MockServer, WAIT};
pub use mock_ldap::MockLdap;
pub use recording_plugin::{Recorder, recording_spec};
