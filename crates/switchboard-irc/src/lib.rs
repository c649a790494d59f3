// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! IRC chat connections for the Switchboard bridge.
//!
//! Implements [`ChatDialer`](switchboard_core::ChatDialer) over the `irc`
//! crate. A background task drives each session's stream, converting
//! protocol messages to records; [`wire`] holds the conversions.

mod connection;
pub mod wire;

pub use connection::{IrcConnection, IrcDialer};
