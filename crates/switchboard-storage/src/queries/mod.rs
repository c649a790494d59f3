// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query modules for the record logs and the state tables.

pub mod accounts;
pub mod ldap;
pub mod message_log;
pub mod plugins;
pub mod records;
