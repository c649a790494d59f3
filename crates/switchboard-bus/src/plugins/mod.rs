// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Plugin instances fed from the incoming log.
//!
//! The manager runs one instance per enabled row of the `plugins` table,
//! tails the incoming log from a bounded distance in the past, and hands
//! each record to the instances whose targets match it. Instance positions
//! are persisted after every delivery, so a restarted instance resumes where
//! it left off, but never further back than the rollback limit.

mod dispatch;
mod host;
mod ldap;
mod manager;

pub use manager::start;

/// Whether the instance `name` is enabled by `filter`.
///
/// No filter enables everything. An entry enables the plugin of that name
/// and every `entry/label` instance of it.
pub fn plugin_enabled(filter: Option<&[String]>, name: &str) -> bool {
    let Some(filter) = filter else {
        return true;
    };
    filter.iter().any(|entry| {
        name == entry
            || name
                .strip_prefix(entry.as_str())
                .is_some_and(|rest| rest.starts_with('/'))
    })
}
