// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Switchboard chat bridge.
//!
//! This crate provides the record and descriptor types, the routing target
//! model, the error type, and the traits the bus uses to reach the ordered
//! log, the state tables, and chat connections.

pub mod descriptor;
pub mod error;
pub mod target;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use descriptor::{AccountInfo, AccountSettings, LdapInfo, PluginInfo};
pub use error::SwitchboardError;
pub use target::{Address, Target, Targets};
pub use types::{LogName, Record, RecordId};

pub use traits::{
    ChatConnection, ChatDialer, OrderedLog, StateStore, TailCursor, TailEvent, TailFilter,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_variants_render() {
        let storage = SwitchboardError::storage(std::io::Error::other("disk"));
        assert_eq!(storage.to_string(), "storage error: disk");

        let missing = SwitchboardError::NotFound {
            kind: "ldap connection".into(),
            name: "corp".into(),
        };
        assert_eq!(missing.to_string(), r#"ldap connection "corp" not found"#);

        let unregistered = SwitchboardError::NotRegistered {
            name: "nope".into(),
        };
        assert_eq!(unregistered.to_string(), r#"plugin "nope" not registered"#);

        assert_eq!(
            SwitchboardError::connection("refused").to_string(),
            "connection error: refused"
        );
    }

    #[test]
    fn all_traits_are_object_safe() {
        fn _log(_: &dyn OrderedLog) {}
        fn _cursor(_: Box<dyn TailCursor>) {}
        fn _state(_: &dyn StateStore) {}
        fn _conn(_: &dyn ChatConnection) {}
        fn _dialer(_: &dyn ChatDialer) {}
    }
}
