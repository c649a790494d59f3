// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persisted descriptor tables and consumer positions.

use async_trait::async_trait;

use crate::descriptor::{AccountInfo, LdapInfo, PluginInfo};
use crate::error::SwitchboardError;
use crate::types::{Record, RecordId};

/// Access to the plugin, account, and directory tables.
///
/// Listing reads whole tables; every write touches a single field of a
/// single row, keyed by name.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn list_plugins(&self) -> Result<Vec<PluginInfo>, SwitchboardError>;

    async fn set_plugin_last_id(&self, name: &str, id: RecordId) -> Result<(), SwitchboardError>;

    /// Stores the command schema a running plugin instance exposes.
    async fn set_plugin_commands(&self, name: &str, commands: &str)
    -> Result<(), SwitchboardError>;

    /// Publishes the command schema of a registered plugin implementation.
    async fn upsert_known_plugin(&self, name: &str, commands: &str)
    -> Result<(), SwitchboardError>;

    async fn list_accounts(&self) -> Result<Vec<AccountInfo>, SwitchboardError>;

    async fn set_account_last_id(&self, name: &str, id: RecordId)
    -> Result<(), SwitchboardError>;

    async fn list_ldap(&self) -> Result<Vec<LdapInfo>, SwitchboardError>;

    /// Archives a record on behalf of a plugin instance.
    async fn archive_record(&self, plugin: &str, record: &Record) -> Result<(), SwitchboardError>;
}
