// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Consumer descriptors as stored in the state tables.
//!
//! Configuration and routing blobs are kept as the raw text read from the
//! store. Supervisors compare them byte-for-byte against the version a
//! running instance was started with; any difference means stop + restart.

use serde::{Deserialize, Serialize};

use crate::error::SwitchboardError;
use crate::target::Targets;
use crate::types::RecordId;

/// Nick used by accounts whose settings leave it unset.
pub const DEFAULT_NICK: &str = "switchboard";

/// A row of the `plugins` table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PluginInfo {
    /// Instance name, `<spec>` or `<spec>/<label>`.
    pub name: String,
    /// Raw JSON configuration blob.
    pub config: String,
    /// Raw JSON targets blob.
    pub targets: String,
    pub last_id: RecordId,
}

impl PluginInfo {
    /// Registry key of the plugin implementation: the name up to the first `/`.
    pub fn spec_name(&self) -> &str {
        spec_name(&self.name)
    }

    pub fn parse_targets(&self) -> Result<Targets, SwitchboardError> {
        Targets::parse(&self.targets)
            .map_err(|e| SwitchboardError::Config(format!("plugin {:?}: {e}", self.name)))
    }

    /// Whether the config or targets blob differs from `other`'s.
    pub fn changed(&self, other: &PluginInfo) -> bool {
        self.config != other.config || self.targets != other.targets
    }
}

/// Registry key for a plugin instance name.
pub fn spec_name(name: &str) -> &str {
    match name.find('/') {
        Some(i) => &name[..i],
        None => name,
    }
}

/// A row of the `accounts` table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountInfo {
    pub name: String,
    /// Raw JSON connection settings blob.
    pub settings: String,
    /// Channels the account should be in.
    pub channels: Vec<String>,
    /// Last outgoing record confirmed delivered.
    pub last_id: RecordId,
}

impl AccountInfo {
    pub fn parse_settings(&self) -> Result<AccountSettings, SwitchboardError> {
        let mut settings: AccountSettings = if self.settings.trim().is_empty() {
            AccountSettings::default()
        } else {
            serde_json::from_str(&self.settings).map_err(|e| {
                SwitchboardError::Config(format!("account {:?}: invalid settings: {e}", self.name))
            })?
        };
        if settings.nick.is_empty() {
            settings.nick = DEFAULT_NICK.to_string();
        }
        Ok(settings)
    }

    /// Whether the settings blob differs from `other`'s. Channels are not
    /// part of the comparison; they are reconciled on a live connection.
    pub fn changed(&self, other: &AccountInfo) -> bool {
        self.settings != other.settings
    }
}

/// Connection settings for one chat account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccountSettings {
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub nick: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub tls: bool,
    /// Prefix marking a channel message as a command to the bot.
    #[serde(default)]
    pub bang: Option<String>,
}

/// A row of the `ldap` table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LdapInfo {
    pub name: String,
    /// Raw JSON connection configuration blob.
    pub config: String,
}
