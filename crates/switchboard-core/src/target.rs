// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Routing targets: which records a plugin observes and where it may send.

use serde::{Deserialize, Serialize};

use crate::error::SwitchboardError;
use crate::types::Record;

/// A chat location: an account, optionally narrowed to a channel and/or nick.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub account: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub channel: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub nick: String,
}

impl Address {
    /// Whether every non-empty field of this address equals the record's.
    pub fn contains(&self, record: &Record) -> bool {
        fields_match(&self.account, &self.channel, &self.nick, record)
    }

    /// Whether a message can be addressed here.
    pub fn can_send(&self) -> bool {
        fields_sendable(&self.account, &self.channel, &self.nick)
    }
}

fn fields_match(account: &str, channel: &str, nick: &str, record: &Record) -> bool {
    (account.is_empty() || account == record.account)
        && (channel.is_empty() || channel == record.channel)
        && (nick.is_empty() || nick == record.nick)
}

fn fields_sendable(account: &str, channel: &str, nick: &str) -> bool {
    !account.is_empty() && (!channel.is_empty() || !nick.is_empty())
}

/// A plugin routing entry with optional per-target configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Target {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub account: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub channel: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub nick: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<serde_json::Value>,
}

impl Target {
    pub fn new(address: Address) -> Self {
        Target {
            account: address.account,
            channel: address.channel,
            nick: address.nick,
            config: None,
        }
    }

    pub fn address(&self) -> Address {
        Address {
            account: self.account.clone(),
            channel: self.channel.clone(),
            nick: self.nick.clone(),
        }
    }

    pub fn matches(&self, record: &Record) -> bool {
        fields_match(&self.account, &self.channel, &self.nick, record)
    }

    pub fn can_send(&self) -> bool {
        fields_sendable(&self.account, &self.channel, &self.nick)
    }

    /// Decodes this target's configuration into `T`, or `T::default()` if unset.
    pub fn config<T>(&self) -> Result<T, SwitchboardError>
    where
        T: serde::de::DeserializeOwned + Default,
    {
        match &self.config {
            None => Ok(T::default()),
            Some(v) => serde_json::from_value(v.clone())
                .map_err(|e| SwitchboardError::Config(format!("invalid target config: {e}"))),
        }
    }
}

/// The ordered target list of a plugin.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Targets(pub Vec<Target>);

impl Targets {
    /// Parses a raw targets blob. An empty blob means no targets.
    pub fn parse(raw: &str) -> Result<Self, SwitchboardError> {
        if raw.trim().is_empty() {
            return Ok(Targets::default());
        }
        serde_json::from_str(raw)
            .map_err(|e| SwitchboardError::Config(format!("invalid targets: {e}")))
    }

    /// The first target matching `record`, if any.
    pub fn find(&self, record: &Record) -> Option<&Target> {
        self.0.iter().find(|t| t.matches(record))
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.find(record).is_some()
    }

    /// Targets a message can be addressed to.
    pub fn sendable(&self) -> impl Iterator<Item = &Target> {
        self.0.iter().filter(|t| t.can_send())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Target> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
