// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The handle a plugin instance uses to talk to the bridge.
//!
//! A [`Plugger`] carries the instance name, its configuration and targets,
//! and a [`PluggerHost`] that routes sends to the outgoing log and injected
//! records to the incoming log.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde_json::Value;
use switchboard_core::types::CMD_PRIVMSG;
use switchboard_core::{Record, SwitchboardError, Target, Targets};
use switchboard_ldap::Conn;
use tracing::{debug, info};

/// Longest text sent in a single message; longer text is split.
pub const MAX_TEXT_LEN: usize = 300;

/// Bridge services available to a plugin instance.
#[async_trait]
pub trait PluggerHost: Send + Sync {
    /// Appends `record` to the outgoing log.
    async fn send(&self, record: Record) -> Result<(), SwitchboardError>;

    /// Appends `record` to the incoming log as if it had been received.
    async fn handle(&self, record: Record) -> Result<(), SwitchboardError>;

    /// The live directory connection registered as `name`.
    fn ldap(&self, name: &str) -> Result<Arc<dyn Conn>, SwitchboardError>;

    /// Persists `record` in the message archive on behalf of `plugin`.
    async fn archive(&self, plugin: &str, record: &Record) -> Result<(), SwitchboardError>;
}

#[derive(Clone)]
pub struct Plugger {
    name: String,
    config: Option<Value>,
    targets: Targets,
    host: Arc<dyn PluggerHost>,
}

impl fmt::Debug for Plugger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plugger")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("targets", &self.targets)
            .finish()
    }
}

impl Plugger {
    /// Builds a plugger from the raw configuration blob of a plugin row.
    pub fn new(
        name: impl Into<String>,
        config: &str,
        targets: Targets,
        host: Arc<dyn PluggerHost>,
    ) -> Result<Self, SwitchboardError> {
        let name = name.into();
        let config = if config.trim().is_empty() {
            None
        } else {
            Some(serde_json::from_str(config).map_err(|e| {
                SwitchboardError::Config(format!("plugin {name:?}: invalid config: {e}"))
            })?)
        };
        Ok(Self {
            name,
            config,
            targets,
            host,
        })
    }

    /// Instance name, `<plugin>` or `<plugin>/<label>`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Decodes the instance configuration, or `T::default()` if unset.
    pub fn config<T>(&self) -> Result<T, SwitchboardError>
    where
        T: DeserializeOwned + Default,
    {
        match &self.config {
            None => Ok(T::default()),
            Some(v) => serde_json::from_value(v.clone()).map_err(|e| {
                SwitchboardError::Config(format!("plugin {:?}: invalid config: {e}", self.name))
            }),
        }
    }

    pub fn targets(&self) -> &Targets {
        &self.targets
    }

    /// The first target matching `record`.
    pub fn target(&self, record: &Record) -> Option<&Target> {
        self.targets.find(record)
    }

    /// Logs `args` at info level, tagged with the instance name.
    pub fn logf(&self, args: fmt::Arguments<'_>) {
        info!(plugin = %self.name, "[{}] {}", self.name, args);
    }

    /// Logs `args` at debug level, tagged with the instance name.
    pub fn debugf(&self, args: fmt::Arguments<'_>) {
        debug!(plugin = %self.name, "[{}] {}", self.name, args);
    }

    /// Queues `record` for delivery.
    ///
    /// The queued copy is stamped with the current time; text longer than
    /// [`MAX_TEXT_LEN`] goes out as several balanced lines.
    pub async fn send(&self, record: &Record) -> Result<(), SwitchboardError> {
        let mut record = record.clone();
        record.time = Some(Utc::now());
        if record.text.len() <= MAX_TEXT_LEN {
            return self.host.send(record).await;
        }
        let text = std::mem::take(&mut record.text);
        for line in break_lines(&text) {
            let mut part = record.clone();
            part.text = line.to_string();
            self.host.send(part).await?;
        }
        Ok(())
    }

    /// Replies to the sender of `to`, in the same channel when there is one.
    ///
    /// Channel replies are addressed to the sender as `nick: text`, or
    /// `@nick text` on telegram-hosted senders. Unknown senders and
    /// `@`-prefixed channels get the text unprefixed.
    pub async fn reply(&self, to: &Record, text: impl Into<String>) -> Result<(), SwitchboardError> {
        let text = text.into();
        let record = if to.channel.is_empty() {
            Record::message(&to.account, "", &to.nick, text)
        } else if to.nick.is_empty() || to.channel.starts_with('@') {
            Record::message(&to.account, &to.channel, "", text)
        } else if to.host == "telegram" {
            Record::message(&to.account, &to.channel, "", format!("@{} {text}", to.nick))
        } else {
            Record::message(&to.account, &to.channel, "", format!("{}: {text}", to.nick))
        };
        self.send(&record).await
    }

    /// Replies privately to the sender of `to`.
    pub async fn send_direct(
        &self,
        to: &Record,
        text: impl Into<String>,
    ) -> Result<(), SwitchboardError> {
        self.send(&Record::message(&to.account, "", &to.nick, text))
            .await
    }

    /// Sends to the channel of `to`, or privately when it has none.
    pub async fn send_channel(
        &self,
        to: &Record,
        text: impl Into<String>,
    ) -> Result<(), SwitchboardError> {
        let record = if to.channel.is_empty() {
            Record::message(&to.account, "", &to.nick, text)
        } else {
            Record::message(&to.account, &to.channel, "", text)
        };
        self.send(&record).await
    }

    /// Sends a copy of `record` to every sendable target.
    ///
    /// Messages are addressed to each target; other commands only take the
    /// target's account. Stops at the first failed send.
    pub async fn broadcast(&self, record: &Record) -> Result<(), SwitchboardError> {
        for target in self.targets.sendable() {
            let mut copy = record.clone();
            copy.account = target.account.clone();
            if copy.verb() == CMD_PRIVMSG {
                address_to(&mut copy, target);
            }
            self.send(&copy).await?;
        }
        Ok(())
    }

    /// Sends `text` to every sendable target.
    pub async fn broadcast_text(&self, text: impl Into<String>) -> Result<(), SwitchboardError> {
        self.broadcast(&Record::message("", "", "", text)).await
    }

    /// Injects `record` into the incoming log if its first matching target
    /// is sendable; otherwise does nothing.
    pub async fn handle(&self, record: &Record) -> Result<(), SwitchboardError> {
        match self.target(record) {
            Some(target) if target.can_send() => self.host.handle(record.clone()).await,
            _ => Ok(()),
        }
    }

    /// The directory connection registered as `name`.
    pub fn ldap(&self, name: &str) -> Result<Arc<dyn Conn>, SwitchboardError> {
        self.host.ldap(name)
    }

    /// Persists `record` in the message archive under this instance's name.
    pub async fn archive(&self, record: &Record) -> Result<(), SwitchboardError> {
        self.host.archive(&self.name, record).await
    }
}

fn address_to(record: &mut Record, target: &Target) {
    if target.channel.is_empty() {
        record.channel.clear();
        record.nick = target.nick.clone();
        return;
    }
    record.channel = target.channel.clone();
    record.nick.clear();
    if !target.nick.is_empty() && !target.channel.starts_with('@') {
        record.text = format!("{}: {}", target.nick, record.text);
    }
}

/// Splits `text` into lines of at most [`MAX_TEXT_LEN`] bytes.
///
/// Lines are balanced in length, broken at the first space at or after the
/// balanced length, else the last space before it, else mid-word.
pub fn break_lines(text: &str) -> Vec<&str> {
    if text.len() <= MAX_TEXT_LEN {
        return vec![text];
    }
    let mut lines = Vec::new();
    let mut rest = text.trim_end_matches(' ');
    while rest.len() > MAX_TEXT_LEN {
        let parts = rest.len().div_ceil(MAX_TEXT_LEN);
        let want = rest.len().div_ceil(parts);
        let bytes = rest.as_bytes();
        let cut = bytes[want..=MAX_TEXT_LEN]
            .iter()
            .position(|&b| b == b' ')
            .map(|i| want + i)
            .or_else(|| bytes[..want].iter().rposition(|&b| b == b' ').filter(|&i| i > 0))
            .unwrap_or_else(|| char_boundary(rest, want));
        lines.push(rest[..cut].trim_end_matches(' '));
        rest = rest[cut..].trim_start_matches(' ');
    }
    if !rest.is_empty() {
        lines.push(rest);
    }
    lines
}

fn char_boundary(text: &str, at: usize) -> usize {
    let mut i = at;
    while i > 0 && !text.is_char_boundary(i) {
        i -= 1;
    }
    if i > 0 {
        return i;
    }
    let mut i = at;
    while !text.is_char_boundary(i) {
        i += 1;
    }
    i
}
