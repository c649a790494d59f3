// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Records, record ids, and log names shared by every Switchboard crate.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

use crate::target::Address;

/// Protocol verb for a plain chat message.
pub const CMD_PRIVMSG: &str = "PRIVMSG";
/// Protocol verb for a reply request (confirmation pings).
pub const CMD_PING: &str = "PING";
/// Protocol verb for a reply (confirmation echoes, wake records).
pub const CMD_PONG: &str = "PONG";
/// Protocol verb for joining channels.
pub const CMD_JOIN: &str = "JOIN";
/// Protocol verb for leaving channels.
pub const CMD_PART: &str = "PART";
/// Protocol verb for leaving the server.
pub const CMD_QUIT: &str = "QUIT";

/// Account marker reserved for wake records injected by the rollback protocol.
///
/// No real account may use this name; records carrying it never reach plugins.
pub const WAKE_ACCOUNT: &str = "<rollback>";
const WAKE_TEXT: &str = "<rollback>";

/// Position of a record in the ordered log.
///
/// Ids are assigned by the store on insert, are globally unique, and increase
/// monotonically in insertion order. `RecordId::ZERO` precedes every record.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RecordId(pub i64);

impl RecordId {
    /// The position before the first record.
    pub const ZERO: RecordId = RecordId(0);

    /// Encodes the id as 16 lowercase hex digits.
    pub fn to_hex(self) -> String {
        format!("{:016x}", self.0)
    }

    /// Decodes an id previously produced by [`RecordId::to_hex`].
    pub fn from_hex(s: &str) -> Option<RecordId> {
        if s.is_empty() || s.len() > 16 {
            return None;
        }
        u64::from_str_radix(s, 16)
            .ok()
            .and_then(|v| i64::try_from(v).ok())
            .map(RecordId)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The two ordered logs the bridge maintains.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum LogName {
    /// Records received from chat connections, consumed by plugins.
    Incoming,
    /// Records produced by plugins, consumed by outbound delivery.
    Outgoing,
}

/// An immutable unit of chat data stored in an ordered log.
///
/// Inbound records carry the sender identity (`nick`, `user`, `host`), the
/// channel when sent to one, and `as_nick`, the bot's nick at the time it was
/// received. Records with an empty `as_nick` are the bot's own outbound
/// messages echoed back into the incoming log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Assigned by the store; not part of the stored payload.
    #[serde(skip)]
    pub id: RecordId,

    pub account: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub nick: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub user: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub host: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub command: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<String>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub channel: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub text: String,

    /// Bang prefix used by this account for commands addressed to the bot.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub bang: String,

    /// Text with the bot-addressing prefix (`bot: ` or the bang) removed.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub bot_text: String,

    /// Bot nick when the record was received; empty for outbound echoes.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub as_nick: String,

    /// Whether the record was addressed to the bot.
    #[serde(default)]
    pub to_bot: bool,
}

impl Record {
    /// A plain chat message to a channel or, when `channel` is empty, to `nick`.
    pub fn message(
        account: impl Into<String>,
        channel: impl Into<String>,
        nick: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Record {
            account: account.into(),
            channel: channel.into(),
            nick: nick.into(),
            command: CMD_PRIVMSG.to_string(),
            text: text.into(),
            ..Default::default()
        }
    }

    /// A protocol command with free-form parameters.
    pub fn command(account: impl Into<String>, command: impl Into<String>) -> Self {
        Record {
            account: account.into(),
            command: command.into(),
            ..Default::default()
        }
    }

    /// A join request for all `channels` in a single command.
    pub fn join(account: impl Into<String>, channels: &[String]) -> Self {
        Record {
            channel: channels.join(","),
            ..Record::command(account, CMD_JOIN)
        }
    }

    /// A part request for all `channels` in a single command.
    pub fn part(account: impl Into<String>, channels: &[String]) -> Self {
        Record {
            channel: channels.join(","),
            ..Record::command(account, CMD_PART)
        }
    }

    /// A reply request whose text must be echoed back by the peer.
    pub fn ping(account: impl Into<String>, text: impl Into<String>) -> Self {
        Record {
            text: text.into(),
            ..Record::command(account, CMD_PING)
        }
    }

    /// A reply carrying `text`.
    pub fn pong(account: impl Into<String>, text: impl Into<String>) -> Self {
        Record {
            text: text.into(),
            ..Record::command(account, CMD_PONG)
        }
    }

    /// A no-op record that wakes tailing readers blocked on the incoming log.
    pub fn wake() -> Self {
        Record::pong(WAKE_ACCOUNT, WAKE_TEXT)
    }

    /// Whether this is a wake record injected by the rollback protocol.
    pub fn is_wake(&self) -> bool {
        self.account == WAKE_ACCOUNT
    }

    /// Whether this record is the bot's own outbound message echoed back.
    pub fn is_outgoing_echo(&self) -> bool {
        self.as_nick.is_empty() && !self.is_wake()
    }

    /// Effective protocol verb; an empty command is a plain message.
    pub fn verb(&self) -> &str {
        if self.command.is_empty() {
            CMD_PRIVMSG
        } else {
            &self.command
        }
    }

    /// The address this record came from (inbound) or goes to (outbound).
    pub fn address(&self) -> Address {
        Address {
            account: self.account.clone(),
            channel: self.channel.clone(),
            nick: self.nick.clone(),
        }
    }
}

/// Renders the record as it is addressed when sent, e.g. `PRIVMSG #chan :hi`.
impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.verb())?;
        let target = if self.channel.is_empty() {
            &self.nick
        } else {
            &self.channel
        };
        if !target.is_empty() {
            write!(f, " {target}")?;
        }
        for param in &self.params {
            write!(f, " {param}")?;
        }
        if !self.text.is_empty() {
            write!(f, " :{}", self.text)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_id_hex_round_trips_and_rejects_garbage() {
        let id = RecordId(0x1234_abcd);
        assert_eq!(id.to_hex(), "000000001234abcd");
        assert_eq!(RecordId::from_hex(&id.to_hex()), Some(id));
        assert_eq!(RecordId::from_hex(""), None);
        assert_eq!(RecordId::from_hex("xyz"), None);
        assert_eq!(RecordId::from_hex("ffffffffffffffff"), None);
        assert_eq!(RecordId::from_hex("00000000000000001"), None);
    }

    #[test]
    fn log_name_strings() {
        assert_eq!(LogName::Incoming.to_string(), "incoming");
        let s: &'static str = LogName::Outgoing.into();
        assert_eq!(s, "outgoing");
    }

    #[test]
    fn display_renders_outbound_forms() {
        let msg = Record::message("one", "#chan", "", "hello");
        assert_eq!(msg.to_string(), "PRIVMSG #chan :hello");

        let private = Record::message("one", "", "nick", "hi");
        assert_eq!(private.to_string(), "PRIVMSG nick :hi");

        let join = Record::join("one", &["#c1".to_string(), "#c2".to_string()]);
        assert_eq!(join.to_string(), "JOIN #c1,#c2");

        let ping = Record::ping("one", "sent:00000000000000ff");
        assert_eq!(ping.to_string(), "PING :sent:00000000000000ff");

        let mut custom = Record::command("one", "TEST");
        custom.params = vec!["some".into(), "params".into()];
        assert_eq!(custom.to_string(), "TEST some params");
    }

    #[test]
    fn wake_record_is_reserved() {
        let wake = Record::wake();
        assert!(wake.is_wake());
        assert_eq!(wake.command, CMD_PONG);
        assert!(!Record::message("one", "#c", "n", "t").is_wake());
    }

    #[test]
    fn wake_record_is_not_an_outgoing_echo() {
        assert!(!Record::wake().is_outgoing_echo());

        let echo = Record::message("one", "#c", "", "sent by the bot");
        assert!(echo.is_outgoing_echo());

        let heard = Record {
            as_nick: "bot".into(),
            ..Record::message("one", "#c", "joe", "hi")
        };
        assert!(!heard.is_outgoing_echo());
    }

    #[test]
    fn payload_omits_id_and_empty_fields() {
        let mut rec = Record::message("one", "#chan", "", "hello");
        rec.id = RecordId(42);
        let json = serde_json::to_string(&rec).unwrap();
        assert!(!json.contains("42"));
        assert!(!json.contains("nick"));
        let back: Record = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, RecordId::ZERO);
        assert_eq!(back.text, "hello");
    }
}
