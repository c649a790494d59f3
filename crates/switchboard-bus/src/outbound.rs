// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound delivery with echo confirmation.
//!
//! Every outgoing record handed to a connection is followed by a ping
//! `PING :sent:<id>`. The peer answers with a matching `PONG`, which is the
//! only evidence that everything up to that record went out. Until then the
//! record is considered unsent and is delivered again by the next session.

use switchboard_core::types::{CMD_PONG, CMD_PRIVMSG};
use switchboard_core::{ChatConnection, LogName, OrderedLog, Record, RecordId, SwitchboardError};
use tracing::{trace, warn};

const SENT_PREFIX: &str = "sent:";

/// The confirmation ping sent after `record`.
pub fn sent_ping(record: &Record) -> Record {
    Record::ping(
        &record.account,
        format!("{SENT_PREFIX}{}", record.id.to_hex()),
    )
}

/// The record id confirmed by a ping echo, if `record` is one.
pub fn parse_confirmation(record: &Record) -> Option<RecordId> {
    if record.command != CMD_PONG {
        return None;
    }
    record
        .text
        .strip_prefix(SENT_PREFIX)
        .and_then(RecordId::from_hex)
}

/// Sends `record` and its confirmation ping over `conn`.
///
/// Chat messages are also copied into the incoming log with an empty
/// `as_nick`, so plugins observing outgoing traffic see them. A failure to
/// copy is logged, not returned.
pub async fn deliver(
    conn: &dyn ChatConnection,
    log: &dyn OrderedLog,
    record: &Record,
) -> Result<(), SwitchboardError> {
    trace!(account = %record.account, id = %record.id, "delivering {record}");
    conn.send(record).await?;
    conn.send(&sent_ping(record)).await?;

    if record.verb() == CMD_PRIVMSG {
        let echo = Record {
            id: RecordId::ZERO,
            as_nick: String::new(),
            ..record.clone()
        };
        if let Err(e) = log.append(LogName::Incoming, &echo).await {
            warn!(account = %record.account, error = %e, "cannot record outgoing echo");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sent_ping_carries_hex_id() {
        let mut record = Record::message("one", "#chan", "", "hi");
        record.id = RecordId(255);
        let ping = sent_ping(&record);
        assert_eq!(ping.account, "one");
        assert_eq!(ping.to_string(), "PING :sent:00000000000000ff");
    }

    #[test]
    fn only_sent_pongs_confirm() {
        assert_eq!(
            parse_confirmation(&Record::pong("one", "sent:00000000000000ff")),
            Some(RecordId(255))
        );
        assert_eq!(parse_confirmation(&Record::pong("one", "other")), None);
        assert_eq!(parse_confirmation(&Record::pong("one", "sent:zz")), None);
        assert_eq!(
            parse_confirmation(&Record::ping("one", "sent:00000000000000ff")),
            None
        );
        assert_eq!(parse_confirmation(&Record::wake()), None);
    }
}
