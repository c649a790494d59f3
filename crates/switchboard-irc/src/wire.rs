// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversions between IRC protocol messages and records.

use chrono::Utc;
use irc::proto::{Command, Message, Prefix};
use switchboard_core::Record;
use switchboard_core::types::{CMD_JOIN, CMD_PART, CMD_PING, CMD_PONG, CMD_PRIVMSG, CMD_QUIT};

const CMD_NOTICE: &str = "NOTICE";

/// Whether `target` names a channel rather than a user.
pub fn is_channel(target: &str) -> bool {
    target.starts_with(['#', '&', '+', '!'])
}

/// Converts a message received while the bot's nick is `nick`.
///
/// Returns `None` for server pings, which the client answers itself.
/// `account` is left empty for the caller to fill in.
pub fn inbound(msg: &Message, nick: &str, bang: &str) -> Option<Record> {
    let mut record = Record {
        time: Some(Utc::now()),
        as_nick: nick.to_string(),
        bang: bang.to_string(),
        ..Default::default()
    };
    match &msg.prefix {
        Some(Prefix::Nickname(n, u, h)) => {
            record.nick = n.clone();
            record.user = u.clone();
            record.host = h.clone();
        }
        Some(Prefix::ServerName(server)) => record.host = server.clone(),
        None => {}
    }

    match &msg.command {
        Command::PING(..) => return None,
        Command::PRIVMSG(target, text) | Command::NOTICE(target, text) => {
            record.command = match msg.command {
                Command::NOTICE(..) => CMD_NOTICE,
                _ => CMD_PRIVMSG,
            }
            .to_string();
            record.text = text.clone();
            if is_channel(target) {
                record.channel = target.clone();
                if let Some(rest) = addressed(text, nick, bang) {
                    record.to_bot = true;
                    record.bot_text = rest.to_string();
                }
            } else {
                record.to_bot = true;
                record.bot_text = text.trim().to_string();
            }
        }
        Command::JOIN(channels, _, _) => {
            record.command = CMD_JOIN.to_string();
            record.channel = channels.clone();
        }
        Command::PART(channels, comment) => {
            record.command = CMD_PART.to_string();
            record.channel = channels.clone();
            record.text = comment.clone().unwrap_or_default();
        }
        Command::QUIT(comment) => {
            record.command = CMD_QUIT.to_string();
            record.text = comment.clone().unwrap_or_default();
        }
        Command::PONG(server, text) => {
            record.command = CMD_PONG.to_string();
            record.text = text.clone().unwrap_or_else(|| server.clone());
        }
        other => {
            let (verb, params, text) = split_line(&String::from(other));
            record.command = verb;
            record.params = params;
            record.text = text;
        }
    }
    Some(record)
}

/// The text of a channel message with the bot-addressing prefix removed,
/// if it has one: `nick: `, `nick, ` or the account's bang.
fn addressed<'a>(text: &'a str, nick: &str, bang: &str) -> Option<&'a str> {
    let by_nick = (!nick.is_empty())
        .then(|| text.strip_prefix(nick))
        .flatten()
        .and_then(|rest| rest.strip_prefix([':', ',']));
    let by_bang = || {
        (!bang.is_empty())
            .then(|| text.strip_prefix(bang))
            .flatten()
    };
    by_nick.or_else(by_bang).map(str::trim)
}

/// Splits a raw command line into verb, middle parameters, and trailing text.
fn split_line(line: &str) -> (String, Vec<String>, String) {
    let line = line.trim_end_matches(['\r', '\n']);
    let (head, text) = match line.split_once(" :") {
        Some((head, text)) => (head, text.to_string()),
        None => (line, String::new()),
    };
    let mut words = head.split_whitespace();
    let verb = words.next().unwrap_or_default().to_string();
    (verb, words.map(str::to_string).collect(), text)
}

/// Converts a record to the message that transmits it.
pub fn outbound(record: &Record) -> Message {
    let target = if record.channel.is_empty() {
        record.nick.clone()
    } else {
        record.channel.clone()
    };
    let text = || (!record.text.is_empty()).then(|| record.text.clone());
    let command = match record.verb() {
        CMD_PRIVMSG => Command::PRIVMSG(target, record.text.clone()),
        CMD_NOTICE => Command::NOTICE(target, record.text.clone()),
        CMD_JOIN => Command::JOIN(record.channel.clone(), None, None),
        CMD_PART => Command::PART(record.channel.clone(), text()),
        CMD_PING => Command::PING(record.text.clone(), None),
        CMD_PONG => Command::PONG(record.text.clone(), None),
        CMD_QUIT => Command::QUIT(text()),
        verb => {
            let mut args = Vec::with_capacity(record.params.len() + 2);
            if !target.is_empty() {
                args.push(target);
            }
            args.extend(record.params.iter().cloned());
            args.extend(text());
            Command::Raw(verb.to_string(), args)
        }
    };
    Message::from(command)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Message {
        line.parse().unwrap()
    }

    #[test]
    fn channel_messages_addressed_by_nick_or_bang() {
        let msg = parse(":joe!~joe@example.com PRIVMSG #chan :bot: echo hi");
        let rec = inbound(&msg, "bot", "!").unwrap();
        assert_eq!(rec.nick, "joe");
        assert_eq!(rec.user, "~joe");
        assert_eq!(rec.host, "example.com");
        assert_eq!(rec.channel, "#chan");
        assert_eq!(rec.text, "bot: echo hi");
        assert!(rec.to_bot);
        assert_eq!(rec.bot_text, "echo hi");
        assert_eq!(rec.as_nick, "bot");

        let bang = inbound(&parse(":joe!j@h PRIVMSG #chan :!echo hi"), "bot", "!").unwrap();
        assert!(bang.to_bot);
        assert_eq!(bang.bot_text, "echo hi");

        let chatter = inbound(&parse(":joe!j@h PRIVMSG #chan :bots are fun"), "bot", "").unwrap();
        assert!(!chatter.to_bot);
        assert!(chatter.bot_text.is_empty());
    }

    #[test]
    fn private_messages_are_always_addressed() {
        let rec = inbound(&parse(":joe!j@h PRIVMSG bot :echo hi"), "bot", "").unwrap();
        assert!(rec.channel.is_empty());
        assert!(rec.to_bot);
        assert_eq!(rec.bot_text, "echo hi");
    }

    #[test]
    fn membership_and_pongs() {
        let join = inbound(&parse(":bot!b@h JOIN #a,#b"), "bot", "").unwrap();
        assert_eq!(join.command, CMD_JOIN);
        assert_eq!(join.channel, "#a,#b");

        let part = inbound(&parse(":bot!b@h PART #a :bye"), "bot", "").unwrap();
        assert_eq!(part.command, CMD_PART);
        assert_eq!(part.channel, "#a");
        assert_eq!(part.text, "bye");

        let pong = inbound(&parse(":irc.example.com PONG irc.example.com :sent:00000000000000ff"), "bot", "")
            .unwrap();
        assert_eq!(pong.command, CMD_PONG);
        assert_eq!(pong.text, "sent:00000000000000ff");

        assert!(inbound(&parse("PING :irc.example.com"), "bot", "").is_none());
    }

    #[test]
    fn other_commands_keep_their_params() {
        let (verb, params, text) = split_line("TOPIC #chan extra :the topic\r\n");
        assert_eq!(verb, "TOPIC");
        assert_eq!(params, ["#chan", "extra"]);
        assert_eq!(text, "the topic");
    }

    #[test]
    fn outbound_forms() {
        let msg = outbound(&Record::message("one", "#chan", "", "hello"));
        assert_eq!(msg.command, Command::PRIVMSG("#chan".into(), "hello".into()));

        let private = outbound(&Record::message("one", "", "joe", "hi"));
        assert_eq!(private.command, Command::PRIVMSG("joe".into(), "hi".into()));

        let join = outbound(&Record::join("one", &["#a".to_string(), "#b".to_string()]));
        assert_eq!(join.command, Command::JOIN("#a,#b".into(), None, None));

        let ping = outbound(&Record::ping("one", "sent:00000000000000ff"));
        assert_eq!(
            ping.command,
            Command::PING("sent:00000000000000ff".into(), None)
        );

        let quit = Record {
            text: "brb".into(),
            ..Record::command("one", CMD_QUIT)
        };
        assert_eq!(outbound(&quit).command, Command::QUIT(Some("brb".into())));

        let mut raw = Record::command("one", "MODE");
        raw.params = vec!["bot".into(), "+i".into()];
        assert_eq!(
            outbound(&raw).command,
            Command::Raw("MODE".into(), vec!["bot".into(), "+i".into()])
        );
    }
}
