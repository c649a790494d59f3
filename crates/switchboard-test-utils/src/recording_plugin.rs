// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A plugin that records what it is handed.
//!
//! Message text containing `panic` makes the message handler panic. The
//! `cmd <text>` command replies `got: <text>`; `ldap <name>` searches the
//! named directory and replies with the first DN or the lookup error.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use switchboard_core::{Record, SwitchboardError};
use switchboard_ldap::Search;
use switchboard_plugin::schema::{Arg, Command};
use switchboard_plugin::{
    CommandCall, CommandHandler, Commands, MessageHandler, OutgoingHandler, Plugger, Plugin,
    PluginSpec,
};
use tokio::sync::Mutex;

use crate::mock_chat::WAIT;

/// What every instance started from one spec observed.
#[derive(Default)]
pub struct Recorder {
    /// `(instance, record)` for each message handled.
    messages: Mutex<Vec<(String, Record)>>,
    commands: Mutex<Vec<(String, CommandCall)>>,
    outgoing: Mutex<Vec<(String, Record)>>,
    starts: AtomicUsize,
    stops: AtomicUsize,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn messages(&self) -> Vec<(String, Record)> {
        self.messages.lock().await.clone()
    }

    /// Texts of the messages handled by `instance`, in order.
    pub async fn texts(&self, instance: &str) -> Vec<String> {
        self.messages
            .lock()
            .await
            .iter()
            .filter(|(name, _)| name == instance)
            .map(|(_, r)| r.text.clone())
            .collect()
    }

    pub async fn commands(&self) -> Vec<(String, CommandCall)> {
        self.commands.lock().await.clone()
    }

    pub async fn outgoing(&self) -> Vec<(String, Record)> {
        self.outgoing.lock().await.clone()
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    /// Waits until at least `n` messages were handled in total.
    pub async fn wait_messages(&self, n: usize) -> Vec<(String, Record)> {
        self.wait_until(|r| r.messages.try_lock().map(|m| m.len() >= n).unwrap_or(false))
            .await;
        self.messages().await
    }

    /// Waits until at least `n` outgoing echoes were observed.
    pub async fn wait_outgoing(&self, n: usize) -> Vec<(String, Record)> {
        self.wait_until(|r| r.outgoing.try_lock().map(|m| m.len() >= n).unwrap_or(false))
            .await;
        self.outgoing().await
    }

    /// Waits until `n` instances have been started.
    pub async fn wait_starts(&self, n: usize) {
        self.wait_until(|r| r.starts() >= n).await;
    }

    async fn wait_until(&self, done: impl Fn(&Self) -> bool) {
        let poll = async {
            while !done(self) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        };
        tokio::time::timeout(WAIT, poll)
            .await
            .expect("timed out waiting for the recording plugin");
    }
}

/// A spec named `name` whose instances report to `recorder`.
pub fn recording_spec(name: &str, recorder: Arc<Recorder>) -> PluginSpec {
    let factory = move |plugger: Plugger| -> Result<Box<dyn Plugin>, SwitchboardError> {
        recorder.starts.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(RecordingPlugin {
            recorder: recorder.clone(),
            plugger,
        }))
    };
    PluginSpec::new(name, factory)
        .with_help("Records every record it is handed.")
        .with_commands(Commands(vec![
            Command::new("cmd")
                .help("Replies with the text.")
                .arg(Arg::new("text").hint("<text ...>").trailing().required()),
            Command::new("ldap")
                .help("Searches a directory connection.")
                .arg(Arg::new("name").required()),
        ]))
}

struct RecordingPlugin {
    recorder: Arc<Recorder>,
    plugger: Plugger,
}

#[async_trait]
impl Plugin for RecordingPlugin {
    fn as_message_handler(&self) -> Option<&dyn MessageHandler> {
        Some(self)
    }

    fn as_command_handler(&self) -> Option<&dyn CommandHandler> {
        Some(self)
    }

    fn as_outgoing_handler(&self) -> Option<&dyn OutgoingHandler> {
        Some(self)
    }

    async fn stop(&self) -> Result<(), SwitchboardError> {
        self.recorder.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl MessageHandler for RecordingPlugin {
    async fn handle_message(&self, record: &Record) {
        self.recorder
            .messages
            .lock()
            .await
            .push((self.plugger.name().to_string(), record.clone()));
        if record.text.contains("panic") {
            panic!("asked to panic by {:?}", record.text);
        }
    }
}

impl RecordingPlugin {
    async fn search(&self, name: &str) -> String {
        let conn = match self.plugger.ldap(name) {
            Ok(conn) => conn,
            Err(e) => return format!("error: {e}"),
        };
        match conn.search(&Search::default()).await {
            Ok(found) => match found.first() {
                Some(entry) => format!("dn: {}", entry.dn),
                None => "dn: none".to_string(),
            },
            Err(e) => format!("error: {e}"),
        }
    }
}

#[async_trait]
impl CommandHandler for RecordingPlugin {
    async fn handle_command(&self, cmd: &CommandCall) {
        self.recorder
            .commands
            .lock()
            .await
            .push((self.plugger.name().to_string(), cmd.clone()));
        let text = match cmd.schema.name.as_str() {
            "ldap" => self.search(cmd.args.str("name")).await,
            _ => format!("got: {}", cmd.args.str("text")),
        };
        let _ = self.plugger.reply(&cmd.record, text).await;
    }
}

#[async_trait]
impl OutgoingHandler for RecordingPlugin {
    async fn handle_outgoing(&self, record: &Record) {
        self.recorder
            .outgoing
            .lock()
            .await
            .push((self.plugger.name().to_string(), record.clone()));
    }
}
