// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared fixtures for the bus integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use switchboard_core::{
    LogName, OrderedLog, Record, RecordId, TailCursor, TailEvent, TailFilter,
};
use switchboard_plugin::{PluginRegistry, PluginSpec};
use switchboard_plugin::builtin::register_builtins;
use switchboard_storage::SqliteStorage;
use switchboard_storage::queries::{accounts, plugins};
use switchboard_test_utils::{Recorder, WAIT, recording_spec, temp_storage};
use tempfile::TempDir;

pub struct Env {
    pub storage: Arc<SqliteStorage>,
    pub recorder: Arc<Recorder>,
    pub registry: Arc<PluginRegistry>,
    _dir: TempDir,
}

impl Env {
    pub async fn new() -> Self {
        Self::with_specs(Vec::new()).await
    }

    /// Like [`Env::new`], with `extra` registered next to the builtins and `rec`.
    pub async fn with_specs(extra: Vec<PluginSpec>) -> Self {
        let (storage, dir) = temp_storage().await;
        let recorder = Recorder::new();
        let mut registry = PluginRegistry::new();
        register_builtins(&mut registry).unwrap();
        registry
            .register(recording_spec("rec", recorder.clone()))
            .unwrap();
        for spec in extra {
            registry.register(spec).unwrap();
        }
        Self {
            storage,
            recorder,
            registry: Arc::new(registry),
            _dir: dir,
        }
    }

    pub fn store(&self) -> switchboard_bus::Store {
        switchboard_bus::Store::new(self.storage.clone())
    }

    pub async fn add_plugin(&self, name: &str, config: &str, targets: &str) {
        let db = self.storage.db().unwrap();
        plugins::upsert_plugin(db, name, config, targets)
            .await
            .unwrap();
    }

    pub async fn add_account(&self, name: &str, settings: &str, channels: &[&str]) {
        let channels: Vec<String> = channels.iter().map(|c| c.to_string()).collect();
        let db = self.storage.db().unwrap();
        accounts::upsert_account(db, name, settings, &channels)
            .await
            .unwrap();
    }

    pub async fn plugin_last_id(&self, name: &str) -> RecordId {
        let db = self.storage.db().unwrap();
        plugins::list_plugins(db)
            .await
            .unwrap()
            .into_iter()
            .find(|p| p.name == name)
            .map(|p| p.last_id)
            .unwrap_or_else(|| panic!("no plugin row {name:?}"))
    }

    pub async fn account_last_id(&self, name: &str) -> RecordId {
        let db = self.storage.db().unwrap();
        accounts::list_accounts(db)
            .await
            .unwrap()
            .into_iter()
            .find(|a| a.name == name)
            .map(|a| a.last_id)
            .unwrap_or_else(|| panic!("no account row {name:?}"))
    }

    /// Waits until the account's confirmed position reaches `id`.
    pub async fn wait_account_last_id(&self, name: &str, id: RecordId) {
        let poll = async {
            while self.account_last_id(name).await < id {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        };
        tokio::time::timeout(WAIT, poll)
            .await
            .unwrap_or_else(|_| panic!("{name} never confirmed {id}"));
    }

    pub async fn incoming(&self, record: Record) -> RecordId {
        self.storage
            .append(LogName::Incoming, &record)
            .await
            .unwrap()
    }

    pub async fn outgoing(&self, record: Record) -> RecordId {
        self.storage
            .append(LogName::Outgoing, &record)
            .await
            .unwrap()
    }

    pub async fn reader(&self, log: LogName) -> LogReader {
        LogReader::open(self.storage.as_ref(), log).await
    }
}

/// A message on account `one` as seen by the bot `bot`.
pub fn inbound(channel: &str, nick: &str, text: &str) -> Record {
    Record {
        as_nick: "bot".into(),
        ..Record::message("one", channel, nick, text)
    }
}

/// A message addressed to the bot, carrying `text` as a command.
pub fn to_bot(channel: &str, nick: &str, text: &str) -> Record {
    Record {
        bot_text: text.into(),
        to_bot: true,
        ..inbound(channel, nick, text)
    }
}

/// Reads one log from the beginning.
pub struct LogReader {
    cursor: Box<dyn TailCursor>,
}

impl LogReader {
    pub async fn open(log: &dyn OrderedLog, name: LogName) -> Self {
        let cursor = log
            .tail_from(name, TailFilter::all(), RecordId::ZERO, Duration::from_millis(50))
            .await
            .unwrap();
        Self { cursor }
    }

    pub async fn next(&mut self) -> Record {
        let read = async {
            loop {
                if let TailEvent::Record(record) = self.cursor.next().await.unwrap() {
                    return record;
                }
            }
        };
        tokio::time::timeout(WAIT, read)
            .await
            .expect("timed out waiting for a log record")
    }

    /// Skips records until one matches `pred`.
    pub async fn find(&mut self, pred: impl Fn(&Record) -> bool) -> Record {
        loop {
            let record = self.next().await;
            if pred(&record) {
                return record;
            }
        }
    }

    /// Whether no record arrives within `wait`.
    pub async fn silent_for(&mut self, wait: Duration) -> bool {
        let read = async {
            loop {
                if let TailEvent::Record(record) = self.cursor.next().await.unwrap() {
                    return record;
                }
            }
        };
        tokio::time::timeout(wait, read).await.is_err()
    }
}
