// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted chat server for deterministic connection tests.
//!
//! Every successful [`MockDialer`] dial yields a [`MockConnection`] handed to
//! the bridge and a [`MockServer`] handed to the test. The server reads what
//! the bridge sent, one record per line, and injects inbound records.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use switchboard_core::{AccountSettings, ChatConnection, ChatDialer, Record, SwitchboardError};
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;

/// How long server reads wait before failing the test.
pub const WAIT: Duration = Duration::from_secs(5);

pub struct MockDialer {
    servers_tx: mpsc::UnboundedSender<MockServer>,
    servers_rx: Mutex<mpsc::UnboundedReceiver<MockServer>>,
    fail_next: AtomicUsize,
    dials: AtomicUsize,
}

impl MockDialer {
    pub fn new() -> Self {
        let (servers_tx, servers_rx) = mpsc::unbounded_channel();
        Self {
            servers_tx,
            servers_rx: Mutex::new(servers_rx),
            fail_next: AtomicUsize::new(0),
            dials: AtomicUsize::new(0),
        }
    }

    /// Makes the next `n` dials fail.
    pub fn fail_next(&self, n: usize) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    /// Dial attempts so far, failed ones included.
    pub fn dials(&self) -> usize {
        self.dials.load(Ordering::SeqCst)
    }

    /// The server side of the next successful dial.
    pub async fn next_server(&self) -> MockServer {
        let mut servers = self.servers_rx.lock().await;
        tokio::time::timeout(WAIT, servers.recv())
            .await
            .expect("timed out waiting for a dial")
            .expect("dialer dropped")
    }

    /// Whether no dial succeeds within `wait`.
    pub async fn no_dial_within(&self, wait: Duration) -> bool {
        let mut servers = self.servers_rx.lock().await;
        tokio::time::timeout(wait, servers.recv()).await.is_err()
    }
}

impl Default for MockDialer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatDialer for MockDialer {
    async fn dial(
        &self,
        account: &str,
        settings: &AccountSettings,
    ) -> Result<Arc<dyn ChatConnection>, SwitchboardError> {
        self.dials.fetch_add(1, Ordering::SeqCst);
        if self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(SwitchboardError::connection(format!(
                "{account}: connection refused"
            )));
        }

        let (to_server, from_bridge) = mpsc::unbounded_channel();
        let (to_bridge, from_server) = mpsc::unbounded_channel();
        let closed = CancellationToken::new();
        let stalled = Arc::new(AtomicBool::new(false));
        let server = MockServer {
            account: account.to_string(),
            nick: settings.nick.clone(),
            sent: from_bridge,
            inbound: to_bridge,
            closed: closed.clone(),
            stalled: stalled.clone(),
        };
        self.servers_tx
            .send(server)
            .map_err(|_| SwitchboardError::connection("test finished"))?;
        Ok(Arc::new(MockConnection {
            sent: to_server,
            inbound: Mutex::new(from_server),
            closed,
            stalled,
        }))
    }
}

/// Bridge side of a scripted session.
pub struct MockConnection {
    sent: mpsc::UnboundedSender<Record>,
    inbound: Mutex<mpsc::UnboundedReceiver<Record>>,
    closed: CancellationToken,
    stalled: Arc<AtomicBool>,
}

#[async_trait]
impl ChatConnection for MockConnection {
    async fn send(&self, record: &Record) -> Result<(), SwitchboardError> {
        if self.closed.is_cancelled() {
            return Err(SwitchboardError::connection("connection closed"));
        }
        self.sent
            .send(record.clone())
            .map_err(|_| SwitchboardError::connection("server gone"))?;
        if self.stalled.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    async fn recv(&self) -> Option<Record> {
        let mut inbound = self.inbound.lock().await;
        tokio::select! {
            _ = self.closed.cancelled() => None,
            record = inbound.recv() => record,
        }
    }

    async fn close(&self) -> Result<(), SwitchboardError> {
        self.closed.cancel();
        Ok(())
    }
}

/// Test side of a scripted session.
pub struct MockServer {
    pub account: String,
    /// Nick the account dialed with.
    pub nick: String,
    sent: mpsc::UnboundedReceiver<Record>,
    inbound: mpsc::UnboundedSender<Record>,
    closed: CancellationToken,
    stalled: Arc<AtomicBool>,
}

impl MockServer {
    /// The next record the bridge sent.
    pub async fn read_record(&mut self) -> Record {
        tokio::time::timeout(WAIT, self.sent.recv())
            .await
            .unwrap_or_else(|_| panic!("[{}] timed out waiting for a line", self.account))
            .unwrap_or_else(|| panic!("[{}] connection dropped", self.account))
    }

    /// The next record the bridge sent, rendered as a protocol line.
    pub async fn read_line(&mut self) -> String {
        self.read_record().await.to_string()
    }

    /// Whether the bridge sends nothing within `wait`.
    pub async fn silent_for(&mut self, wait: Duration) -> bool {
        match tokio::time::timeout(wait, self.sent.recv()).await {
            Err(_) => true,
            Ok(None) => true,
            Ok(Some(_)) => false,
        }
    }

    /// Injects an inbound record.
    pub fn send(&self, record: Record) {
        let _ = self.inbound.send(record);
    }

    /// Echoes a `PING` line back as the matching `PONG`.
    pub fn pong(&self, ping_line: &str) {
        let text = ping_line
            .strip_prefix("PING :")
            .unwrap_or_else(|| panic!("not a PING line: {ping_line}"));
        self.send(Record::pong("", text));
    }

    /// Echoes the bot's own `JOIN` or `PART` of `channels`.
    pub fn echo(&self, command: &str, channels: &str) {
        self.send(Record {
            nick: self.nick.clone(),
            channel: channels.to_string(),
            ..Record::command("", command)
        });
    }

    /// Stops acknowledging writes: each later send still arrives here but
    /// never returns to the bridge.
    pub fn stall(&self) {
        self.stalled.store(true, Ordering::SeqCst);
    }

    /// Drops the session from the server side.
    pub fn close(&self) {
        self.closed.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dial_pairs_connection_with_server() {
        let dialer = MockDialer::new();
        let settings = AccountSettings {
            nick: "bot".into(),
            ..Default::default()
        };
        let conn = dialer.dial("one", &settings).await.unwrap();
        let mut server = dialer.next_server().await;
        assert_eq!(server.nick, "bot");

        conn.send(&Record::message("one", "#c", "", "hi")).await.unwrap();
        assert_eq!(server.read_line().await, "PRIVMSG #c :hi");

        server.send(Record::message("", "#c", "joe", "yo"));
        assert_eq!(conn.recv().await.unwrap().text, "yo");

        server.close();
        assert!(conn.recv().await.is_none());
        assert!(conn.send(&Record::ping("one", "x")).await.is_err());
    }

    #[tokio::test]
    async fn stalled_sends_arrive_but_never_return() {
        let dialer = MockDialer::new();
        let conn = dialer.dial("one", &AccountSettings::default()).await.unwrap();
        let mut server = dialer.next_server().await;
        server.stall();

        let record = Record::message("one", "#c", "", "stuck");
        let sent = tokio::time::timeout(Duration::from_millis(50), conn.send(&record)).await;
        assert!(sent.is_err());
        assert_eq!(server.read_line().await, "PRIVMSG #c :stuck");
    }

    #[tokio::test]
    async fn injected_failures_are_consumed() {
        let dialer = MockDialer::new();
        dialer.fail_next(2);
        let settings = AccountSettings::default();
        assert!(dialer.dial("one", &settings).await.is_err());
        assert!(dialer.dial("one", &settings).await.is_err());
        assert!(dialer.dial("one", &settings).await.is_ok());
        assert_eq!(dialer.dials(), 3);
    }
}
