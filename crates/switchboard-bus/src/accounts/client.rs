// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One chat account: a connection kept alive across failures.
//!
//! The client task dials, joins the desired channels, then runs a session
//! that interleaves three streams until the connection is lost:
//!
//! - inbound records, forwarded to the incoming log,
//! - outgoing records for the account, delivered with confirmation pings,
//! - channel updates from the account manager.
//!
//! Each session tails the outgoing log from the last confirmed record, so
//! anything sent but not confirmed by the previous session goes out again.
//!
//! Every write to the connection is bounded by the send timeout and gives
//! way to a stop request, so a wedged server can neither hold up shutdown
//! nor keep the client from redialing.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use switchboard_core::types::{CMD_JOIN, CMD_PART, CMD_PONG, CMD_QUIT};
use switchboard_core::{
    AccountInfo, AccountSettings, ChatConnection, ChatDialer, LogName, Record, RecordId,
    SwitchboardError, TailFilter,
};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::Store;
use crate::outbound::{deliver, parse_confirmation};
use crate::tail::{TailOptions, Tailer};

/// What every client of one manager shares.
#[derive(Clone)]
pub(crate) struct ClientContext {
    pub(crate) store: Store,
    pub(crate) dialer: Arc<dyn ChatDialer>,
    pub(crate) idle_timeout: Duration,
    pub(crate) tail_backoff: Duration,
    pub(crate) reconnect_backoff: Duration,
    pub(crate) send_timeout: Duration,
}

/// Upper bound on the farewell `QUIT` and close once stopped.
const QUIT_GRACE: Duration = Duration::from_secs(1);

enum Command {
    Channels(Vec<String>, oneshot::Sender<()>),
}

enum Outcome {
    Stop,
    Lost,
}

pub(crate) struct AccountClient {
    commands: mpsc::Sender<Command>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl AccountClient {
    pub(crate) fn start(info: &AccountInfo, settings: AccountSettings, ctx: ClientContext) -> Self {
        let (commands, rx) = mpsc::channel(4);
        let cancel = CancellationToken::new();
        let task = ClientTask {
            name: info.name.clone(),
            settings,
            ctx,
            desired: dedup(&info.channels),
            joined: BTreeSet::new(),
            confirmed: info.last_id,
            commands: rx,
            cancel: cancel.clone(),
        };
        Self {
            commands,
            cancel,
            task: tokio::spawn(task.run()),
        }
    }

    pub(crate) fn is_alive(&self) -> bool {
        !self.task.is_finished()
    }

    /// Updates the desired channels and waits until the client has sent the
    /// resulting `JOIN`/`PART`, if connected.
    pub(crate) async fn set_channels(&self, channels: Vec<String>) {
        let (ack, done) = oneshot::channel();
        if self
            .commands
            .send(Command::Channels(channels, ack))
            .await
            .is_ok()
        {
            let _ = done.await;
        }
    }

    /// Sends `QUIT` if connected and waits for the task to finish.
    pub(crate) async fn stop(self, account: &str) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!(%account, error = %e, "account client task failed");
        }
    }
}

struct ClientTask {
    name: String,
    settings: AccountSettings,
    ctx: ClientContext,
    desired: Vec<String>,
    joined: BTreeSet<String>,
    confirmed: RecordId,
    commands: mpsc::Receiver<Command>,
    cancel: CancellationToken,
}

impl ClientTask {
    async fn run(mut self) {
        let mut failures: u32 = 0;
        loop {
            let Some(dialed) = self.dial().await else {
                return;
            };
            let conn = match dialed {
                Ok(conn) => {
                    failures = 0;
                    conn
                }
                Err(e) => {
                    failures += 1;
                    if failures == 1 {
                        warn!(account = %self.name, error = %e, "cannot connect");
                    } else {
                        debug!(account = %self.name, error = %e, failures, "connect retry failed");
                    }
                    if !self.pause().await {
                        return;
                    }
                    continue;
                }
            };

            info!(account = %self.name, nick = %self.settings.nick, "connected");
            let outcome = self.session(conn.as_ref()).await;
            if let Outcome::Stop = outcome {
                let quit = Record {
                    text: "brb".into(),
                    ..Record::command(&self.name, CMD_QUIT)
                };
                match tokio::time::timeout(QUIT_GRACE, conn.send(&quit)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => debug!(account = %self.name, error = %e, "cannot send QUIT"),
                    Err(_) => debug!(account = %self.name, "QUIT timed out"),
                }
            }
            match tokio::time::timeout(QUIT_GRACE, conn.close()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => debug!(account = %self.name, error = %e, "connection close failed"),
                Err(_) => debug!(account = %self.name, "connection close timed out"),
            }
            match outcome {
                Outcome::Stop => {
                    info!(account = %self.name, "disconnected");
                    return;
                }
                Outcome::Lost => {
                    warn!(account = %self.name, "connection lost, reconnecting");
                    if !self.pause().await {
                        return;
                    }
                }
            }
        }
    }

    /// Dials while serving commands. `None` means cancelled.
    async fn dial(&mut self) -> Option<Result<Arc<dyn ChatConnection>, SwitchboardError>> {
        let dialer = self.ctx.dialer.clone();
        let name = self.name.clone();
        let settings = self.settings.clone();
        let dial = async move { dialer.dial(&name, &settings).await };
        tokio::pin!(dial);
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return None,
                Some(cmd) = self.commands.recv() => self.offline(cmd),
                dialed = &mut dial => return Some(dialed),
            }
        }
    }

    /// Sleeps the reconnect backoff while serving commands. Returns false if
    /// cancelled.
    async fn pause(&mut self) -> bool {
        let sleep = tokio::time::sleep(self.ctx.reconnect_backoff);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return false,
                Some(cmd) = self.commands.recv() => self.offline(cmd),
                _ = &mut sleep => return true,
            }
        }
    }

    fn offline(&mut self, cmd: Command) {
        match cmd {
            Command::Channels(channels, ack) => {
                self.desired = dedup(&channels);
                let _ = ack.send(());
            }
        }
    }

    async fn session(&mut self, conn: &dyn ChatConnection) -> Outcome {
        self.joined.clear();
        match self.write(self.sync_channels(conn)).await {
            None => return Outcome::Stop,
            Some(Err(e)) => {
                warn!(account = %self.name, error = %e, "cannot join channels");
                return Outcome::Lost;
            }
            Some(Ok(())) => {}
        }

        let tail_cancel = self.cancel.child_token();
        let options = TailOptions::new(LogName::Outgoing, TailFilter::account(&self.name))
            .idle_timeout(self.ctx.idle_timeout)
            .backoff(self.ctx.tail_backoff);
        let (mut outgoing, tail) = Tailer::new(
            self.ctx.store.log.clone(),
            options,
            self.confirmed,
            tail_cancel.clone(),
        )
        .spawn(1);

        let outcome = loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break Outcome::Stop,
                inbound = conn.recv() => match inbound {
                    Some(record) => self.inbound(record).await,
                    None => break Outcome::Lost,
                },
                Some(cmd) = self.commands.recv() => match cmd {
                    Command::Channels(channels, ack) => {
                        self.desired = dedup(&channels);
                        let synced = self.write(self.sync_channels(conn)).await;
                        let _ = ack.send(());
                        match synced {
                            None => break Outcome::Stop,
                            Some(Err(e)) => {
                                warn!(account = %self.name, error = %e, "cannot update channels");
                                break Outcome::Lost;
                            }
                            Some(Ok(())) => {}
                        }
                    }
                },
                Some(record) = outgoing.recv() => {
                    let log = self.ctx.store.log.as_ref();
                    match self.write(deliver(conn, log, &record)).await {
                        None => break Outcome::Stop,
                        Some(Err(e)) => {
                            warn!(account = %self.name, id = %record.id, error = %e, "cannot deliver record");
                            break Outcome::Lost;
                        }
                        Some(Ok(())) => {}
                    }
                }
            }
        };

        tail_cancel.cancel();
        drop(outgoing);
        if let Err(e) = tail.await {
            warn!(account = %self.name, error = %e, "outgoing tail task failed");
        }
        outcome
    }

    /// Runs a write to the connection. `None` means the client was stopped
    /// first; a write outlasting the send timeout fails with `Timeout`.
    async fn write<T>(
        &self,
        op: impl Future<Output = Result<T, SwitchboardError>>,
    ) -> Option<Result<T, SwitchboardError>> {
        let duration = self.ctx.send_timeout;
        let bounded = tokio::time::timeout(duration, op);
        self.cancel
            .run_until_cancelled(bounded)
            .await
            .map(|written| written.unwrap_or(Err(SwitchboardError::Timeout { duration })))
    }

    /// Joins desired channels not yet joined, then parts joined channels no
    /// longer desired. The joined set only changes on the server's echo.
    async fn sync_channels(&self, conn: &dyn ChatConnection) -> Result<(), SwitchboardError> {
        let missing: Vec<String> = self
            .desired
            .iter()
            .filter(|c| !self.joined.contains(*c))
            .cloned()
            .collect();
        let extra: Vec<String> = self
            .joined
            .iter()
            .filter(|c| !self.desired.contains(c))
            .cloned()
            .collect();
        if !missing.is_empty() {
            conn.send(&Record::join(&self.name, &missing)).await?;
        }
        if !extra.is_empty() {
            conn.send(&Record::part(&self.name, &extra)).await?;
        }
        Ok(())
    }

    async fn inbound(&mut self, mut record: Record) {
        record.account = self.name.clone();

        if record.command == CMD_PONG {
            if let Some(id) = parse_confirmation(&record) {
                self.confirm(id).await;
            }
            return;
        }

        if record.nick == self.settings.nick {
            let channels = record.channel.split(',').filter(|c| !c.is_empty());
            match record.command.as_str() {
                CMD_JOIN => self.joined.extend(channels.map(str::to_string)),
                CMD_PART => {
                    for channel in channels {
                        self.joined.remove(channel);
                    }
                }
                _ => {}
            }
        }

        if let Err(e) = self
            .ctx
            .store
            .log
            .append(LogName::Incoming, &record)
            .await
        {
            warn!(account = %self.name, error = %e, "cannot append incoming record");
        }
    }

    async fn confirm(&mut self, id: RecordId) {
        if id <= self.confirmed {
            return;
        }
        if let Err(e) = self.ctx.store.state.set_account_last_id(&self.name, id).await {
            warn!(account = %self.name, error = %e, "cannot update last sent record id");
        }
        self.confirmed = id;
    }
}

fn dedup(channels: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(channels.len());
    for channel in channels {
        if !channel.is_empty() && !out.contains(channel) {
            out.push(channel.clone());
        }
    }
    out
}
