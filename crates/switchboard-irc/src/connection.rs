// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use irc::client::prelude::{Client, Command, Config, Response};
use irc::client::{ClientStream, Sender};
use switchboard_core::{AccountSettings, ChatConnection, ChatDialer, Record, SwitchboardError};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::wire;

const DEFAULT_PORT: u16 = 6667;
const DEFAULT_TLS_PORT: u16 = 6697;

/// How long registration may take before the dial fails.
const REGISTER_TIMEOUT: Duration = Duration::from_secs(30);
/// How long `close` lets the stream flush queued lines, such as `QUIT`.
const CLOSE_GRACE: Duration = Duration::from_millis(500);
/// Inbound records buffered ahead of the bus.
const INBOUND_CAPACITY: usize = 64;

/// Splits `host[:port]` into host and port, defaulting the port by `tls`.
fn server_address(host: &str, tls: bool) -> Result<(String, u16), SwitchboardError> {
    let default_port = if tls { DEFAULT_TLS_PORT } else { DEFAULT_PORT };
    match host.rsplit_once(':') {
        Some((name, port)) if !name.is_empty() => port
            .parse()
            .map(|port| (name.to_string(), port))
            .map_err(|_| SwitchboardError::Config(format!("invalid port in host {host:?}"))),
        Some(_) => Err(SwitchboardError::Config(format!("invalid host {host:?}"))),
        None if host.is_empty() => Err(SwitchboardError::Config("account has no host".into())),
        None => Ok((host.to_string(), default_port)),
    }
}

fn client_config(settings: &AccountSettings) -> Result<Config, SwitchboardError> {
    let (server, port) = server_address(&settings.host, settings.tls)?;
    Ok(Config {
        nickname: Some(settings.nick.clone()),
        username: Some(settings.nick.clone()),
        realname: Some(settings.nick.clone()),
        server: Some(server),
        port: Some(port),
        password: settings.password.clone(),
        use_tls: Some(settings.tls),
        ..Config::default()
    })
}

/// Dials IRC servers for accounts.
#[derive(Debug, Default, Clone, Copy)]
pub struct IrcDialer;

#[async_trait]
impl ChatDialer for IrcDialer {
    async fn dial(
        &self,
        account: &str,
        settings: &AccountSettings,
    ) -> Result<Arc<dyn ChatConnection>, SwitchboardError> {
        let config = client_config(settings)?;
        let mut client = Client::from_config(config)
            .await
            .map_err(|e| SwitchboardError::connection(format!("{account}: {e}")))?;
        client
            .identify()
            .map_err(|e| SwitchboardError::connection(format!("{account}: {e}")))?;
        let mut stream = client
            .stream()
            .map_err(|e| SwitchboardError::connection(format!("{account}: {e}")))?;

        match tokio::time::timeout(REGISTER_TIMEOUT, registered(&mut stream)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(SwitchboardError::connection(format!("{account}: {e}"))),
            Err(_) => {
                return Err(SwitchboardError::Timeout {
                    duration: REGISTER_TIMEOUT,
                });
            }
        }
        debug!(%account, nick = %client.current_nickname(), "registered");

        let bang = settings.bang.clone().unwrap_or_default();
        Ok(Arc::new(IrcConnection::spawn(
            account.to_string(),
            client,
            stream,
            bang,
        )))
    }
}

/// Reads until the server welcomes us.
async fn registered(stream: &mut ClientStream) -> Result<(), String> {
    while let Some(msg) = stream.next().await {
        let msg = msg.map_err(|e| e.to_string())?;
        match &msg.command {
            Command::Response(Response::RPL_WELCOME, _) => return Ok(()),
            Command::ERROR(reason) => return Err(reason.clone()),
            _ => trace!("before registration: {msg}"),
        }
    }
    Err("connection closed during registration".into())
}

/// A registered IRC session.
///
/// A reader task drives the client's stream, which also flushes lines
/// queued by [`send`](ChatConnection::send), and converts what it reads to
/// records.
pub struct IrcConnection {
    sender: Sender,
    inbound: Mutex<mpsc::Receiver<Record>>,
    cancel: CancellationToken,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl IrcConnection {
    fn spawn(account: String, client: Client, stream: ClientStream, bang: String) -> Self {
        let (tx, rx) = mpsc::channel(INBOUND_CAPACITY);
        let cancel = CancellationToken::new();
        let sender = client.sender();
        let reader = tokio::spawn(read(account, client, stream, bang, tx, cancel.clone()));
        Self {
            sender,
            inbound: Mutex::new(rx),
            cancel,
            reader: Mutex::new(Some(reader)),
        }
    }
}

async fn read(
    account: String,
    client: Client,
    mut stream: ClientStream,
    bang: String,
    tx: mpsc::Sender<Record>,
    cancel: CancellationToken,
) {
    loop {
        let msg = tokio::select! {
            _ = cancel.cancelled() => return,
            msg = stream.next() => msg,
        };
        let msg = match msg {
            Some(Ok(msg)) => msg,
            Some(Err(e)) => {
                warn!(%account, error = %e, "irc stream failed");
                return;
            }
            None => {
                debug!(%account, "irc stream closed");
                return;
            }
        };
        let Some(record) = wire::inbound(&msg, client.current_nickname(), &bang) else {
            continue;
        };
        tokio::select! {
            _ = cancel.cancelled() => return,
            sent = tx.send(record) => if sent.is_err() {
                return;
            },
        }
    }
}

#[async_trait]
impl ChatConnection for IrcConnection {
    async fn send(&self, record: &Record) -> Result<(), SwitchboardError> {
        if self.cancel.is_cancelled() {
            return Err(SwitchboardError::connection("connection closed"));
        }
        trace!(account = %record.account, "sending {record}");
        self.sender
            .send(wire::outbound(record))
            .map_err(|e| SwitchboardError::connection(e.to_string()))
    }

    async fn recv(&self) -> Option<Record> {
        self.inbound.lock().await.recv().await
    }

    async fn close(&self) -> Result<(), SwitchboardError> {
        let Some(mut reader) = self.reader.lock().await.take() else {
            return Ok(());
        };
        if tokio::time::timeout(CLOSE_GRACE, &mut reader).await.is_ok() {
            self.cancel.cancel();
            return Ok(());
        }
        self.cancel.cancel();
        reader
            .await
            .map_err(|e| SwitchboardError::connection(format!("irc reader failed: {e}")))
    }
}
