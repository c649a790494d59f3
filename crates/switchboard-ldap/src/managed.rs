// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A directory connection that dials in the background and redials when the
//! session breaks.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use switchboard_core::SwitchboardError;
use tokio::sync::{Mutex, Notify, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{Config, Conn, Dialer, Search, SearchResult};

/// A self-healing connection to one directory server.
///
/// [`ManagedConn::conn`] returns `None` until the first dial succeeds and
/// while a broken session is being replaced.
pub struct ManagedConn {
    name: String,
    current: watch::Receiver<Option<Arc<dyn Conn>>>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ManagedConn {
    /// Starts dialing `config` in the background, retrying every `backoff`.
    pub fn dial(
        name: impl Into<String>,
        config: Config,
        dialer: Arc<dyn Dialer>,
        backoff: Duration,
    ) -> Self {
        let name = name.into();
        let (tx, current) = watch::channel(None);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run(
            name.clone(),
            config,
            dialer,
            backoff,
            tx,
            cancel.clone(),
        ));
        Self {
            name,
            current,
            cancel,
            task: Mutex::new(Some(task)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The live session, if connected.
    pub fn conn(&self) -> Option<Arc<dyn Conn>> {
        self.current.borrow().clone()
    }

    /// Waits until a session is available or the connection is closed.
    pub async fn connected(&self) -> Option<Arc<dyn Conn>> {
        let mut rx = self.current.clone();
        let result = rx.wait_for(|c| c.is_some()).await;
        result.ok().and_then(|c| c.clone())
    }

    /// Stops redialing and closes the live session. Closing twice is a no-op.
    pub async fn close(&self) -> Result<(), SwitchboardError> {
        self.cancel.cancel();
        let task = self.task.lock().await.take();
        if let Some(task) = task {
            task.await.map_err(|e| {
                SwitchboardError::Internal(format!("LDAP task {:?} failed: {e}", self.name))
            })?;
        }
        Ok(())
    }
}

async fn run(
    name: String,
    config: Config,
    dialer: Arc<dyn Dialer>,
    backoff: Duration,
    tx: watch::Sender<Option<Arc<dyn Conn>>>,
    cancel: CancellationToken,
) {
    let mut failures: u32 = 0;
    loop {
        let dialed = tokio::select! {
            _ = cancel.cancelled() => return,
            r = dialer.dial(&config) => r,
        };
        let inner = match dialed {
            Ok(conn) => conn,
            Err(e) => {
                failures += 1;
                let msg = config.redact(&e.to_string());
                if failures == 1 {
                    warn!(ldap = %name, error = %msg, "cannot connect to LDAP server");
                } else {
                    debug!(ldap = %name, error = %msg, failures, "LDAP dial retry failed");
                }
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = tokio::time::sleep(backoff) => continue,
                }
            }
        };
        failures = 0;

        let broken = Arc::new(Notify::new());
        let session: Arc<dyn Conn> = Arc::new(Session {
            inner: inner.clone(),
            broken: broken.clone(),
        });
        tx.send_replace(Some(session));
        info!(ldap = %name, address = %config.address(), "LDAP connection established");

        let stopping = tokio::select! {
            _ = cancel.cancelled() => true,
            _ = broken.notified() => false,
        };
        tx.send_replace(None);
        if let Err(e) = inner.close().await {
            debug!(ldap = %name, error = %e, "LDAP session close failed");
        }
        if stopping {
            debug!(ldap = %name, "LDAP connection closed");
            return;
        }
        warn!(ldap = %name, "LDAP session broken, redialing");
    }
}

/// Wraps a live session and reports connection failures to the dial loop.
struct Session {
    inner: Arc<dyn Conn>,
    broken: Arc<Notify>,
}

#[async_trait]
impl Conn for Session {
    async fn search(&self, search: &Search) -> Result<Vec<SearchResult>, SwitchboardError> {
        let result = self.inner.search(search).await;
        if let Err(SwitchboardError::Connection { .. }) = &result {
            self.broken.notify_one();
        }
        result
    }

    async fn close(&self) -> Result<(), SwitchboardError> {
        // Owned by the dial loop.
        Ok(())
    }
}
