// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::Arc;

use async_trait::async_trait;
use switchboard_config::model::BusConfig;
use switchboard_core::{AccountInfo, ChatDialer, SwitchboardError};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::client::{AccountClient, ClientContext};
use crate::Store;
use crate::supervisor::{Lifecycle, ManagerHandle, Reconciler, Request, Ticker};

pub(crate) struct RunningAccount {
    info: AccountInfo,
    client: AccountClient,
}

pub(crate) struct AccountLifecycle {
    ctx: ClientContext,
}

#[async_trait]
impl Lifecycle for AccountLifecycle {
    type Descriptor = AccountInfo;
    type Instance = RunningAccount;
    const KIND: &'static str = "account";

    async fn desired(&self) -> Result<Vec<AccountInfo>, SwitchboardError> {
        self.ctx.store.state.list_accounts().await
    }

    fn name<'a>(&self, desc: &'a AccountInfo) -> &'a str {
        &desc.name
    }

    fn changed(&self, inst: &RunningAccount, desc: &AccountInfo) -> bool {
        inst.info.changed(desc)
    }

    fn alive(&self, inst: &RunningAccount) -> bool {
        inst.client.is_alive()
    }

    async fn start(&self, desc: &AccountInfo) -> Result<RunningAccount, SwitchboardError> {
        let settings = desc.parse_settings()?;
        Ok(RunningAccount {
            info: desc.clone(),
            client: AccountClient::start(desc, settings, self.ctx.clone()),
        })
    }

    /// Channels are reconciled on the live connection, every refresh.
    async fn update(&self, inst: &mut RunningAccount, desc: &AccountInfo) {
        inst.info.channels = desc.channels.clone();
        inst.client.set_channels(desc.channels.clone()).await;
    }

    async fn stop(&self, name: &str, inst: RunningAccount) {
        inst.client.stop(name).await;
    }
}

/// Starts the account manager: one client per row of the `accounts` table.
pub fn start(
    config: &BusConfig,
    store: Store,
    dialer: Arc<dyn ChatDialer>,
) -> ManagerHandle {
    info!("starting account manager");
    let lifecycle = AccountLifecycle {
        ctx: ClientContext {
            store,
            dialer,
            idle_timeout: config.tail_idle_timeout(),
            tail_backoff: config.tail_backoff(),
            reconnect_backoff: config.reconnect_backoff(),
            send_timeout: config.send_timeout(),
        },
    };
    let (tx, requests) = mpsc::channel(8);
    let cancel = CancellationToken::new();
    let task = tokio::spawn(run(
        Reconciler::new(lifecycle),
        requests,
        Ticker::new(config.refresh_interval()),
        config.shutdown_concurrency,
        cancel.clone(),
    ));
    ManagerHandle::new("account", tx, cancel, task)
}

async fn run(
    mut reconciler: Reconciler<AccountLifecycle>,
    mut requests: mpsc::Receiver<Request>,
    mut ticker: Ticker,
    concurrency: usize,
    cancel: CancellationToken,
) {
    reconciler.reconcile().await;
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            Some(Request::Refresh(ack)) = requests.recv() => {
                reconciler.reconcile().await;
                let _ = ack.send(());
            }
            _ = ticker.tick() => {
                reconciler.reconcile().await;
            }
        }
    }
    reconciler.shutdown(concurrency).await;
}
