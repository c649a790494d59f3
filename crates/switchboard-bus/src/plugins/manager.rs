// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The plugin manager task.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use futures::FutureExt;
use switchboard_config::model::BusConfig;
use switchboard_core::{LogName, PluginInfo, Record, RecordId, SwitchboardError, TailFilter, Targets};
use switchboard_plugin::{Commands, Plugger, PluggerHost, Plugin, PluginRegistry};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::dispatch::dispatch;
use super::host::BusHost;
use super::ldap::LdapTable;
use super::plugin_enabled;
use crate::Store;
use crate::rollback::{self, RollbackHandle};
use crate::supervisor::{Lifecycle, ManagerHandle, Reconciler, Request, Ticker};
use crate::tail::{TailOptions, Tailer};

pub(crate) struct RunningPlugin {
    pub(crate) info: PluginInfo,
    pub(crate) commands: Commands,
    pub(crate) plugger: Plugger,
    pub(crate) plugin: Box<dyn Plugin>,
}

pub(crate) struct PluginLifecycle {
    store: Store,
    registry: Arc<PluginRegistry>,
    host: Arc<BusHost>,
    filter: Option<Vec<String>>,
    rollback_limit: Duration,
}

#[async_trait]
impl Lifecycle for PluginLifecycle {
    type Descriptor = PluginInfo;
    type Instance = RunningPlugin;
    const KIND: &'static str = "plugin";

    async fn desired(&self) -> Result<Vec<PluginInfo>, SwitchboardError> {
        let mut plugins = self.store.state.list_plugins().await?;
        plugins.retain(|p| plugin_enabled(self.filter.as_deref(), &p.name));
        Ok(plugins)
    }

    fn name<'a>(&self, desc: &'a PluginInfo) -> &'a str {
        &desc.name
    }

    fn changed(&self, inst: &RunningPlugin, desc: &PluginInfo) -> bool {
        inst.info.changed(desc)
    }

    async fn start(&self, desc: &PluginInfo) -> Result<RunningPlugin, SwitchboardError> {
        let spec = self.registry.lookup(&desc.name)?;
        let targets: Targets = desc.parse_targets()?;
        let host: Arc<dyn PluggerHost> = self.host.clone();
        let plugger = Plugger::new(&desc.name, &desc.config, targets, host)?;

        let floor = self
            .store
            .log
            .last_id_before(LogName::Incoming, cutoff(self.rollback_limit))
            .await?;
        let plugin = panic::catch_unwind(AssertUnwindSafe(|| spec.factory.start(plugger.clone())))
            .map_err(|_| SwitchboardError::plugin("plugin panicked while starting"))??;

        let mut info = desc.clone();
        if info.last_id < floor {
            info.last_id = floor;
        }

        let commands = spec.commands.clone();
        if let Err(e) = self
            .store
            .state
            .set_plugin_commands(&desc.name, &commands.to_json())
            .await
        {
            warn!(plugin = %desc.name, error = %e, "cannot update commands schema");
        }

        Ok(RunningPlugin {
            info,
            commands,
            plugger,
            plugin,
        })
    }

    async fn stop(&self, name: &str, inst: RunningPlugin) {
        match AssertUnwindSafe(inst.plugin.stop()).catch_unwind().await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(plugin = %name, error = %e, "plugin stopped with an error"),
            Err(_) => error!(plugin = %name, "plugin panicked while stopping"),
        }
    }

    fn position(&self, inst: &RunningPlugin) -> Option<RecordId> {
        Some(inst.info.last_id)
    }
}

/// Oldest record time a newly started plugin is shown.
pub(crate) fn cutoff(limit: Duration) -> DateTime<Utc> {
    let limit = TimeDelta::from_std(limit).unwrap_or(TimeDelta::MAX);
    Utc::now()
        .checked_sub_signed(limit)
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

struct PluginLoop {
    config: BusConfig,
    store: Store,
    registry: Arc<PluginRegistry>,
    reconciler: Reconciler<PluginLifecycle>,
    ldaps: LdapTable,
    host: Arc<BusHost>,
    requests: mpsc::Receiver<Request>,
    cancel: CancellationToken,
}

/// Starts the plugin manager.
///
/// Plugins are started from the `plugins` table on the manager task, and
/// see incoming records from `rollback_limit` ago onwards. Fails when the
/// starting position cannot be read.
pub async fn start(
    config: &BusConfig,
    store: Store,
    registry: Arc<PluginRegistry>,
    ldap_dialer: Arc<dyn switchboard_ldap::Dialer>,
) -> Result<ManagerHandle, SwitchboardError> {
    info!("starting plugins");
    let enabled = !matches!(&config.plugins, Some(list) if list.is_empty());
    let position = if enabled {
        store
            .log
            .last_id_before(LogName::Incoming, cutoff(config.rollback_limit()))
            .await?
    } else {
        RecordId::ZERO
    };

    let ldaps = LdapTable::new(ldap_dialer, config.reconnect_backoff());
    let host = Arc::new(BusHost::new(store.clone(), ldaps.snapshot()));
    let lifecycle = PluginLifecycle {
        store: store.clone(),
        registry: registry.clone(),
        host: host.clone(),
        filter: config.plugins.clone(),
        rollback_limit: config.rollback_limit(),
    };

    let (tx, requests) = mpsc::channel(8);
    let cancel = CancellationToken::new();
    let manager = PluginLoop {
        config: config.clone(),
        store,
        registry,
        reconciler: Reconciler::new(lifecycle),
        ldaps,
        host,
        requests,
        cancel: cancel.clone(),
    };
    let task = tokio::spawn(async move {
        if enabled {
            manager.run(position).await;
        } else {
            manager.idle().await;
        }
    });
    Ok(ManagerHandle::new("plugin", tx, cancel, task))
}

impl PluginLoop {
    /// No plugins are enabled: answer refreshes until cancelled.
    async fn idle(mut self) {
        debug!("all plugins disabled");
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                Some(Request::Refresh(ack)) = self.requests.recv() => {
                    let _ = ack.send(());
                }
            }
        }
        self.host.close();
    }

    async fn run(mut self, position: RecordId) {
        self.update_known().await;

        let (rollback, rollback_rx) = rollback::channel();
        let tail_cancel = self.cancel.child_token();
        let options = TailOptions::new(LogName::Incoming, TailFilter::all())
            .idle_timeout(self.config.tail_idle_timeout())
            .backoff(self.config.tail_backoff());
        let (mut records, tail) =
            Tailer::new(self.store.log.clone(), options, position, tail_cancel.clone())
                .with_rollback(rollback_rx)
                .spawn(1);

        self.refresh(&rollback).await;
        let mut ticker = Ticker::new(self.config.refresh_interval());
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                Some(Request::Refresh(ack)) = self.requests.recv() => {
                    self.refresh(&rollback).await;
                    let _ = ack.send(());
                }
                _ = ticker.tick() => self.refresh(&rollback).await,
                Some(record) = records.recv() => {
                    dispatch(
                        self.reconciler.running_mut(),
                        self.store.state.as_ref(),
                        &record,
                    )
                    .await;
                }
            }
        }

        tail_cancel.cancel();
        drop(records);
        if let Err(e) = tail.await {
            warn!(error = %e, "incoming tail task failed");
        }
        self.die().await;
    }

    async fn die(&mut self) {
        self.ldaps.unpublish();
        let concurrency = self.config.shutdown_concurrency;
        tokio::join!(
            self.reconciler.shutdown(concurrency),
            self.ldaps.close_all()
        );
        self.host.close();
    }

    async fn refresh(&mut self, rollback: &RollbackHandle) {
        self.ldaps.refresh(self.store.state.as_ref()).await;
        let Some(report) = self.reconciler.reconcile().await else {
            return;
        };
        let Some(position) = report.rollback else {
            return;
        };

        if let Err(e) = self.store.log.append(LogName::Incoming, &Record::wake()).await {
            warn!(error = %e, "cannot append wake record");
            return;
        }
        tokio::select! {
            _ = self.cancel.cancelled() => {}
            applied = rollback.request(position) => match applied {
                Ok(true) => info!(%position, "rolled back incoming tail for restarted plugins"),
                Ok(false) => {}
                Err(e) => debug!(error = %e, "incoming tail gone before rollback"),
            },
        }
    }

    async fn update_known(&self) {
        for spec in self.registry.list_all() {
            if !plugin_enabled(self.config.plugins.as_deref(), &spec.name) {
                continue;
            }
            if let Err(e) = self
                .store
                .state
                .upsert_known_plugin(&spec.name, &spec.commands.to_json())
                .await
            {
                warn!(plugin = %spec.name, error = %e, "cannot update known plugin");
            }
        }
    }
}
