// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::Arc;

use switchboard_config::model::BusConfig;
use switchboard_core::{ChatDialer, SwitchboardError};
use switchboard_plugin::PluginRegistry;
use tracing::info;

use crate::supervisor::ManagerHandle;
use crate::{Store, accounts, plugins};

/// The running bridge: an account manager and a plugin manager over one
/// store.
pub struct Bridge {
    accounts: ManagerHandle,
    plugins: ManagerHandle,
}

impl Bridge {
    /// Starts both managers. If the plugin manager cannot start, the
    /// account manager is stopped again and the error returned.
    pub async fn start(
        config: &BusConfig,
        store: Store,
        registry: Arc<PluginRegistry>,
        dialer: Arc<dyn ChatDialer>,
        ldap_dialer: Arc<dyn switchboard_ldap::Dialer>,
    ) -> Result<Self, SwitchboardError> {
        info!("starting bridge");
        let accounts = accounts::start(config, store.clone(), dialer);
        let plugins = match plugins::start(config, store, registry, ldap_dialer).await {
            Ok(plugins) => plugins,
            Err(e) => {
                accounts.stop().await;
                return Err(e);
            }
        };
        Ok(Self { accounts, plugins })
    }

    /// Reloads the `accounts` table now.
    pub async fn refresh_accounts(&self) -> Result<(), SwitchboardError> {
        self.accounts.refresh().await
    }

    /// Reloads the `plugins` and `ldap` tables now.
    pub async fn refresh_plugins(&self) -> Result<(), SwitchboardError> {
        self.plugins.refresh().await
    }

    /// Stops both managers and everything they run. Stopping twice is a
    /// no-op.
    pub async fn stop(&self) {
        tokio::join!(self.plugins.stop(), self.accounts.stop());
        info!("bridge stopped");
    }
}
