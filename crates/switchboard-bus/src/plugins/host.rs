// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::Arc;

use async_trait::async_trait;
use switchboard_core::{LogName, Record, SwitchboardError};
use switchboard_ldap::Conn;
use switchboard_plugin::PluggerHost;
use tokio_util::sync::CancellationToken;

use super::ldap::LdapSnapshot;
use crate::Store;

/// Bridge services behind every plugger the plugin manager hands out.
///
/// Once the manager has shut down, every call fails with
/// [`SwitchboardError::Stopped`].
pub(crate) struct BusHost {
    store: Store,
    ldaps: LdapSnapshot,
    closed: CancellationToken,
}

impl BusHost {
    pub(crate) fn new(store: Store, ldaps: LdapSnapshot) -> Self {
        Self {
            store,
            ldaps,
            closed: CancellationToken::new(),
        }
    }

    pub(crate) fn close(&self) {
        self.closed.cancel();
    }

    fn check(&self) -> Result<(), SwitchboardError> {
        if self.closed.is_cancelled() {
            return Err(SwitchboardError::Stopped);
        }
        Ok(())
    }
}

#[async_trait]
impl PluggerHost for BusHost {
    async fn send(&self, record: Record) -> Result<(), SwitchboardError> {
        self.check()?;
        self.store.log.append(LogName::Outgoing, &record).await?;
        Ok(())
    }

    async fn handle(&self, record: Record) -> Result<(), SwitchboardError> {
        self.check()?;
        self.store.log.append(LogName::Incoming, &record).await?;
        Ok(())
    }

    fn ldap(&self, name: &str) -> Result<Arc<dyn Conn>, SwitchboardError> {
        self.check()?;
        self.ldaps
            .load()
            .get(name)
            .and_then(|managed| managed.conn())
            .ok_or_else(|| SwitchboardError::NotFound {
                kind: "LDAP connection".into(),
                name: name.into(),
            })
    }

    async fn archive(&self, plugin: &str, record: &Record) -> Result<(), SwitchboardError> {
        self.check()?;
        self.store.state.archive_record(plugin, record).await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use switchboard_storage::queries::message_log;
    use switchboard_test_utils::{MockLdap, temp_storage};

    use super::*;
    use crate::plugins::ldap::LdapTable;

    #[tokio::test]
    async fn calls_fail_once_closed() {
        let (storage, _dir) = temp_storage().await;
        let ldaps = LdapTable::new(MockLdap::new(), Duration::from_millis(10));
        let host = BusHost::new(Store::new(storage.clone()), ldaps.snapshot());
        let record = Record::message("one", "#c", "", "hi");

        host.send(record.clone()).await.unwrap();
        host.archive("log", &record).await.unwrap();
        assert!(matches!(
            host.ldap("corp"),
            Err(SwitchboardError::NotFound { .. })
        ));
        let db = storage.db().unwrap();
        assert_eq!(message_log::list(db, "log").await.unwrap().len(), 1);

        host.close();
        assert!(matches!(
            host.send(record.clone()).await,
            Err(SwitchboardError::Stopped)
        ));
        assert!(matches!(
            host.handle(record.clone()).await,
            Err(SwitchboardError::Stopped)
        ));
        assert!(matches!(host.ldap("corp"), Err(SwitchboardError::Stopped)));
    }
}
