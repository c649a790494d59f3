// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The named directory connections plugins may borrow.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use switchboard_core::StateStore;
use switchboard_ldap::{Config, Dialer, ManagedConn};
use tracing::{info, warn};

/// Lock-free view of the live connections, shared with plugin hosts.
pub(crate) type LdapSnapshot = Arc<ArcSwap<HashMap<String, Arc<ManagedConn>>>>;

struct Entry {
    raw: String,
    conn: Arc<ManagedConn>,
}

pub(crate) struct LdapTable {
    dialer: Arc<dyn Dialer>,
    backoff: Duration,
    entries: BTreeMap<String, Entry>,
    snapshot: LdapSnapshot,
}

impl LdapTable {
    pub(crate) fn new(dialer: Arc<dyn Dialer>, backoff: Duration) -> Self {
        Self {
            dialer,
            backoff,
            entries: BTreeMap::new(),
            snapshot: Arc::new(ArcSwap::from_pointee(HashMap::new())),
        }
    }

    pub(crate) fn snapshot(&self) -> LdapSnapshot {
        self.snapshot.clone()
    }

    /// Dials new rows, redials rows whose raw config changed, and closes
    /// connections whose row is gone.
    pub(crate) async fn refresh(&mut self, state: &dyn StateStore) {
        let rows = match state.list_ldap().await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(error = %e, "cannot fetch LDAP connection information");
                return;
            }
        };

        let mut changed = false;
        let mut seen = Vec::with_capacity(rows.len());
        for row in rows {
            let config = match Config::parse(&row.config) {
                Ok(config) => config,
                Err(e) => {
                    warn!(ldap = %row.name, error = %e, "invalid LDAP configuration");
                    continue;
                }
            };
            seen.push(row.name.clone());
            if let Some(entry) = self.entries.get(&row.name) {
                if entry.raw == row.config {
                    continue;
                }
                info!(ldap = %row.name, "LDAP connection changed, closing and restarting it");
                if let Some(old) = self.entries.remove(&row.name) {
                    close(&row.name, &old.conn).await;
                }
            } else {
                info!(ldap = %row.name, "LDAP connection starting");
            }
            let conn = ManagedConn::dial(&row.name, config, self.dialer.clone(), self.backoff);
            self.entries.insert(
                row.name,
                Entry {
                    raw: row.config,
                    conn: Arc::new(conn),
                },
            );
            changed = true;
        }

        let removed: Vec<String> = self
            .entries
            .keys()
            .filter(|name| !seen.contains(name))
            .cloned()
            .collect();
        for name in removed {
            if let Some(old) = self.entries.remove(&name) {
                info!(ldap = %name, "LDAP connection removed, closing it");
                close(&name, &old.conn).await;
                changed = true;
            }
        }

        if changed {
            self.publish();
        }
    }

    /// Empties the shared view. Plugins can no longer borrow connections.
    pub(crate) fn unpublish(&self) {
        self.snapshot.store(Arc::new(HashMap::new()));
    }

    /// Closes every connection concurrently.
    pub(crate) async fn close_all(&mut self) {
        self.unpublish();
        let entries = std::mem::take(&mut self.entries);
        futures::future::join_all(
            entries
                .iter()
                .map(|(name, entry)| close(name, &entry.conn)),
        )
        .await;
    }

    fn publish(&self) {
        let view = self
            .entries
            .iter()
            .map(|(name, entry)| (name.clone(), entry.conn.clone()))
            .collect();
        self.snapshot.store(Arc::new(view));
    }
}

async fn close(name: &str, conn: &ManagedConn) {
    if let Err(e) = conn.close().await {
        warn!(ldap = %name, error = %e, "LDAP connection closed with an error");
    }
}

#[cfg(test)]
mod tests {
    use switchboard_storage::queries::ldap::{delete_ldap, upsert_ldap};
    use switchboard_test_utils::{MockLdap, temp_storage};

    use super::*;

    #[tokio::test]
    async fn refresh_follows_the_table() {
        let (storage, _dir) = temp_storage().await;
        let db = storage.db().unwrap();
        let directory = MockLdap::new();
        let mut table = LdapTable::new(directory.clone(), Duration::from_millis(10));
        let view = table.snapshot();

        upsert_ldap(db, "corp", r#"{"url":"ldap://a"}"#).await.unwrap();
        upsert_ldap(db, "broken", r#"{"address":"x"}"#).await.unwrap();
        table.refresh(storage.as_ref()).await;
        let names: Vec<String> = view.load().keys().cloned().collect();
        assert_eq!(names, ["corp"]);
        let corp = view.load()["corp"].clone();
        assert!(corp.connected().await.is_some());

        // Unchanged rows keep their connection.
        table.refresh(storage.as_ref()).await;
        assert_eq!(directory.dials(), 1);

        upsert_ldap(db, "corp", r#"{"url":"ldap://b"}"#).await.unwrap();
        table.refresh(storage.as_ref()).await;
        assert_eq!(directory.closes(), 1);
        let corp = view.load()["corp"].clone();
        corp.connected().await;
        assert_eq!(directory.dials(), 2);

        delete_ldap(db, "corp").await.unwrap();
        table.refresh(storage.as_ref()).await;
        assert!(view.load().is_empty());
        assert_eq!(directory.closes(), 2);
    }

    #[tokio::test]
    async fn close_all_unpublishes_first() {
        let (storage, _dir) = temp_storage().await;
        let db = storage.db().unwrap();
        let directory = MockLdap::new();
        let mut table = LdapTable::new(directory.clone(), Duration::from_millis(10));
        upsert_ldap(db, "a", r#"{"url":"ldap://a"}"#).await.unwrap();
        upsert_ldap(db, "b", r#"{"url":"ldap://b"}"#).await.unwrap();
        table.refresh(storage.as_ref()).await;
        let conns: Vec<_> = table.snapshot().load().values().cloned().collect();
        for conn in conns {
            conn.connected().await;
        }

        table.close_all().await;
        assert!(table.snapshot().load().is_empty());
        assert_eq!(directory.closes(), 2);
    }
}
