// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory directory server.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use switchboard_core::SwitchboardError;
use switchboard_ldap::{Config, Conn, Dialer, Search, SearchResult};

/// Answers every search with one entry whose DN is the dialed URL.
#[derive(Default)]
pub struct MockLdap {
    dials: AtomicUsize,
    closes: Arc<AtomicUsize>,
}

impl MockLdap {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn dials(&self) -> usize {
        self.dials.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Dialer for MockLdap {
    async fn dial(&self, config: &Config) -> Result<Arc<dyn Conn>, SwitchboardError> {
        self.dials.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MockLdapConn {
            url: config.url.clone(),
            closes: self.closes.clone(),
        }))
    }
}

struct MockLdapConn {
    url: String,
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl Conn for MockLdapConn {
    async fn search(&self, _search: &Search) -> Result<Vec<SearchResult>, SwitchboardError> {
        Ok(vec![SearchResult {
            dn: self.url.clone(),
            attrs: vec![],
        }])
    }

    async fn close(&self) -> Result<(), SwitchboardError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
