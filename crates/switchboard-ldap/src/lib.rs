// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Directory service (LDAP) connections for plugins.
//!
//! The bridge does not speak the LDAP wire protocol itself. A [`Dialer`]
//! supplied by the embedding binary opens [`Conn`] sessions; the plugin
//! manager keeps one [`ManagedConn`] per row of the `ldap` table and hands
//! the live session to plugins on request.

pub mod escape;
pub mod managed;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use switchboard_core::SwitchboardError;

pub use escape::escape_filter;
pub use managed::ManagedConn;

/// Connection settings for one directory server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// `ldap://host:port`, `ldaps://host:port`, or a bare `host:port`.
    pub url: String,
    #[serde(default)]
    pub base_dn: String,
    #[serde(default)]
    pub bind_dn: String,
    #[serde(default)]
    pub bind_pass: String,
}

impl Config {
    /// Parses a raw JSON configuration blob from the `ldap` table.
    pub fn parse(raw: &str) -> Result<Self, SwitchboardError> {
        serde_json::from_str(raw)
            .map_err(|e| SwitchboardError::Config(format!("invalid LDAP config: {e}")))
    }

    /// Whether the server should be reached over TLS.
    pub fn uses_tls(&self) -> bool {
        self.url.starts_with("ldaps://")
    }

    /// The `host:port` part of the URL.
    pub fn address(&self) -> &str {
        self.url
            .strip_prefix("ldaps://")
            .or_else(|| self.url.strip_prefix("ldap://"))
            .unwrap_or(&self.url)
    }

    /// Replaces every occurrence of the bind password in `message`.
    pub fn redact(&self, message: &str) -> String {
        if self.bind_pass.is_empty() {
            return message.to_string();
        }
        message.replace(&self.bind_pass, "********")
    }
}

/// A subtree search under the connection's base DN.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Search {
    pub filter: String,
    pub attrs: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attr {
    pub name: String,
    pub values: Vec<String>,
}

/// One entry returned by a search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchResult {
    pub dn: String,
    pub attrs: Vec<Attr>,
}

impl SearchResult {
    /// All values of attribute `name`, or an empty slice.
    pub fn values(&self, name: &str) -> &[String] {
        self.attrs
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.values.as_slice())
            .unwrap_or(&[])
    }

    /// The first value of attribute `name`, or `""`.
    pub fn value(&self, name: &str) -> &str {
        self.values(name).first().map(String::as_str).unwrap_or("")
    }
}

/// An open, bound session with a directory server.
#[async_trait]
pub trait Conn: Send + Sync {
    async fn search(&self, search: &Search) -> Result<Vec<SearchResult>, SwitchboardError>;

    async fn close(&self) -> Result<(), SwitchboardError>;
}

/// Opens and binds sessions.
#[async_trait]
pub trait Dialer: Send + Sync {
    async fn dial(&self, config: &Config) -> Result<Arc<dyn Conn>, SwitchboardError>;
}

/// Dialer for builds without a directory client; every dial fails.
pub struct NoDialer;

#[async_trait]
impl Dialer for NoDialer {
    async fn dial(&self, config: &Config) -> Result<Arc<dyn Conn>, SwitchboardError> {
        Err(SwitchboardError::connection(format!(
            "no LDAP client available for {}",
            config.address()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_address_strips_scheme() {
        let mut config = Config {
            url: "ldaps://ldap.example.com:636".into(),
            ..Default::default()
        };
        assert!(config.uses_tls());
        assert_eq!(config.address(), "ldap.example.com:636");

        config.url = "ldap://ldap.example.com".into();
        assert!(!config.uses_tls());
        assert_eq!(config.address(), "ldap.example.com");

        config.url = "ldap.example.com:389".into();
        assert_eq!(config.address(), "ldap.example.com:389");
    }

    #[test]
    fn config_parse_rejects_unknown_keys() {
        let config = Config::parse(r#"{"url":"ldap://h","base_dn":"dc=x"}"#).unwrap();
        assert_eq!(config.base_dn, "dc=x");
        assert!(Config::parse(r#"{"url":"ldap://h","basedn":"dc=x"}"#).is_err());
    }

    #[test]
    fn redact_hides_password() {
        let config = Config {
            url: "ldap://h".into(),
            bind_pass: "s3cret".into(),
            ..Default::default()
        };
        assert_eq!(
            config.redact("bind failed for s3cret: bad s3cret"),
            "bind failed for ********: bad ********"
        );
    }

    #[test]
    fn result_values_lookup() {
        let result = SearchResult {
            dn: "uid=joe".into(),
            attrs: vec![Attr {
                name: "mail".into(),
                values: vec!["joe@example.com".into(), "j@example.com".into()],
            }],
        };
        assert_eq!(result.value("mail"), "joe@example.com");
        assert_eq!(result.values("mail").len(), 2);
        assert_eq!(result.value("cn"), "");
        assert!(result.values("cn").is_empty());
    }

    #[tokio::test]
    async fn no_dialer_always_fails() {
        let config = Config {
            url: "ldap://h:389".into(),
            ..Default::default()
        };
        let err = NoDialer.dial(&config).await.err().unwrap();
        assert!(err.to_string().contains("h:389"));
    }
}
