// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Directory service connection rows.

use rusqlite::params;
use switchboard_core::{LdapInfo, SwitchboardError};

use crate::database::{Database, map_tr_err};

pub async fn list_ldap(db: &Database) -> Result<Vec<LdapInfo>, SwitchboardError> {
    db.connection()
        .call(|conn| -> Result<Vec<LdapInfo>, rusqlite::Error> {
            let mut stmt = conn.prepare("SELECT name, config FROM ldap ORDER BY name ASC")?;
            let rows = stmt.query_map([], |row| {
                Ok(LdapInfo {
                    name: row.get(0)?,
                    config: row.get(1)?,
                })
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn upsert_ldap(db: &Database, name: &str, config: &str) -> Result<(), SwitchboardError> {
    let name = name.to_string();
    let config = config.to_string();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO ldap (name, config) VALUES (?1, ?2)
                 ON CONFLICT(name) DO UPDATE SET config = excluded.config",
                params![name, config],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn delete_ldap(db: &Database, name: &str) -> Result<(), SwitchboardError> {
    let name = name.to_string();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute("DELETE FROM ldap WHERE name = ?1", params![name])?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}
