// SPDX-FileCopyrightText: 2026 mqlens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the [`ProfileStore`] trait.
//!
//! Profiles are stored one row each, ordered by `position`. The connection
//! parameters are kept as their tagged JSON form so new provider fields need
//! no schema change.

use std::collections::HashSet;

use async_trait::async_trait;
use mqlens_core::{ConnectionParams, ConnectionProfile, MqError, ProfileStore};
use rusqlite::params;
use tracing::debug;

use crate::database::{Database, map_tr_err};

/// Profile collection persisted in the `connection_profiles` table.
#[derive(Clone)]
pub struct SqliteProfileStore {
    db: Database,
}

impl SqliteProfileStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

/// Row shape shuttled across the tokio-rusqlite thread boundary.
struct ProfileRow {
    id: String,
    name: String,
    provider_type: String,
    params: String,
}

#[async_trait]
impl ProfileStore for SqliteProfileStore {
    async fn load_profiles(&self) -> Result<Vec<ConnectionProfile>, MqError> {
        let rows = self
            .db
            .connection()
            .call(|conn| -> Result<Vec<ProfileRow>, rusqlite::Error> {
                let mut stmt = conn.prepare(
                    "SELECT id, name, provider_type, params
                     FROM connection_profiles ORDER BY position",
                )?;
                let rows = stmt.query_map([], |row| {
                    Ok(ProfileRow {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        provider_type: row.get(2)?,
                        params: row.get(3)?,
                    })
                })?;
                rows.collect()
            })
            .await
            .map_err(map_tr_err)?;

        rows.into_iter()
            .map(|row| {
                let params: ConnectionParams =
                    serde_json::from_str(&row.params).map_err(|e| MqError::Storage {
                        source: format!(
                            "profile `{}` ({}) has unreadable parameters: {e}",
                            row.id, row.provider_type
                        )
                        .into(),
                    })?;
                Ok(ConnectionProfile {
                    id: row.id,
                    name: row.name,
                    params,
                })
            })
            .collect()
    }

    async fn save_profiles(&self, profiles: &[ConnectionProfile]) -> Result<(), MqError> {
        let mut seen = HashSet::new();
        let mut rows = Vec::with_capacity(profiles.len());
        for profile in profiles {
            if profile.id.trim().is_empty() {
                return Err(MqError::InvalidProfile(format!(
                    "profile `{}` has no id",
                    profile.name
                )));
            }
            if profile.params.has_secrets() {
                return Err(MqError::InvalidProfile(format!(
                    "profile `{}` still carries secret fields",
                    profile.id
                )));
            }
            if !seen.insert(profile.id.as_str()) {
                return Err(MqError::InvalidProfile(format!(
                    "duplicate profile id `{}`",
                    profile.id
                )));
            }
            let params = serde_json::to_string(&profile.params)
                .map_err(|e| MqError::Internal(format!("serialize profile: {e}")))?;
            rows.push(ProfileRow {
                id: profile.id.clone(),
                name: profile.name.clone(),
                provider_type: profile.provider_type().to_string(),
                params,
            });
        }

        let count = rows.len();
        let now = chrono::Utc::now().to_rfc3339();
        self.db
            .connection()
            .call(move |conn| -> Result<(), rusqlite::Error> {
                let tx = conn.transaction()?;
                tx.execute("DELETE FROM connection_profiles", [])?;
                {
                    let mut stmt = tx.prepare(
                        "INSERT INTO connection_profiles
                         (id, position, name, provider_type, params, updated_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    )?;
                    for (position, row) in rows.iter().enumerate() {
                        stmt.execute(params![
                            row.id,
                            position as i64,
                            row.name,
                            row.provider_type,
                            row.params,
                            now,
                        ])?;
                    }
                }
                tx.commit()
            })
            .await
            .map_err(map_tr_err)?;

        debug!(count, "profiles saved");
        Ok(())
    }
}
