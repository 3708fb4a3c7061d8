// SPDX-FileCopyrightText: 2026 mqlens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The profile book: the ordered profile collection with its secrets kept
//! apart.
//!
//! Secrets are split off into the [`SecretStore`] on save and rehydrated on
//! demand, so the [`ProfileStore`] only ever sees stripped profiles.

use std::sync::Arc;

use mqlens_core::{ConnectionProfile, MqError, ProfileStore, SecretField, SecretStore};
use secrecy::ExposeSecret;
use serde::Serialize;
use serde_json::Value;
use strum::IntoEnumIterator;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Outcome of [`ProfileBook::import`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    /// Ids of the profiles saved, in input order.
    pub imported: Vec<String>,
    pub skipped: Vec<SkippedRecord>,
}

/// An input record that was not imported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedRecord {
    /// Position in the input array.
    pub index: usize,
    pub reason: String,
}

pub struct ProfileBook {
    store: Arc<dyn ProfileStore>,
    secrets: Arc<dyn SecretStore>,
    // Serializes read-modify-write cycles over the whole collection.
    edit: Mutex<()>,
}

impl ProfileBook {
    pub fn new(store: Arc<dyn ProfileStore>, secrets: Arc<dyn SecretStore>) -> Self {
        Self {
            store,
            secrets,
            edit: Mutex::new(()),
        }
    }

    /// Stripped profiles in stored order.
    pub async fn list(&self) -> Result<Vec<ConnectionProfile>, MqError> {
        self.store.load_profiles().await
    }

    /// One stripped profile.
    pub async fn get(&self, profile_id: &str) -> Result<ConnectionProfile, MqError> {
        self.list()
            .await?
            .into_iter()
            .find(|p| p.id == profile_id)
            .ok_or_else(|| MqError::ProfileNotFound(profile_id.to_string()))
    }

    /// One profile with its secrets filled back in, ready to connect with.
    pub async fn get_hydrated(&self, profile_id: &str) -> Result<ConnectionProfile, MqError> {
        let mut profile = self.get(profile_id).await?;
        self.hydrate(&mut profile).await?;
        Ok(profile)
    }

    /// Saves `profile`, assigning an id if it has none, and returns the
    /// stripped profile as persisted.
    ///
    /// Secrets are written before the collection is touched, so a secret
    /// store failure leaves nothing persisted. A secret field left empty keeps
    /// whatever was stored for it before.
    pub async fn save(&self, mut profile: ConnectionProfile) -> Result<ConnectionProfile, MqError> {
        let _edit = self.edit.lock().await;
        self.save_locked(&mut profile).await?;
        Ok(profile)
    }

    async fn save_locked(&self, profile: &mut ConnectionProfile) -> Result<(), MqError> {
        if profile.name.trim().is_empty() {
            return Err(MqError::InvalidProfile("profile name is empty".into()));
        }
        let assigned = profile.ensure_id();
        for (field, value) in profile.params.take_secrets() {
            self.secrets
                .store(&field.key_for(&profile.id), &value)
                .await?;
        }

        let mut profiles = self.store.load_profiles().await?;
        match profiles.iter_mut().find(|p| p.id == profile.id) {
            Some(existing) => *existing = profile.clone(),
            None => profiles.push(profile.clone()),
        }
        self.store.save_profiles(&profiles).await?;
        info!(
            profile_id = %profile.id,
            provider = %profile.provider_type(),
            new = assigned,
            "profile saved"
        );
        Ok(())
    }

    /// Removes a profile and every secret stored for it. Returns the
    /// removed profile.
    pub async fn remove(&self, profile_id: &str) -> Result<ConnectionProfile, MqError> {
        let _edit = self.edit.lock().await;
        let mut profiles = self.store.load_profiles().await?;
        let position = profiles
            .iter()
            .position(|p| p.id == profile_id)
            .ok_or_else(|| MqError::ProfileNotFound(profile_id.to_string()))?;

        for field in SecretField::iter() {
            self.secrets.delete(&field.key_for(profile_id)).await?;
        }
        let removed = profiles.remove(position);
        self.store.save_profiles(&profiles).await?;
        info!(profile_id, "profile deleted");
        Ok(removed)
    }

    /// Deep copy of every profile, with secrets rehydrated when asked.
    pub async fn export(&self, include_secrets: bool) -> Result<Vec<ConnectionProfile>, MqError> {
        let mut profiles = self.list().await?;
        if include_secrets {
            for profile in &mut profiles {
                self.hydrate(profile).await?;
            }
        }
        Ok(profiles)
    }

    /// Imports a JSON array of profiles.
    ///
    /// Records without `name` or `providerType`, or that fail to decode, are
    /// skipped and reported. The rest go through [`ProfileBook::save`].
    pub async fn import(&self, json: &str) -> Result<ImportReport, MqError> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| MqError::InvalidProfile(format!("import is not valid JSON: {e}")))?;
        let Value::Array(records) = value else {
            return Err(MqError::InvalidProfile(
                "import must be a JSON array of profiles".into(),
            ));
        };

        let mut report = ImportReport::default();
        let _edit = self.edit.lock().await;
        for (index, record) in records.into_iter().enumerate() {
            let mut profile = match decode_record(record) {
                Ok(profile) => profile,
                Err(reason) => {
                    warn!(index, reason = %reason, "skipping import record");
                    report.skipped.push(SkippedRecord { index, reason });
                    continue;
                }
            };
            self.save_locked(&mut profile).await?;
            report.imported.push(profile.id);
        }
        debug!(
            imported = report.imported.len(),
            skipped = report.skipped.len(),
            "import finished"
        );
        Ok(report)
    }

    async fn hydrate(&self, profile: &mut ConnectionProfile) -> Result<(), MqError> {
        for &field in profile.params.secret_fields() {
            let Some(secret) = self.secrets.get(&field.key_for(&profile.id)).await? else {
                continue;
            };
            if let Some(slot) = profile.params.secret_slot_mut(field) {
                *slot = Some(secret.expose_secret().to_string());
            }
        }
        Ok(())
    }
}

fn decode_record(record: Value) -> Result<ConnectionProfile, String> {
    let Value::Object(fields) = &record else {
        return Err("record is not an object".into());
    };
    match fields.get("name") {
        Some(Value::String(name)) if name.trim().is_empty() => return Err("name is empty".into()),
        Some(Value::String(_)) => {}
        _ => return Err("missing name".into()),
    }
    if !fields.contains_key("providerType") {
        return Err("missing providerType".into());
    }
    serde_json::from_value(record).map_err(|e| format!("invalid profile: {e}"))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn records_need_name_and_provider() {
        assert_eq!(
            decode_record(json!({"providerType": "kafka"})).unwrap_err(),
            "missing name"
        );
        assert_eq!(
            decode_record(json!({"name": "k"})).unwrap_err(),
            "missing providerType"
        );
        assert!(decode_record(json!(3)).is_err());
    }

    #[test]
    fn blank_names_are_rejected() {
        let reason = decode_record(json!({
            "name": "  ",
            "providerType": "rabbitmq",
            "connectionParams": {"host": "h"}
        }))
        .unwrap_err();
        assert_eq!(reason, "name is empty");
    }

    #[test]
    fn unknown_fields_are_tolerated() {
        let profile = decode_record(json!({
            "name": "events",
            "providerType": "kafka",
            "connectionParams": {"brokers": ["k1:9092"]},
            "colour": "teal"
        }))
        .unwrap();
        assert_eq!(profile.name, "events");
        assert!(profile.id.is_empty());
    }

    #[test]
    fn bad_params_are_reported() {
        let reason = decode_record(json!({
            "name": "x",
            "providerType": "carrierpigeon",
            "connectionParams": {}
        }))
        .unwrap_err();
        assert!(reason.starts_with("invalid profile"), "{reason}");
    }
}
