// SPDX-FileCopyrightText: 2026 mqlens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Secret store boundary.

use async_trait::async_trait;
use secrecy::SecretString;

use crate::error::MqError;

/// Key/value store for credential material, keyed `secret.<kind>.<profileId>`.
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<SecretString>, MqError>;

    async fn store(&self, key: &str, value: &str) -> Result<(), MqError>;

    /// Deleting a missing key succeeds.
    async fn delete(&self, key: &str) -> Result<(), MqError>;
}
