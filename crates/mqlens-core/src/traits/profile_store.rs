// SPDX-FileCopyrightText: 2026 mqlens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persisted profile collection boundary.

use async_trait::async_trait;

use crate::error::MqError;
use crate::profile::ConnectionProfile;

/// An ordered, secret-free list of profiles, read and written as a whole.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn load_profiles(&self) -> Result<Vec<ConnectionProfile>, MqError>;

    /// Replaces the stored collection. Implementations reject profiles that
    /// still carry a secret with `InvalidProfile`.
    async fn save_profiles(&self, profiles: &[ConnectionProfile]) -> Result<(), MqError>;
}
