// SPDX-FileCopyrightText: 2026 mqlens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter manifests: what each compiled-in adapter is and can do.

use mqlens_core::{ProviderType, SecretField};
use serde::Serialize;

/// What an adapter can do beyond the required queue operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Capability {
    Topics,
    Channels,
    /// Delete-by-id without touching other messages.
    NativeDelete,
    /// Browse through a broker cursor.
    NativeBrowse,
    /// Browse and delete by draining through a holding queue.
    DrainReplay,
    /// Browse and delete by leasing messages.
    Lease,
}

/// Describes one compiled-in broker adapter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdapterManifest {
    /// Short display name, e.g. "rabbitmq".
    pub name: String,
    pub provider_type: ProviderType,
    pub version: String,
    pub description: String,
    pub capabilities: Vec<Capability>,
    /// Secret kinds the adapter's profile parameters carry.
    pub secret_fields: Vec<SecretField>,
}
