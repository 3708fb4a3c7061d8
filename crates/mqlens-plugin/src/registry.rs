// SPDX-FileCopyrightText: 2026 mqlens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Registry of compiled-in broker adapters.
//!
//! The `AdapterRegistry` stores one `AdapterEntry` per provider type. An entry
//! holds the manifest, a status, and the factory the connection manager uses to
//! build unconnected adapters.

use std::collections::BTreeMap;
use std::sync::Arc;

use mqlens_core::{AdapterFactory, AdapterSettings, MessagingProvider, MqError, ProviderType};
use tracing::debug;

use crate::catalog::catalog_entry;
use crate::manifest::AdapterManifest;

/// Status of an adapter in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterStatus {
    /// The adapter can be used to connect profiles.
    Enabled,
    /// Listed for display, but no factory is compiled in.
    Unavailable,
}

impl std::fmt::Display for AdapterStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdapterStatus::Enabled => write!(f, "enabled"),
            AdapterStatus::Unavailable => write!(f, "unavailable"),
        }
    }
}

/// A single entry in the adapter registry.
pub struct AdapterEntry {
    pub manifest: AdapterManifest,
    pub status: AdapterStatus,
    pub factory: Option<Box<dyn AdapterFactory>>,
}

impl std::fmt::Debug for AdapterEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterEntry")
            .field("manifest", &self.manifest)
            .field("status", &self.status)
            .field("factory", &self.factory.is_some())
            .finish()
    }
}

/// Adapter table keyed by provider type.
#[derive(Debug, Default)]
pub struct AdapterRegistry {
    entries: BTreeMap<ProviderType, AdapterEntry>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `factory` under its provider type, using the built-in
    /// manifest for that provider. Replaces any previous entry.
    pub fn register(&mut self, factory: Box<dyn AdapterFactory>) -> Result<(), MqError> {
        let provider = factory.provider_type();
        let manifest = catalog_entry(provider).ok_or(MqError::AdapterNotFound(provider))?;
        self.register_with_manifest(manifest, Some(factory), AdapterStatus::Enabled)
    }

    /// Registers an entry with an explicit manifest and status.
    ///
    /// A factory must produce the provider its manifest names.
    pub fn register_with_manifest(
        &mut self,
        manifest: AdapterManifest,
        factory: Option<Box<dyn AdapterFactory>>,
        status: AdapterStatus,
    ) -> Result<(), MqError> {
        if let Some(factory) = &factory
            && factory.provider_type() != manifest.provider_type
        {
            return Err(MqError::Internal(format!(
                "factory for {} registered under manifest for {}",
                factory.provider_type(),
                manifest.provider_type
            )));
        }
        let status = if factory.is_none() {
            AdapterStatus::Unavailable
        } else {
            status
        };
        debug!(provider = %manifest.provider_type, %status, "adapter registered");
        self.entries.insert(
            manifest.provider_type,
            AdapterEntry {
                manifest,
                status,
                factory,
            },
        );
        Ok(())
    }

    pub fn get(&self, provider: ProviderType) -> Option<&AdapterEntry> {
        self.entries.get(&provider)
    }

    /// Builds an unconnected adapter for `provider`.
    pub fn create(
        &self,
        provider: ProviderType,
        settings: &AdapterSettings,
    ) -> Result<Arc<dyn MessagingProvider>, MqError> {
        let entry = self
            .entries
            .get(&provider)
            .filter(|e| e.status == AdapterStatus::Enabled)
            .ok_or(MqError::AdapterNotFound(provider))?;
        let factory = entry
            .factory
            .as_ref()
            .ok_or(MqError::AdapterNotFound(provider))?;
        factory.create(settings)
    }

    /// All entries in provider order.
    pub fn list_all(&self) -> Vec<&AdapterEntry> {
        self.entries.values().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
