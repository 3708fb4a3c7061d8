// SPDX-FileCopyrightText: 2026 mqlens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter construction boundary.

use std::sync::Arc;

use crate::error::MqError;
use crate::settings::AdapterSettings;
use crate::traits::provider::MessagingProvider;
use crate::types::ProviderType;

/// Builds unconnected adapters for one provider type.
///
/// `create` must not perform network I/O.
pub trait AdapterFactory: Send + Sync {
    fn provider_type(&self) -> ProviderType;

    fn create(&self, settings: &AdapterSettings) -> Result<Arc<dyn MessagingProvider>, MqError>;
}
