// SPDX-FileCopyrightText: 2026 mqlens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter registry, manifests, and the built-in broker catalog.
//!
//! Broker adapters are compiled in. The registry maps each
//! [`ProviderType`](mqlens_core::ProviderType) to a manifest describing the
//! adapter and the factory that builds it, so adding a broker is one
//! registration.

pub mod catalog;
pub mod manifest;
pub mod registry;

pub use catalog::{builtin_catalog, catalog_entry};
pub use manifest::{AdapterManifest, Capability};
pub use registry::{AdapterEntry, AdapterRegistry, AdapterStatus};
