// SPDX-FileCopyrightText: 2026 mqlens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connection management for mqlens.
//!
//! [`ConnectionManager`] is the one place front ends go through: it resolves
//! profiles from the [`ProfileBook`], builds adapters from the registry,
//! keeps at most one live adapter per profile, and emits broker events after
//! mutations.

pub mod manager;
pub mod profiles;

pub use manager::ConnectionManager;
pub use profiles::{ImportReport, ProfileBook, SkippedRecord};
