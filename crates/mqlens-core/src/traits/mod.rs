// SPDX-FileCopyrightText: 2026 mqlens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Capability traits implemented by broker adapters and by the stores the
//! connection manager depends on.
//!
//! All traits use `#[async_trait]` so they can be held as trait objects.

pub mod channel;
pub mod factory;
pub mod profile_store;
pub mod provider;
pub mod secret;
pub mod topic;

pub use channel::ChannelOperations;
pub use factory::AdapterFactory;
pub use profile_store::ProfileStore;
pub use provider::MessagingProvider;
pub use secret::SecretStore;
pub use topic::TopicOperations;
