// SPDX-FileCopyrightText: 2026 mqlens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for mqlens integration tests.
//!
//! Provides broker and store doubles plus a harness for fast, deterministic,
//! CI-runnable tests without external brokers.
//!
//! # Components
//!
//! - [`InMemoryBroker`] - provider with queues, topics and channels in memory
//! - [`MockFactory`] - adapter factory over a shared [`BrokerState`]
//! - [`MemorySecretStore`] / [`FailingSecretStore`] - secret store doubles
//! - [`MemoryProfileStore`] - profile store that rejects secret-bearing profiles
//! - [`TestHarness`] - a connection manager wired to all of the above

pub mod broker;
pub mod harness;
pub mod stores;

pub use broker::{BrokerOptions, BrokerState, InMemoryBroker, MockFactory};
pub use harness::TestHarness;
pub use stores::{FailingSecretStore, MemoryProfileStore, MemorySecretStore};
