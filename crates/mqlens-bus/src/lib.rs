// SPDX-FileCopyrightText: 2026 mqlens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process change notifications.
//!
//! The connection manager publishes a [`BrokerEvent`] after every mutating
//! queue operation so any attached view can refresh without polling.

pub mod bus;
pub mod events;

pub use bus::{EventBus, EventSubscription};
pub use events::{BrokerEvent, EventEnvelope};
