// SPDX-FileCopyrightText: 2026 mqlens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Broadcast fan-out of [`EventEnvelope`]s.
//!
//! Publishing never blocks and never fails: with no subscribers the event is
//! dropped, and a subscriber that falls more than `capacity` events behind
//! skips ahead.

use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::events::{BrokerEvent, EventEnvelope};

#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EventEnvelope>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Stamp and broadcast an event for `profile_id`.
    pub fn publish(&self, profile_id: &str, event: BrokerEvent) {
        let envelope = EventEnvelope::new(profile_id, event);
        match self.sender.send(envelope) {
            Ok(receivers) => debug!(profile_id, receivers, "event published"),
            Err(_) => debug!(profile_id, "event dropped: no subscribers"),
        }
    }

    pub fn subscribe(&self) -> EventSubscription {
        EventSubscription {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Receiving half handed to front ends.
pub struct EventSubscription {
    receiver: broadcast::Receiver<EventEnvelope>,
}

impl EventSubscription {
    /// Next event, or `None` once the bus is gone. Lag is logged and skipped.
    pub async fn recv(&mut self) -> Option<EventEnvelope> {
        loop {
            match self.receiver.recv().await {
                Ok(envelope) => return Some(envelope),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Every event already buffered, without waiting.
    pub fn drain(&mut self) -> Vec<EventEnvelope> {
        let mut out = Vec::new();
        loop {
            match self.receiver.try_recv() {
                Ok(envelope) => out.push(envelope),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "event subscriber lagged");
                }
                Err(_) => return out,
            }
        }
    }
}
