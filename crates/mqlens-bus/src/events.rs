// SPDX-FileCopyrightText: 2026 mqlens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Event payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Something observable changed on a connected broker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum BrokerEvent {
    /// A mutation completed and the queue's depth was re-read.
    #[serde(rename_all = "camelCase")]
    QueueDepthChanged { queue: String, depth: u64 },
    /// A mutation completed but the depth could not be re-read.
    #[serde(rename_all = "camelCase")]
    QueueUpdated { queue: String },
}

impl BrokerEvent {
    pub fn queue(&self) -> &str {
        match self {
            BrokerEvent::QueueDepthChanged { queue, .. } | BrokerEvent::QueueUpdated { queue } => {
                queue
            }
        }
    }
}

/// A [`BrokerEvent`] stamped with the profile it concerns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    pub id: Uuid,
    pub profile_id: String,
    pub emitted_at: DateTime<Utc>,
    #[serde(flatten)]
    pub event: BrokerEvent,
}

impl EventEnvelope {
    pub fn new(profile_id: impl Into<String>, event: BrokerEvent) -> Self {
        Self {
            id: Uuid::new_v4(),
            profile_id: profile_id.into(),
            emitted_at: Utc::now(),
            event,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_serializes_flat() {
        let env = EventEnvelope::new(
            "p1",
            BrokerEvent::QueueDepthChanged {
                queue: "orders".into(),
                depth: 3,
            },
        );
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["type"], "queueDepthChanged");
        assert_eq!(json["profileId"], "p1");
        assert_eq!(json["queue"], "orders");
        assert_eq!(json["depth"], 3);
    }

    #[test]
    fn envelope_reads_back_from_json() {
        let env = EventEnvelope::new("p2", BrokerEvent::QueueUpdated { queue: "q".into() });
        let text = serde_json::to_string(&env).unwrap();
        let back: EventEnvelope = serde_json::from_str(&text).unwrap();
        assert_eq!(back, env);
    }

    #[test]
    fn queue_accessor_covers_both_variants() {
        let updated = BrokerEvent::QueueUpdated { queue: "q".into() };
        assert_eq!(updated.queue(), "q");
    }
}
