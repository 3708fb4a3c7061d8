// SPDX-FileCopyrightText: 2026 mqlens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Broker-neutral data model: messages, queue/topic/channel descriptors, and
//! browse options.

use std::borrow::Cow;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Open map of broker-specific metadata.
pub type PropertyMap = BTreeMap<String, serde_json::Value>;

/// The six supported broker families.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ProviderType {
    IbmMq,
    RabbitMq,
    Kafka,
    ActiveMq,
    AzureServiceBus,
    AwsSqs,
}

/// What an `ObjectNotFound` error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
pub enum ObjectKind {
    Queue,
    Topic,
    Channel,
    Message,
}

/// A message snapshot taken from a queue or topic.
///
/// Immutable once retrieved. `timestamp` is absent when the broker does not
/// report one; it is never defaulted to the retrieval time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(with = "payload_base64")]
    pub payload: Vec<u8>,
    #[serde(default)]
    pub properties: PropertyMap,
}

impl Message {
    pub fn new(id: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            id: id.into(),
            correlation_id: None,
            timestamp: None,
            payload: payload.into(),
            properties: PropertyMap::new(),
        }
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    /// Payload decoded as UTF-8, with invalid sequences replaced.
    pub fn payload_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }
}

mod payload_base64 {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}

/// Exact-match narrowing applied to a browse window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

impl MessageFilter {
    /// Returns true when every populated criterion matches exactly.
    pub fn matches(&self, message: &Message) -> bool {
        if let Some(id) = &self.message_id
            && message.id != *id
        {
            return false;
        }
        if let Some(correlation_id) = &self.correlation_id
            && message.correlation_id.as_deref() != Some(correlation_id.as_str())
        {
            return false;
        }
        true
    }

    pub fn is_empty(&self) -> bool {
        self.message_id.is_none() && self.correlation_id.is_none()
    }
}

/// Window and filter for `browse_messages`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowseOptions {
    pub limit: usize,
    pub start_position: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<MessageFilter>,
}

impl BrowseOptions {
    pub fn new(limit: usize, start_position: usize) -> Self {
        Self {
            limit,
            start_position,
            filter: None,
        }
    }

    /// Builds options from signed inputs; negatives clamp to zero, so a
    /// non-positive limit yields an empty browse.
    pub fn from_signed(limit: i64, start_position: i64) -> Self {
        Self::new(
            usize::try_from(limit.max(0)).unwrap_or(usize::MAX),
            usize::try_from(start_position.max(0)).unwrap_or(usize::MAX),
        )
    }

    pub fn with_filter(mut self, filter: MessageFilter) -> Self {
        self.filter = if filter.is_empty() { None } else { Some(filter) };
        self
    }

    /// Number of queue positions a browse must reach to fill the window.
    pub fn end_position(&self) -> usize {
        self.start_position.saturating_add(self.limit)
    }
}

/// Summary row returned by `list_queues`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<u64>,
    #[serde(default, skip_serializing_if = "PropertyMap::is_empty")]
    pub attributes: PropertyMap,
}

impl QueueInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            depth: None,
            attributes: PropertyMap::new(),
        }
    }

    pub fn with_depth(mut self, depth: u64) -> Self {
        self.depth = Some(depth);
        self
    }
}

/// Full queue description, fetched on demand.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueProperties {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub durable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consumer_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub attributes: PropertyMap,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic_string: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicProperties {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic_string: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition_count: Option<u32>,
    #[serde(default)]
    pub attributes: PropertyMap,
}

/// Reported state of a channel. Adapters report the current state; start and
/// stop are requests that are no-ops when already in the target macro-state.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum ChannelStatus {
    Inactive,
    Running,
    Retrying,
    Stopped,
}

impl ChannelStatus {
    /// Maps a broker status keyword onto the four macro-states.
    pub fn from_broker(status: &str) -> Self {
        match status.trim().to_ascii_uppercase().as_str() {
            "RUNNING" | "BINDING" | "STARTING" | "INITIALIZING" | "REQUESTING" | "SWITCHING"
            | "PAUSED" => ChannelStatus::Running,
            "RETRYING" => ChannelStatus::Retrying,
            "STOPPED" | "STOPPING" => ChannelStatus::Stopped,
            _ => ChannelStatus::Inactive,
        }
    }

    /// Running or retrying: a start request is a no-op.
    pub fn is_active(self) -> bool {
        matches!(self, ChannelStatus::Running | ChannelStatus::Retrying)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_type: Option<String>,
    pub status: ChannelStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelProperties {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_type: Option<String>,
    pub status: ChannelStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_name: Option<String>,
    #[serde(default)]
    pub attributes: PropertyMap,
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn provider_type_wire_names() {
        let names: Vec<String> = ProviderType::iter().map(|p| p.to_string()).collect();
        assert_eq!(
            names,
            ["ibmmq", "rabbitmq", "kafka", "activemq", "azureservicebus", "awssqs"]
        );
        for provider in ProviderType::iter() {
            let json = serde_json::to_string(&provider).unwrap();
            assert_eq!(json, format!("\"{provider}\""));
            assert_eq!(ProviderType::from_str(&provider.to_string()).unwrap(), provider);
        }
    }

    #[test]
    fn filter_matches_on_both_criteria() {
        let msg = Message::new("m1", b"x".to_vec()).with_correlation_id("c1");
        let by_id = MessageFilter {
            message_id: Some("m1".into()),
            correlation_id: None,
        };
        let both_wrong = MessageFilter {
            message_id: Some("m1".into()),
            correlation_id: Some("c2".into()),
        };
        assert!(by_id.matches(&msg));
        assert!(!both_wrong.matches(&msg));
        assert!(MessageFilter::default().matches(&msg));
    }

    #[test]
    fn correlation_filter_rejects_uncorrelated_message() {
        let msg = Message::new("m1", Vec::new());
        let filter = MessageFilter {
            message_id: None,
            correlation_id: Some("c1".into()),
        };
        assert!(!filter.matches(&msg));
    }

    #[test]
    fn signed_options_clamp_to_zero() {
        let opts = BrowseOptions::from_signed(-5, -2);
        assert_eq!(opts.limit, 0);
        assert_eq!(opts.start_position, 0);
        assert_eq!(BrowseOptions::from_signed(10, 3).end_position(), 13);
    }

    #[test]
    fn message_json_uses_base64_payload_and_omits_missing_timestamp() {
        let msg = Message::new("id-1", b"hello".to_vec());
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["payload"], "aGVsbG8=");
        assert!(json.get("timestamp").is_none());
        let back: Message = serde_json::from_value(json).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn channel_status_macro_states() {
        assert_eq!(ChannelStatus::from_broker("running"), ChannelStatus::Running);
        assert_eq!(ChannelStatus::from_broker("BINDING"), ChannelStatus::Running);
        assert_eq!(ChannelStatus::from_broker("RETRYING"), ChannelStatus::Retrying);
        assert_eq!(ChannelStatus::from_broker("STOPPING"), ChannelStatus::Stopped);
        assert_eq!(ChannelStatus::from_broker(""), ChannelStatus::Inactive);
        assert!(ChannelStatus::Retrying.is_active());
        assert!(!ChannelStatus::Stopped.is_active());
        assert_eq!(ChannelStatus::Running.to_string(), "RUNNING");
    }
}
