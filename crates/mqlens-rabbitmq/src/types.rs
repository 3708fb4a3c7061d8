// SPDX-FileCopyrightText: 2026 mqlens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Management API request and response bodies.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use mqlens_core::{Message, PropertyMap};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use tracing::warn;

/// AMQP basic properties the publish endpoint accepts directly. Anything else
/// a caller supplies travels as a header.
pub const BASIC_PROPERTIES: &[&str] = &[
    "content_type",
    "content_encoding",
    "delivery_mode",
    "priority",
    "correlation_id",
    "reply_to",
    "expiration",
    "message_id",
    "timestamp",
    "type",
    "user_id",
    "app_id",
];

#[derive(Debug, Deserialize)]
pub struct Overview {
    #[serde(default)]
    pub rabbitmq_version: Option<String>,
    #[serde(default)]
    pub cluster_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueueRecord {
    pub name: String,
    #[serde(default)]
    pub messages: Option<u64>,
    #[serde(default)]
    pub messages_ready: Option<u64>,
    #[serde(default)]
    pub messages_unacknowledged: Option<u64>,
    #[serde(default)]
    pub consumers: Option<u64>,
    #[serde(default)]
    pub durable: bool,
    #[serde(default)]
    pub auto_delete: bool,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default, rename = "type")]
    pub queue_type: Option<String>,
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeRecord {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub durable: bool,
    #[serde(default)]
    pub auto_delete: bool,
    #[serde(default)]
    pub internal: bool,
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

#[derive(Debug, Serialize)]
pub struct GetRequest {
    pub count: usize,
    pub ackmode: &'static str,
    pub encoding: &'static str,
}

impl GetRequest {
    /// A destructive get: messages are acknowledged and not requeued.
    pub fn consume(count: usize) -> Self {
        Self {
            count,
            ackmode: "ack_requeue_false",
            encoding: "base64",
        }
    }
}

/// One message returned by `POST /api/queues/{vhost}/{queue}/get`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetMessage {
    pub payload: String,
    #[serde(default)]
    pub payload_encoding: String,
    #[serde(default, deserialize_with = "map_or_empty_seq")]
    pub properties: Map<String, Value>,
    #[serde(default)]
    pub routing_key: String,
    #[serde(default)]
    pub exchange: String,
    #[serde(default)]
    pub redelivered: bool,
}

impl GetMessage {
    pub fn payload_bytes(&self) -> Vec<u8> {
        if self.payload_encoding == "base64" {
            match STANDARD.decode(&self.payload) {
                Ok(bytes) => return bytes,
                Err(e) => warn!(error = %e, "undecodable base64 payload, keeping raw text"),
            }
        }
        self.payload.clone().into_bytes()
    }

    /// Broker-neutral snapshot. Without an AMQP `message_id` the id is a
    /// content hash, stable for as long as the message is unchanged.
    pub fn to_message(&self) -> Message {
        let payload = self.payload_bytes();
        let id = self
            .string_property("message_id")
            .map(str::to_string)
            .unwrap_or_else(|| content_id(&payload, &self.properties));

        let mut properties: PropertyMap = self
            .properties
            .iter()
            .filter(|(k, _)| !matches!(k.as_str(), "message_id" | "correlation_id" | "timestamp"))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        properties.insert("exchange".into(), Value::String(self.exchange.clone()));
        properties.insert("routingKey".into(), Value::String(self.routing_key.clone()));
        properties.insert("redelivered".into(), Value::Bool(self.redelivered));

        Message {
            id,
            correlation_id: self.string_property("correlation_id").map(str::to_string),
            timestamp: self
                .properties
                .get("timestamp")
                .and_then(Value::as_i64)
                .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0)),
            payload,
            properties,
        }
    }

    fn string_property(&self, key: &str) -> Option<&str> {
        self.properties
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }
}

/// Hex SHA-256 prefix over payload and properties.
pub fn content_id(payload: &[u8], properties: &Map<String, Value>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload);
    hasher.update([0u8]);
    if let Ok(props) = serde_json::to_vec(properties) {
        hasher.update(props);
    }
    hex::encode(&hasher.finalize()[..16])
}

#[derive(Debug, Serialize)]
pub struct PublishRequest<'a> {
    pub properties: &'a Map<String, Value>,
    pub routing_key: &'a str,
    pub payload: &'a str,
    pub payload_encoding: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct PublishResponse {
    pub routed: bool,
}

#[derive(Debug, Serialize)]
pub struct DeclareQueue {
    pub durable: bool,
    pub auto_delete: bool,
    pub arguments: Map<String, Value>,
}

/// Splits caller properties into AMQP basic properties and headers. New
/// messages default to persistent delivery.
pub fn publish_properties(properties: Option<&PropertyMap>) -> Map<String, Value> {
    let mut basic = Map::new();
    let mut headers = Map::new();
    for (key, value) in properties.into_iter().flatten() {
        if BASIC_PROPERTIES.contains(&key.as_str()) {
            basic.insert(key.clone(), value.clone());
        } else if key == "headers"
            && let Value::Object(extra) = value
        {
            headers.extend(extra.clone());
        } else {
            headers.insert(key.clone(), value.clone());
        }
    }
    basic
        .entry("delivery_mode")
        .or_insert(Value::from(2));
    if !headers.is_empty() {
        basic.insert("headers".into(), Value::Object(headers));
    }
    basic
}

/// The management API renders an empty property table as `[]`.
fn map_or_empty_seq<'de, D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Object(map) => Ok(map),
        Value::Array(items) if items.is_empty() => Ok(Map::new()),
        Value::Null => Ok(Map::new()),
        other => Err(serde::de::Error::custom(format!(
            "expected property table, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn get_message(value: Value) -> GetMessage {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn empty_properties_array_is_accepted() {
        let msg = get_message(json!({
            "payload": "aGk=",
            "payload_encoding": "base64",
            "properties": [],
            "routing_key": "orders",
            "exchange": "",
            "redelivered": false
        }));
        assert!(msg.properties.is_empty());
        assert_eq!(msg.payload_bytes(), b"hi");
    }

    #[test]
    fn message_id_and_timestamp_are_lifted() {
        let msg = get_message(json!({
            "payload": "e30=",
            "payload_encoding": "base64",
            "properties": {
                "message_id": "m-1",
                "correlation_id": "c-1",
                "timestamp": 1_700_000_000,
                "headers": {"tenant": "a"}
            },
            "routing_key": "orders",
            "exchange": "",
        }));
        let m = msg.to_message();
        assert_eq!(m.id, "m-1");
        assert_eq!(m.correlation_id.as_deref(), Some("c-1"));
        assert_eq!(m.timestamp.unwrap().timestamp(), 1_700_000_000);
        assert_eq!(m.properties["headers"]["tenant"], "a");
        assert_eq!(m.properties["routingKey"], "orders");
        assert!(!m.properties.contains_key("message_id"));
    }

    #[test]
    fn missing_message_id_falls_back_to_stable_hash() {
        let body = json!({"payload": "YQ==", "payload_encoding": "base64", "properties": {}});
        let a = get_message(body.clone()).to_message();
        let b = get_message(body).to_message();
        assert_eq!(a.id, b.id);
        assert_eq!(a.id.len(), 32);
        assert!(a.timestamp.is_none());

        let other = get_message(json!({"payload": "Yg==", "payload_encoding": "base64"})).to_message();
        assert_ne!(a.id, other.id);
    }

    #[test]
    fn caller_properties_split_into_basic_and_headers() {
        let mut props = PropertyMap::new();
        props.insert("correlation_id".into(), json!("c-9"));
        props.insert("tenant".into(), json!("acme"));
        let out = publish_properties(Some(&props));
        assert_eq!(out["correlation_id"], "c-9");
        assert_eq!(out["delivery_mode"], 2);
        assert_eq!(out["headers"]["tenant"], "acme");

        let bare = publish_properties(None);
        assert!(bare.get("headers").is_none());
    }
}
