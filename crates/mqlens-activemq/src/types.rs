// SPDX-FileCopyrightText: 2026 mqlens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Jolokia request envelopes and the JMX message rendering returned by
//! `browse()`.

use chrono::{DateTime, Utc};
use mqlens_core::{Message, MqError, ObjectKind, PropertyMap};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One Jolokia request.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum JolokiaRequest {
    Read {
        mbean: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        attribute: Option<Value>,
    },
    Exec {
        mbean: String,
        operation: String,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        arguments: Vec<Value>,
    },
}

/// Jolokia reports JMX failures inside a 200 response.
#[derive(Debug, Deserialize)]
pub struct JolokiaResponse {
    pub status: u16,
    #[serde(default)]
    pub value: Value,
    #[serde(default)]
    pub error_type: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl JolokiaResponse {
    /// The value, or the error mapped onto the taxonomy.
    pub fn into_value(self, kind: ObjectKind, name: &str) -> Result<Value, MqError> {
        if self.status == 200 {
            return Ok(self.value);
        }
        let error_type = self.error_type.unwrap_or_default();
        let detail = self.error.unwrap_or_else(|| format!("status {}", self.status));
        if error_type.ends_with("InstanceNotFoundException") || self.status == 404 {
            Err(MqError::not_found(kind, name))
        } else if error_type.ends_with("SecurityException") || self.status == 403 {
            Err(MqError::AuthorizationDenied(detail))
        } else {
            Err(MqError::transport_msg(format!("jolokia: {detail}")))
        }
    }
}

/// JMS header fields lifted out of the property map.
const JMS_LIFTED: &[&str] = &["JMSMessageID", "JMSCorrelationID", "JMSTimestamp", "Text", "BodyPreview"];

/// Typed property tables a browsed message carries.
const PROPERTY_TABLES: &[&str] = &[
    "StringProperties",
    "BooleanProperties",
    "ByteProperties",
    "ShortProperties",
    "IntProperties",
    "LongProperties",
    "FloatProperties",
    "DoubleProperties",
];

/// Converts one element of a `browse()` result.
pub fn browsed_message(value: &Value) -> Result<Message, MqError> {
    let object = value
        .as_object()
        .ok_or_else(|| MqError::transport_msg("jolokia: browsed message is not an object"))?;
    let id = object
        .get("JMSMessageID")
        .and_then(Value::as_str)
        .ok_or_else(|| MqError::transport_msg("jolokia: browsed message has no JMSMessageID"))?;

    let payload = match (object.get("Text"), object.get("BodyPreview")) {
        (Some(Value::String(text)), _) => text.clone().into_bytes(),
        (_, Some(Value::Array(bytes))) => bytes
            .iter()
            .filter_map(Value::as_i64)
            .map(|b| b as u8)
            .collect(),
        _ => Vec::new(),
    };

    let mut properties = PropertyMap::new();
    for (key, value) in object {
        if JMS_LIFTED.contains(&key.as_str()) || value.is_null() {
            continue;
        }
        if PROPERTY_TABLES.contains(&key.as_str()) {
            if let Value::Object(table) = value {
                properties.extend(table.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
            continue;
        }
        properties.insert(key.clone(), value.clone());
    }

    Ok(Message {
        id: id.to_string(),
        correlation_id: object
            .get("JMSCorrelationID")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        timestamp: object
            .get("JMSTimestamp")
            .and_then(jms_timestamp)
            .and_then(DateTime::<Utc>::from_timestamp_millis),
        payload,
        properties,
    })
}

/// JMSTimestamp arrives as epoch millis, or as a rendered `java.util.Date`.
fn jms_timestamp(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().filter(|ms| *ms > 0),
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|d| d.timestamp_millis()),
        _ => None,
    }
}
