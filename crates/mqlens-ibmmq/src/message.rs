// SPDX-FileCopyrightText: 2026 mqlens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message descriptor and user properties as carried by the messaging REST
//! API: `ibm-mq-md-*` headers for MQMD fields and `ibm-mq-usr-*` headers for
//! user properties. Property values travel JSON-encoded so their type
//! survives a round trip.

use chrono::{DateTime, Utc};
use mqlens_core::{Message, MqError, PropertyMap, ProviderType};
use mqlens_http::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Deserialize;
use serde_json::Value;

const MD_PREFIX: &str = "ibm-mq-md-";
const USR_PREFIX: &str = "ibm-mq-usr-";

/// MQMD fields a caller may set through the property map.
const MD_FIELDS: &[&str] = &["correlationId", "replyTo", "persistence", "expiry"];

/// A correlation id of all zeroes is MQCI_NONE.
const CORREL_NONE: &str = "000000000000000000000000000000000000000000000000";

/// One entry of a `messagelist` response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListedMessage {
    pub message_id: String,
    #[serde(default)]
    pub correlation_id: Option<String>,
    #[serde(default, alias = "putDate")]
    pub put_date_time: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MessageList {
    #[serde(default)]
    pub messages: Vec<ListedMessage>,
}

fn correlation(id: Option<&str>) -> Option<String> {
    id.map(str::trim)
        .filter(|c| !c.is_empty() && *c != CORREL_NONE)
        .map(str::to_string)
}

/// Builds a message from a browse response and its list entry.
pub fn from_response(listed: &ListedMessage, headers: &HeaderMap, payload: Vec<u8>) -> Message {
    let mut properties = PropertyMap::new();
    let mut header_correl = None;
    for (name, value) in headers {
        let Ok(value) = value.to_str() else { continue };
        let name = name.as_str();
        if let Some(user) = name.strip_prefix(USR_PREFIX) {
            let decoded = serde_json::from_str(value).unwrap_or_else(|_| Value::from(value));
            properties.insert(user.to_string(), decoded);
        } else if let Some(field) = name.strip_prefix(MD_PREFIX) {
            match field {
                "messageid" => {}
                "correlationid" => header_correl = Some(value.to_string()),
                _ => {
                    properties.insert(format!("md.{field}"), Value::from(value));
                }
            }
        }
    }

    Message {
        id: listed.message_id.clone(),
        correlation_id: correlation(listed.correlation_id.as_deref())
            .or_else(|| correlation(header_correl.as_deref())),
        timestamp: listed
            .put_date_time
            .as_deref()
            .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
            .map(|t| t.with_timezone(&Utc)),
        payload,
        properties,
    }
}

/// Request headers carrying `properties` on a put or publish.
pub fn put_headers(properties: Option<&PropertyMap>) -> Result<HeaderMap, MqError> {
    let mut headers = HeaderMap::new();
    for (key, value) in properties.into_iter().flatten() {
        let (name, rendered) = if MD_FIELDS.contains(&key.as_str()) {
            let rendered = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (format!("{MD_PREFIX}{key}"), rendered)
        } else {
            (format!("{USR_PREFIX}{key}"), value.to_string())
        };
        let name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
            MqError::unsupported(ProviderType::IbmMq, format!("property name `{key}`"))
        })?;
        let value = HeaderValue::from_str(&rendered).map_err(|_| {
            MqError::unsupported(ProviderType::IbmMq, format!("value of property `{key}`"))
        })?;
        headers.insert(name, value);
    }
    Ok(headers)
}

/// Content type for a payload: text when it is UTF-8, bytes otherwise.
pub fn content_type(payload: &[u8]) -> &'static str {
    if std::str::from_utf8(payload).is_ok() {
        "text/plain;charset=utf-8"
    } else {
        "application/octet-stream"
    }
}
