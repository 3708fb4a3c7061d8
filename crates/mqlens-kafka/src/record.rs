// SPDX-FileCopyrightText: 2026 mqlens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversions between Kafka records and [`Message`]s.
//!
//! A message id is `<partition>:<offset>`. Record headers become string
//! properties; the record key and its coordinates are reported as `key`,
//! `partition` and `offset`.

use std::collections::BTreeMap;

use chrono::Utc;
use mqlens_core::{Message, PropertyMap};
use rskafka::record::{Record, RecordAndOffset};
use serde_json::Value;

/// Properties that address the record rather than travel as headers.
const KEY_PROPERTY: &str = "key";
const PARTITION_PROPERTY: &str = "partition";
const OFFSET_PROPERTY: &str = "offset";

pub fn message_id(partition: i32, offset: i64) -> String {
    format!("{partition}:{offset}")
}

pub fn to_message(partition: i32, record: RecordAndOffset) -> Message {
    let RecordAndOffset { record, offset } = record;
    let mut properties: PropertyMap = record
        .headers
        .into_iter()
        .map(|(k, v)| (k, Value::from(String::from_utf8_lossy(&v).into_owned())))
        .collect();
    if let Some(key) = &record.key {
        properties.insert(
            KEY_PROPERTY.into(),
            Value::from(String::from_utf8_lossy(key).into_owned()),
        );
    }
    properties.insert(PARTITION_PROPERTY.into(), Value::from(partition));
    properties.insert(OFFSET_PROPERTY.into(), Value::from(offset));

    Message {
        id: message_id(partition, offset),
        correlation_id: None,
        timestamp: Some(record.timestamp),
        payload: record.value.unwrap_or_default(),
        properties,
    }
}

/// The partition a put targets: the `partition` property when it names one
/// of `partitions`, else the lowest partition.
pub fn target_partition(properties: Option<&PropertyMap>, partitions: &[i32]) -> Option<i32> {
    let requested = properties
        .and_then(|p| p.get(PARTITION_PROPERTY))
        .and_then(Value::as_i64)
        .and_then(|p| i32::try_from(p).ok());
    match requested {
        Some(p) => partitions.contains(&p).then_some(p),
        None => partitions.iter().min().copied(),
    }
}

/// Builds the record for a put. `key` becomes the record key, other
/// properties become headers.
pub fn build_record(payload: &[u8], properties: Option<&PropertyMap>) -> Record {
    let mut key = None;
    let mut headers = BTreeMap::new();
    for (name, value) in properties.into_iter().flatten() {
        let rendered = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        match name.as_str() {
            KEY_PROPERTY => key = Some(rendered.into_bytes()),
            PARTITION_PROPERTY | OFFSET_PROPERTY => {}
            _ => {
                headers.insert(name.clone(), rendered.into_bytes());
            }
        }
    }
    Record {
        key,
        value: Some(payload.to_vec()),
        headers,
        timestamp: Utc::now(),
    }
}
