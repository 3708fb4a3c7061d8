// SPDX-FileCopyrightText: 2026 mqlens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Service Bus REST session for one namespace.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mqlens_browse::LeaseSource;
use mqlens_core::{Message, MqError, ObjectKind, PropertyMap, ProviderType};
use mqlens_http::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, LOCATION};
use mqlens_http::{Method, RequestBuilder, RestClient, StatusCode, Target, Url};
use serde_json::{Map, Value};
use tracing::debug;

use crate::atom::{Entry, parse_entries};
use crate::auth::Credentials;

pub const API_VERSION: &str = "2021-05";

/// Entities fetched per management page.
const PAGE_SIZE: usize = 100;

const BROKER_PROPERTIES: &str = "brokerproperties";

/// Broker properties a sender may set; everything else is a custom property.
const SETTABLE: &[&str] = &[
    "MessageId",
    "CorrelationId",
    "Label",
    "SessionId",
    "ReplyTo",
    "To",
    "TimeToLive",
    "ScheduledEnqueueTimeUtc",
    "PartitionKey",
];

/// Broker properties lifted into [`Message`] fields or only meaningful to
/// the lock.
const LIFTED: &[&str] = &["MessageId", "CorrelationId", "EnqueuedTimeUtc", "LockToken", "LockedUntilUtc"];

/// Response headers that are transport, not custom properties.
const TRANSPORT_HEADERS: &[&str] = &[
    "brokerproperties",
    "content-length",
    "content-type",
    "date",
    "location",
    "server",
    "strict-transport-security",
    "transfer-encoding",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Queues,
    Topics,
}

impl EntityKind {
    fn resource(self) -> &'static str {
        match self {
            EntityKind::Queues => "Queues",
            EntityKind::Topics => "Topics",
        }
    }

    fn object_kind(self) -> ObjectKind {
        match self {
            EntityKind::Queues => ObjectKind::Queue,
            EntityKind::Topics => ObjectKind::Topic,
        }
    }
}

/// A peek-locked message and the lock URL that releases or completes it.
#[derive(Debug)]
pub struct LockedMessage {
    pub message: Message,
    pub location: Url,
}

#[derive(Debug)]
pub struct ServiceBusSession {
    rest: RestClient,
    credentials: Credentials,
}

impl ServiceBusSession {
    pub fn new(rest: RestClient, credentials: Credentials) -> Self {
        Self { rest, credentials }
    }

    async fn authorized(&self, method: Method, url: Url) -> Result<RequestBuilder, MqError> {
        let auth = self.credentials.authorization().await?;
        Ok(self
            .rest
            .request(method, url)
            .header("authorization", auth))
    }

    /// Lists at most one queue; proves the endpoint and credentials work.
    pub async fn probe(&self) -> Result<(), MqError> {
        let url = self.rest.url_with_query(&["$Resources", "Queues"], &[
            ("api-version", API_VERSION),
            ("$top", "1"),
        ]);
        let req = self.authorized(Method::GET, url).await?;
        self.rest
            .send_idempotent(req, &Target::new(ObjectKind::Queue, "*"))
            .await?;
        Ok(())
    }

    /// Every queue or topic in the namespace, following management paging.
    pub async fn entities(&self, kind: EntityKind) -> Result<Vec<Entry>, MqError> {
        let mut all = Vec::new();
        loop {
            let skip = all.len().to_string();
            let top = PAGE_SIZE.to_string();
            let url = self.rest.url_with_query(&["$Resources", kind.resource()], &[
                ("api-version", API_VERSION),
                ("$skip", skip.as_str()),
                ("$top", top.as_str()),
            ]);
            let req = self.authorized(Method::GET, url).await?;
            let response = self
                .rest
                .send_idempotent(req, &Target::new(kind.object_kind(), "*"))
                .await?;
            let body = response
                .text()
                .await
                .map_err(|e| MqError::transport("failed to read management feed", e))?;
            let page = parse_entries(&body);
            let full = page.len() >= PAGE_SIZE;
            all.extend(page);
            if !full {
                return Ok(all);
            }
        }
    }

    /// One entity's description. An entity of the other kind counts as
    /// missing.
    pub async fn entity(&self, kind: EntityKind, name: &str) -> Result<Entry, MqError> {
        let url = self
            .rest
            .url_with_query(&[name], &[("api-version", API_VERSION)]);
        let req = self.authorized(Method::GET, url).await?;
        let target = Target::new(kind.object_kind(), name);
        let response = self.rest.send_idempotent(req, &target).await?;
        let body = response
            .text()
            .await
            .map_err(|e| MqError::transport("failed to read entity description", e))?;
        parse_entries(&body)
            .into_iter()
            .find(|e| match kind {
                EntityKind::Queues => e.is_queue(),
                EntityKind::Topics => e.is_topic(),
            })
            .ok_or_else(|| MqError::not_found(kind.object_kind(), name))
    }

    /// Peek-locks the next unlocked message; `None` when there is none.
    pub async fn peek_lock(&self, queue: &str, timeout_secs: u64) -> Result<Option<LockedMessage>, MqError> {
        let timeout = timeout_secs.to_string();
        let url = self
            .rest
            .url_with_query(&[queue, "messages", "head"], &[("timeout", timeout.as_str())]);
        let req = self.authorized(Method::POST, url).await?;
        let response = self.rest.send(req, &Target::queue(queue)).await?;
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        let headers = response.headers().clone();
        let location = headers
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| Url::parse(v).ok())
            .ok_or_else(|| MqError::transport_msg("peek-lock response has no lock location"))?;
        let payload = response
            .bytes()
            .await
            .map_err(|e| MqError::transport("failed to read message body", e))?;
        Ok(Some(LockedMessage {
            message: received_message(&headers, payload.to_vec())?,
            location,
        }))
    }

    /// Abandons a lock, making the message visible again.
    pub async fn unlock(&self, location: Url) -> Result<(), MqError> {
        let req = self.authorized(Method::PUT, location).await?;
        self.rest
            .send(req, &Target::new(ObjectKind::Message, "lock"))
            .await?;
        Ok(())
    }

    /// Completes a lock, deleting the message.
    pub async fn complete(&self, location: Url) -> Result<(), MqError> {
        let req = self.authorized(Method::DELETE, location).await?;
        self.rest
            .send(req, &Target::new(ObjectKind::Message, "lock"))
            .await?;
        Ok(())
    }

    /// Sends to a queue or topic.
    pub async fn send(
        &self,
        kind: EntityKind,
        entity: &str,
        payload: &[u8],
        properties: Option<&PropertyMap>,
    ) -> Result<(), MqError> {
        let url = self.rest.url(&[entity, "messages"]);
        let content_type = if std::str::from_utf8(payload).is_ok() {
            "text/plain;charset=utf-8"
        } else {
            "application/octet-stream"
        };
        let req = self
            .authorized(Method::POST, url)
            .await?
            .headers(send_headers(properties)?)
            .header(CONTENT_TYPE, content_type)
            .body(payload.to_vec());
        self.rest
            .send(req, &Target::new(kind.object_kind(), entity))
            .await?;
        debug!(entity, bytes = payload.len(), "message sent");
        Ok(())
    }
}

fn received_message(headers: &HeaderMap, payload: Vec<u8>) -> Result<Message, MqError> {
    let broker: Map<String, Value> = match headers.get(BROKER_PROPERTIES) {
        Some(raw) => serde_json::from_slice(raw.as_bytes())
            .map_err(|e| MqError::transport("unreadable BrokerProperties header", e))?,
        None => Map::new(),
    };
    let id = match broker.get("MessageId") {
        Some(Value::String(id)) => id.clone(),
        _ => broker
            .get("SequenceNumber")
            .map(Value::to_string)
            .ok_or_else(|| MqError::transport_msg("received message has no MessageId"))?,
    };
    let timestamp = broker
        .get("EnqueuedTimeUtc")
        .and_then(Value::as_str)
        .and_then(|t| DateTime::parse_from_rfc2822(t).ok())
        .map(|t| t.with_timezone(&Utc));
    let correlation_id = broker
        .get("CorrelationId")
        .and_then(Value::as_str)
        .map(str::to_string);

    let mut properties: PropertyMap = broker
        .into_iter()
        .filter(|(k, _)| !LIFTED.contains(&k.as_str()))
        .collect();
    for (name, value) in headers {
        if TRANSPORT_HEADERS.contains(&name.as_str()) {
            continue;
        }
        let Ok(value) = value.to_str() else { continue };
        let decoded = serde_json::from_str(value).unwrap_or_else(|_| Value::from(value));
        properties.insert(name.as_str().to_string(), decoded);
    }

    Ok(Message {
        id,
        correlation_id,
        timestamp,
        payload,
        properties,
    })
}

/// `BrokerProperties` plus one header per custom property.
fn send_headers(properties: Option<&PropertyMap>) -> Result<HeaderMap, MqError> {
    let mut broker = Map::new();
    let mut headers = HeaderMap::new();
    for (key, value) in properties.into_iter().flatten() {
        if SETTABLE.contains(&key.as_str()) {
            broker.insert(key.clone(), value.clone());
            continue;
        }
        let name = HeaderName::from_bytes(key.as_bytes()).map_err(|_| {
            MqError::unsupported(ProviderType::AzureServiceBus, format!("property name `{key}`"))
        })?;
        let value = HeaderValue::from_str(&value.to_string()).map_err(|_| {
            MqError::unsupported(ProviderType::AzureServiceBus, format!("value of property `{key}`"))
        })?;
        headers.insert(name, value);
    }
    if !broker.is_empty() {
        let encoded = Value::Object(broker).to_string();
        let value = HeaderValue::from_str(&encoded)
            .map_err(|e| MqError::Internal(format!("BrokerProperties header: {e}")))?;
        headers.insert(HeaderName::from_static(BROKER_PROPERTIES), value);
    }
    Ok(headers)
}

/// Peek-lock leases on one queue.
pub struct QueueLeases<'a> {
    pub session: &'a ServiceBusSession,
    pub queue: &'a str,
    pub timeout_secs: u64,
}

#[async_trait]
impl LeaseSource for QueueLeases<'_> {
    type Lease = LockedMessage;

    async fn lease_batch(&self, max: usize) -> Result<Vec<LockedMessage>, MqError> {
        let mut batch = Vec::new();
        while batch.len() < max {
            match self.session.peek_lock(self.queue, self.timeout_secs).await {
                Ok(Some(locked)) => batch.push(locked),
                Ok(None) => break,
                Err(err) => {
                    for locked in batch {
                        if let Err(e) = self.session.unlock(locked.location).await {
                            debug!(error = %e, "unlock after failed lease batch");
                        }
                    }
                    return Err(err);
                }
            }
        }
        Ok(batch)
    }

    fn message<'b>(&self, lease: &'b LockedMessage) -> &'b Message {
        &lease.message
    }

    async fn release(&self, lease: LockedMessage) -> Result<(), MqError> {
        self.session.unlock(lease.location).await
    }

    async fn remove(&self, lease: LockedMessage) -> Result<(), MqError> {
        self.session.complete(lease.location).await
    }
}
