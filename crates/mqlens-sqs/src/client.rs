// SPDX-FileCopyrightText: 2026 mqlens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQS JSON protocol session.
//!
//! Every action is a signed `POST /` with an `X-Amz-Target: AmazonSQS.<Action>`
//! header and a JSON body. Failures carry their code in the body's `__type`.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use mqlens_browse::LeaseSource;
use mqlens_core::{Message, MqError, ObjectKind, PropertyMap};
use mqlens_http::header::CONTENT_TYPE;
use mqlens_http::{Method, RestClient, Target, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::sigv4::{AwsCredentials, CanonicalRequest, Scope, sign};

const JSON_1_0: &str = "application/x-amz-json-1.0";

/// Largest batch `ReceiveMessage` returns.
pub const MAX_RECEIVE: usize = 10;

/// Property lifted into [`Message::correlation_id`] and back.
pub const CORRELATION_ATTRIBUTE: &str = "CorrelationId";

/// An SQS error response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiFailure {
    pub status: u16,
    /// The `__type` with any `namespace#` prefix removed.
    pub code: String,
    pub message: String,
}

impl ApiFailure {
    fn parse(status: u16, body: &[u8]) -> Self {
        let value: Value = serde_json::from_slice(body).unwrap_or(Value::Null);
        let code = value
            .get("__type")
            .and_then(Value::as_str)
            .map(|t| t.rsplit('#').next().unwrap_or(t).to_string())
            .unwrap_or_default();
        let message = value
            .get("message")
            .or_else(|| value.get("Message"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Self {
            status,
            code,
            message,
        }
    }

    pub fn is_purge_in_progress(&self) -> bool {
        self.code.ends_with("PurgeQueueInProgress")
    }

    pub fn into_error(self, target: &Target) -> MqError {
        match self.code.as_str() {
            "QueueDoesNotExist" | "AWS.SimpleQueueService.NonExistentQueue" => {
                MqError::not_found(target.kind, target.name.clone())
            }
            "ReceiptHandleIsInvalid" => MqError::not_found(ObjectKind::Message, target.name.clone()),
            "AccessDenied"
            | "AccessDeniedException"
            | "InvalidClientTokenId"
            | "SignatureDoesNotMatch"
            | "UnrecognizedClientException"
            | "MissingAuthenticationToken"
            | "ExpiredToken" => MqError::AuthorizationDenied(format!("{}: {}", self.code, self.message)),
            _ if self.status == 401 || self.status == 403 => {
                MqError::AuthorizationDenied(format!("HTTP {}: {}", self.status, self.message))
            }
            _ => MqError::transport_msg(format!(
                "sqs: {} (HTTP {}): {}",
                if self.code.is_empty() { "error" } else { self.code.as_str() },
                self.status,
                self.message
            )),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListQueuesResponse {
    #[serde(default)]
    queue_urls: Vec<String>,
    next_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct QueueUrlResponse {
    queue_url: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AttributesResponse {
    #[serde(default)]
    attributes: HashMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ReceiveResponse {
    #[serde(default)]
    messages: Vec<ReceivedMessage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ReceivedMessage {
    message_id: String,
    receipt_handle: String,
    #[serde(default)]
    body: String,
    #[serde(default)]
    attributes: HashMap<String, String>,
    #[serde(default)]
    message_attributes: HashMap<String, MessageAttribute>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct MessageAttribute {
    data_type: String,
    string_value: Option<String>,
}

/// A received message and the handle that releases or deletes it.
#[derive(Debug)]
pub struct ReceiptLease {
    pub message: Message,
    pub receipt_handle: String,
}

/// Queue name from a queue URL (its last path segment).
pub fn queue_name(queue_url: &str) -> &str {
    queue_url.trim_end_matches('/').rsplit('/').next().unwrap_or(queue_url)
}

pub fn is_fifo(queue: &str) -> bool {
    queue.ends_with(".fifo")
}

#[derive(Debug)]
pub struct SqsSession {
    rest: RestClient,
    region: String,
    credentials: AwsCredentials,
    queue_urls: Mutex<HashMap<String, String>>,
}

impl SqsSession {
    pub fn new(rest: RestClient, region: impl Into<String>, credentials: AwsCredentials) -> Self {
        Self {
            rest,
            region: region.into(),
            credentials,
            queue_urls: Mutex::new(HashMap::new()),
        }
    }

    /// Sends one action; the inner result is the service's verdict.
    pub async fn try_call(&self, action: &str, body: &Value) -> Result<Result<Value, ApiFailure>, MqError> {
        let url: Url = self.rest.base_url().clone();
        let payload = serde_json::to_vec(body).map_err(|e| MqError::Internal(format!("encode {action}: {e}")))?;
        let target = format!("AmazonSQS.{action}");
        let host = match (url.host_str(), url.port()) {
            (Some(h), Some(p)) => format!("{h}:{p}"),
            (Some(h), None) => h.to_string(),
            (None, _) => return Err(MqError::InvalidProfile(format!("endpoint `{url}` has no host"))),
        };
        let signed = sign(
            &CanonicalRequest {
                method: "POST",
                path: url.path(),
                query: &[],
                headers: &[
                    ("content-type", JSON_1_0),
                    ("host", host.as_str()),
                    ("x-amz-target", target.as_str()),
                ],
                body: &payload,
            },
            &Scope {
                region: &self.region,
                service: "sqs",
            },
            &self.credentials,
            Utc::now(),
        )?;

        let mut req = self
            .rest
            .request(Method::POST, url)
            .header(CONTENT_TYPE, JSON_1_0)
            .header("x-amz-target", &target)
            .body(payload);
        for (name, value) in signed {
            req = req.header(name, value);
        }

        let response = self.rest.send_unchecked(req).await?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| MqError::transport(format!("failed to read {action} response"), e))?;
        if !status.is_success() {
            let failure = ApiFailure::parse(status.as_u16(), &bytes);
            debug!(action, code = %failure.code, "sqs action failed");
            return Ok(Err(failure));
        }
        if bytes.is_empty() {
            return Ok(Ok(Value::Null));
        }
        serde_json::from_slice(&bytes)
            .map(Ok)
            .map_err(|e| MqError::transport(format!("unexpected {action} response"), e))
    }

    async fn call<T: DeserializeOwned + Default>(&self, action: &str, body: Value, target: &Target) -> Result<T, MqError> {
        match self.try_call(action, &body).await? {
            Ok(Value::Null) => Ok(T::default()),
            Ok(value) => serde_json::from_value(value)
                .map_err(|e| MqError::transport(format!("unexpected {action} response"), e)),
            Err(failure) => Err(failure.into_error(target)),
        }
    }

    /// Every queue URL, optionally restricted to a name prefix.
    pub async fn list_queue_urls(&self, prefix: Option<&str>, limit: Option<usize>) -> Result<Vec<String>, MqError> {
        let mut urls = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let mut body = Map::new();
            body.insert("MaxResults".into(), json!(limit.unwrap_or(1000).min(1000)));
            if let Some(prefix) = prefix {
                body.insert("QueueNamePrefix".into(), json!(prefix));
            }
            if let Some(token) = &next_token {
                body.insert("NextToken".into(), json!(token));
            }
            let page: ListQueuesResponse = self
                .call("ListQueues", Value::Object(body), &Target::queue("*"))
                .await?;
            urls.extend(page.queue_urls);
            match page.next_token {
                Some(token) if limit.is_none_or(|l| urls.len() < l) => next_token = Some(token),
                _ => break,
            }
        }
        let mut cache = self.queue_urls.lock().await;
        for url in &urls {
            cache.insert(queue_name(url).to_string(), url.clone());
        }
        Ok(urls)
    }

    /// Resolves and caches a queue URL.
    pub async fn queue_url(&self, queue: &str) -> Result<String, MqError> {
        if let Some(url) = self.queue_urls.lock().await.get(queue) {
            return Ok(url.clone());
        }
        let resolved: QueueUrlResponse = match self
            .try_call("GetQueueUrl", &json!({ "QueueName": queue }))
            .await?
        {
            Ok(value) => serde_json::from_value(value)
                .map_err(|e| MqError::transport("unexpected GetQueueUrl response", e))?,
            Err(failure) => return Err(failure.into_error(&Target::queue(queue))),
        };
        self.queue_urls
            .lock()
            .await
            .insert(queue.to_string(), resolved.queue_url.clone());
        Ok(resolved.queue_url)
    }

    pub async fn attributes(&self, queue: &str) -> Result<HashMap<String, String>, MqError> {
        let url = self.queue_url(queue).await?;
        let response: AttributesResponse = self
            .call(
                "GetQueueAttributes",
                json!({ "QueueUrl": url, "AttributeNames": ["All"] }),
                &Target::queue(queue),
            )
            .await?;
        Ok(response.attributes)
    }

    pub async fn send(&self, queue: &str, body: &str, properties: Option<&PropertyMap>) -> Result<(), MqError> {
        let url = self.queue_url(queue).await?;
        let request = send_request(&url, queue, body, properties);
        let _: Value = self.call("SendMessage", request, &Target::queue(queue)).await?;
        debug!(queue, bytes = body.len(), "message sent");
        Ok(())
    }

    /// Receives up to `max` messages, hiding them for `visibility_secs`.
    pub async fn receive(
        &self,
        queue: &str,
        max: usize,
        visibility_secs: u64,
        wait_secs: u64,
    ) -> Result<Vec<ReceiptLease>, MqError> {
        let url = self.queue_url(queue).await?;
        let response: ReceiveResponse = self
            .call(
                "ReceiveMessage",
                json!({
                    "QueueUrl": url,
                    "MaxNumberOfMessages": max.clamp(1, MAX_RECEIVE),
                    "VisibilityTimeout": visibility_secs,
                    "WaitTimeSeconds": wait_secs.min(20),
                    "MessageSystemAttributeNames": ["All"],
                    "MessageAttributeNames": ["All"],
                }),
                &Target::queue(queue),
            )
            .await?;
        Ok(response.messages.into_iter().map(into_lease).collect())
    }

    pub async fn change_visibility(&self, queue: &str, receipt_handle: &str, secs: u64) -> Result<(), MqError> {
        let url = self.queue_url(queue).await?;
        let _: Value = self
            .call(
                "ChangeMessageVisibility",
                json!({ "QueueUrl": url, "ReceiptHandle": receipt_handle, "VisibilityTimeout": secs }),
                &Target::new(ObjectKind::Message, receipt_handle),
            )
            .await?;
        Ok(())
    }

    pub async fn delete(&self, queue: &str, receipt_handle: &str) -> Result<(), MqError> {
        let url = self.queue_url(queue).await?;
        let _: Value = self
            .call(
                "DeleteMessage",
                json!({ "QueueUrl": url, "ReceiptHandle": receipt_handle }),
                &Target::new(ObjectKind::Message, receipt_handle),
            )
            .await?;
        Ok(())
    }

    /// `Ok(false)` when a purge is already running on the queue.
    pub async fn purge(&self, queue: &str) -> Result<bool, MqError> {
        let url = self.queue_url(queue).await?;
        match self.try_call("PurgeQueue", &json!({ "QueueUrl": url })).await? {
            Ok(_) => Ok(true),
            Err(failure) if failure.is_purge_in_progress() => {
                warn!(queue, "purge already in progress");
                Ok(false)
            }
            Err(failure) => Err(failure.into_error(&Target::queue(queue))),
        }
    }
}

fn send_request(url: &str, queue: &str, body: &str, properties: Option<&PropertyMap>) -> Value {
    let mut request = Map::new();
    request.insert("QueueUrl".into(), json!(url));
    request.insert("MessageBody".into(), json!(body));

    let mut attributes = Map::new();
    let mut group_id = None;
    let mut dedup_id = None;
    for (key, value) in properties.into_iter().flatten() {
        match key.as_str() {
            "MessageGroupId" => group_id = Some(plain(value)),
            "MessageDeduplicationId" => dedup_id = Some(plain(value)),
            "DelaySeconds" if value.is_u64() => {
                request.insert("DelaySeconds".into(), value.clone());
            }
            _ => {
                let data_type = if value.is_number() { "Number" } else { "String" };
                attributes.insert(
                    key.clone(),
                    json!({ "DataType": data_type, "StringValue": plain(value) }),
                );
            }
        }
    }
    if !attributes.is_empty() {
        request.insert("MessageAttributes".into(), Value::Object(attributes));
    }
    if is_fifo(queue) {
        request.insert("MessageGroupId".into(), json!(group_id.unwrap_or_else(|| "mqlens".into())));
        request.insert(
            "MessageDeduplicationId".into(),
            json!(dedup_id.unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string())),
        );
    }
    Value::Object(request)
}

/// A property value as attribute text; strings lose their JSON quotes.
fn plain(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn into_lease(received: ReceivedMessage) -> ReceiptLease {
    let timestamp = received
        .attributes
        .get("SentTimestamp")
        .and_then(|ms| ms.parse::<i64>().ok())
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single());

    let mut properties: PropertyMap = received
        .attributes
        .into_iter()
        .map(|(k, v)| (k, Value::from(v)))
        .collect();
    let mut correlation_id = None;
    for (name, attr) in received.message_attributes {
        let Some(text) = attr.string_value else { continue };
        if name == CORRELATION_ATTRIBUTE {
            correlation_id = Some(text);
            continue;
        }
        let value = if attr.data_type.starts_with("Number") {
            serde_json::from_str(&text).unwrap_or(Value::from(text))
        } else {
            Value::from(text)
        };
        properties.insert(name, value);
    }

    ReceiptLease {
        message: Message {
            id: received.message_id,
            correlation_id,
            timestamp,
            payload: received.body.into_bytes(),
            properties,
        },
        receipt_handle: received.receipt_handle,
    }
}

/// Visibility-timeout leases on one queue.
pub struct QueueLeases<'a> {
    pub session: &'a SqsSession,
    pub queue: &'a str,
    pub visibility_secs: u64,
    pub wait_secs: u64,
}

#[async_trait]
impl LeaseSource for QueueLeases<'_> {
    type Lease = ReceiptLease;

    async fn lease_batch(&self, max: usize) -> Result<Vec<ReceiptLease>, MqError> {
        self.session
            .receive(self.queue, max, self.visibility_secs, self.wait_secs)
            .await
    }

    fn message<'b>(&self, lease: &'b ReceiptLease) -> &'b Message {
        &lease.message
    }

    async fn release(&self, lease: ReceiptLease) -> Result<(), MqError> {
        self.session
            .change_visibility(self.queue, &lease.receipt_handle, 0)
            .await
    }

    async fn remove(&self, lease: ReceiptLease) -> Result<(), MqError> {
        self.session.delete(self.queue, &lease.receipt_handle).await
    }
}
