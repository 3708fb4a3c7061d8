// SPDX-FileCopyrightText: 2026 mqlens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! ActiveMQ Classic adapter for mqlens.
//!
//! Every operation is a Jolokia read or exec against the broker's JMX MBeans.
//! Browsing walks the queue's `browse()` snapshot, which the broker caps at
//! its `maxBrowsePageSize` (400 by default). Deletion uses `removeMessage`,
//! clearing uses `purge()`.

pub mod client;
pub mod types;

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use mqlens_browse::{MessageCursor, browse_with_cursor, delete_each_native};
use mqlens_core::filter::retain_matching;
use mqlens_core::profile::ActiveMqParams;
use mqlens_core::{
    AdapterFactory, AdapterSettings, BrowseOptions, ConnectionParams, Message, MessagingProvider,
    MqError, ObjectKind, PropertyMap, ProviderType, QueueInfo, QueueProperties, SessionCell,
    TopicInfo, TopicOperations, TopicProperties, bounded,
};
use mqlens_http::RestClient;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::client::{Destination, JolokiaSession};
use crate::types::browsed_message;

/// Advisory topics the broker creates for itself.
const ADVISORY_PREFIX: &str = "ActiveMQ.Advisory.";

const SEND_TEXT: &str = "sendTextMessage(java.util.Map,java.lang.String)";
const REMOVE_MESSAGE: &str = "removeMessage(java.lang.String)";

/// Jolokia endpoint for a profile.
pub fn jolokia_url(params: &ActiveMqParams) -> String {
    match &params.jolokia_url {
        Some(url) if !url.trim().is_empty() => url.trim().to_string(),
        _ => format!("http://{}:8161/api/jolokia", params.host),
    }
}

/// The origin Jolokia's CORS check expects for requests to `url`.
fn origin_of(url: &str) -> Result<String, MqError> {
    let parsed = url::Url::parse(url)
        .map_err(|e| MqError::InvalidProfile(format!("invalid Jolokia URL `{url}`: {e}")))?;
    Ok(parsed.origin().ascii_serialization())
}

/// Forward-only view over a `browse()` snapshot.
struct BrowseCursor {
    pending: VecDeque<Value>,
}

#[async_trait]
impl MessageCursor for BrowseCursor {
    async fn next_message(&mut self) -> Result<Option<Message>, MqError> {
        self.pending.pop_front().map(|v| browsed_message(&v)).transpose()
    }

    async fn skip(&mut self, n: usize) -> Result<usize, MqError> {
        let skipped = n.min(self.pending.len());
        self.pending.drain(..skipped);
        Ok(skipped)
    }

    async fn close(&mut self) -> Result<(), MqError> {
        self.pending.clear();
        Ok(())
    }
}

fn u64_attr(attrs: &Map<String, Value>, key: &str) -> Option<u64> {
    attrs.get(key).and_then(Value::as_u64)
}

fn to_property_map(attrs: Map<String, Value>) -> PropertyMap {
    attrs
        .into_iter()
        .filter(|(_, v)| !v.is_null())
        .collect()
}

pub struct ActiveMqAdapter {
    settings: AdapterSettings,
    session: SessionCell<JolokiaSession>,
}

impl ActiveMqAdapter {
    pub fn new(settings: AdapterSettings) -> Self {
        Self {
            settings,
            session: SessionCell::new(),
        }
    }

    /// Sends a text message through a destination MBean.
    async fn send_text(
        session: &JolokiaSession,
        destination: Destination,
        name: &str,
        payload: &[u8],
        properties: Option<&PropertyMap>,
    ) -> Result<(), MqError> {
        let text = std::str::from_utf8(payload).map_err(|_| {
            MqError::unsupported(ProviderType::ActiveMq, "sending a non-UTF-8 payload")
        })?;
        let headers: Map<String, Value> = properties
            .into_iter()
            .flatten()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        session
            .exec(
                destination,
                name,
                SEND_TEXT,
                vec![Value::Object(headers), Value::from(text)],
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl MessagingProvider for ActiveMqAdapter {
    fn provider_type(&self) -> ProviderType {
        ProviderType::ActiveMq
    }

    async fn connect(&self, params: &ConnectionParams) -> Result<(), MqError> {
        let ConnectionParams::ActiveMq(params) = params else {
            return Err(MqError::InvalidProfile(format!(
                "expected activemq parameters, got {}",
                params.provider_type()
            )));
        };
        let url = jolokia_url(params);
        let rest = RestClient::builder(url.clone())
            .basic_auth(params.username.as_deref(), params.password.as_deref())
            .timeout(self.settings.operation_timeout)
            .header("origin", &origin_of(&url)?)?
            .build()?;
        let session = JolokiaSession::new(rest, &params.broker_name);
        let version = bounded(self.settings.connect_timeout, session.broker_version()).await?;
        info!(broker = %params.broker_name, version = %version, "connected to ActiveMQ");
        self.session.install(session).await;
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), MqError> {
        if self.session.take().await.is_some() {
            debug!("ActiveMQ session closed");
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    async fn list_queues(&self, filter: Option<&str>) -> Result<Vec<QueueInfo>, MqError> {
        let session = self.session.lock().await?;
        let mut queues: Vec<QueueInfo> = session
            .destinations(Destination::Queue, &["QueueSize", "ConsumerCount"])
            .await?
            .into_iter()
            .map(|(name, attrs)| {
                let mut info = QueueInfo::new(name);
                info.depth = u64_attr(&attrs, "QueueSize");
                if let Some(consumers) = attrs.get("ConsumerCount") {
                    info.attributes
                        .insert("consumerCount".into(), consumers.clone());
                }
                info
            })
            .collect();
        retain_matching(&mut queues, filter, |q| &q.name);
        Ok(queues)
    }

    async fn get_queue_properties(&self, queue: &str) -> Result<QueueProperties, MqError> {
        let session = self.session.lock().await?;
        let attrs = session.attributes(Destination::Queue, queue).await?;
        Ok(QueueProperties {
            name: queue.to_string(),
            depth: u64_attr(&attrs, "QueueSize"),
            max_depth: None,
            durable: None,
            consumer_count: u64_attr(&attrs, "ConsumerCount"),
            description: None,
            attributes: to_property_map(attrs),
        })
    }

    async fn get_queue_depth(&self, queue: &str) -> Result<u64, MqError> {
        let session = self.session.lock().await?;
        let attrs = session.attributes(Destination::Queue, queue).await?;
        Ok(u64_attr(&attrs, "QueueSize").unwrap_or(0))
    }

    async fn browse_messages(
        &self,
        queue: &str,
        options: &BrowseOptions,
    ) -> Result<Vec<Message>, MqError> {
        let session = self.session.lock().await?;
        let snapshot = session
            .exec(Destination::Queue, queue, "browse()", Vec::new())
            .await?;
        let pending = match snapshot {
            Value::Array(items) => items.into(),
            Value::Null => VecDeque::new(),
            other => {
                return Err(MqError::transport_msg(format!(
                    "jolokia: browse() returned {other}"
                )));
            }
        };
        if pending.len() < options.start_position.saturating_add(options.limit) {
            note_browse_cap(&session, queue, pending.len()).await;
        }
        let mut cursor = BrowseCursor { pending };
        browse_with_cursor(&mut cursor, options).await
    }

    async fn put_message(
        &self,
        queue: &str,
        payload: &[u8],
        properties: Option<&PropertyMap>,
    ) -> Result<(), MqError> {
        let session = self.session.lock().await?;
        // Sending creates missing queues, so check first.
        session.attributes(Destination::Queue, queue).await?;
        Self::send_text(&session, Destination::Queue, queue, payload, properties).await
    }

    async fn delete_message(&self, queue: &str, message_id: &str) -> Result<(), MqError> {
        let session = self.session.lock().await?;
        remove_message(&session, queue, message_id).await
    }

    async fn delete_messages(&self, queue: &str, message_ids: &[String]) -> Result<usize, MqError> {
        let session = self.session.lock().await?;
        let session = &*session;
        delete_each_native(message_ids, |id| async move {
            remove_message(session, queue, &id).await
        })
        .await?
        .into_result()
    }

    async fn clear_queue(&self, queue: &str) -> Result<(), MqError> {
        let session = self.session.lock().await?;
        session
            .exec(Destination::Queue, queue, "purge()", Vec::new())
            .await?;
        Ok(())
    }

    fn topics(&self) -> Option<&dyn TopicOperations> {
        Some(self)
    }
}

/// Logs when the snapshot came back shorter than the queue, i.e. the broker's
/// `maxBrowsePageSize` cut the page short. Best effort.
async fn note_browse_cap(session: &JolokiaSession, queue: &str, snapshot: usize) {
    let Ok(attrs) = session.attributes(Destination::Queue, queue).await else {
        return;
    };
    if let Some(depth) = u64_attr(&attrs, "QueueSize")
        && depth > snapshot as u64
    {
        debug!(queue, depth, snapshot, "browse snapshot truncated by maxBrowsePageSize");
    }
}

async fn remove_message(session: &JolokiaSession, queue: &str, message_id: &str) -> Result<(), MqError> {
    let removed = session
        .exec(
            Destination::Queue,
            queue,
            REMOVE_MESSAGE,
            vec![Value::from(message_id)],
        )
        .await?;
    if removed.as_bool() == Some(true) {
        Ok(())
    } else {
        Err(MqError::not_found(ObjectKind::Message, message_id))
    }
}

#[async_trait]
impl TopicOperations for ActiveMqAdapter {
    async fn list_topics(&self, filter: Option<&str>) -> Result<Vec<TopicInfo>, MqError> {
        let session = self.session.lock().await?;
        let mut topics: Vec<TopicInfo> = session
            .destinations(Destination::Topic, &["ConsumerCount"])
            .await?
            .into_iter()
            .filter(|(name, _)| !name.starts_with(ADVISORY_PREFIX))
            .map(|(name, _)| TopicInfo {
                name,
                topic_string: None,
            })
            .collect();
        retain_matching(&mut topics, filter, |t| &t.name);
        Ok(topics)
    }

    async fn get_topic_properties(&self, topic: &str) -> Result<TopicProperties, MqError> {
        let session = self.session.lock().await?;
        let attrs = session.attributes(Destination::Topic, topic).await?;
        Ok(TopicProperties {
            name: topic.to_string(),
            topic_string: None,
            subscription_count: u64_attr(&attrs, "ConsumerCount"),
            partition_count: None,
            attributes: to_property_map(attrs),
        })
    }

    async fn publish_message(
        &self,
        topic: &str,
        payload: &[u8],
        properties: Option<&PropertyMap>,
    ) -> Result<(), MqError> {
        let session = self.session.lock().await?;
        session.attributes(Destination::Topic, topic).await?;
        Self::send_text(&session, Destination::Topic, topic, payload, properties).await
    }
}

/// Builds [`ActiveMqAdapter`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct ActiveMqFactory;

impl AdapterFactory for ActiveMqFactory {
    fn provider_type(&self) -> ProviderType {
        ProviderType::ActiveMq
    }

    fn create(&self, settings: &AdapterSettings) -> Result<Arc<dyn MessagingProvider>, MqError> {
        Ok(Arc::new(ActiveMqAdapter::new(settings.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_jolokia_url_uses_web_console_port() {
        let params = ActiveMqParams {
            host: "amq".into(),
            ..ActiveMqParams::default()
        };
        assert_eq!(jolokia_url(&params), "http://amq:8161/api/jolokia");
        assert_eq!(origin_of(&jolokia_url(&params)).unwrap(), "http://amq:8161");
    }

    #[tokio::test]
    async fn cursor_skip_does_not_decode() {
        let mut cursor = BrowseCursor {
            pending: vec![Value::Null, Value::Null, serde_json::json!({"JMSMessageID": "ID:3"})].into(),
        };
        assert_eq!(cursor.skip(2).await.unwrap(), 2);
        assert_eq!(cursor.next_message().await.unwrap().unwrap().id, "ID:3");
        assert!(cursor.next_message().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn not_connected_before_connect() {
        let adapter = ActiveMqAdapter::new(AdapterSettings::default());
        assert!(matches!(
            adapter.clear_queue("q").await,
            Err(MqError::NotConnected)
        ));
    }
}
