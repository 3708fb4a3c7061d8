// SPDX-FileCopyrightText: 2026 mqlens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! RabbitMQ adapter for mqlens.
//!
//! Talks to the management HTTP API. RabbitMQ has no non-destructive read and
//! no delete-by-id, so browse and delete use drain-and-replay through a
//! temporary holding queue. Topic exchanges are exposed as topics.

pub mod client;
pub mod types;

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use mqlens_browse::{browse_by_drain, delete_by_drain};
use mqlens_core::filter::retain_matching;
use mqlens_core::profile::RabbitMqParams;
use mqlens_core::{
    AdapterFactory, AdapterSettings, BrowseOptions, ConnectionParams, Message, MessagingProvider,
    MqError, ObjectKind, PropertyMap, ProviderType, QueueInfo, QueueProperties, SessionCell,
    TopicInfo, TopicOperations, TopicProperties, bounded,
};
use mqlens_http::RestClient;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::client::RabbitSession;
use crate::types::publish_properties;

/// Management API base URL for a profile.
pub fn management_base_url(params: &RabbitMqParams) -> String {
    match &params.management_url {
        Some(url) if !url.trim().is_empty() => url.trim().to_string(),
        _ => {
            let scheme = if params.use_tls { "https" } else { "http" };
            format!("{scheme}://{}:{}", params.host, params.management_port)
        }
    }
}

pub struct RabbitMqAdapter {
    settings: AdapterSettings,
    session: SessionCell<RabbitSession>,
}

impl RabbitMqAdapter {
    pub fn new(settings: AdapterSettings) -> Self {
        Self {
            settings,
            session: SessionCell::new(),
        }
    }
}

#[async_trait]
impl MessagingProvider for RabbitMqAdapter {
    fn provider_type(&self) -> ProviderType {
        ProviderType::RabbitMq
    }

    async fn connect(&self, params: &ConnectionParams) -> Result<(), MqError> {
        let ConnectionParams::RabbitMq(params) = params else {
            return Err(MqError::InvalidProfile(format!(
                "expected rabbitmq parameters, got {}",
                params.provider_type()
            )));
        };
        let rest = RestClient::builder(management_base_url(params))
            .basic_auth(params.username.as_deref(), params.password.as_deref())
            .timeout(self.settings.operation_timeout)
            .build()?;
        let session = RabbitSession::new(rest, params.vhost.clone());

        let overview = bounded(self.settings.connect_timeout, async {
            let overview = session.overview().await?;
            session.check_vhost().await?;
            Ok(overview)
        })
        .await?;
        info!(
            host = %params.host,
            vhost = %params.vhost,
            version = overview.rabbitmq_version.as_deref().unwrap_or("unknown"),
            "connected to RabbitMQ"
        );
        self.session.install(session).await;
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), MqError> {
        if self.session.take().await.is_some() {
            debug!("RabbitMQ session closed");
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    async fn list_queues(&self, filter: Option<&str>) -> Result<Vec<QueueInfo>, MqError> {
        let session = self.session.lock().await?;
        let mut queues: Vec<QueueInfo> = session
            .queues()
            .await?
            .into_iter()
            .filter(|q| !self.settings.is_holding_queue(&q.name))
            .map(|q| {
                let mut info = QueueInfo::new(q.name).with_depth(q.messages.unwrap_or(0));
                if let Some(kind) = q.queue_type {
                    info.attributes.insert("type".into(), Value::String(kind));
                }
                info
            })
            .collect();
        retain_matching(&mut queues, filter, |q| &q.name);
        Ok(queues)
    }

    async fn get_queue_properties(&self, queue: &str) -> Result<QueueProperties, MqError> {
        let session = self.session.lock().await?;
        let record = session.queue(queue).await?;
        let mut attributes: PropertyMap = record.arguments.into_iter().collect();
        attributes.insert("autoDelete".into(), Value::Bool(record.auto_delete));
        for (key, value) in [
            ("state", record.state.map(Value::String)),
            ("type", record.queue_type.map(Value::String)),
            ("messagesReady", record.messages_ready.map(Value::from)),
            (
                "messagesUnacknowledged",
                record.messages_unacknowledged.map(Value::from),
            ),
        ] {
            if let Some(value) = value {
                attributes.insert(key.into(), value);
            }
        }
        let max_depth = attributes.get("x-max-length").and_then(Value::as_u64);
        Ok(QueueProperties {
            name: record.name,
            depth: Some(record.messages.unwrap_or(0)),
            max_depth,
            durable: Some(record.durable),
            consumer_count: record.consumers,
            description: None,
            attributes,
        })
    }

    async fn get_queue_depth(&self, queue: &str) -> Result<u64, MqError> {
        let session = self.session.lock().await?;
        Ok(session.queue(queue).await?.messages.unwrap_or(0))
    }

    async fn browse_messages(
        &self,
        queue: &str,
        options: &BrowseOptions,
    ) -> Result<Vec<Message>, MqError> {
        let session = self.session.lock().await?;
        // Fail fast on a missing queue before any holding queue exists.
        session.queue(queue).await?;
        browse_by_drain(&*session, queue, options, &self.settings).await
    }

    async fn put_message(
        &self,
        queue: &str,
        payload: &[u8],
        properties: Option<&PropertyMap>,
    ) -> Result<(), MqError> {
        let session = self.session.lock().await?;
        let properties = publish_properties(properties);
        session
            .send_to_queue(queue, &properties, &STANDARD.encode(payload), "base64")
            .await
    }

    async fn delete_message(&self, queue: &str, message_id: &str) -> Result<(), MqError> {
        let session = self.session.lock().await?;
        session.queue(queue).await?;
        delete_by_drain(&*session, queue, &[message_id.to_string()], &self.settings)
            .await?
            .into_single(message_id)
    }

    async fn delete_messages(&self, queue: &str, message_ids: &[String]) -> Result<usize, MqError> {
        let session = self.session.lock().await?;
        session.queue(queue).await?;
        delete_by_drain(&*session, queue, message_ids, &self.settings)
            .await?
            .into_result()
    }

    async fn clear_queue(&self, queue: &str) -> Result<(), MqError> {
        let session = self.session.lock().await?;
        session.purge(queue).await
    }

    fn topics(&self) -> Option<&dyn TopicOperations> {
        Some(self)
    }
}

#[async_trait]
impl TopicOperations for RabbitMqAdapter {
    async fn list_topics(&self, filter: Option<&str>) -> Result<Vec<TopicInfo>, MqError> {
        let session = self.session.lock().await?;
        let mut topics: Vec<TopicInfo> = session
            .exchanges()
            .await?
            .into_iter()
            .filter(|e| e.kind == "topic")
            .map(|e| TopicInfo {
                name: e.name,
                topic_string: None,
            })
            .collect();
        retain_matching(&mut topics, filter, |t| &t.name);
        Ok(topics)
    }

    async fn get_topic_properties(&self, topic: &str) -> Result<TopicProperties, MqError> {
        let session = self.session.lock().await?;
        let exchange = session.exchange(topic).await?;
        if exchange.kind != "topic" {
            return Err(MqError::not_found(ObjectKind::Topic, topic));
        }
        let bindings = session.exchange_bindings(topic).await?;
        let mut attributes: PropertyMap = exchange.arguments.into_iter().collect();
        attributes.insert("durable".into(), Value::Bool(exchange.durable));
        attributes.insert("autoDelete".into(), Value::Bool(exchange.auto_delete));
        attributes.insert("internal".into(), Value::Bool(exchange.internal));
        Ok(TopicProperties {
            name: exchange.name,
            topic_string: None,
            subscription_count: Some(bindings.len() as u64),
            partition_count: None,
            attributes,
        })
    }

    /// The routing key comes from a `routingKey` property and defaults to
    /// empty. A message no binding matches is dropped by the broker.
    async fn publish_message(
        &self,
        topic: &str,
        payload: &[u8],
        properties: Option<&PropertyMap>,
    ) -> Result<(), MqError> {
        let session = self.session.lock().await?;
        let mut properties = properties.cloned().unwrap_or_default();
        let routing_key = match properties.remove("routingKey") {
            Some(Value::String(key)) => key,
            Some(other) => other.to_string(),
            None => String::new(),
        };
        let amqp = publish_properties(Some(&properties));
        let routed = session
            .publish(topic, &routing_key, &amqp, &STANDARD.encode(payload), "base64")
            .await?;
        if !routed {
            warn!(topic, routing_key = %routing_key, "published message matched no binding");
        }
        Ok(())
    }
}

/// Builds [`RabbitMqAdapter`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct RabbitMqFactory;

impl AdapterFactory for RabbitMqFactory {
    fn provider_type(&self) -> ProviderType {
        ProviderType::RabbitMq
    }

    fn create(&self, settings: &AdapterSettings) -> Result<Arc<dyn MessagingProvider>, MqError> {
        Ok(Arc::new(RabbitMqAdapter::new(settings.clone())))
    }
}
