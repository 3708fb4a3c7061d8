// SPDX-FileCopyrightText: 2026 mqlens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Kafka adapter for mqlens.
//!
//! Kafka has no queues, so every topic is presented both as a queue and as a
//! topic. A queue's depth is the number of retained records, summed over
//! partitions. Records cannot be removed individually: per-message delete is
//! unsupported, and clearing deletes records up to each partition's high
//! watermark.

pub mod cursor;
pub mod error;
pub mod record;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mqlens_browse::browse_with_cursor;
use mqlens_core::filter::retain_matching;
use mqlens_core::profile::KafkaParams;
use mqlens_core::{
    AdapterFactory, AdapterSettings, BrowseOptions, ConnectionParams, Message, MessagingProvider,
    MqError, ObjectKind, PropertyMap, ProviderType, QueueInfo, QueueProperties, SessionCell,
    TopicInfo, TopicOperations, TopicProperties, bounded,
};
use rskafka::client::partition::{Compression, OffsetAt, PartitionClient, UnknownTopicHandling};
use rskafka::client::{Client, ClientBuilder, SaslConfig};
use rskafka::record::RecordAndOffset;
use serde_json::Value;
use tracing::{debug, info};

use crate::cursor::{OffsetCursor, PartitionRange, RecordSource};
use crate::error::map_kafka_error;
use crate::record::{build_record, target_partition};

/// Largest fetch response requested per round trip.
const FETCH_MAX_BYTES: i32 = 1024 * 1024;

/// Topics the cluster keeps for itself, such as `__consumer_offsets`.
fn is_internal(topic: &str) -> bool {
    topic.starts_with("__")
}

struct KafkaSession {
    client: Client,
}

/// Partition clients for one topic plus the retained offset range of each.
struct TopicReader {
    topic: String,
    clients: BTreeMap<i32, PartitionClient>,
    ranges: Vec<PartitionRange>,
    max_wait_ms: i32,
}

impl TopicReader {
    fn depth(&self) -> u64 {
        self.ranges
            .iter()
            .map(|r| u64::try_from(r.end - r.start).unwrap_or(0))
            .sum()
    }
}

#[async_trait]
impl RecordSource for TopicReader {
    async fn fetch(&self, partition: i32, offset: i64) -> Result<Vec<RecordAndOffset>, MqError> {
        let client = self.clients.get(&partition).ok_or_else(|| {
            MqError::Internal(format!("no client for partition {partition} of `{}`", self.topic))
        })?;
        let (records, _high_watermark) = client
            .fetch_records(offset, 1..FETCH_MAX_BYTES, self.max_wait_ms)
            .await
            .map_err(|e| map_kafka_error(e, &self.topic))?;
        Ok(records)
    }
}

impl KafkaSession {
    async fn topic_names(&self) -> Result<Vec<String>, MqError> {
        let topics = self
            .client
            .list_topics()
            .await
            .map_err(|e| map_kafka_error(e, "*"))?;
        let mut names: Vec<String> = topics
            .into_iter()
            .map(|t| t.name)
            .filter(|name| !is_internal(name))
            .collect();
        names.sort();
        Ok(names)
    }

    async fn partitions(&self, topic: &str) -> Result<Vec<i32>, MqError> {
        let topics = self
            .client
            .list_topics()
            .await
            .map_err(|e| map_kafka_error(e, topic))?;
        topics
            .into_iter()
            .find(|t| t.name == topic)
            .map(|t| t.partitions.into_iter().collect())
            .ok_or_else(|| MqError::not_found(ObjectKind::Queue, topic))
    }

    async fn partition_client(&self, topic: &str, partition: i32) -> Result<PartitionClient, MqError> {
        self.client
            .partition_client(topic.to_owned(), partition, UnknownTopicHandling::Error)
            .await
            .map_err(|e| map_kafka_error(e, topic))
    }

    async fn reader(&self, topic: &str, receive_wait: Duration) -> Result<TopicReader, MqError> {
        let mut clients = BTreeMap::new();
        let mut ranges = Vec::new();
        for partition in self.partitions(topic).await? {
            let client = self.partition_client(topic, partition).await?;
            let start = client
                .get_offset(OffsetAt::Earliest)
                .await
                .map_err(|e| map_kafka_error(e, topic))?;
            let end = client
                .get_offset(OffsetAt::Latest)
                .await
                .map_err(|e| map_kafka_error(e, topic))?;
            ranges.push(PartitionRange {
                partition,
                start,
                end,
            });
            clients.insert(partition, client);
        }
        Ok(TopicReader {
            topic: topic.to_string(),
            clients,
            ranges,
            max_wait_ms: i32::try_from(receive_wait.as_millis()).unwrap_or(i32::MAX),
        })
    }

    async fn produce(
        &self,
        topic: &str,
        payload: &[u8],
        properties: Option<&PropertyMap>,
    ) -> Result<(), MqError> {
        let partitions = self.partitions(topic).await?;
        let partition = target_partition(properties, &partitions).ok_or_else(|| {
            MqError::not_found(ObjectKind::Queue, format!("{topic} (requested partition)"))
        })?;
        let client = self.partition_client(topic, partition).await?;
        let offsets = client
            .produce(vec![build_record(payload, properties)], Compression::NoCompression)
            .await
            .map_err(|e| map_kafka_error(e, topic))?;
        debug!(topic, partition, offsets = ?offsets, "record produced");
        Ok(())
    }
}

pub struct KafkaAdapter {
    settings: AdapterSettings,
    session: SessionCell<KafkaSession>,
}

impl KafkaAdapter {
    pub fn new(settings: AdapterSettings) -> Self {
        Self {
            settings,
            session: SessionCell::new(),
        }
    }

    fn client_builder(params: &KafkaParams) -> Result<ClientBuilder, MqError> {
        if params.brokers.is_empty() {
            return Err(MqError::InvalidProfile("no Kafka brokers configured".into()));
        }
        if params.use_tls {
            return Err(MqError::InvalidProfile(
                "TLS connections to Kafka are not supported".into(),
            ));
        }
        let mut builder = ClientBuilder::new(params.brokers.clone());
        match (&params.username, &params.password) {
            (Some(username), Some(password)) => {
                let mechanism = params.sasl_mechanism.as_deref().unwrap_or("PLAIN");
                if !mechanism.eq_ignore_ascii_case("PLAIN") {
                    return Err(MqError::InvalidProfile(format!(
                        "SASL mechanism `{mechanism}` is not supported; use PLAIN"
                    )));
                }
                builder = builder.sasl_config(SaslConfig::Plain {
                    username: username.clone(),
                    password: password.clone(),
                });
            }
            (None, None) => {}
            _ => {
                return Err(MqError::InvalidProfile(
                    "SASL authentication requires both username and password".into(),
                ));
            }
        }
        Ok(builder)
    }
}

#[async_trait]
impl MessagingProvider for KafkaAdapter {
    fn provider_type(&self) -> ProviderType {
        ProviderType::Kafka
    }

    async fn connect(&self, params: &ConnectionParams) -> Result<(), MqError> {
        let ConnectionParams::Kafka(params) = params else {
            return Err(MqError::InvalidProfile(format!(
                "expected kafka parameters, got {}",
                params.provider_type()
            )));
        };
        let builder = Self::client_builder(params)?;
        let client = bounded(self.settings.connect_timeout, async {
            builder.build().await.map_err(|e| {
                MqError::transport(format!("cannot reach Kafka brokers {:?}", params.brokers), e)
            })
        })
        .await?;
        let session = KafkaSession { client };
        // Metadata proves the credentials are accepted.
        let topics = bounded(self.settings.connect_timeout, session.topic_names()).await?;
        info!(brokers = ?params.brokers, topics = topics.len(), "connected to Kafka");
        self.session.install(session).await;
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), MqError> {
        if self.session.take().await.is_some() {
            debug!("Kafka client dropped");
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    async fn list_queues(&self, filter: Option<&str>) -> Result<Vec<QueueInfo>, MqError> {
        let session = self.session.lock().await?;
        let names = bounded(self.settings.operation_timeout, session.topic_names()).await?;
        let mut queues: Vec<QueueInfo> = names.into_iter().map(QueueInfo::new).collect();
        retain_matching(&mut queues, filter, |q| &q.name);
        Ok(queues)
    }

    async fn get_queue_properties(&self, queue: &str) -> Result<QueueProperties, MqError> {
        let session = self.session.lock().await?;
        let reader = bounded(
            self.settings.operation_timeout,
            session.reader(queue, self.settings.receive_wait),
        )
        .await?;
        let mut attributes = PropertyMap::new();
        attributes.insert("partitions".into(), Value::from(reader.ranges.len()));
        for range in &reader.ranges {
            attributes.insert(
                format!("partition.{}", range.partition),
                serde_json::json!({"earliest": range.start, "latest": range.end}),
            );
        }
        Ok(QueueProperties {
            name: queue.to_string(),
            depth: Some(reader.depth()),
            durable: Some(true),
            attributes,
            ..QueueProperties::default()
        })
    }

    async fn get_queue_depth(&self, queue: &str) -> Result<u64, MqError> {
        let session = self.session.lock().await?;
        let reader = bounded(
            self.settings.operation_timeout,
            session.reader(queue, self.settings.receive_wait),
        )
        .await?;
        Ok(reader.depth())
    }

    async fn browse_messages(
        &self,
        queue: &str,
        options: &BrowseOptions,
    ) -> Result<Vec<Message>, MqError> {
        let session = self.session.lock().await?;
        if options.limit == 0 {
            return Ok(Vec::new());
        }
        bounded(self.settings.operation_timeout, async {
            let reader = session.reader(queue, self.settings.receive_wait).await?;
            let mut cursor = OffsetCursor::new(&reader, reader.ranges.clone());
            browse_with_cursor(&mut cursor, options).await
        })
        .await
    }

    async fn put_message(
        &self,
        queue: &str,
        payload: &[u8],
        properties: Option<&PropertyMap>,
    ) -> Result<(), MqError> {
        let session = self.session.lock().await?;
        bounded(
            self.settings.operation_timeout,
            session.produce(queue, payload, properties),
        )
        .await
    }

    async fn delete_message(&self, _queue: &str, _message_id: &str) -> Result<(), MqError> {
        self.session.lock().await?;
        Err(MqError::unsupported(ProviderType::Kafka, "deleting individual records"))
    }

    async fn delete_messages(&self, _queue: &str, _message_ids: &[String]) -> Result<usize, MqError> {
        self.session.lock().await?;
        Err(MqError::unsupported(ProviderType::Kafka, "deleting individual records"))
    }

    async fn clear_queue(&self, queue: &str) -> Result<(), MqError> {
        let session = self.session.lock().await?;
        let timeout_ms = i32::try_from(self.settings.operation_timeout.as_millis()).unwrap_or(i32::MAX);
        bounded(self.settings.operation_timeout, async {
            let reader = session.reader(queue, self.settings.receive_wait).await?;
            for range in &reader.ranges {
                if range.start >= range.end {
                    continue;
                }
                if let Some(client) = reader.clients.get(&range.partition) {
                    client
                        .delete_records(range.end, timeout_ms)
                        .await
                        .map_err(|e| map_kafka_error(e, queue))?;
                    debug!(queue, partition = range.partition, upto = range.end, "records deleted");
                }
            }
            Ok(())
        })
        .await
    }

    fn topics(&self) -> Option<&dyn TopicOperations> {
        Some(self)
    }
}

#[async_trait]
impl TopicOperations for KafkaAdapter {
    async fn list_topics(&self, filter: Option<&str>) -> Result<Vec<TopicInfo>, MqError> {
        let session = self.session.lock().await?;
        let names = bounded(self.settings.operation_timeout, session.topic_names()).await?;
        let mut topics: Vec<TopicInfo> = names
            .into_iter()
            .map(|name| TopicInfo {
                name,
                topic_string: None,
            })
            .collect();
        retain_matching(&mut topics, filter, |t| &t.name);
        Ok(topics)
    }

    async fn get_topic_properties(&self, topic: &str) -> Result<TopicProperties, MqError> {
        let session = self.session.lock().await?;
        let partitions = bounded(self.settings.operation_timeout, session.partitions(topic))
            .await
            .map_err(|e| match e {
                MqError::ObjectNotFound { .. } => MqError::not_found(ObjectKind::Topic, topic),
                other => other,
            })?;
        Ok(TopicProperties {
            name: topic.to_string(),
            topic_string: None,
            subscription_count: None,
            partition_count: u32::try_from(partitions.len()).ok(),
            attributes: PropertyMap::new(),
        })
    }

    async fn publish_message(
        &self,
        topic: &str,
        payload: &[u8],
        properties: Option<&PropertyMap>,
    ) -> Result<(), MqError> {
        let session = self.session.lock().await?;
        bounded(
            self.settings.operation_timeout,
            session.produce(topic, payload, properties),
        )
        .await
    }

    fn topics_are_queues(&self) -> bool {
        true
    }
}

/// Builds [`KafkaAdapter`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct KafkaFactory;

impl AdapterFactory for KafkaFactory {
    fn provider_type(&self) -> ProviderType {
        ProviderType::Kafka
    }

    fn create(&self, settings: &AdapterSettings) -> Result<Arc<dyn MessagingProvider>, MqError> {
        Ok(Arc::new(KafkaAdapter::new(settings.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> KafkaParams {
        KafkaParams {
            brokers: vec!["localhost:9092".into()],
            ..KafkaParams::default()
        }
    }

    #[test]
    fn internal_topics_are_hidden() {
        assert!(is_internal("__consumer_offsets"));
        assert!(!is_internal("orders"));
    }

    #[test]
    fn profile_validation() {
        assert!(KafkaAdapter::client_builder(&params()).is_ok());

        let tls = KafkaParams {
            use_tls: true,
            ..params()
        };
        assert!(matches!(
            KafkaAdapter::client_builder(&tls),
            Err(MqError::InvalidProfile(_))
        ));

        let scram = KafkaParams {
            username: Some("u".into()),
            password: Some("p".into()),
            sasl_mechanism: Some("SCRAM-SHA-512".into()),
            ..params()
        };
        assert!(KafkaAdapter::client_builder(&scram).is_err());

        let half = KafkaParams {
            username: Some("u".into()),
            ..params()
        };
        assert!(KafkaAdapter::client_builder(&half).is_err());

        assert!(KafkaAdapter::client_builder(&KafkaParams::default()).is_err());
    }

    #[test]
    fn topics_double_as_queues() {
        let adapter = KafkaAdapter::new(AdapterSettings::default());
        assert!(adapter.topics_are_queues());
    }

    #[tokio::test]
    async fn operations_need_a_connection() {
        let adapter = KafkaAdapter::new(AdapterSettings::default());
        assert!(matches!(
            adapter.delete_message("t", "0:1").await,
            Err(MqError::NotConnected)
        ));
        assert!(matches!(
            adapter.list_queues(None).await,
            Err(MqError::NotConnected)
        ));
    }
}
