// SPDX-FileCopyrightText: 2026 mqlens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory broker implementing the full provider interface.
//!
//! Queues, topics and channels live in a [`BrokerState`] that is shared
//! between every adapter a [`MockFactory`] creates, so tests can seed state
//! before connecting and inspect it afterwards.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use mqlens_browse::{MessageCursor, browse_with_cursor, delete_each_native};
use mqlens_core::filter::retain_matching;
use mqlens_core::{
    AdapterFactory, AdapterSettings, BrowseOptions, ChannelInfo, ChannelOperations,
    ChannelProperties, ChannelStatus, ConnectionParams, Message, MessagingProvider, MqError,
    ObjectKind, PropertyMap, ProviderType, QueueInfo, QueueProperties, TopicInfo,
    TopicOperations, TopicProperties,
};

/// Broker contents shared by every adapter of one factory.
#[derive(Debug, Default)]
pub struct BrokerState {
    queues: Mutex<BTreeMap<String, VecDeque<Message>>>,
    topics: Mutex<BTreeMap<String, Vec<Message>>>,
    channels: Mutex<BTreeMap<String, ChannelStatus>>,
    last_params: Mutex<Option<ConnectionParams>>,
    next_id: AtomicUsize,
    depth_reads: AtomicUsize,
}

impl BrokerState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Creates `queue` holding one text message per id, payload `body-<id>`.
    pub fn seed(&self, queue: &str, ids: &[&str]) {
        let messages = ids
            .iter()
            .map(|id| Message::new(*id, format!("body-{id}").into_bytes()))
            .collect();
        lock(&self.queues).insert(queue.to_string(), messages);
    }

    pub fn add_topic(&self, topic: &str) {
        lock(&self.topics).entry(topic.to_string()).or_default();
    }

    pub fn add_channel(&self, channel: &str, status: ChannelStatus) {
        lock(&self.channels).insert(channel.to_string(), status);
    }

    pub fn depth(&self, queue: &str) -> Option<usize> {
        lock(&self.queues).get(queue).map(VecDeque::len)
    }

    pub fn ids(&self, queue: &str) -> Vec<String> {
        lock(&self.queues)
            .get(queue)
            .map(|q| q.iter().map(|m| m.id.clone()).collect())
            .unwrap_or_default()
    }

    pub fn published(&self, topic: &str) -> Vec<Message> {
        lock(&self.topics).get(topic).cloned().unwrap_or_default()
    }

    pub fn channel_status(&self, channel: &str) -> Option<ChannelStatus> {
        lock(&self.channels).get(channel).copied()
    }

    /// Parameters of the most recent successful connect, secrets included.
    pub fn last_params(&self) -> Option<ConnectionParams> {
        lock(&self.last_params).clone()
    }

    /// How many depth queries have reached any adapter.
    pub fn depth_reads(&self) -> usize {
        self.depth_reads.load(Ordering::SeqCst)
    }

    fn fresh_id(&self) -> String {
        format!("MSG{:04}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|p| p.into_inner())
}

/// Knobs for fault injection.
#[derive(Debug, Clone, Default)]
pub struct BrokerOptions {
    /// Sleep inside `connect`, widening race windows.
    pub connect_delay: Option<Duration>,
    /// `connect` fails with a transport error.
    pub failing_connect: bool,
    /// `disconnect` tears the session down but reports a transport error.
    pub failing_disconnect: bool,
    /// Depth queries fail after connecting.
    pub depth_fails: bool,
    /// Omit the topic capability.
    pub without_topics: bool,
    /// Omit the channel capability.
    pub without_channels: bool,
    /// Report topics as readable queues, the way Kafka does.
    pub topics_as_queues: bool,
}

/// A [`MessagingProvider`] over [`BrokerState`].
#[derive(Debug)]
pub struct InMemoryBroker {
    provider: ProviderType,
    state: Arc<BrokerState>,
    options: BrokerOptions,
    connected: AtomicBool,
    disconnects: AtomicUsize,
}

impl InMemoryBroker {
    pub fn new(provider: ProviderType, state: Arc<BrokerState>, options: BrokerOptions) -> Self {
        Self {
            provider,
            state,
            options,
            connected: AtomicBool::new(false),
            disconnects: AtomicUsize::new(0),
        }
    }

    pub fn disconnect_count(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    fn ensure_connected(&self) -> Result<(), MqError> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(MqError::NotConnected)
        }
    }

    fn with_queue<T>(
        &self,
        queue: &str,
        f: impl FnOnce(&mut VecDeque<Message>) -> T,
    ) -> Result<T, MqError> {
        self.ensure_connected()?;
        let mut queues = lock(&self.state.queues);
        let messages = queues
            .get_mut(queue)
            .ok_or_else(|| MqError::not_found(ObjectKind::Queue, queue))?;
        Ok(f(messages))
    }
}

/// Browse cursor over a snapshot of one queue.
struct SnapshotCursor {
    messages: VecDeque<Message>,
}

#[async_trait]
impl MessageCursor for SnapshotCursor {
    async fn next_message(&mut self) -> Result<Option<Message>, MqError> {
        Ok(self.messages.pop_front())
    }

    async fn skip(&mut self, n: usize) -> Result<usize, MqError> {
        let skipped = n.min(self.messages.len());
        self.messages.drain(..skipped);
        Ok(skipped)
    }

    async fn close(&mut self) -> Result<(), MqError> {
        self.messages.clear();
        Ok(())
    }
}

#[async_trait]
impl MessagingProvider for InMemoryBroker {
    fn provider_type(&self) -> ProviderType {
        self.provider
    }

    async fn connect(&self, params: &ConnectionParams) -> Result<(), MqError> {
        if let Some(delay) = self.options.connect_delay {
            tokio::time::sleep(delay).await;
        }
        if self.options.failing_connect {
            return Err(MqError::transport_msg("connection refused"));
        }
        *lock(&self.state.last_params) = Some(params.clone());
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), MqError> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
        if self.options.failing_disconnect {
            return Err(MqError::transport_msg("socket already dead"));
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn list_queues(&self, filter: Option<&str>) -> Result<Vec<QueueInfo>, MqError> {
        self.ensure_connected()?;
        let mut queues: Vec<QueueInfo> = lock(&self.state.queues)
            .iter()
            .map(|(name, messages)| QueueInfo::new(name).with_depth(messages.len() as u64))
            .collect();
        retain_matching(&mut queues, filter, |q| &q.name);
        Ok(queues)
    }

    async fn get_queue_properties(&self, queue: &str) -> Result<QueueProperties, MqError> {
        let depth = self.with_queue(queue, |m| m.len() as u64)?;
        Ok(QueueProperties {
            name: queue.to_string(),
            depth: Some(depth),
            durable: Some(true),
            ..QueueProperties::default()
        })
    }

    async fn get_queue_depth(&self, queue: &str) -> Result<u64, MqError> {
        self.state.depth_reads.fetch_add(1, Ordering::SeqCst);
        if self.options.depth_fails {
            return Err(MqError::transport_msg("depth unavailable"));
        }
        self.with_queue(queue, |m| m.len() as u64)
    }

    async fn browse_messages(
        &self,
        queue: &str,
        options: &BrowseOptions,
    ) -> Result<Vec<Message>, MqError> {
        let messages = self.with_queue(queue, |m| m.clone())?;
        browse_with_cursor(&mut SnapshotCursor { messages }, options).await
    }

    async fn put_message(
        &self,
        queue: &str,
        payload: &[u8],
        properties: Option<&PropertyMap>,
    ) -> Result<(), MqError> {
        let mut message = Message::new(self.state.fresh_id(), payload.to_vec());
        if let Some(properties) = properties {
            message.properties = properties.clone();
        }
        self.with_queue(queue, |m| m.push_back(message))
    }

    async fn delete_message(&self, queue: &str, message_id: &str) -> Result<(), MqError> {
        let removed = self.with_queue(queue, |m| {
            m.iter()
                .position(|msg| msg.id == message_id)
                .and_then(|at| m.remove(at))
        })?;
        match removed {
            Some(_) => Ok(()),
            None => Err(MqError::not_found(ObjectKind::Message, message_id)),
        }
    }

    async fn delete_messages(&self, queue: &str, message_ids: &[String]) -> Result<usize, MqError> {
        self.with_queue(queue, |_| ())?;
        let outcome =
            delete_each_native(message_ids, |id| async move { self.delete_message(queue, &id).await })
                .await?;
        outcome.into_result()
    }

    async fn clear_queue(&self, queue: &str) -> Result<(), MqError> {
        self.with_queue(queue, VecDeque::clear)
    }

    fn topics(&self) -> Option<&dyn TopicOperations> {
        if self.options.without_topics {
            None
        } else {
            Some(self)
        }
    }

    fn channels(&self) -> Option<&dyn ChannelOperations> {
        if self.options.without_channels {
            None
        } else {
            Some(self)
        }
    }
}

#[async_trait]
impl TopicOperations for InMemoryBroker {
    async fn list_topics(&self, filter: Option<&str>) -> Result<Vec<TopicInfo>, MqError> {
        self.ensure_connected()?;
        let mut topics: Vec<TopicInfo> = lock(&self.state.topics)
            .keys()
            .map(|name| TopicInfo {
                name: name.clone(),
                topic_string: Some(name.replace('.', "/")),
            })
            .collect();
        retain_matching(&mut topics, filter, |t| &t.name);
        Ok(topics)
    }

    async fn get_topic_properties(&self, topic: &str) -> Result<TopicProperties, MqError> {
        self.ensure_connected()?;
        if !lock(&self.state.topics).contains_key(topic) {
            return Err(MqError::not_found(ObjectKind::Topic, topic));
        }
        Ok(TopicProperties {
            name: topic.to_string(),
            topic_string: Some(topic.replace('.', "/")),
            subscription_count: Some(0),
            ..TopicProperties::default()
        })
    }

    async fn publish_message(
        &self,
        topic: &str,
        payload: &[u8],
        properties: Option<&PropertyMap>,
    ) -> Result<(), MqError> {
        self.ensure_connected()?;
        let mut message = Message::new(self.state.fresh_id(), payload.to_vec());
        if let Some(properties) = properties {
            message.properties = properties.clone();
        }
        lock(&self.state.topics)
            .get_mut(topic)
            .ok_or_else(|| MqError::not_found(ObjectKind::Topic, topic))?
            .push(message);
        Ok(())
    }

    fn topics_are_queues(&self) -> bool {
        self.options.topics_as_queues
    }
}

#[async_trait]
impl ChannelOperations for InMemoryBroker {
    async fn list_channels(&self, filter: Option<&str>) -> Result<Vec<ChannelInfo>, MqError> {
        self.ensure_connected()?;
        let mut channels: Vec<ChannelInfo> = lock(&self.state.channels)
            .iter()
            .map(|(name, status)| ChannelInfo {
                name: name.clone(),
                channel_type: Some("SVRCONN".into()),
                status: *status,
            })
            .collect();
        retain_matching(&mut channels, filter, |c| &c.name);
        Ok(channels)
    }

    async fn get_channel_properties(&self, channel: &str) -> Result<ChannelProperties, MqError> {
        self.ensure_connected()?;
        let status = self
            .state
            .channel_status(channel)
            .ok_or_else(|| MqError::not_found(ObjectKind::Channel, channel))?;
        Ok(ChannelProperties {
            name: channel.to_string(),
            channel_type: Some("SVRCONN".into()),
            status,
            connection_name: None,
            attributes: PropertyMap::new(),
        })
    }

    async fn start_channel(&self, channel: &str) -> Result<(), MqError> {
        self.set_channel(channel, ChannelStatus::Running)
    }

    async fn stop_channel(&self, channel: &str) -> Result<(), MqError> {
        self.set_channel(channel, ChannelStatus::Stopped)
    }
}

impl InMemoryBroker {
    fn set_channel(&self, channel: &str, status: ChannelStatus) -> Result<(), MqError> {
        self.ensure_connected()?;
        let mut channels = lock(&self.state.channels);
        let current = channels
            .get_mut(channel)
            .ok_or_else(|| MqError::not_found(ObjectKind::Channel, channel))?;
        *current = status;
        Ok(())
    }
}

/// [`AdapterFactory`] producing [`InMemoryBroker`]s over one shared state.
#[derive(Debug)]
pub struct MockFactory {
    provider: ProviderType,
    state: Arc<BrokerState>,
    options: BrokerOptions,
    created: Arc<AtomicUsize>,
}

impl MockFactory {
    pub fn new(provider: ProviderType, state: Arc<BrokerState>) -> Self {
        Self::with_options(provider, state, BrokerOptions::default())
    }

    pub fn with_options(
        provider: ProviderType,
        state: Arc<BrokerState>,
        options: BrokerOptions,
    ) -> Self {
        Self {
            provider,
            state,
            options,
            created: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Shared count of adapters created, readable after the factory has
    /// been moved into a registry.
    pub fn created_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.created)
    }
}

impl AdapterFactory for MockFactory {
    fn provider_type(&self) -> ProviderType {
        self.provider
    }

    fn create(&self, _settings: &AdapterSettings) -> Result<Arc<dyn MessagingProvider>, MqError> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(InMemoryBroker::new(
            self.provider,
            Arc::clone(&self.state),
            self.options.clone(),
        )))
    }
}
