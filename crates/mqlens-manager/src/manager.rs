// SPDX-FileCopyrightText: 2026 mqlens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The connection manager.
//!
//! Owns the map of live adapters keyed by profile id and routes every broker
//! operation through it. Mutations re-read the queue depth afterwards and
//! announce the result on the [`EventBus`].

use std::sync::Arc;

use dashmap::DashMap;
use mqlens_bus::{BrokerEvent, EventBus, EventSubscription};
use mqlens_core::{
    AdapterSettings, BrowseOptions, ChannelInfo, ChannelOperations, ChannelProperties,
    ConnectionProfile, Message, MessagingProvider, MqError, PropertyMap, QueueInfo,
    QueueProperties, TopicInfo, TopicOperations, TopicProperties,
};
use mqlens_plugin::AdapterRegistry;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::profiles::ProfileBook;

type Adapter = Arc<dyn MessagingProvider>;

pub struct ConnectionManager {
    registry: Arc<AdapterRegistry>,
    settings: AdapterSettings,
    profiles: ProfileBook,
    bus: EventBus,
    live: DashMap<String, Adapter>,
    // One gate per profile id; connect and disconnect for an id never overlap.
    gates: DashMap<String, Arc<Mutex<()>>>,
}

impl ConnectionManager {
    pub fn new(
        registry: Arc<AdapterRegistry>,
        settings: AdapterSettings,
        profiles: ProfileBook,
        bus: EventBus,
    ) -> Self {
        Self {
            registry,
            settings,
            profiles,
            bus,
            live: DashMap::new(),
            gates: DashMap::new(),
        }
    }

    pub fn profiles(&self) -> &ProfileBook {
        &self.profiles
    }

    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    pub fn subscribe(&self) -> EventSubscription {
        self.bus.subscribe()
    }

    fn gate(&self, profile_id: &str) -> Arc<Mutex<()>> {
        Arc::clone(&*self.gates.entry(profile_id.to_string()).or_default())
    }

    // --- lifecycle ---

    /// Connects `profile_id`, or returns its live adapter if already
    /// connected. Concurrent calls for one id share a single adapter.
    pub async fn connect(&self, profile_id: &str) -> Result<Adapter, MqError> {
        if let Some(adapter) = self.get_provider(profile_id) {
            return Ok(adapter);
        }
        let gate = self.gate(profile_id);
        let _held = gate.lock().await;
        if let Some(adapter) = self.get_provider(profile_id) {
            return Ok(adapter);
        }

        let profile = match self.profiles.get_hydrated(profile_id).await {
            Ok(profile) => profile,
            Err(e) => {
                if matches!(e, MqError::ProfileNotFound(_)) {
                    self.gates.remove(profile_id);
                }
                return Err(e);
            }
        };
        let provider = profile.provider_type();
        let adapter = self.registry.create(provider, &self.settings)?;
        adapter.connect(&profile.params).await?;

        self.live.insert(profile_id.to_string(), Arc::clone(&adapter));
        info!(profile_id, name = %profile.name, %provider, "connected");
        Ok(adapter)
    }

    /// Drops the live adapter for `profile_id` and disconnects it. The entry
    /// is gone even when the adapter's disconnect fails.
    pub async fn disconnect(&self, profile_id: &str) -> Result<(), MqError> {
        let gate = self.gate(profile_id);
        let _held = gate.lock().await;
        self.disconnect_locked(profile_id).await
    }

    async fn disconnect_locked(&self, profile_id: &str) -> Result<(), MqError> {
        let Some((_, adapter)) = self.live.remove(profile_id) else {
            debug!(profile_id, "disconnect: not connected");
            return Ok(());
        };
        info!(profile_id, "disconnecting");
        adapter.disconnect().await
    }

    pub async fn disconnect_all(&self) {
        for profile_id in self.connected_profiles() {
            if let Err(e) = self.disconnect(&profile_id).await {
                warn!(profile_id = %profile_id, error = %e, "disconnect failed");
            }
        }
    }

    /// Disconnects the profile if live, then deletes it and its secrets.
    /// The profile's gate is held throughout, so no connect can slip in
    /// between the two steps.
    pub async fn delete_profile(&self, profile_id: &str) -> Result<ConnectionProfile, MqError> {
        self.profiles.get(profile_id).await?;
        let gate = self.gate(profile_id);
        let held = gate.lock().await;
        if let Err(e) = self.disconnect_locked(profile_id).await {
            warn!(profile_id, error = %e, "disconnect before delete failed");
        }
        let removed = self.profiles.remove(profile_id).await;
        self.gates.remove(profile_id);
        drop(held);
        removed
    }

    /// Number of per-profile gates currently held in the table.
    pub fn gate_count(&self) -> usize {
        self.gates.len()
    }

    // --- lookups ---

    pub fn get_provider(&self, profile_id: &str) -> Option<Adapter> {
        self.live.get(profile_id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn is_connected(&self, profile_id: &str) -> bool {
        self.live.contains_key(profile_id)
    }

    /// Ids of every live profile, sorted.
    pub fn connected_profiles(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.live.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn supports_topics(&self, profile_id: &str) -> bool {
        self.get_provider(profile_id)
            .is_some_and(|a| a.topics().is_some())
    }

    pub fn supports_channels(&self, profile_id: &str) -> bool {
        self.get_provider(profile_id)
            .is_some_and(|a| a.channels().is_some())
    }

    fn require(&self, profile_id: &str) -> Result<Adapter, MqError> {
        self.get_provider(profile_id).ok_or(MqError::NotConnected)
    }

    // --- queue reads ---

    pub async fn list_queues(
        &self,
        profile_id: &str,
        filter: Option<&str>,
    ) -> Result<Vec<QueueInfo>, MqError> {
        self.require(profile_id)?.list_queues(filter).await
    }

    pub async fn get_queue_properties(
        &self,
        profile_id: &str,
        queue: &str,
    ) -> Result<QueueProperties, MqError> {
        self.require(profile_id)?.get_queue_properties(queue).await
    }

    pub async fn get_queue_depth(&self, profile_id: &str, queue: &str) -> Result<u64, MqError> {
        self.require(profile_id)?.get_queue_depth(queue).await
    }

    pub async fn browse_messages(
        &self,
        profile_id: &str,
        queue: &str,
        options: &BrowseOptions,
    ) -> Result<Vec<Message>, MqError> {
        self.require(profile_id)?
            .browse_messages(queue, options)
            .await
    }

    // --- queue mutations ---

    pub async fn put_message(
        &self,
        profile_id: &str,
        queue: &str,
        payload: &[u8],
        properties: Option<&PropertyMap>,
    ) -> Result<(), MqError> {
        let adapter = self.require(profile_id)?;
        adapter.put_message(queue, payload, properties).await?;
        self.refresh_depth(profile_id, adapter.as_ref(), queue).await;
        Ok(())
    }

    pub async fn delete_message(
        &self,
        profile_id: &str,
        queue: &str,
        message_id: &str,
    ) -> Result<(), MqError> {
        let adapter = self.require(profile_id)?;
        adapter.delete_message(queue, message_id).await?;
        self.refresh_depth(profile_id, adapter.as_ref(), queue).await;
        Ok(())
    }

    /// Deletes `message_ids`. A `PartialFailure` is returned unchanged, but
    /// the depth is still refreshed since some deletions were committed.
    pub async fn delete_messages(
        &self,
        profile_id: &str,
        queue: &str,
        message_ids: &[String],
    ) -> Result<usize, MqError> {
        let adapter = self.require(profile_id)?;
        let result = adapter.delete_messages(queue, message_ids).await;
        if matches!(result, Ok(_) | Err(MqError::PartialFailure { .. })) {
            self.refresh_depth(profile_id, adapter.as_ref(), queue).await;
        }
        result
    }

    pub async fn clear_queue(&self, profile_id: &str, queue: &str) -> Result<(), MqError> {
        let adapter = self.require(profile_id)?;
        adapter.clear_queue(queue).await?;
        self.refresh_depth(profile_id, adapter.as_ref(), queue).await;
        Ok(())
    }

    /// Best effort: the mutation already succeeded, so a failed depth read
    /// only downgrades the event.
    async fn refresh_depth(&self, profile_id: &str, adapter: &dyn MessagingProvider, queue: &str) {
        let event = match adapter.get_queue_depth(queue).await {
            Ok(depth) => BrokerEvent::QueueDepthChanged {
                queue: queue.to_string(),
                depth,
            },
            Err(e) => {
                warn!(profile_id, queue, error = %e, "depth refresh failed");
                BrokerEvent::QueueUpdated {
                    queue: queue.to_string(),
                }
            }
        };
        self.bus.publish(profile_id, event);
    }

    // --- topics ---

    pub async fn list_topics(
        &self,
        profile_id: &str,
        filter: Option<&str>,
    ) -> Result<Vec<TopicInfo>, MqError> {
        let adapter = self.require(profile_id)?;
        topic_ops(adapter.as_ref())?.list_topics(filter).await
    }

    pub async fn get_topic_properties(
        &self,
        profile_id: &str,
        topic: &str,
    ) -> Result<TopicProperties, MqError> {
        let adapter = self.require(profile_id)?;
        topic_ops(adapter.as_ref())?.get_topic_properties(topic).await
    }

    pub async fn publish_message(
        &self,
        profile_id: &str,
        topic: &str,
        payload: &[u8],
        properties: Option<&PropertyMap>,
    ) -> Result<(), MqError> {
        let adapter = self.require(profile_id)?;
        let ops = topic_ops(adapter.as_ref())?;
        ops.publish_message(topic, payload, properties).await?;
        if ops.topics_are_queues() {
            self.refresh_depth(profile_id, adapter.as_ref(), topic).await;
        } else {
            debug!(profile_id, topic, "published; topic has no queue depth");
            self.bus.publish(
                profile_id,
                BrokerEvent::QueueUpdated {
                    queue: topic.to_string(),
                },
            );
        }
        Ok(())
    }

    // --- channels ---

    pub async fn list_channels(
        &self,
        profile_id: &str,
        filter: Option<&str>,
    ) -> Result<Vec<ChannelInfo>, MqError> {
        let adapter = self.require(profile_id)?;
        channel_ops(adapter.as_ref())?.list_channels(filter).await
    }

    pub async fn get_channel_properties(
        &self,
        profile_id: &str,
        channel: &str,
    ) -> Result<ChannelProperties, MqError> {
        let adapter = self.require(profile_id)?;
        channel_ops(adapter.as_ref())?
            .get_channel_properties(channel)
            .await
    }

    pub async fn start_channel(&self, profile_id: &str, channel: &str) -> Result<(), MqError> {
        let adapter = self.require(profile_id)?;
        channel_ops(adapter.as_ref())?.start_channel(channel).await?;
        info!(profile_id, channel, "channel start requested");
        Ok(())
    }

    pub async fn stop_channel(&self, profile_id: &str, channel: &str) -> Result<(), MqError> {
        let adapter = self.require(profile_id)?;
        channel_ops(adapter.as_ref())?.stop_channel(channel).await?;
        info!(profile_id, channel, "channel stop requested");
        Ok(())
    }
}

fn topic_ops(adapter: &dyn MessagingProvider) -> Result<&dyn TopicOperations, MqError> {
    adapter
        .topics()
        .ok_or_else(|| MqError::unsupported(adapter.provider_type(), "topics"))
}

fn channel_ops(adapter: &dyn MessagingProvider) -> Result<&dyn ChannelOperations, MqError> {
    adapter
        .channels()
        .ok_or_else(|| MqError::unsupported(adapter.provider_type(), "channels"))
}
