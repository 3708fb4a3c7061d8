// SPDX-FileCopyrightText: 2026 mqlens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The provider capability interface every broker adapter implements.

use async_trait::async_trait;

use crate::error::MqError;
use crate::profile::ConnectionParams;
use crate::traits::channel::ChannelOperations;
use crate::traits::topic::TopicOperations;
use crate::types::{BrowseOptions, Message, PropertyMap, ProviderType, QueueInfo, QueueProperties};

/// Uniform queue operations over one broker connection.
///
/// Constructing an adapter performs no I/O; all network traffic starts with
/// [`connect`](MessagingProvider::connect). Every other operation fails with
/// [`MqError::NotConnected`] before a successful connect or after
/// [`disconnect`](MessagingProvider::disconnect).
#[async_trait]
pub trait MessagingProvider: Send + Sync + 'static {
    /// Which broker family this adapter speaks to.
    fn provider_type(&self) -> ProviderType;

    /// Opens the broker session. `params` carries rehydrated secrets.
    async fn connect(&self, params: &ConnectionParams) -> Result<(), MqError>;

    /// Closes the broker session and releases every handle it holds.
    async fn disconnect(&self) -> Result<(), MqError>;

    fn is_connected(&self) -> bool;

    /// Lists queues whose names pass `filter` (see [`crate::filter`]).
    async fn list_queues(&self, filter: Option<&str>) -> Result<Vec<QueueInfo>, MqError>;

    async fn get_queue_properties(&self, queue: &str) -> Result<QueueProperties, MqError>;

    async fn get_queue_depth(&self, queue: &str) -> Result<u64, MqError>;

    /// Returns a non-destructive snapshot of the requested window.
    async fn browse_messages(
        &self,
        queue: &str,
        options: &BrowseOptions,
    ) -> Result<Vec<Message>, MqError>;

    async fn put_message(
        &self,
        queue: &str,
        payload: &[u8],
        properties: Option<&PropertyMap>,
    ) -> Result<(), MqError>;

    /// Removes exactly one message. Fails with `ObjectNotFound` if the id is
    /// not on the queue.
    async fn delete_message(&self, queue: &str, message_id: &str) -> Result<(), MqError>;

    /// Removes every listed message and returns the count removed. If any id
    /// is missing the call fails with `PartialFailure`; removals that did
    /// succeed stay committed.
    async fn delete_messages(&self, queue: &str, message_ids: &[String]) -> Result<usize, MqError>;

    async fn clear_queue(&self, queue: &str) -> Result<(), MqError>;

    /// Topic operations, when the broker has them.
    fn topics(&self) -> Option<&dyn TopicOperations> {
        None
    }

    /// Channel operations, when the broker has them.
    fn channels(&self) -> Option<&dyn ChannelOperations> {
        None
    }
}
