// SPDX-FileCopyrightText: 2026 mqlens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Optional publish/subscribe capability.

use async_trait::async_trait;

use crate::error::MqError;
use crate::types::{PropertyMap, TopicInfo, TopicProperties};

#[async_trait]
pub trait TopicOperations: Send + Sync {
    async fn list_topics(&self, filter: Option<&str>) -> Result<Vec<TopicInfo>, MqError>;

    async fn get_topic_properties(&self, topic: &str) -> Result<TopicProperties, MqError>;

    async fn publish_message(
        &self,
        topic: &str,
        payload: &[u8],
        properties: Option<&PropertyMap>,
    ) -> Result<(), MqError>;

    /// True when each topic is also readable as a queue of the same name, so
    /// publishing changes that queue's depth.
    fn topics_are_queues(&self) -> bool {
        false
    }
}
