// SPDX-FileCopyrightText: 2026 mqlens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Optional channel administration capability (IBM MQ).

use async_trait::async_trait;

use crate::error::MqError;
use crate::types::{ChannelInfo, ChannelProperties};

#[async_trait]
pub trait ChannelOperations: Send + Sync {
    async fn list_channels(&self, filter: Option<&str>) -> Result<Vec<ChannelInfo>, MqError>;

    async fn get_channel_properties(&self, channel: &str) -> Result<ChannelProperties, MqError>;

    /// Requests a start. A channel that is already running or retrying is left
    /// alone and the call succeeds.
    async fn start_channel(&self, channel: &str) -> Result<(), MqError>;

    /// Requests a stop. A channel that is already stopped or inactive is left
    /// alone and the call succeeds.
    async fn stop_channel(&self, channel: &str) -> Result<(), MqError>;
}
