// SPDX-FileCopyrightText: 2026 mqlens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use mqlens_core::{MqError, ObjectKind};
use rskafka::client::error::{Error, ProtocolError};

/// Maps an rskafka failure on `topic` onto the error taxonomy.
pub fn map_kafka_error(err: Error, topic: &str) -> MqError {
    match &err {
        Error::ServerError { protocol_error, .. } => match protocol_error {
            ProtocolError::UnknownTopicOrPartition => MqError::not_found(ObjectKind::Queue, topic),
            ProtocolError::TopicAuthorizationFailed
            | ProtocolError::ClusterAuthorizationFailed
            | ProtocolError::SaslAuthenticationFailed => {
                MqError::AuthorizationDenied(err.to_string())
            }
            _ => MqError::transport(format!("kafka request on `{topic}` failed"), err),
        },
        _ => MqError::transport(format!("kafka request on `{topic}` failed"), err),
    }
}
