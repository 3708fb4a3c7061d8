// SPDX-FileCopyrightText: 2026 mqlens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error taxonomy shared by the connection manager and every broker adapter.

use std::time::Duration;

use thiserror::Error;

use crate::types::{ObjectKind, ProviderType};

/// The primary error type returned by provider operations, the connection
/// manager, and the persistence layers beneath it.
#[derive(Debug, Error)]
pub enum MqError {
    /// Operation attempted on an adapter that was never connected or has been
    /// disconnected.
    #[error("not connected")]
    NotConnected,

    /// No connection profile exists with the given id.
    #[error("connection profile not found: {0}")]
    ProfileNotFound(String),

    /// The queue, topic, channel or message does not exist on the broker.
    #[error("{kind} not found: {name}")]
    ObjectNotFound { kind: ObjectKind, name: String },

    /// The broker rejected the request because of insufficient rights.
    #[error("authorization denied: {0}")]
    AuthorizationDenied(String),

    /// A bounded wait elapsed without a result.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    /// A batch delete removed some of the requested messages but not all.
    #[error(
        "removed {removed} of {requested} messages; not found: {}",
        missing.join(", ")
    )]
    PartialFailure {
        requested: usize,
        removed: usize,
        missing: Vec<String>,
    },

    /// Underlying network or SDK failure.
    #[error("transport error: {message}")]
    Transport {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The adapter does not offer this operation.
    #[error("{operation} is not supported by {provider}")]
    Unsupported {
        provider: ProviderType,
        operation: String,
    },

    /// A connection profile is malformed or violates a persistence invariant.
    #[error("invalid connection profile: {0}")]
    InvalidProfile(String),

    /// Configuration errors (invalid TOML, bad values).
    #[error("configuration error: {0}")]
    Config(String),

    /// Local persistence failure (SQLite, migrations).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Secret store failure (vault locked, decryption failed, I/O).
    #[error("secret store error: {0}")]
    SecretStore(String),

    /// No adapter factory is registered for the provider type.
    #[error("no adapter registered for provider {0}")]
    AdapterNotFound(ProviderType),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl MqError {
    /// Builds a transport error wrapping the vendor error.
    pub fn transport<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        MqError::Transport {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Builds a transport error carrying only a message.
    pub fn transport_msg(message: impl Into<String>) -> Self {
        MqError::Transport {
            message: message.into(),
            source: None,
        }
    }

    pub fn not_found(kind: ObjectKind, name: impl Into<String>) -> Self {
        MqError::ObjectNotFound {
            kind,
            name: name.into(),
        }
    }

    pub fn unsupported(provider: ProviderType, operation: impl Into<String>) -> Self {
        MqError::Unsupported {
            provider,
            operation: operation.into(),
        }
    }

    /// Maps a non-success HTTP status to the error taxonomy.
    ///
    /// `kind`/`name` identify the object the request addressed so a 404 can be
    /// reported as a missing queue, topic or message.
    pub fn from_http_status(status: u16, kind: ObjectKind, name: &str, detail: &str) -> Self {
        match status {
            401 | 403 => MqError::AuthorizationDenied(format!("HTTP {status}: {detail}")),
            404 => MqError::not_found(kind, name),
            _ => MqError::transport_msg(format!("HTTP {status}: {detail}")),
        }
    }

    /// True for `ObjectNotFound`.
    pub fn is_not_found(&self) -> bool {
        matches!(self, MqError::ObjectNotFound { .. })
    }

    /// True for `AuthorizationDenied`.
    pub fn is_authorization_denied(&self) -> bool {
        matches!(self, MqError::AuthorizationDenied(_))
    }

    /// True for `Unsupported`.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, MqError::Unsupported { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_failure_lists_missing_ids() {
        let err = MqError::PartialFailure {
            requested: 3,
            removed: 1,
            missing: vec!["a".into(), "b".into()],
        };
        assert_eq!(err.to_string(), "removed 1 of 3 messages; not found: a, b");
    }

    #[test]
    fn http_status_mapping() {
        assert!(MqError::from_http_status(401, ObjectKind::Queue, "q", "").is_authorization_denied());
        assert!(MqError::from_http_status(403, ObjectKind::Queue, "q", "").is_authorization_denied());
        let nf = MqError::from_http_status(404, ObjectKind::Message, "id-1", "");
        assert!(nf.is_not_found());
        assert_eq!(nf.to_string(), "message not found: id-1");
        assert!(matches!(
            MqError::from_http_status(500, ObjectKind::Queue, "q", "boom"),
            MqError::Transport { .. }
        ));
    }

    #[test]
    fn unsupported_names_provider_and_operation() {
        let err = MqError::unsupported(ProviderType::Kafka, "deleteMessage");
        assert_eq!(err.to_string(), "deleteMessage is not supported by kafka");
        assert!(err.is_unsupported());
    }
}
