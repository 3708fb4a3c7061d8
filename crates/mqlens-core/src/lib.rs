// SPDX-FileCopyrightText: 2026 mqlens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for mqlens.
//!
//! This crate holds the provider capability interface every broker adapter
//! implements, the connection profile model with its secret fields, the error
//! taxonomy, and the broker-neutral message and queue types.

pub mod error;
pub mod filter;
pub mod profile;
pub mod session;
pub mod settings;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::MqError;
pub use profile::{ConnectionParams, ConnectionProfile, SecretField};
pub use session::SessionCell;
pub use settings::{AdapterSettings, bounded};
pub use types::{
    BrowseOptions, ChannelInfo, ChannelProperties, ChannelStatus, Message, MessageFilter,
    ObjectKind, PropertyMap, ProviderType, QueueInfo, QueueProperties, TopicInfo,
    TopicProperties,
};

pub use traits::{
    AdapterFactory, ChannelOperations, MessagingProvider, ProfileStore, SecretStore,
    TopicOperations,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mq_error_has_taxonomy_variants() {
        let _not_connected = MqError::NotConnected;
        let _profile = MqError::ProfileNotFound("p".into());
        let _object = MqError::not_found(ObjectKind::Queue, "q");
        let _denied = MqError::AuthorizationDenied("no".into());
        let _timeout = MqError::Timeout {
            duration: std::time::Duration::from_secs(1),
        };
        let _partial = MqError::PartialFailure {
            requested: 2,
            removed: 1,
            missing: vec!["x".into()],
        };
        let _transport = MqError::transport("io", std::io::Error::other("reset"));
    }

    #[test]
    fn all_traits_are_object_safe() {
        fn _provider(_: &dyn MessagingProvider) {}
        fn _topics(_: &dyn TopicOperations) {}
        fn _channels(_: &dyn ChannelOperations) {}
        fn _secrets(_: &dyn SecretStore) {}
        fn _profiles(_: &dyn ProfileStore) {}
        fn _factory(_: &dyn AdapterFactory) {}
    }
}
