// SPDX-FileCopyrightText: 2026 mqlens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! AWS SQS adapter for mqlens.
//!
//! SQS has no browse primitive. Browsing receives messages with a visibility
//! timeout and resets it to zero afterwards, which counts as a delivery
//! (`ApproximateReceiveCount` goes up and redrive policies may fire).

pub mod client;
pub mod sigv4;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use mqlens_browse::{browse_with_lease, clear_with_lease, delete_with_lease};
use mqlens_core::filter::retain_matching;
use mqlens_core::profile::SqsParams;
use mqlens_core::{
    AdapterFactory, AdapterSettings, BrowseOptions, ConnectionParams, Message, MessagingProvider,
    MqError, PropertyMap, ProviderType, QueueInfo, QueueProperties, SessionCell, bounded,
};
use mqlens_http::RestClient;
use serde_json::Value;
use tracing::{debug, info};

use crate::client::{QueueLeases, SqsSession, queue_name};
use crate::sigv4::AwsCredentials;

/// Regional endpoint unless the profile overrides it.
pub fn endpoint_url(params: &SqsParams) -> String {
    match &params.endpoint {
        Some(url) if !url.trim().is_empty() => url.trim().to_string(),
        _ => format!("https://sqs.{}.amazonaws.com", params.region),
    }
}

fn count(attrs: &HashMap<String, String>, key: &str) -> Option<u64> {
    attrs.get(key).and_then(|v| v.parse().ok())
}

struct Connected {
    session: SqsSession,
    prefix: Option<String>,
}

pub struct SqsAdapter {
    settings: AdapterSettings,
    session: SessionCell<Connected>,
}

impl SqsAdapter {
    pub fn new(settings: AdapterSettings) -> Self {
        Self {
            settings,
            session: SessionCell::new(),
        }
    }

    fn leases<'a>(&self, session: &'a SqsSession, queue: &'a str) -> QueueLeases<'a> {
        QueueLeases {
            session,
            queue,
            visibility_secs: self.settings.lease_duration.as_secs().max(1),
            wait_secs: self.settings.receive_wait.as_secs(),
        }
    }
}

#[async_trait]
impl MessagingProvider for SqsAdapter {
    fn provider_type(&self) -> ProviderType {
        ProviderType::AwsSqs
    }

    async fn connect(&self, params: &ConnectionParams) -> Result<(), MqError> {
        let ConnectionParams::AwsSqs(params) = params else {
            return Err(MqError::InvalidProfile(format!(
                "expected awssqs parameters, got {}",
                params.provider_type()
            )));
        };
        if params.region.trim().is_empty() {
            return Err(MqError::InvalidProfile("region is required".into()));
        }
        let credentials = AwsCredentials::resolve(params)?;
        let endpoint = endpoint_url(params);
        let rest = RestClient::builder(endpoint.clone())
            .timeout(self.settings.operation_timeout)
            .build()?;
        let session = SqsSession::new(rest, params.region.trim(), credentials);
        let prefix = params
            .queue_name_prefix
            .clone()
            .filter(|p| !p.trim().is_empty());
        bounded(
            self.settings.connect_timeout,
            session.list_queue_urls(prefix.as_deref(), Some(1)),
        )
        .await?;
        info!(endpoint = %endpoint, region = %params.region, "connected to SQS");
        self.session.install(Connected { session, prefix }).await;
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), MqError> {
        if self.session.take().await.is_some() {
            debug!("SQS session closed");
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    async fn list_queues(&self, filter: Option<&str>) -> Result<Vec<QueueInfo>, MqError> {
        let conn = self.session.lock().await?;
        let urls = conn.session.list_queue_urls(conn.prefix.as_deref(), None).await?;
        let mut queues: Vec<QueueInfo> = urls
            .iter()
            .map(|url| {
                let mut info = QueueInfo::new(queue_name(url));
                info.attributes.insert("queueUrl".into(), Value::from(url.as_str()));
                info
            })
            .collect();
        queues.sort_by(|a, b| a.name.cmp(&b.name));
        retain_matching(&mut queues, filter, |q| &q.name);
        Ok(queues)
    }

    async fn get_queue_properties(&self, queue: &str) -> Result<QueueProperties, MqError> {
        let conn = self.session.lock().await?;
        let attrs = conn.session.attributes(queue).await?;
        let description = attrs
            .get("QueueArn")
            .map(|arn| format!("{} queue {arn}", if client::is_fifo(queue) { "FIFO" } else { "standard" }));
        Ok(QueueProperties {
            name: queue.to_string(),
            depth: count(&attrs, "ApproximateNumberOfMessages"),
            max_depth: None,
            durable: None,
            consumer_count: None,
            description,
            attributes: attrs
                .into_iter()
                .map(|(k, v)| (k, Value::from(v)))
                .collect(),
        })
    }

    async fn get_queue_depth(&self, queue: &str) -> Result<u64, MqError> {
        let conn = self.session.lock().await?;
        let attrs = conn.session.attributes(queue).await?;
        Ok(count(&attrs, "ApproximateNumberOfMessages").unwrap_or(0))
    }

    async fn browse_messages(
        &self,
        queue: &str,
        options: &BrowseOptions,
    ) -> Result<Vec<Message>, MqError> {
        let conn = self.session.lock().await?;
        browse_with_lease(&self.leases(&conn.session, queue), options, self.settings.batch_size).await
    }

    async fn put_message(
        &self,
        queue: &str,
        payload: &[u8],
        properties: Option<&PropertyMap>,
    ) -> Result<(), MqError> {
        let body = std::str::from_utf8(payload)
            .map_err(|_| MqError::unsupported(ProviderType::AwsSqs, "sending a non-UTF-8 payload"))?;
        let conn = self.session.lock().await?;
        conn.session.send(queue, body, properties).await
    }

    async fn delete_message(&self, queue: &str, message_id: &str) -> Result<(), MqError> {
        let conn = self.session.lock().await?;
        let ids = [message_id.to_string()];
        delete_with_lease(&self.leases(&conn.session, queue), &ids, self.settings.batch_size)
            .await?
            .into_single(message_id)
    }

    async fn delete_messages(&self, queue: &str, message_ids: &[String]) -> Result<usize, MqError> {
        let conn = self.session.lock().await?;
        delete_with_lease(&self.leases(&conn.session, queue), message_ids, self.settings.batch_size)
            .await?
            .into_result()
    }

    async fn clear_queue(&self, queue: &str) -> Result<(), MqError> {
        let conn = self.session.lock().await?;
        if conn.session.purge(queue).await? {
            return Ok(());
        }
        let removed = clear_with_lease(&self.leases(&conn.session, queue), self.settings.batch_size).await?;
        debug!(queue, removed, "queue cleared by lease");
        Ok(())
    }
}

/// Builds [`SqsAdapter`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqsFactory;

impl AdapterFactory for SqsFactory {
    fn provider_type(&self) -> ProviderType {
        ProviderType::AwsSqs
    }

    fn create(&self, settings: &AdapterSettings) -> Result<Arc<dyn MessagingProvider>, MqError> {
        Ok(Arc::new(SqsAdapter::new(settings.clone())))
    }
}
