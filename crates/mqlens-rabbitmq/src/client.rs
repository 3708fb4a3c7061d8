// SPDX-FileCopyrightText: 2026 mqlens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Management API session bound to one virtual host.

use async_trait::async_trait;
use mqlens_browse::DrainableQueue;
use mqlens_core::{Message, MqError, ObjectKind};
use mqlens_http::{Method, RestClient, Target, decode_json};
use serde_json::{Map, Value};
use tracing::debug;

use crate::types::{
    DeclareQueue, ExchangeRecord, GetMessage, GetRequest, Overview, PublishRequest,
    PublishResponse, QueueRecord,
};

/// The nameless default exchange, as the management API spells it.
pub const DEFAULT_EXCHANGE: &str = "amq.default";

#[derive(Debug)]
pub struct RabbitSession {
    rest: RestClient,
    vhost: String,
}

impl RabbitSession {
    pub fn new(rest: RestClient, vhost: impl Into<String>) -> Self {
        Self {
            rest,
            vhost: vhost.into(),
        }
    }

    pub async fn overview(&self) -> Result<Overview, MqError> {
        let req = self.rest.request(Method::GET, self.rest.url(&["api", "overview"]));
        self.rest.send_json(req, &Target::queue("-")).await
    }

    /// Fails with `InvalidProfile` when the virtual host does not exist.
    pub async fn check_vhost(&self) -> Result<(), MqError> {
        let req = self
            .rest
            .request(Method::GET, self.rest.url(&["api", "vhosts", &self.vhost]));
        match self.rest.send_idempotent(req, &Target::queue(&self.vhost)).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => Err(MqError::InvalidProfile(format!(
                "virtual host `{}` does not exist",
                self.vhost
            ))),
            Err(e) => Err(e),
        }
    }

    pub async fn queues(&self) -> Result<Vec<QueueRecord>, MqError> {
        let req = self
            .rest
            .request(Method::GET, self.rest.url(&["api", "queues", &self.vhost]));
        self.rest.send_json(req, &Target::queue("-")).await
    }

    pub async fn queue(&self, name: &str) -> Result<QueueRecord, MqError> {
        let req = self.rest.request(
            Method::GET,
            self.rest.url(&["api", "queues", &self.vhost, name]),
        );
        self.rest.send_json(req, &Target::queue(name)).await
    }

    /// Destructively receives up to `count` messages.
    pub async fn get(&self, queue: &str, count: usize) -> Result<Vec<GetMessage>, MqError> {
        let req = self
            .rest
            .request(
                Method::POST,
                self.rest.url(&["api", "queues", &self.vhost, queue, "get"]),
            )
            .json(&GetRequest::consume(count));
        let response = self.rest.send(req, &Target::queue(queue)).await?;
        decode_json(response).await
    }

    /// Publishes through `exchange`. Returns whether any queue received it.
    pub async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        properties: &Map<String, Value>,
        payload: &str,
        payload_encoding: &str,
    ) -> Result<bool, MqError> {
        let target = if exchange == DEFAULT_EXCHANGE {
            Target::queue(routing_key)
        } else {
            Target::topic(exchange)
        };
        let req = self
            .rest
            .request(
                Method::POST,
                self.rest
                    .url(&["api", "exchanges", &self.vhost, exchange, "publish"]),
            )
            .json(&PublishRequest {
                properties,
                routing_key,
                payload,
                payload_encoding,
            });
        let response = self.rest.send(req, &target).await?;
        let body: PublishResponse = decode_json(response).await?;
        Ok(body.routed)
    }

    /// Publishes to `queue` through the default exchange; an unrouted
    /// message means the queue does not exist.
    pub async fn send_to_queue(
        &self,
        queue: &str,
        properties: &Map<String, Value>,
        payload: &str,
        payload_encoding: &str,
    ) -> Result<(), MqError> {
        if self
            .publish(DEFAULT_EXCHANGE, queue, properties, payload, payload_encoding)
            .await?
        {
            Ok(())
        } else {
            Err(MqError::not_found(ObjectKind::Queue, queue))
        }
    }

    pub async fn declare_queue(&self, name: &str) -> Result<(), MqError> {
        let req = self
            .rest
            .request(
                Method::PUT,
                self.rest.url(&["api", "queues", &self.vhost, name]),
            )
            .json(&DeclareQueue {
                durable: true,
                auto_delete: false,
                arguments: Map::new(),
            });
        self.rest.send(req, &Target::queue(name)).await?;
        Ok(())
    }

    pub async fn delete_queue(&self, name: &str) -> Result<(), MqError> {
        let req = self.rest.request(
            Method::DELETE,
            self.rest.url(&["api", "queues", &self.vhost, name]),
        );
        self.rest.send(req, &Target::queue(name)).await?;
        Ok(())
    }

    pub async fn purge(&self, queue: &str) -> Result<(), MqError> {
        let req = self.rest.request(
            Method::DELETE,
            self.rest
                .url(&["api", "queues", &self.vhost, queue, "contents"]),
        );
        self.rest.send(req, &Target::queue(queue)).await?;
        Ok(())
    }

    pub async fn exchanges(&self) -> Result<Vec<ExchangeRecord>, MqError> {
        let req = self
            .rest
            .request(Method::GET, self.rest.url(&["api", "exchanges", &self.vhost]));
        self.rest.send_json(req, &Target::topic("-")).await
    }

    pub async fn exchange(&self, name: &str) -> Result<ExchangeRecord, MqError> {
        let req = self.rest.request(
            Method::GET,
            self.rest.url(&["api", "exchanges", &self.vhost, name]),
        );
        self.rest.send_json(req, &Target::topic(name)).await
    }

    /// Bindings whose source is `exchange`.
    pub async fn exchange_bindings(&self, exchange: &str) -> Result<Vec<Value>, MqError> {
        let req = self.rest.request(
            Method::GET,
            self.rest.url(&[
                "api",
                "exchanges",
                &self.vhost,
                exchange,
                "bindings",
                "source",
            ]),
        );
        self.rest.send_json(req, &Target::topic(exchange)).await
    }
}

#[async_trait]
impl DrainableQueue for RabbitSession {
    type Envelope = GetMessage;

    async fn receive_batch(&self, queue: &str, max: usize) -> Result<Vec<GetMessage>, MqError> {
        let batch = self.get(queue, max).await?;
        debug!(queue, count = batch.len(), "received batch");
        Ok(batch)
    }

    async fn send(&self, queue: &str, envelope: &GetMessage) -> Result<(), MqError> {
        self.send_to_queue(
            queue,
            &envelope.properties,
            &envelope.payload,
            &envelope.payload_encoding,
        )
        .await
    }

    fn to_message(&self, envelope: &GetMessage) -> Message {
        envelope.to_message()
    }

    async fn create_holding_queue(&self, name: &str) -> Result<(), MqError> {
        self.declare_queue(name).await
    }

    async fn delete_holding_queue(&self, name: &str) -> Result<(), MqError> {
        self.delete_queue(name).await
    }
}
