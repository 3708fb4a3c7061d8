// SPDX-FileCopyrightText: 2026 mqlens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! mqweb session: the administrative MQSC endpoint plus the messaging API
//! for one queue manager.

use mqlens_core::{Message, MqError, ObjectKind, PropertyMap};
use mqlens_http::header::CONTENT_TYPE;
use mqlens_http::{Method, RestClient, StatusCode, Target, decode_json};
use serde_json::{Map, Value};
use tracing::debug;

use crate::message::{ListedMessage, MessageList, content_type, from_response, put_headers};
use crate::mqsc::{MqscCommand, MqscResponse};

/// mqweb rejects state-changing requests without this header.
pub const CSRF_HEADER: &str = "ibm-mq-rest-csrf-token";

#[derive(Debug)]
pub struct MqWebSession {
    rest: RestClient,
    qmgr: String,
}

impl MqWebSession {
    pub fn new(rest: RestClient, queue_manager: &str) -> Self {
        Self {
            rest,
            qmgr: queue_manager.to_string(),
        }
    }

    pub fn queue_manager(&self) -> &str {
        &self.qmgr
    }

    /// Confirms the queue manager exists. Users holding only the messaging
    /// role cannot read it, which is not a connect failure.
    pub async fn check_queue_manager(&self) -> Result<(), MqError> {
        let url = self.rest.url(&["admin", "qmgr", &self.qmgr]);
        let target = Target::queue(self.qmgr.clone());
        match self
            .rest
            .send_idempotent(self.rest.request(Method::GET, url), &target)
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => Err(MqError::InvalidProfile(format!(
                "queue manager `{}` not found",
                self.qmgr
            ))),
            Err(e) if e.is_authorization_denied() => {
                debug!(qmgr = %self.qmgr, "queue manager not readable, continuing with messaging role");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Runs one MQSC command, returning the raw response.
    pub async fn run(
        &self,
        command: &MqscCommand<'_>,
        kind: ObjectKind,
        name: &str,
    ) -> Result<MqscResponse, MqError> {
        let url = self
            .rest
            .url(&["admin", "action", "qmgr", &self.qmgr, "mqsc"]);
        debug!(command = ?command, "mqsc");
        let req = self.rest.request(Method::POST, url).json(command);
        self.rest.send_json(req, &Target::new(kind, name)).await
    }

    /// Runs one MQSC command and returns the per-object parameters.
    pub async fn mqsc(
        &self,
        command: &MqscCommand<'_>,
        kind: ObjectKind,
        name: &str,
    ) -> Result<Vec<Map<String, Value>>, MqError> {
        self.run(command, kind, name)
            .await?
            .into_parameters(kind, name)
    }

    fn message_url(&self, queue: &str, query: &[(&str, &str)]) -> mqlens_http::Url {
        self.rest.url_with_query(
            &["messaging", "qmgr", &self.qmgr, "queue", queue, "message"],
            query,
        )
    }

    /// Message ids on `queue`, in queue order.
    pub async fn message_list(&self, queue: &str) -> Result<Vec<ListedMessage>, MqError> {
        let url = self
            .rest
            .url(&["messaging", "qmgr", &self.qmgr, "queue", queue, "messagelist"]);
        let response = self
            .rest
            .send_idempotent(self.rest.request(Method::GET, url), &Target::queue(queue))
            .await?;
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(Vec::new());
        }
        let list: MessageList = decode_json(response).await?;
        Ok(list.messages)
    }

    /// Non-destructive read of one message. `None` when it is gone.
    pub async fn browse(&self, queue: &str, listed: &ListedMessage) -> Result<Option<Message>, MqError> {
        let url = self.message_url(queue, &[("messageId", listed.message_id.as_str())]);
        let response = self
            .rest
            .send_idempotent(self.rest.request(Method::GET, url), &Target::queue(queue))
            .await?;
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        let headers = response.headers().clone();
        let payload = response
            .bytes()
            .await
            .map_err(|e| MqError::transport("failed to read message body", e))?;
        Ok(Some(from_response(listed, &headers, payload.to_vec())))
    }

    /// Destructive get by id; false when no such message exists.
    pub async fn get_by_id(&self, queue: &str, message_id: &str) -> Result<bool, MqError> {
        let url = self.message_url(queue, &[("messageId", message_id), ("wait", "0")]);
        let response = self
            .rest
            .send(self.rest.request(Method::DELETE, url), &Target::queue(queue))
            .await?;
        Ok(response.status() != StatusCode::NO_CONTENT)
    }

    /// Destructive get of the next message; false when the queue is empty.
    pub async fn get_next(&self, queue: &str) -> Result<bool, MqError> {
        let url = self.message_url(queue, &[("wait", "0")]);
        let response = self
            .rest
            .send(self.rest.request(Method::DELETE, url), &Target::queue(queue))
            .await?;
        Ok(response.status() != StatusCode::NO_CONTENT)
    }

    pub async fn put(
        &self,
        queue: &str,
        payload: &[u8],
        properties: Option<&PropertyMap>,
    ) -> Result<(), MqError> {
        let url = self.message_url(queue, &[]);
        self.post_message(url, Target::queue(queue), payload, properties)
            .await
    }

    pub async fn publish(
        &self,
        topic_string: &str,
        payload: &[u8],
        properties: Option<&PropertyMap>,
    ) -> Result<(), MqError> {
        let url = self
            .rest
            .url(&["messaging", "qmgr", &self.qmgr, "topic", topic_string, "message"]);
        self.post_message(url, Target::topic(topic_string), payload, properties)
            .await
    }

    async fn post_message(
        &self,
        url: mqlens_http::Url,
        target: Target,
        payload: &[u8],
        properties: Option<&PropertyMap>,
    ) -> Result<(), MqError> {
        let req = self
            .rest
            .request(Method::POST, url)
            .headers(put_headers(properties)?)
            .header(CONTENT_TYPE, content_type(payload))
            .body(payload.to_vec());
        self.rest.send(req, &target).await?;
        Ok(())
    }
}
