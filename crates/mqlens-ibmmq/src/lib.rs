// SPDX-FileCopyrightText: 2026 mqlens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! IBM MQ adapter for mqlens.
//!
//! Administration goes through MQSC commands posted to mqweb's
//! `runCommandJSON` action. Messages go through the messaging REST API:
//! browsing walks the queue's message-id listing and reads each message by
//! id, deletion is a destructive get by id.
//!
//! Queue discovery degrades for users without administrative access: when
//! `DISPLAY QLOCAL` is denied the profile's known queues are probed through
//! the messaging API instead.

pub mod client;
pub mod message;
pub mod mqsc;

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use mqlens_browse::{MessageCursor, browse_with_cursor, delete_each_native};
use mqlens_core::filter::retain_matching;
use mqlens_core::profile::IbmMqParams;
use mqlens_core::{
    AdapterFactory, AdapterSettings, BrowseOptions, ChannelInfo, ChannelOperations,
    ChannelProperties, ChannelStatus, ConnectionParams, Message, MessagingProvider, MqError,
    ObjectKind, PropertyMap, ProviderType, QueueInfo, QueueProperties, SessionCell, TopicInfo,
    TopicOperations, TopicProperties, bounded,
};
use mqlens_http::RestClient;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::client::{CSRF_HEADER, MqWebSession};
use crate::message::ListedMessage;
use crate::mqsc::{MQRC_OBJECT_IN_USE, MqscCommand, param_str, param_u64};

/// Objects the queue manager defines for itself; hidden from listings.
const SYSTEM_PREFIX: &str = "SYSTEM.";

/// mqweb base URL for a profile.
pub fn rest_base_url(params: &IbmMqParams) -> String {
    match &params.rest_url {
        Some(url) if !url.trim().is_empty() => url.trim().to_string(),
        _ => format!("https://{}:9443/ibmmq/rest/v2", params.host),
    }
}

struct Connected {
    web: MqWebSession,
    known_queues: Vec<String>,
}

/// Walks a message-id listing, reading bodies only for messages it returns.
struct ListCursor<'a> {
    web: &'a MqWebSession,
    queue: &'a str,
    pending: VecDeque<ListedMessage>,
}

#[async_trait]
impl MessageCursor for ListCursor<'_> {
    async fn next_message(&mut self) -> Result<Option<Message>, MqError> {
        while let Some(listed) = self.pending.pop_front() {
            if let Some(message) = self.web.browse(self.queue, &listed).await? {
                return Ok(Some(message));
            }
            debug!(queue = self.queue, message_id = %listed.message_id, "listed message already gone");
        }
        Ok(None)
    }

    async fn skip(&mut self, n: usize) -> Result<usize, MqError> {
        let skipped = n.min(self.pending.len());
        self.pending.drain(..skipped);
        Ok(skipped)
    }

    async fn close(&mut self) -> Result<(), MqError> {
        self.pending.clear();
        Ok(())
    }
}

fn is_system(name: &str) -> bool {
    name.starts_with(SYSTEM_PREFIX)
}

fn into_property_map(params: Map<String, Value>) -> PropertyMap {
    params.into_iter().collect()
}

/// Names from a generic DISPLAY, where a match-nothing pattern is reported
/// as an unknown object.
fn or_empty(
    result: Result<Vec<Map<String, Value>>, MqError>,
) -> Result<Vec<Map<String, Value>>, MqError> {
    match result {
        Err(e) if e.is_not_found() => Ok(Vec::new()),
        other => other,
    }
}

pub struct IbmMqAdapter {
    settings: AdapterSettings,
    session: SessionCell<Connected>,
}

impl IbmMqAdapter {
    pub fn new(settings: AdapterSettings) -> Self {
        Self {
            settings,
            session: SessionCell::new(),
        }
    }
}

async fn probe_known_queues(conn: &Connected) -> Result<Vec<QueueInfo>, MqError> {
    let mut found = Vec::new();
    for name in &conn.known_queues {
        match conn.web.message_list(name).await {
            Ok(listed) => found.push(QueueInfo::new(name.clone()).with_depth(listed.len() as u64)),
            Err(e) if e.is_not_found() || e.is_authorization_denied() => {
                debug!(queue = %name, error = %e, "known queue not accessible");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(found)
}

async fn queue_parameters(
    web: &MqWebSession,
    queue: &str,
    wanted: &[&str],
) -> Result<Map<String, Value>, MqError> {
    web.mqsc(&MqscCommand::display("qlocal", queue, wanted), ObjectKind::Queue, queue)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| MqError::not_found(ObjectKind::Queue, queue))
}

async fn remove_by_id(web: &MqWebSession, queue: &str, message_id: &str) -> Result<(), MqError> {
    if web.get_by_id(queue, message_id).await? {
        Ok(())
    } else {
        Err(MqError::not_found(ObjectKind::Message, message_id))
    }
}

#[async_trait]
impl MessagingProvider for IbmMqAdapter {
    fn provider_type(&self) -> ProviderType {
        ProviderType::IbmMq
    }

    async fn connect(&self, params: &ConnectionParams) -> Result<(), MqError> {
        let ConnectionParams::IbmMq(params) = params else {
            return Err(MqError::InvalidProfile(format!(
                "expected ibmmq parameters, got {}",
                params.provider_type()
            )));
        };
        if params.queue_manager.trim().is_empty() {
            return Err(MqError::InvalidProfile("queue manager name is empty".into()));
        }
        let rest = RestClient::builder(rest_base_url(params))
            .basic_auth(params.username.as_deref(), params.password.as_deref())
            .timeout(self.settings.operation_timeout)
            .accept_invalid_certs(params.accept_invalid_certs)
            .header(CSRF_HEADER, "mqlens")?
            .build()?;
        let web = MqWebSession::new(rest, &params.queue_manager);
        bounded(self.settings.connect_timeout, web.check_queue_manager()).await?;
        info!(qmgr = %params.queue_manager, "connected to IBM MQ");
        self.session
            .install(Connected {
                web,
                known_queues: params.known_queues.clone(),
            })
            .await;
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), MqError> {
        if let Some(conn) = self.session.take().await {
            debug!(qmgr = conn.web.queue_manager(), "IBM MQ session closed");
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    async fn list_queues(&self, filter: Option<&str>) -> Result<Vec<QueueInfo>, MqError> {
        let conn = self.session.lock().await?;
        let listed = conn
            .web
            .mqsc(
                &MqscCommand::display("qlocal", "*", &["curdepth", "maxdepth", "descr"]),
                ObjectKind::Queue,
                "*",
            )
            .await;
        let mut queues = match or_empty(listed) {
            Ok(rows) => rows
                .into_iter()
                .filter_map(|row| {
                    let name = param_str(&row, "queue")?.to_string();
                    let mut info = QueueInfo::new(name);
                    info.depth = param_u64(&row, "curdepth");
                    info.attributes = into_property_map(row);
                    Some(info)
                })
                .filter(|q| !is_system(&q.name))
                .collect(),
            Err(e) if e.is_authorization_denied() => {
                warn!(error = %e, "DISPLAY QLOCAL denied, probing known queues");
                probe_known_queues(&conn).await?
            }
            Err(e) => return Err(e),
        };
        queues.sort_by(|a, b| a.name.cmp(&b.name));
        retain_matching(&mut queues, filter, |q| &q.name);
        Ok(queues)
    }

    async fn get_queue_properties(&self, queue: &str) -> Result<QueueProperties, MqError> {
        let conn = self.session.lock().await?;
        match queue_parameters(&conn.web, queue, &[]).await {
            Ok(params) => Ok(QueueProperties {
                name: queue.to_string(),
                depth: param_u64(&params, "curdepth"),
                max_depth: param_u64(&params, "maxdepth"),
                durable: param_str(&params, "defpsist").map(|p| p.eq_ignore_ascii_case("YES")),
                consumer_count: param_u64(&params, "ipprocs"),
                description: param_str(&params, "descr").map(str::to_string),
                attributes: into_property_map(params),
            }),
            Err(e) if e.is_authorization_denied() => {
                let listed = conn.web.message_list(queue).await?;
                Ok(QueueProperties {
                    name: queue.to_string(),
                    depth: Some(listed.len() as u64),
                    ..QueueProperties::default()
                })
            }
            Err(e) => Err(e),
        }
    }

    async fn get_queue_depth(&self, queue: &str) -> Result<u64, MqError> {
        let conn = self.session.lock().await?;
        match queue_parameters(&conn.web, queue, &["curdepth"]).await {
            Ok(params) => Ok(param_u64(&params, "curdepth").unwrap_or(0)),
            Err(e) if e.is_authorization_denied() => {
                Ok(conn.web.message_list(queue).await?.len() as u64)
            }
            Err(e) => Err(e),
        }
    }

    async fn browse_messages(
        &self,
        queue: &str,
        options: &BrowseOptions,
    ) -> Result<Vec<Message>, MqError> {
        let conn = self.session.lock().await?;
        if options.limit == 0 {
            return Ok(Vec::new());
        }
        let listed = conn.web.message_list(queue).await?;
        let mut cursor = ListCursor {
            web: &conn.web,
            queue,
            pending: listed.into(),
        };
        browse_with_cursor(&mut cursor, options).await
    }

    async fn put_message(
        &self,
        queue: &str,
        payload: &[u8],
        properties: Option<&PropertyMap>,
    ) -> Result<(), MqError> {
        let conn = self.session.lock().await?;
        conn.web.put(queue, payload, properties).await
    }

    async fn delete_message(&self, queue: &str, message_id: &str) -> Result<(), MqError> {
        let conn = self.session.lock().await?;
        remove_by_id(&conn.web, queue, message_id).await
    }

    async fn delete_messages(&self, queue: &str, message_ids: &[String]) -> Result<usize, MqError> {
        let conn = self.session.lock().await?;
        let web = &conn.web;
        delete_each_native(message_ids, |id| async move {
            remove_by_id(web, queue, &id).await
        })
        .await?
        .into_result()
    }

    async fn clear_queue(&self, queue: &str) -> Result<(), MqError> {
        let conn = self.session.lock().await?;
        let command = MqscCommand::new("clear", "qlocal", queue);
        let response = conn.web.run(&command, ObjectKind::Queue, queue).await?;
        if response.failed_reason() != Some(MQRC_OBJECT_IN_USE) {
            response.into_parameters(ObjectKind::Queue, queue)?;
            return Ok(());
        }

        // An open queue cannot be cleared; drain what is there now.
        let depth = conn.web.message_list(queue).await?.len();
        info!(queue, depth, "queue in use, clearing by destructive get");
        let mut removed = 0;
        while removed < depth && conn.web.get_next(queue).await? {
            removed += 1;
        }
        debug!(queue, removed, "queue cleared");
        Ok(())
    }

    fn topics(&self) -> Option<&dyn TopicOperations> {
        Some(self)
    }

    fn channels(&self) -> Option<&dyn ChannelOperations> {
        Some(self)
    }
}

async fn topic_string(web: &MqWebSession, topic: &str) -> Result<(Map<String, Value>, Option<String>), MqError> {
    let params = web
        .mqsc(&MqscCommand::display("topic", topic, &[]), ObjectKind::Topic, topic)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| MqError::not_found(ObjectKind::Topic, topic))?;
    let topic_string = param_str(&params, "topicstr").map(str::to_string);
    Ok((params, topic_string))
}

#[async_trait]
impl TopicOperations for IbmMqAdapter {
    async fn list_topics(&self, filter: Option<&str>) -> Result<Vec<TopicInfo>, MqError> {
        let conn = self.session.lock().await?;
        let rows = or_empty(
            conn.web
                .mqsc(
                    &MqscCommand::display("topic", "*", &["topicstr"]),
                    ObjectKind::Topic,
                    "*",
                )
                .await,
        )?;
        let mut topics: Vec<TopicInfo> = rows
            .iter()
            .filter_map(|row| {
                Some(TopicInfo {
                    name: param_str(row, "topic")?.to_string(),
                    topic_string: param_str(row, "topicstr").map(str::to_string),
                })
            })
            .filter(|t| !is_system(&t.name))
            .collect();
        topics.sort_by(|a, b| a.name.cmp(&b.name));
        retain_matching(&mut topics, filter, |t| &t.name);
        Ok(topics)
    }

    async fn get_topic_properties(&self, topic: &str) -> Result<TopicProperties, MqError> {
        let conn = self.session.lock().await?;
        let (params, topic_string) = topic_string(&conn.web, topic).await?;
        let subscription_count = match &topic_string {
            Some(ts) => or_empty(
                conn.web
                    .mqsc(
                        &MqscCommand::display("tpstatus", ts, &["subcount"]),
                        ObjectKind::Topic,
                        topic,
                    )
                    .await,
            )?
            .first()
            .and_then(|row| param_u64(row, "subcount")),
            None => None,
        };
        Ok(TopicProperties {
            name: topic.to_string(),
            topic_string,
            subscription_count,
            partition_count: None,
            attributes: into_property_map(params),
        })
    }

    async fn publish_message(
        &self,
        topic: &str,
        payload: &[u8],
        properties: Option<&PropertyMap>,
    ) -> Result<(), MqError> {
        let conn = self.session.lock().await?;
        let (_, topic_string) = topic_string(&conn.web, topic).await?;
        let topic_string = topic_string.ok_or_else(|| {
            MqError::transport_msg(format!("topic `{topic}` has no topic string"))
        })?;
        conn.web.publish(&topic_string, payload, properties).await
    }
}

/// Current status per channel; channels without a status entry are inactive.
async fn channel_statuses(web: &MqWebSession, name: &str) -> Result<HashMap<String, ChannelStatus>, MqError> {
    let rows = or_empty(
        web.mqsc(
            &MqscCommand::display("chstatus", name, &["status"]),
            ObjectKind::Channel,
            name,
        )
        .await,
    )?;
    Ok(rows
        .iter()
        .filter_map(|row| {
            Some((
                param_str(row, "channel")?.to_string(),
                ChannelStatus::from_broker(param_str(row, "status")?),
            ))
        })
        .collect())
}

async fn channel_status(web: &MqWebSession, channel: &str) -> Result<ChannelStatus, MqError> {
    Ok(channel_statuses(web, channel)
        .await?
        .remove(channel)
        .unwrap_or(ChannelStatus::Inactive))
}

async fn channel_definition(web: &MqWebSession, channel: &str) -> Result<Map<String, Value>, MqError> {
    web.mqsc(
        &MqscCommand::display("channel", channel, &[]),
        ObjectKind::Channel,
        channel,
    )
    .await?
    .into_iter()
    .next()
    .ok_or_else(|| MqError::not_found(ObjectKind::Channel, channel))
}

#[async_trait]
impl ChannelOperations for IbmMqAdapter {
    async fn list_channels(&self, filter: Option<&str>) -> Result<Vec<ChannelInfo>, MqError> {
        let conn = self.session.lock().await?;
        let rows = or_empty(
            conn.web
                .mqsc(
                    &MqscCommand::display("channel", "*", &["chltype"]),
                    ObjectKind::Channel,
                    "*",
                )
                .await,
        )?;
        let statuses = channel_statuses(&conn.web, "*").await?;
        let mut channels: Vec<ChannelInfo> = rows
            .iter()
            .filter_map(|row| {
                let name = param_str(row, "channel")?.to_string();
                Some(ChannelInfo {
                    status: statuses.get(&name).copied().unwrap_or(ChannelStatus::Inactive),
                    channel_type: param_str(row, "chltype").map(str::to_string),
                    name,
                })
            })
            .filter(|c| !is_system(&c.name))
            .collect();
        channels.sort_by(|a, b| a.name.cmp(&b.name));
        retain_matching(&mut channels, filter, |c| &c.name);
        Ok(channels)
    }

    async fn get_channel_properties(&self, channel: &str) -> Result<ChannelProperties, MqError> {
        let conn = self.session.lock().await?;
        let params = channel_definition(&conn.web, channel).await?;
        let status = channel_status(&conn.web, channel).await?;
        Ok(ChannelProperties {
            name: channel.to_string(),
            channel_type: param_str(&params, "chltype").map(str::to_string),
            status,
            connection_name: param_str(&params, "conname").map(str::to_string),
            attributes: into_property_map(params),
        })
    }

    async fn start_channel(&self, channel: &str) -> Result<(), MqError> {
        let conn = self.session.lock().await?;
        channel_definition(&conn.web, channel).await?;
        if channel_status(&conn.web, channel).await?.is_active() {
            debug!(channel, "channel already running");
            return Ok(());
        }
        conn.web
            .mqsc(
                &MqscCommand::new("start", "channel", channel),
                ObjectKind::Channel,
                channel,
            )
            .await?;
        info!(channel, "channel start requested");
        Ok(())
    }

    async fn stop_channel(&self, channel: &str) -> Result<(), MqError> {
        let conn = self.session.lock().await?;
        channel_definition(&conn.web, channel).await?;
        match channel_status(&conn.web, channel).await? {
            ChannelStatus::Stopped | ChannelStatus::Inactive => {
                debug!(channel, "channel not running");
                return Ok(());
            }
            ChannelStatus::Running | ChannelStatus::Retrying => {}
        }
        conn.web
            .mqsc(
                &MqscCommand::new("stop", "channel", channel),
                ObjectKind::Channel,
                channel,
            )
            .await?;
        info!(channel, "channel stop requested");
        Ok(())
    }
}

/// Builds [`IbmMqAdapter`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct IbmMqFactory;

impl AdapterFactory for IbmMqFactory {
    fn provider_type(&self) -> ProviderType {
        ProviderType::IbmMq
    }

    fn create(&self, settings: &AdapterSettings) -> Result<Arc<dyn MessagingProvider>, MqError> {
        Ok(Arc::new(IbmMqAdapter::new(settings.clone())))
    }
}
