// SPDX-FileCopyrightText: 2026 mqlens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Jolokia session bound to one broker's MBean tree.

use mqlens_core::{MqError, ObjectKind};
use mqlens_http::{Method, RestClient, Target};
use serde_json::{Map, Value};
use tracing::debug;

use crate::types::{JolokiaRequest, JolokiaResponse};

/// JMX destination types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    Queue,
    Topic,
}

impl Destination {
    fn jmx_type(self) -> &'static str {
        match self {
            Destination::Queue => "Queue",
            Destination::Topic => "Topic",
        }
    }

    fn kind(self) -> ObjectKind {
        match self {
            Destination::Queue => ObjectKind::Queue,
            Destination::Topic => ObjectKind::Topic,
        }
    }
}

/// Quotes an ObjectName value when it contains characters JMX reserves.
pub fn quote_value(value: &str) -> String {
    if !value.contains([',', '=', ':', '"', '*', '?', '\\', '\n']) {
        return value.to_string();
    }
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        match c {
            '"' | '*' | '?' | '\\' => {
                quoted.push('\\');
                quoted.push(c);
            }
            '\n' => quoted.push_str("\\n"),
            _ => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}

/// Reads a key out of an ObjectName, undoing [`quote_value`].
pub fn object_name_key(object_name: &str, key: &str) -> Option<String> {
    let (_, props) = object_name.split_once(':')?;
    let mut rest = props;
    while !rest.is_empty() {
        let (k, after) = rest.split_once('=')?;
        let (value, remainder) = if let Some(quoted) = after.strip_prefix('"') {
            let mut out = String::new();
            let mut chars = quoted.char_indices();
            let mut end = None;
            while let Some((i, c)) = chars.next() {
                match c {
                    '\\' => {
                        if let Some((_, escaped)) = chars.next() {
                            out.push(if escaped == 'n' { '\n' } else { escaped });
                        }
                    }
                    '"' => {
                        end = Some(i + 1);
                        break;
                    }
                    _ => out.push(c),
                }
            }
            let end = end?;
            (out, quoted[end..].trim_start_matches(','))
        } else {
            match after.split_once(',') {
                Some((v, r)) => (v.to_string(), r),
                None => (after.to_string(), ""),
            }
        };
        if k == key {
            return Some(value);
        }
        rest = remainder;
    }
    None
}

#[derive(Debug)]
pub struct JolokiaSession {
    rest: RestClient,
    broker: String,
}

impl JolokiaSession {
    pub fn new(rest: RestClient, broker_name: &str) -> Self {
        Self {
            rest,
            broker: quote_value(broker_name),
        }
    }

    pub fn broker_mbean(&self) -> String {
        format!("org.apache.activemq:type=Broker,brokerName={}", self.broker)
    }

    pub fn destination_mbean(&self, destination: Destination, name: &str) -> String {
        format!(
            "{},destinationType={},destinationName={}",
            self.broker_mbean(),
            destination.jmx_type(),
            quote_value(name)
        )
    }

    /// Pattern matching every destination of one type.
    pub fn destination_pattern(&self, destination: Destination) -> String {
        format!(
            "{},destinationType={},destinationName=*",
            self.broker_mbean(),
            destination.jmx_type()
        )
    }

    async fn call(&self, request: &JolokiaRequest, target: &Target) -> Result<Value, MqError> {
        let req = self
            .rest
            .request(Method::POST, self.rest.base_url().clone())
            .json(request);
        let response: JolokiaResponse = self.rest.send_json(req, target).await?;
        response.into_value(target.kind, &target.name)
    }

    pub async fn broker_version(&self) -> Result<String, MqError> {
        let request = JolokiaRequest::Read {
            mbean: self.broker_mbean(),
            attribute: Some(Value::from("BrokerVersion")),
        };
        let target = Target::queue(self.broker.clone());
        match self.call(&request, &target).await {
            Ok(value) => Ok(value.as_str().unwrap_or("unknown").to_string()),
            Err(e) if e.is_not_found() => Err(MqError::InvalidProfile(format!(
                "broker `{}` not found",
                self.broker
            ))),
            Err(e) => Err(e),
        }
    }

    /// Attributes of every destination of one type, keyed by name.
    pub async fn destinations(
        &self,
        destination: Destination,
        attributes: &[&str],
    ) -> Result<Vec<(String, Map<String, Value>)>, MqError> {
        let request = JolokiaRequest::Read {
            mbean: self.destination_pattern(destination),
            attribute: Some(Value::from(attributes.to_vec())),
        };
        let value = match self.call(&request, &Target::new(destination.kind(), "*")).await {
            Ok(value) => value,
            // A pattern that matches nothing is reported as a missing MBean.
            Err(e) if e.is_not_found() => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let Value::Object(by_name) = value else {
            return Ok(Vec::new());
        };
        let mut out: Vec<(String, Map<String, Value>)> = by_name
            .into_iter()
            .filter_map(|(object_name, attrs)| {
                let name = object_name_key(&object_name, "destinationName")?;
                let Value::Object(attrs) = attrs else {
                    return None;
                };
                Some((name, attrs))
            })
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(out)
    }

    /// Every attribute of one destination.
    pub async fn attributes(
        &self,
        destination: Destination,
        name: &str,
    ) -> Result<Map<String, Value>, MqError> {
        let request = JolokiaRequest::Read {
            mbean: self.destination_mbean(destination, name),
            attribute: None,
        };
        match self.call(&request, &Target::new(destination.kind(), name)).await? {
            Value::Object(attrs) => Ok(attrs),
            other => Err(MqError::transport_msg(format!(
                "jolokia: unexpected attribute payload {other}"
            ))),
        }
    }

    pub async fn exec(
        &self,
        destination: Destination,
        name: &str,
        operation: &str,
        arguments: Vec<Value>,
    ) -> Result<Value, MqError> {
        debug!(destination = name, operation, "jolokia exec");
        let request = JolokiaRequest::Exec {
            mbean: self.destination_mbean(destination, name),
            operation: operation.to_string(),
            arguments,
        };
        self.call(&request, &Target::new(destination.kind(), name)).await
    }
}
