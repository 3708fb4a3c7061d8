// SPDX-FileCopyrightText: 2026 mqlens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! REST plumbing shared by the RabbitMQ, ActiveMQ, IBM MQ, Service Bus and
//! SQS adapters.

pub mod client;

pub use client::{RestClient, RestClientBuilder, Target, decode_json, form_body};
pub use reqwest::{Method, RequestBuilder, Response, StatusCode, header};
pub use url::Url;
