// SPDX-FileCopyrightText: 2026 mqlens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client shared by the REST-administered adapters.
//!
//! [`RestClient`] owns the connection pool, base URL, credentials and request
//! timeout for one broker endpoint, and maps transport failures and non-2xx
//! statuses onto [`MqError`].

use std::time::Duration;

use mqlens_core::{MqError, ObjectKind};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

/// Longest response body excerpt carried into an error message.
const ERROR_BODY_LIMIT: usize = 512;

/// The broker object a request addresses, used to report a 404 precisely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub kind: ObjectKind,
    pub name: String,
}

impl Target {
    pub fn new(kind: ObjectKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }

    pub fn queue(name: impl Into<String>) -> Self {
        Self::new(ObjectKind::Queue, name)
    }

    pub fn topic(name: impl Into<String>) -> Self {
        Self::new(ObjectKind::Topic, name)
    }

    pub fn channel(name: impl Into<String>) -> Self {
        Self::new(ObjectKind::Channel, name)
    }
}

/// Builder for [`RestClient`].
#[derive(Debug)]
pub struct RestClientBuilder {
    base_url: String,
    username: Option<String>,
    password: Option<SecretString>,
    timeout: Duration,
    accept_invalid_certs: bool,
    headers: HeaderMap,
    max_retries: u32,
}

impl RestClientBuilder {
    pub fn basic_auth(mut self, username: Option<&str>, password: Option<&str>) -> Self {
        self.username = username.filter(|u| !u.is_empty()).map(str::to_string);
        self.password = password.map(|p| SecretString::from(p.to_string()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    /// Adds a header sent with every request.
    pub fn header(mut self, name: &'static str, value: &str) -> Result<Self, MqError> {
        let value = HeaderValue::from_str(value)
            .map_err(|e| MqError::InvalidProfile(format!("invalid {name} header value: {e}")))?;
        self.headers.insert(HeaderName::from_static(name), value);
        Ok(self)
    }

    /// Retries for idempotent requests answered with 429, 502 or 503.
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn build(self) -> Result<RestClient, MqError> {
        let mut base = Url::parse(&self.base_url)
            .map_err(|e| MqError::InvalidProfile(format!("invalid URL `{}`: {e}", self.base_url)))?;
        if base.cannot_be_a_base() {
            return Err(MqError::InvalidProfile(format!(
                "URL `{}` cannot carry a path",
                self.base_url
            )));
        }
        // Path segments are appended, so drop a trailing slash.
        if let Ok(mut segments) = base.path_segments_mut() {
            segments.pop_if_empty();
        }

        let client = reqwest::Client::builder()
            .default_headers(self.headers)
            .timeout(self.timeout)
            .danger_accept_invalid_certs(self.accept_invalid_certs)
            .build()
            .map_err(|e| MqError::transport("failed to build HTTP client", e))?;

        Ok(RestClient {
            client,
            base,
            username: self.username,
            password: self.password,
            timeout: self.timeout,
            max_retries: self.max_retries,
        })
    }
}

/// Pooled HTTP client bound to one broker endpoint.
#[derive(Clone)]
pub struct RestClient {
    client: reqwest::Client,
    base: Url,
    username: Option<String>,
    password: Option<SecretString>,
    timeout: Duration,
    max_retries: u32,
}

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestClient")
            .field("base", &self.base.as_str())
            .field("username", &self.username)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl RestClient {
    pub fn builder(base_url: impl Into<String>) -> RestClientBuilder {
        RestClientBuilder {
            base_url: base_url.into(),
            username: None,
            password: None,
            timeout: Duration::from_secs(10),
            accept_invalid_certs: false,
            headers: HeaderMap::new(),
            max_retries: 1,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Base URL with `segments` appended, each percent-encoded as one segment.
    ///
    /// A segment of `/` becomes `%2F`, which is how RabbitMQ addresses the
    /// default vhost.
    pub fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.extend(segments);
        }
        url
    }

    /// Like [`RestClient::url`], plus query parameters.
    pub fn url_with_query(&self, segments: &[&str], query: &[(&str, &str)]) -> Url {
        let mut url = self.url(segments);
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        url
    }

    /// A request with credentials applied.
    pub fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.username {
            Some(user) => builder.basic_auth(
                user,
                self.password.as_ref().map(|p| p.expose_secret().to_string()),
            ),
            None => builder,
        }
    }

    /// Sends `request`, returning the response only for 2xx statuses.
    pub async fn send(&self, request: RequestBuilder, target: &Target) -> Result<Response, MqError> {
        let response = request.send().await.map_err(|e| self.map_send_error(e))?;
        self.check(response, target).await
    }

    /// Sends `request` and returns the response whatever its status, for
    /// protocols that carry error codes in the body.
    pub async fn send_unchecked(&self, request: RequestBuilder) -> Result<Response, MqError> {
        let response = request.send().await.map_err(|e| self.map_send_error(e))?;
        debug!(status = %response.status(), url = %response.url(), "HTTP response");
        Ok(response)
    }

    /// Sends an idempotent request, retrying transient statuses.
    pub async fn send_idempotent(
        &self,
        request: RequestBuilder,
        target: &Target,
    ) -> Result<Response, MqError> {
        let mut attempt = 0;
        loop {
            let Some(this_try) = request.try_clone() else {
                return self.send(request, target).await;
            };
            let response = this_try.send().await.map_err(|e| self.map_send_error(e))?;
            if is_transient(response.status()) && attempt < self.max_retries {
                attempt += 1;
                warn!(status = %response.status(), attempt, "transient HTTP status, retrying");
                tokio::time::sleep(Duration::from_millis(250 * u64::from(attempt))).await;
                continue;
            }
            return self.check(response, target).await;
        }
    }

    /// Sends and decodes a JSON body.
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        target: &Target,
    ) -> Result<T, MqError> {
        let response = self.send_idempotent(request, target).await?;
        decode_json(response).await
    }

    async fn check(&self, response: Response, target: &Target) -> Result<Response, MqError> {
        let status = response.status();
        debug!(status = %status, url = %response.url(), "HTTP response");
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(MqError::from_http_status(
            status.as_u16(),
            target.kind,
            &target.name,
            &excerpt(&body),
        ))
    }

    fn map_send_error(&self, e: reqwest::Error) -> MqError {
        if e.is_timeout() {
            MqError::Timeout {
                duration: self.timeout,
            }
        } else if e.is_connect() {
            MqError::transport(format!("cannot reach {}", self.base), e)
        } else {
            MqError::transport("HTTP request failed", e)
        }
    }
}

/// Reads a response body as JSON.
pub async fn decode_json<T: DeserializeOwned>(response: Response) -> Result<T, MqError> {
    let bytes = response
        .bytes()
        .await
        .map_err(|e| MqError::transport("failed to read response body", e))?;
    serde_json::from_slice(&bytes).map_err(|e| MqError::transport("unexpected response body", e))
}

/// `application/x-www-form-urlencoded` body for `pairs`.
pub fn form_body(pairs: &[(&str, &str)]) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish()
}

fn is_transient(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS | StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE
    )
}

fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(ERROR_BODY_LIMIT) {
        Some((cut, _)) => format!("{}...", &trimmed[..cut]),
        None => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> RestClient {
        RestClient::builder(base).build().unwrap()
    }

    #[test]
    fn url_encodes_each_segment() {
        let c = client("http://broker:15672/api/");
        assert_eq!(
            c.url(&["queues", "/", "orders in"]).as_str(),
            "http://broker:15672/api/queues/%2F/orders%20in"
        );
    }

    #[test]
    fn query_pairs_are_encoded() {
        let c = client("https://qm:9443/ibmmq/rest/v2");
        let url = c.url_with_query(&["messaging", "qmgr", "QM1", "queue", "Q1", "message"], &[
            ("messageId", "414d5120"),
            ("wait", "0"),
        ]);
        assert_eq!(url.query(), Some("messageId=414d5120&wait=0"));
    }

    #[test]
    fn invalid_base_url_is_a_profile_error() {
        let err = RestClient::builder("not a url").build().unwrap_err();
        assert!(matches!(err, MqError::InvalidProfile(_)));
    }

    #[test]
    fn form_body_escapes_values() {
        assert_eq!(form_body(&[("a", "x y"), ("b", "&")]), "a=x+y&b=%26");
    }

    #[test]
    fn excerpt_truncates_long_bodies() {
        let long = "x".repeat(600);
        let cut = excerpt(&long);
        assert!(cut.ends_with("..."));
        assert_eq!(cut.len(), ERROR_BODY_LIMIT + 3);
        assert_eq!(excerpt("  short \n"), "short");
    }

    #[test]
    fn debug_hides_password() {
        let c = RestClient::builder("http://h")
            .basic_auth(Some("admin"), Some("s3cret"))
            .build()
            .unwrap();
        assert!(!format!("{c:?}").contains("s3cret"));
    }
}
