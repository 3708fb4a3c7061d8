// SPDX-FileCopyrightText: 2026 mqlens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Service Bus credentials: shared access signatures from a connection
//! string, or Azure AD client-credential tokens.

use std::time::{Duration, Instant};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use mqlens_core::MqError;
use mqlens_core::profile::ServiceBusParams;
use mqlens_http::header::CONTENT_TYPE;
use mqlens_http::{Method, RestClient, Target, form_body};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sha2::Sha256;
use tokio::sync::Mutex;
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;

/// Lifetime of a generated SAS token.
const SAS_LIFETIME: Duration = Duration::from_secs(3600);

/// Refresh AAD tokens this long before they expire.
const TOKEN_SKEW: Duration = Duration::from_secs(60);

const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";
const SERVICE_BUS_SCOPE: &str = "https://servicebus.azure.net/.default";

/// The parts of a Service Bus connection string mqlens uses.
#[derive(Clone)]
pub struct ConnectionString {
    pub endpoint: String,
    pub key_name: String,
    pub key: SecretString,
}

impl std::fmt::Debug for ConnectionString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionString")
            .field("endpoint", &self.endpoint)
            .field("key_name", &self.key_name)
            .finish_non_exhaustive()
    }
}

impl ConnectionString {
    /// Parses `Endpoint=sb://…/;SharedAccessKeyName=…;SharedAccessKey=…`.
    /// An `sb://` endpoint is addressed over HTTPS.
    pub fn parse(raw: &str) -> Result<Self, MqError> {
        let mut endpoint = None;
        let mut key_name = None;
        let mut key = None;
        for part in raw.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let Some((name, value)) = part.split_once('=') else {
                return Err(MqError::InvalidProfile(
                    "malformed Service Bus connection string".into(),
                ));
            };
            match name.trim().to_ascii_lowercase().as_str() {
                "endpoint" => endpoint = Some(value.trim().to_string()),
                "sharedaccesskeyname" => key_name = Some(value.trim().to_string()),
                "sharedaccesskey" => key = Some(value.trim().to_string()),
                _ => {}
            }
        }
        let missing = |what: &str| MqError::InvalidProfile(format!("connection string has no {what}"));
        let endpoint = endpoint.ok_or_else(|| missing("Endpoint"))?;
        let endpoint = match endpoint.strip_prefix("sb://") {
            Some(rest) => format!("https://{rest}"),
            None => endpoint,
        };
        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            key_name: key_name.ok_or_else(|| missing("SharedAccessKeyName"))?,
            key: SecretString::from(key.ok_or_else(|| missing("SharedAccessKey"))?),
        })
    }
}

/// Builds a SAS token for `resource_uri`, valid until `expiry` (unix seconds).
pub fn sas_token(resource_uri: &str, key_name: &str, key: &str, expiry: u64) -> Result<String, MqError> {
    let encoded_uri = encode(&resource_uri.to_lowercase());
    let mut mac = HmacSha256::new_from_slice(key.as_bytes())
        .map_err(|e| MqError::Internal(format!("SAS key rejected: {e}")))?;
    mac.update(format!("{encoded_uri}\n{expiry}").as_bytes());
    let signature = STANDARD.encode(mac.finalize().into_bytes());
    Ok(format!(
        "SharedAccessSignature sr={encoded_uri}&sig={}&se={expiry}&skn={key_name}",
        encode(&signature)
    ))
}

fn encode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: u64,
}

/// Source of the `Authorization` header value.
pub enum Credentials {
    Sas {
        resource: String,
        key_name: String,
        key: SecretString,
    },
    AzureAd {
        rest: RestClient,
        tenant_id: String,
        client_id: String,
        client_secret: SecretString,
        cached: Mutex<Option<(SecretString, Instant)>>,
    },
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::Sas { key_name, .. } => f.debug_struct("Sas").field("key_name", key_name).finish_non_exhaustive(),
            Credentials::AzureAd { client_id, .. } => {
                f.debug_struct("AzureAd").field("client_id", client_id).finish_non_exhaustive()
            }
        }
    }
}

/// Namespace endpoint and credentials for a profile. The connection string
/// wins when both forms are present.
pub fn from_params(params: &ServiceBusParams, timeout: Duration) -> Result<(String, Credentials), MqError> {
    if let Some(raw) = params.connection_string.as_deref().filter(|s| !s.trim().is_empty()) {
        let cs = ConnectionString::parse(raw)?;
        let credentials = Credentials::Sas {
            resource: cs.endpoint.clone(),
            key_name: cs.key_name,
            key: cs.key,
        };
        return Ok((cs.endpoint, credentials));
    }

    let namespace = params
        .fully_qualified_namespace
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| MqError::InvalidProfile("either a connection string or a namespace is required".into()))?;
    let endpoint = if namespace.contains("://") {
        namespace.trim_end_matches('/').to_string()
    } else {
        format!("https://{}", namespace.trim_end_matches('/'))
    };
    let (Some(tenant_id), Some(client_id), Some(client_secret)) =
        (&params.tenant_id, &params.client_id, &params.client_secret)
    else {
        return Err(MqError::InvalidProfile(
            "Azure AD authentication needs tenantId, clientId and clientSecret".into(),
        ));
    };
    let authority = params.authority_host.as_deref().unwrap_or(DEFAULT_AUTHORITY);
    let rest = RestClient::builder(authority).timeout(timeout).build()?;
    Ok((
        endpoint,
        Credentials::AzureAd {
            rest,
            tenant_id: tenant_id.clone(),
            client_id: client_id.clone(),
            client_secret: SecretString::from(client_secret.clone()),
            cached: Mutex::new(None),
        },
    ))
}

impl Credentials {
    /// `Authorization` header value for the next request.
    pub async fn authorization(&self) -> Result<String, MqError> {
        match self {
            Credentials::Sas {
                resource,
                key_name,
                key,
            } => {
                let expiry = chrono::Utc::now().timestamp().max(0) as u64 + SAS_LIFETIME.as_secs();
                sas_token(resource, key_name, key.expose_secret(), expiry)
            }
            Credentials::AzureAd {
                rest,
                tenant_id,
                client_id,
                client_secret,
                cached,
            } => {
                let mut cached = cached.lock().await;
                if let Some((token, valid_until)) = cached.as_ref()
                    && Instant::now() < *valid_until
                {
                    return Ok(format!("Bearer {}", token.expose_secret()));
                }
                let url = rest.url(&[tenant_id.as_str(), "oauth2", "v2.0", "token"]);
                let body = form_body(&[
                    ("grant_type", "client_credentials"),
                    ("client_id", client_id.as_str()),
                    ("client_secret", client_secret.expose_secret()),
                    ("scope", SERVICE_BUS_SCOPE),
                ]);
                let req = rest
                    .request(Method::POST, url)
                    .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(body);
                let response: TokenResponse = rest
                    .send_json(req, &Target::queue("oauth2/token"))
                    .await
                    .map_err(|e| match e {
                        MqError::ObjectNotFound { .. } => {
                            MqError::InvalidProfile(format!("tenant `{tenant_id}` not found"))
                        }
                        other => other,
                    })?;
                let lifetime = Duration::from_secs(response.expires_in).saturating_sub(TOKEN_SKEW);
                debug!(lifetime_secs = lifetime.as_secs(), "Azure AD token acquired");
                let header = format!("Bearer {}", response.access_token);
                *cached = Some((SecretString::from(response.access_token), Instant::now() + lifetime));
                Ok(header)
            }
        }
    }
}
