// SPDX-FileCopyrightText: 2026 mqlens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! AWS Signature Version 4 request signing.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use mqlens_core::MqError;
use mqlens_core::profile::SqsParams;
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// Static AWS credentials.
#[derive(Clone)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: SecretString,
    pub session_token: Option<SecretString>,
}

impl std::fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("access_key_id", &self.access_key_id)
            .finish_non_exhaustive()
    }
}

impl AwsCredentials {
    /// Credentials from the profile, else from `AWS_ACCESS_KEY_ID`,
    /// `AWS_SECRET_ACCESS_KEY` and `AWS_SESSION_TOKEN`.
    pub fn resolve(params: &SqsParams) -> Result<Self, MqError> {
        let non_empty = |v: &Option<String>| v.clone().filter(|s| !s.trim().is_empty());
        match (non_empty(&params.access_key_id), non_empty(&params.secret_access_key)) {
            (Some(access_key_id), Some(secret)) => Ok(Self {
                access_key_id,
                secret_access_key: SecretString::from(secret),
                session_token: None,
            }),
            (Some(_), None) | (None, Some(_)) => Err(MqError::InvalidProfile(
                "accessKeyId and secretAccessKey must be set together".into(),
            )),
            (None, None) => {
                let access_key_id = std::env::var("AWS_ACCESS_KEY_ID").map_err(|_| {
                    MqError::InvalidProfile("no access key in profile and AWS_ACCESS_KEY_ID not set".into())
                })?;
                let secret = std::env::var("AWS_SECRET_ACCESS_KEY").map_err(|_| {
                    MqError::InvalidProfile("AWS_SECRET_ACCESS_KEY not set".into())
                })?;
                Ok(Self {
                    access_key_id,
                    secret_access_key: SecretString::from(secret),
                    session_token: std::env::var("AWS_SESSION_TOKEN").ok().map(SecretString::from),
                })
            }
        }
    }
}

/// What a request looks like to the signer.
pub struct CanonicalRequest<'a> {
    pub method: &'a str,
    /// Already URI-encoded path, `/` when empty.
    pub path: &'a str,
    pub query: &'a [(&'a str, &'a str)],
    /// Headers to sign, including `host`.
    pub headers: &'a [(&'a str, &'a str)],
    pub body: &'a [u8],
}

/// Signing scope.
pub struct Scope<'a> {
    pub region: &'a str,
    pub service: &'a str,
}

/// Headers to add to the request: `x-amz-date`, `authorization` and, with
/// temporary credentials, `x-amz-security-token`.
pub fn sign(
    request: &CanonicalRequest<'_>,
    scope: &Scope<'_>,
    credentials: &AwsCredentials,
    now: DateTime<Utc>,
) -> Result<Vec<(&'static str, String)>, MqError> {
    let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
    let date = now.format("%Y%m%d").to_string();

    let mut headers: Vec<(String, String)> = request
        .headers
        .iter()
        .map(|(k, v)| (k.to_ascii_lowercase(), v.trim().to_string()))
        .collect();
    headers.push(("x-amz-date".into(), amz_date.clone()));
    if let Some(token) = &credentials.session_token {
        headers.push(("x-amz-security-token".into(), token.expose_secret().to_string()));
    }
    headers.sort();

    let canonical_headers: String = headers.iter().map(|(k, v)| format!("{k}:{v}\n")).collect();
    let signed_headers = headers
        .iter()
        .map(|(k, _)| k.as_str())
        .collect::<Vec<_>>()
        .join(";");

    let mut query: Vec<(String, String)> = request
        .query
        .iter()
        .map(|(k, v)| (uri_encode(k), uri_encode(v)))
        .collect();
    query.sort();
    let canonical_query = query
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    let path = if request.path.is_empty() { "/" } else { request.path };
    let canonical = format!(
        "{}\n{path}\n{canonical_query}\n{canonical_headers}\n{signed_headers}\n{}",
        request.method,
        hex::encode(Sha256::digest(request.body))
    );

    let credential_scope = format!("{date}/{}/{}/aws4_request", scope.region, scope.service);
    let string_to_sign = format!(
        "{ALGORITHM}\n{amz_date}\n{credential_scope}\n{}",
        hex::encode(Sha256::digest(canonical.as_bytes()))
    );

    let key = signing_key(
        credentials.secret_access_key.expose_secret(),
        &date,
        scope.region,
        scope.service,
    )?;
    let signature = hex::encode(hmac(&key, string_to_sign.as_bytes())?);

    let mut out = vec![
        ("x-amz-date", amz_date),
        (
            "authorization",
            format!(
                "{ALGORITHM} Credential={}/{credential_scope}, SignedHeaders={signed_headers}, Signature={signature}",
                credentials.access_key_id
            ),
        ),
    ];
    if let Some(token) = &credentials.session_token {
        out.push(("x-amz-security-token", token.expose_secret().to_string()));
    }
    Ok(out)
}

fn signing_key(secret: &str, date: &str, region: &str, service: &str) -> Result<Vec<u8>, MqError> {
    let k_date = hmac(format!("AWS4{secret}").as_bytes(), date.as_bytes())?;
    let k_region = hmac(&k_date, region.as_bytes())?;
    let k_service = hmac(&k_region, service.as_bytes())?;
    hmac(&k_service, b"aws4_request")
}

fn hmac(key: &[u8], data: &[u8]) -> Result<Vec<u8>, MqError> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| MqError::Internal(format!("HMAC key rejected: {e}")))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// RFC 3986 encoding with only unreserved characters left bare.
fn uri_encode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => out.push(byte as char),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn example_credentials() -> AwsCredentials {
        AwsCredentials {
            access_key_id: "AKIDEXAMPLE".into(),
            secret_access_key: SecretString::from("wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY"),
            session_token: None,
        }
    }

    #[test]
    fn signing_key_matches_published_derivation() {
        let key = signing_key(
            "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY",
            "20120215",
            "us-east-1",
            "iam",
        )
        .unwrap();
        assert_eq!(
            hex::encode(key),
            "f4780e2d9f65fa895f9c67b32ce1baf0b0d8a43505a000a1a9e090d414db404d"
        );
    }

    #[test]
    fn get_vanilla_signature() {
        let now = Utc.with_ymd_and_hms(2015, 8, 30, 12, 36, 0).unwrap();
        let headers = sign(
            &CanonicalRequest {
                method: "GET",
                path: "/",
                query: &[],
                headers: &[("Host", "example.amazonaws.com")],
                body: b"",
            },
            &Scope {
                region: "us-east-1",
                service: "service",
            },
            &example_credentials(),
            now,
        )
        .unwrap();
        assert_eq!(headers[0], ("x-amz-date", "20150830T123600Z".to_string()));
        assert_eq!(
            headers[1].1,
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20150830/us-east-1/service/aws4_request, \
             SignedHeaders=host;x-amz-date, \
             Signature=5fa00fa31553b73ebf1942676e86291e8372ff2a2260956d9b8aae1d763fbf31"
        );
    }

    #[test]
    fn session_token_is_signed_and_returned() {
        let mut creds = example_credentials();
        creds.session_token = Some(SecretString::from("tok"));
        let headers = sign(
            &CanonicalRequest {
                method: "POST",
                path: "/",
                query: &[],
                headers: &[("host", "sqs.eu-west-1.amazonaws.com")],
                body: b"{}",
            },
            &Scope {
                region: "eu-west-1",
                service: "sqs",
            },
            &creds,
            Utc::now(),
        )
        .unwrap();
        assert!(headers[1].1.contains("SignedHeaders=host;x-amz-date;x-amz-security-token"));
        assert_eq!(headers[2], ("x-amz-security-token", "tok".to_string()));
    }

    #[test]
    fn uri_encode_leaves_unreserved_only() {
        assert_eq!(uri_encode("a b/c~d"), "a%20b%2Fc~d");
    }

    #[test]
    fn half_set_profile_keys_are_rejected() {
        let params = SqsParams {
            region: "eu-west-1".into(),
            access_key_id: Some("AKID".into()),
            ..SqsParams::default()
        };
        assert!(matches!(AwsCredentials::resolve(&params), Err(MqError::InvalidProfile(_))));
    }
}
