//! Identity collaborator: confirms a stored credential record is still a
//! valid session.
//!
//! `TokenInfoProvider` asks Google's `tokeninfo` endpoint about the access
//! token. Only a connect timeout is applied; a slow endpoint keeps the
//! resolver loading until it answers.

use async_trait::async_trait;
use serde::Deserialize;

use crate::credentials::CredentialRecord;

/// Errors reaching or interpreting the identity collaborator.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("Cannot reach identity service at {0}")]
    Connection(String),
    #[error("HTTP error: {0}")]
    HttpClient(String),
    #[error("Identity service returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Unreadable identity response: {0}")]
    ResponseParsing(String),
}

/// Answers "is this credential record a live session?".
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn validate(&self, record: &CredentialRecord) -> Result<bool, IdentityError>;
}

// ═══════════════════════════════════════════════════════════
// TokenInfoProvider
// ═══════════════════════════════════════════════════════════

const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Response body from `GET /tokeninfo?access_token=...`
#[derive(Debug, Deserialize)]
struct TokenInfoResponse {
    /// Seconds until expiry. Google sends it as a string.
    #[serde(default)]
    expires_in: Option<serde_json::Value>,
    #[serde(default)]
    email: Option<String>,
}

/// Google OAuth token validation over HTTP.
pub struct TokenInfoProvider {
    endpoint: String,
    client: reqwest::Client,
}

impl TokenInfoProvider {
    pub fn new(endpoint: &str) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("HTTP client builder failed, using defaults: {e}");
                reqwest::Client::new()
            });

        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            client,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl IdentityProvider for TokenInfoProvider {
    async fn validate(&self, record: &CredentialRecord) -> Result<bool, IdentityError> {
        let Some(token) = record.tokens.access_token() else {
            return Ok(false);
        };

        // The request URL carries the token; errors are stripped of it.
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("access_token", token)])
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    IdentityError::Connection(self.endpoint.clone())
                } else {
                    IdentityError::HttpClient(e.without_url().to_string())
                }
            })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| IdentityError::HttpClient(e.without_url().to_string()))?;

        interpret_tokeninfo(status, &body)
    }
}

/// Map a tokeninfo answer to a session verdict.
///
/// 2xx with a positive `expires_in` is a live session. 400/401 is Google's
/// answer for an invalid or expired token (a verdict, not a failure).
/// Anything else is an error, which the resolver treats as fail-closed.
fn interpret_tokeninfo(status: u16, body: &str) -> Result<bool, IdentityError> {
    match status {
        200..=299 => {
            let parsed: TokenInfoResponse = serde_json::from_str(body)
                .map_err(|e| IdentityError::ResponseParsing(e.to_string()))?;
            let expires_in = parsed.expires_in.as_ref().and_then(|v| match v {
                serde_json::Value::String(s) => s.trim().parse::<i64>().ok(),
                serde_json::Value::Number(n) => n.as_i64(),
                _ => None,
            });
            if let Some(email) = parsed.email.as_deref() {
                tracing::debug!(email, ?expires_in, "Token info received");
            }
            Ok(expires_in.map_or(true, |secs| secs > 0))
        }
        400 | 401 => Ok(false),
        _ => Err(IdentityError::Status {
            status,
            body: body.chars().take(200).collect(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::{sample_tokens, TokenBundle};

    #[test]
    fn live_token_is_valid() {
        let body = r#"{"azp":"x","aud":"x","expires_in":"3599","email":"ada@example.com"}"#;
        assert!(interpret_tokeninfo(200, body).unwrap());
    }

    #[test]
    fn numeric_expires_in_is_accepted() {
        assert!(interpret_tokeninfo(200, r#"{"expires_in":12}"#).unwrap());
        assert!(!interpret_tokeninfo(200, r#"{"expires_in":0}"#).unwrap());
    }

    #[test]
    fn missing_expires_in_still_counts_as_valid() {
        assert!(interpret_tokeninfo(200, "{}").unwrap());
    }

    #[test]
    fn invalid_token_is_a_verdict_not_an_error() {
        let body = r#"{"error":"invalid_token","error_description":"Invalid Value"}"#;
        assert!(!interpret_tokeninfo(400, body).unwrap());
        assert!(!interpret_tokeninfo(401, "").unwrap());
    }

    #[test]
    fn server_error_is_an_error() {
        match interpret_tokeninfo(503, "unavailable") {
            Err(IdentityError::Status { status, body }) => {
                assert_eq!(status, 503);
                assert_eq!(body, "unavailable");
            }
            other => panic!("Expected Status error, got: {other:?}"),
        }
    }

    #[test]
    fn garbage_success_body_is_a_parse_error() {
        assert!(matches!(
            interpret_tokeninfo(200, "<html>"),
            Err(IdentityError::ResponseParsing(_))
        ));
    }

    #[test]
    fn endpoint_trailing_slash_is_trimmed() {
        let provider = TokenInfoProvider::new("https://oauth2.googleapis.com/tokeninfo/");
        assert_eq!(provider.endpoint(), "https://oauth2.googleapis.com/tokeninfo");
    }

    #[tokio::test]
    async fn record_without_access_token_skips_network() {
        // Unroutable endpoint: any request would fail with an error.
        let provider = TokenInfoProvider::new("http://127.0.0.1:9/tokeninfo");
        let record = CredentialRecord {
            tokens: TokenBundle::default(),
            user: None,
        };
        assert!(!provider.validate(&record).await.unwrap());
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_an_error() {
        let provider = TokenInfoProvider::new("http://127.0.0.1:9/tokeninfo");
        let record = CredentialRecord {
            tokens: sample_tokens(),
            user: None,
        };
        assert!(provider.validate(&record).await.is_err());
    }

    #[tokio::test]
    async fn transport_errors_do_not_carry_the_token() {
        // Accepts connections and drops them before answering.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                drop(socket);
            }
        });

        let provider = TokenInfoProvider::new(&format!("http://{addr}/tokeninfo"));
        let record = CredentialRecord {
            tokens: sample_tokens(),
            user: None,
        };
        let err = provider.validate(&record).await.unwrap_err();
        let token = record.tokens.access_token().unwrap();
        assert!(!err.to_string().contains(token), "token leaked: {err}");
        assert!(!format!("{err:?}").contains(token));
    }
}
