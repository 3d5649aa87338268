//! Google API clients initialized from their discovery documents.
//!
//! `initialize()` fetches the REST discovery document for the API and
//! checks it names the expected service. That is the whole bootstrap the
//! mail, storage and spreadsheet clients need before first use.

use async_trait::async_trait;
use serde::Deserialize;

use super::{ServiceClient, ServiceError, ServiceKind};

pub const GMAIL_DISCOVERY_URL: &str = "https://gmail.googleapis.com/$discovery/rest?version=v1";
pub const DRIVE_DISCOVERY_URL: &str = "https://www.googleapis.com/discovery/v1/apis/drive/v3/rest";
pub const SHEETS_DISCOVERY_URL: &str = "https://sheets.googleapis.com/$discovery/rest?version=v4";

const CONNECT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Deserialize)]
struct DiscoveryDocument {
    name: String,
    #[serde(default)]
    version: Option<String>,
}

pub struct DiscoveryClient {
    kind: ServiceKind,
    api_name: &'static str,
    discovery_url: String,
    client: reqwest::Client,
}

impl DiscoveryClient {
    pub fn new(kind: ServiceKind, api_name: &'static str, discovery_url: &str) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("HTTP client builder failed, using defaults: {e}");
                reqwest::Client::new()
            });
        Self {
            kind,
            api_name,
            discovery_url: discovery_url.to_string(),
            client,
        }
    }

    pub fn gmail() -> Self {
        Self::new(ServiceKind::Mail, "gmail", GMAIL_DISCOVERY_URL)
    }

    pub fn drive() -> Self {
        Self::new(ServiceKind::Storage, "drive", DRIVE_DISCOVERY_URL)
    }

    pub fn sheets() -> Self {
        Self::new(ServiceKind::Spreadsheet, "sheets", SHEETS_DISCOVERY_URL)
    }
}

#[async_trait]
impl ServiceClient for DiscoveryClient {
    fn kind(&self) -> ServiceKind {
        self.kind
    }

    async fn initialize(&self) -> Result<(), ServiceError> {
        let response = self
            .client
            .get(&self.discovery_url)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    ServiceError::Connection(self.discovery_url.clone())
                } else {
                    ServiceError::HttpClient(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::Status {
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| ServiceError::HttpClient(e.to_string()))?;
        let version = check_discovery(self.api_name, &body)?;
        tracing::debug!(
            service = %self.kind,
            api = self.api_name,
            ?version,
            "Discovery document loaded"
        );
        Ok(())
    }
}

/// Validate a discovery document body; returns the advertised version.
fn check_discovery(api_name: &str, body: &str) -> Result<Option<String>, ServiceError> {
    let doc: DiscoveryDocument =
        serde_json::from_str(body).map_err(|e| ServiceError::Discovery(e.to_string()))?;
    if doc.name != api_name {
        return Err(ServiceError::Discovery(format!(
            "expected api '{api_name}', got '{}'",
            doc.name
        )));
    }
    Ok(doc.version)
}
