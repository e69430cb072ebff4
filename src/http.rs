use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;

use crate::entry::WriteRequest;
use crate::env::{
    env_or, STACKDRIVER_ACCESS_TOKEN_ENV, STACKDRIVER_ENDPOINT_ENV, STACKDRIVER_PROJECT_ID_ENV,
};
use crate::error::LoggingError;
use crate::stackdriver::{ClientConfig, StackdriverClient};
use crate::transport::Transport;

/// Public Cloud Logging v2 write endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://logging.googleapis.com/v2/entries:write";

/// Configuration for [`HttpTransport`].
///
/// The transport does not mint credentials. Pass an OAuth2 access token
/// obtained elsewhere, or leave it unset when talking to an emulator or an
/// authenticating proxy.
#[derive(Clone, Debug)]
pub struct HttpConfig {
    /// Full URL of the `entries:write` method.
    pub endpoint: String,
    pub access_token: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            access_token: None,
        }
    }
}

impl HttpConfig {
    /// Read `STACKDRIVER_ENDPOINT` and `STACKDRIVER_ACCESS_TOKEN`, falling
    /// back to the defaults.
    pub fn from_env() -> Self {
        let access_token = std::env::var(STACKDRIVER_ACCESS_TOKEN_ENV)
            .ok()
            .filter(|token| !token.is_empty());

        HttpConfig {
            endpoint: env_or(STACKDRIVER_ENDPOINT_ENV, DEFAULT_ENDPOINT),
            access_token,
        }
    }
}

/// [`Transport`] posting JSON `entries:write` requests over HTTPS.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    config: HttpConfig,
}

impl HttpTransport {
    pub fn new(config: HttpConfig) -> Self {
        let client = Client::new();
        Self { client, config }
    }

    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn write_entries(&self, request: &WriteRequest) -> Result<(), LoggingError> {
        let body = serde_json::to_vec(request)?;
        let mut req = self
            .client
            .post(&self.config.endpoint)
            .header("Content-Type", "application/json")
            .body(body);
        if let Some(token) = &self.config.access_token {
            req = req.bearer_auth(token);
        }

        let resp = req.send().await.map_err(|e| LoggingError::Transport(Box::new(e)))?;
        if resp.status().is_success() {
            Ok(())
        } else {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_else(|_| "<no body>".to_string());
            Err(LoggingError::Http { status, body })
        }
    }
}

impl StackdriverClient {
    /// Client over [`HttpTransport`] for `project_id`.
    pub fn with_http(
        project_id: impl Into<String>,
        http: HttpConfig,
        config: ClientConfig,
    ) -> Result<Self, LoggingError> {
        StackdriverClient::new(project_id, Arc::new(HttpTransport::new(http)), config)
    }

    /// Client configured entirely from the environment.
    ///
    /// **Returns**
    /// - `Err(LoggingError::MissingConfig(..))` when `STACKDRIVER_PROJECT_ID`
    ///   is unset or empty.
    pub fn from_env() -> Result<Self, LoggingError> {
        let project_id = std::env::var(STACKDRIVER_PROJECT_ID_ENV)
            .ok()
            .filter(|id| !id.is_empty())
            .ok_or(LoggingError::MissingConfig(STACKDRIVER_PROJECT_ID_ENV))?;

        Self::with_http(project_id, HttpConfig::from_env(), ClientConfig::default())
    }
}
