use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

/// Options for the HTTP client used to read inverter status pages.
#[cfg_attr(feature = "config", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    /// Per-request timeout in milliseconds. `None` keeps the client default (no timeout).
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to build http client: {0}")]
    Build(reqwest::Error),
    #[error("request failed: {0}")]
    Request(reqwest::Error),
    #[error("unexpected http status {status}")]
    Status { status: u16 },
    #[error("failed to read response body: {0}")]
    Body(reqwest::Error),
}

/// Outcome of one status page fetch.
#[derive(Debug)]
pub enum RawStatus {
    Payload(Vec<u8>),
    /// The inverter could not be read. At night the inverter shuts down, so this is routine.
    Unavailable(ClientError),
}

impl RawStatus {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Anything that can return the raw status page of an inverter.
#[async_trait]
pub trait StatusSource: Send + Sync {
    /// Never fails: every error is reported as [`RawStatus::Unavailable`].
    async fn fetch(&self, url: &str) -> RawStatus;
}

#[derive(Debug, Clone)]
pub struct StatusClient {
    http: reqwest::Client,
}

impl StatusClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout_ms) = config.timeout_ms {
            builder = builder.timeout(Duration::from_millis(timeout_ms));
        }
        let http = builder.build().map_err(ClientError::Build)?;
        Ok(Self { http })
    }

    async fn try_fetch(&self, url: &str) -> Result<Vec<u8>, ClientError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(ClientError::Request)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status {
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(ClientError::Body)?;
        debug!(url, bytes = body.len(), "status page received");
        Ok(body.to_vec())
    }
}

#[async_trait]
impl StatusSource for StatusClient {
    async fn fetch(&self, url: &str) -> RawStatus {
        debug!(url, "connecting to inverter");
        match self.try_fetch(url).await {
            Ok(body) => RawStatus::Payload(body),
            Err(err) => {
                debug!(url, error = %err, "status fetch failed");
                RawStatus::Unavailable(err)
            }
        }
    }
}
