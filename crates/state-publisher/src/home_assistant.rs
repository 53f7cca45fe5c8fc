use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use tracing::debug;

use crate::{PublishError, SensorAttributes, StateSink, StateUpdate};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Writes entity states through the Home Assistant REST API.
#[derive(Debug, Clone)]
pub struct HomeAssistantSink {
    base_url: String,
    token: String,
    client: Client,
}

#[derive(Serialize)]
struct StateBody<'a> {
    state: &'a str,
    attributes: &'a SensorAttributes,
}

impl HomeAssistantSink {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Result<Self, PublishError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(PublishError::Build)?;
        let base_url = base_url.into().trim_end_matches('/').to_string();

        Ok(Self {
            base_url,
            token: token.into(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl StateSink for HomeAssistantSink {
    async fn set_state(&self, update: &StateUpdate) -> Result<(), PublishError> {
        let url = format!("{}/api/states/{}", self.base_url, update.entity_id);
        debug!(entity_id = %update.entity_id, state = %update.state, "posting state");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&StateBody {
                state: &update.state,
                attributes: &update.attributes,
            })
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(PublishError::Unauthorized),
            status => {
                let message = response.text().await.unwrap_or_default();
                Err(PublishError::Rejected {
                    status: status.as_u16(),
                    message,
                })
            }
        }
    }
}
