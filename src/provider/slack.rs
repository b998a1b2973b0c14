//! HTTP binding for the chat provider (Web API).

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use super::ChatProvider;
use crate::constants::PROVIDER_CHAT;
use crate::errors::ProviderError;

pub struct SlackClient {
    base_url: String,
    token: String,
    http_client: reqwest::Client,
}

/// Every Web API response carries `ok`; failures name the cause in `error`.
#[derive(Deserialize)]
struct ApiResponse {
    ok: bool,
    error: Option<String>,
}

impl SlackClient {
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
        http_client: reqwest::Client,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            token: token.into(),
            http_client,
        }
    }

    fn api_url(&self, method: &str) -> String {
        format!("{}/api/{}", self.base_url.trim_end_matches('/'), method)
    }
}

#[async_trait]
impl ChatProvider for SlackClient {
    #[instrument(skip(self, text))]
    async fn post_message(&self, channel: &str, text: &str) -> Result<(), ProviderError> {
        let operation = "chat.postMessage";
        let response = self
            .http_client
            .post(self.api_url(operation))
            .bearer_auth(&self.token)
            .json(&json!({ "channel": channel, "text": text }))
            .send()
            .await
            .map_err(|e| ProviderError::RequestFailed {
                provider: PROVIDER_CHAT.to_string(),
                operation: operation.to_string(),
                details: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::UnexpectedStatus {
                provider: PROVIDER_CHAT.to_string(),
                operation: operation.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        let api_response: ApiResponse =
            response.json().await.map_err(|e| ProviderError::Decode {
                provider: PROVIDER_CHAT.to_string(),
                operation: operation.to_string(),
                details: e.to_string(),
            })?;

        if !api_response.ok {
            return Err(ProviderError::Api {
                provider: PROVIDER_CHAT.to_string(),
                operation: operation.to_string(),
                details: api_response
                    .error
                    .unwrap_or_else(|| "unknown_error".to_string()),
            });
        }

        Ok(())
    }
}
