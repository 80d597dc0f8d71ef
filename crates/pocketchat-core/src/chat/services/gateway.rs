//! Completion endpoint client.

use thiserror::Error;
use tracing::debug;

use super::request::{CompletionRequest, CompletionResponse};
use crate::chat::repositories::BoxFuture;

pub const OPENAI_API_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("remote error ({status}): {message}")]
    Remote { status: u16, message: String },

    #[error("completion response contained no choices")]
    EmptyResponse,
}

/// The remote completion API, reduced to the one call the core needs.
/// Implemented over HTTP in production and stubbed in tests.
pub trait CompletionGateway: Send + Sync + 'static {
    /// Send an assembled request; resolve to the assistant reply text.
    fn complete(
        &self,
        request: CompletionRequest,
    ) -> BoxFuture<'static, Result<String, GatewayError>>;
}

/// OpenAI-compatible chat-completions client.
pub struct OpenAiGateway {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenAiGateway {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: OPENAI_API_URL.to_string(),
            api_key: api_key.into(),
        }
    }

    /// Point at a non-default endpoint (proxy, compatible provider).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

impl CompletionGateway for OpenAiGateway {
    fn complete(
        &self,
        request: CompletionRequest,
    ) -> BoxFuture<'static, Result<String, GatewayError>> {
        let client = self.client.clone();
        let url = format!("{}/chat/completions", self.base_url);
        let api_key = self.api_key.clone();

        Box::pin(async move {
            debug!(model = %request.model, turns = request.messages.len(), "Sending completion request");

            let response = client
                .post(&url)
                .bearer_auth(&api_key)
                .json(&request)
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                let message = response.text().await.unwrap_or_default();
                return Err(GatewayError::Remote {
                    status: status.as_u16(),
                    message,
                });
            }

            let body: CompletionResponse = response.json().await?;
            body.choices
                .into_iter()
                .next()
                .and_then(|choice| choice.message.content)
                .ok_or(GatewayError::EmptyResponse)
        })
    }
}
