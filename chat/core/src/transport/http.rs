//! HTTP Chat Endpoint
//!
//! Talks to the assistant server over plain HTTP:
//! - `POST {base_url}/api/chat` streams the reply as raw text
//! - `POST {base_url}/api/chat/end` ends a conversation
//!
//! Only a connect timeout applies to the chat request; a whole-request
//! timeout would cut long answers off mid-stream.

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};

use super::traits::{ByteStream, ChatEndpoint};
use crate::config::EndpointConfig;
use crate::error::TransportError;
use crate::messages::{ChatRequest, ConversationId, EndConversationRequest};

/// reqwest-backed endpoint
#[derive(Clone, Debug)]
pub struct HttpEndpoint {
    config: EndpointConfig,
    http_client: reqwest::Client,
}

impl HttpEndpoint {
    /// Create an endpoint from configuration
    ///
    /// # Errors
    ///
    /// Fails if the HTTP client cannot be built (e.g. TLS backend unavailable).
    pub fn new(config: EndpointConfig) -> Result<Self, TransportError> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()?;
        Ok(Self {
            config,
            http_client,
        })
    }

    /// Endpoint configuration
    #[must_use]
    pub fn config(&self) -> &EndpointConfig {
        &self.config
    }
}

/// Turn a non-success response into a [`TransportError::Status`]
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(TransportError::Status {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl ChatEndpoint for HttpEndpoint {
    fn name(&self) -> &str {
        "http"
    }

    async fn open_stream(&self, request: &ChatRequest) -> Result<ByteStream, TransportError> {
        let url = self.config.chat_url();
        tracing::debug!(url = %url, messages = request.messages.len(), "Opening chat stream");

        let response = self.http_client.post(&url).json(request).send().await?;
        let response = check_status(response).await?;

        Ok(response
            .bytes_stream()
            .map_err(TransportError::from)
            .boxed())
    }

    async fn end_conversation(&self, id: &ConversationId) -> Result<(), TransportError> {
        let url = self.config.end_url();
        tracing::debug!(url = %url, conversation_id = %id, "Ending conversation");

        let body = EndConversationRequest {
            conversation_id: id.clone(),
        };
        let response = self
            .http_client
            .post(&url)
            .timeout(self.config.end_timeout)
            .json(&body)
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }
}
