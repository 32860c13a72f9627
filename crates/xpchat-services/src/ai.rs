use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use xpchat_types::ChatError;
use xpchat_types::api::{Ack, CompletionBody, CompletionRequest};
use xpchat_types::collab::Assistant;

use crate::endpoint::EndpointClient;

/// Assistant backed by an HTTP completion endpoint.
///
/// The endpoint only acknowledges the request; the reply is written into the
/// room by the backend and reaches the feed through the subscription.
#[derive(Debug, Clone)]
pub struct HttpAssistant {
    endpoint: EndpointClient,
}

impl HttpAssistant {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ChatError> {
        Ok(Self {
            endpoint: EndpointClient::new(url, timeout)?,
        })
    }
}

#[async_trait]
impl Assistant for HttpAssistant {
    async fn complete(&self, request: CompletionRequest) -> Result<Ack, ChatError> {
        info!(
            "Asking assistant for {} in {} ({} chars)",
            request.identity.id,
            request.room,
            request.prompt.chars().count()
        );
        let body = CompletionBody::from(&request);
        let builder = self.endpoint.client().post(self.endpoint.url()).json(&body);
        self.endpoint.call(builder).await
    }
}
