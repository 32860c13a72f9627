//! Shared plumbing for the JSON endpoints the console calls.
//!
//! Endpoints answer `2xx` with their payload on success. Failures come back
//! either as a non-2xx status or as `{ "ok": false, "code": ..., "message": ... }`;
//! both are mapped onto [`ChatError`] here so callers only see one taxonomy.

use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use xpchat_types::ChatError;
use xpchat_types::api::EndpointReply;

/// Longest backend message carried into a `BackendRejected`.
const MAX_REPLY_MESSAGE: usize = 240;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// A reqwest client bound to one endpoint URL.
#[derive(Debug, Clone)]
pub struct EndpointClient {
    client: Client,
    url: String,
}

impl EndpointClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ChatError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT.min(timeout))
            .timeout(timeout)
            .build()
            .map_err(|e| ChatError::NetworkUnavailable(format!("http client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Send a prepared request and decode a successful reply as `T`.
    pub async fn call<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ChatError> {
        let response = request.send().await.map_err(transport_error)?;
        decode(response).await
    }
}

/// Map a reqwest transport failure.
pub fn transport_error(err: reqwest::Error) -> ChatError {
    if err.is_timeout() {
        warn!("Endpoint request timed out: {}", err);
        ChatError::Timeout
    } else {
        warn!("Endpoint unreachable: {}", err);
        ChatError::NetworkUnavailable(err.to_string())
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ChatError> {
    let status = response.status();
    let text = response.text().await.map_err(transport_error)?;
    debug!("Endpoint replied {} ({} bytes)", status, text.len());

    let reply: EndpointReply = serde_json::from_str(&text).unwrap_or_default();
    if !status.is_success() || reply.ok == Some(false) {
        return Err(rejection(status, reply, &text));
    }

    serde_json::from_str(&text).map_err(|e| {
        warn!("Endpoint reply could not be decoded: {}", e);
        ChatError::backend("BAD_REPLY", truncate(&e.to_string()))
    })
}

fn rejection(status: StatusCode, reply: EndpointReply, raw: &str) -> ChatError {
    let code = reply
        .code
        .filter(|c| !c.trim().is_empty())
        .unwrap_or_else(|| format!("HTTP_{}", status.as_u16()));
    let message = reply.message.unwrap_or_else(|| raw.to_string());
    ChatError::backend(code, truncate(&message))
}

fn truncate(message: &str) -> String {
    message.chars().take(MAX_REPLY_MESSAGE).collect()
}
