//! HTTP responder gateway client

use super::{ResponderError, ResponderGateway, ResponderReply, ResponderRequest};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Client for an HTTP responder endpoint speaking a small JSON protocol:
/// POST the request, receive `{ "reply": ..., "handoff": ... }`.
pub struct HttpResponder {
    client: Client,
    url: String,
    api_key: Option<String>,
}

impl HttpResponder {
    pub fn new(url: String, api_key: Option<String>, timeout: Duration) -> Self {
        // The overall call deadline is enforced by the runtime; this client
        // timeout is a backstop slightly above it so the connection is not
        // held open after the caller gave up.
        let client = Client::builder()
            .timeout(timeout + Duration::from_secs(5))
            .build()
            .unwrap_or_default();
        Self {
            client,
            url,
            api_key,
        }
    }

    fn translate_request(request: &ResponderRequest) -> WireRequest<'_> {
        WireRequest {
            message: &request.message_text,
            knowledge: request
                .knowledge
                .iter()
                .map(|k| WireKnowledge {
                    question: &k.question,
                    answer: &k.answer,
                })
                .collect(),
            tone: &request.tone,
            first_interaction: request.first_interaction,
        }
    }

    fn classify_error(status: reqwest::StatusCode, body: &str) -> ResponderError {
        match status.as_u16() {
            401 | 403 => ResponderError::auth(format!("Authentication failed: {body}")),
            429 => ResponderError::rate_limit(format!("Rate limited: {body}")),
            400 => ResponderError::invalid_request(format!("Invalid request: {body}")),
            500..=599 => ResponderError::server_error(format!("Server error: {body}")),
            _ => ResponderError::network(format!("HTTP {status}: {body}")),
        }
    }
}

#[async_trait]
impl ResponderGateway for HttpResponder {
    async fn complete(&self, request: &ResponderRequest) -> Result<ResponderReply, ResponderError> {
        let wire_request = Self::translate_request(request);

        let mut builder = self.client.post(&self.url).json(&wire_request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                ResponderError::timeout(format!("Request timeout: {e}"))
            } else if e.is_connect() {
                ResponderError::network(format!("Connection failed: {e}"))
            } else {
                ResponderError::network(format!("Request failed: {e}"))
            }
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ResponderError::network(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(Self::classify_error(status, &body));
        }

        let wire: WireReply = serde_json::from_str(&body).map_err(|e| {
            ResponderError::invalid_request(format!("Failed to parse response: {e} - body: {body}"))
        })?;

        Ok(ResponderReply {
            reply_text: wire.reply,
            requires_handoff: wire.handoff,
        })
    }
}

// Wire types

#[derive(Debug, Serialize)]
struct WireRequest<'a> {
    message: &'a str,
    knowledge: Vec<WireKnowledge<'a>>,
    tone: &'a str,
    first_interaction: bool,
}

#[derive(Debug, Serialize)]
struct WireKnowledge<'a> {
    question: &'a str,
    answer: &'a str,
}

#[derive(Debug, Deserialize)]
struct WireReply {
    reply: String,
    #[serde(default)]
    handoff: bool,
}
