//! Automated responder gateway abstraction
//!
//! The responder is an opaque external collaborator: it receives the
//! inbound text plus the deployment's knowledge context and returns a reply
//! and a handoff signal. Failures are all-or-nothing and classified for
//! retry; the state machine absorbs them without changing ownership.

mod http;

pub use http::HttpResponder;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A question/answer pair given to the responder as grounding context
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    pub question: String,
    pub answer: String,
}

/// Input of a responder call
#[derive(Debug, Clone, Serialize)]
pub struct ResponderRequest {
    pub message_text: String,
    pub knowledge: Vec<KnowledgeEntry>,
    pub tone: String,
    pub first_interaction: bool,
}

/// Output of a responder call
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ResponderReply {
    pub reply_text: String,
    /// The responder could not answer and asks for a human
    pub requires_handoff: bool,
}

/// Responder error with classification
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ResponderError {
    pub kind: ResponderErrorKind,
    pub message: String,
}

impl ResponderError {
    pub fn new(kind: ResponderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ResponderErrorKind::Network, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ResponderErrorKind::Timeout, message)
    }

    pub fn rate_limit(message: impl Into<String>) -> Self {
        Self::new(ResponderErrorKind::RateLimit, message)
    }

    pub fn server_error(message: impl Into<String>) -> Self {
        Self::new(ResponderErrorKind::ServerError, message)
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(ResponderErrorKind::Auth, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ResponderErrorKind::InvalidRequest, message)
    }

    pub fn unconfigured() -> Self {
        Self::new(
            ResponderErrorKind::Unconfigured,
            "no responder endpoint configured",
        )
    }
}

/// Error classification for retry logic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponderErrorKind {
    /// Network issues - retryable
    Network,
    /// Call exceeded the configured deadline - retryable
    Timeout,
    /// Rate limited (429) - retryable with backoff
    RateLimit,
    /// Server error (5xx) - retryable
    ServerError,
    /// Authentication failed (401, 403) - not retryable
    Auth,
    /// Bad request (400) - not retryable
    InvalidRequest,
    /// No endpoint configured for this deployment - not retryable
    Unconfigured,
}

impl ResponderErrorKind {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network | Self::Timeout | Self::RateLimit | Self::ServerError
        )
    }
}

/// Common interface for responder implementations
#[async_trait]
pub trait ResponderGateway: Send + Sync {
    /// Produce a reply for an inbound customer message. All-or-nothing:
    /// an error means no partial output was produced.
    async fn complete(&self, request: &ResponderRequest) -> Result<ResponderReply, ResponderError>;
}

/// Placeholder for deployments without a responder endpoint. Every call
/// fails with a non-retryable error, which the state machine absorbs as a
/// recoverable failure (no reply, ownership untouched).
pub struct UnconfiguredResponder;

#[async_trait]
impl ResponderGateway for UnconfiguredResponder {
    async fn complete(&self, _request: &ResponderRequest) -> Result<ResponderReply, ResponderError> {
        Err(ResponderError::unconfigured())
    }
}
