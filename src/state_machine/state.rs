//! Conversation state types

use crate::db::Ownership;
use serde::{Deserialize, Serialize};

/// An inbound customer message whose evaluation is waiting for the
/// in-flight responder call to resolve. The message itself is already in
/// the store; only its evaluation is deferred.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedInbound {
    pub text: String,
    pub first_interaction: bool,
}

/// Conversation state
///
/// Ownership is `Automated` in both `Automated` and `ReplyPending`;
/// `ReplyPending` additionally records that exactly one responder call is
/// in flight and which inbound evaluations are waiting behind it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConvState {
    /// The automated responder owns the thread, nothing in flight
    #[default]
    Automated,

    /// The automated responder owns the thread and one call is in flight
    ReplyPending {
        #[serde(default)]
        queued: Vec<QueuedInbound>,
    },

    /// A specific human owns the thread; the engine performs no automatic
    /// replies in this state
    Human { agent_id: String },
}

impl ConvState {
    /// Starting state for a conversation loaded from the registry.
    /// An in-flight responder call is never persisted, so a restart always
    /// resumes automated conversations in the quiescent state.
    pub fn from_ownership(ownership: &Ownership) -> Self {
        match ownership {
            Ownership::Automated => ConvState::Automated,
            Ownership::Human { agent_id } => ConvState::Human {
                agent_id: agent_id.clone(),
            },
        }
    }

    /// Current ownership as stored on the conversation record
    pub fn ownership(&self) -> Ownership {
        match self {
            ConvState::Automated | ConvState::ReplyPending { .. } => Ownership::Automated,
            ConvState::Human { agent_id } => Ownership::Human {
                agent_id: agent_id.clone(),
            },
        }
    }

    /// Check if a responder call is outstanding
    pub fn is_reply_pending(&self) -> bool {
        matches!(self, ConvState::ReplyPending { .. })
    }
}

/// Context for a conversation (immutable configuration)
#[derive(Debug, Clone)]
pub struct ConvContext {
    pub conversation_id: String,
    /// External-party identifier of the thread's counterpart
    pub contact_id: String,
    /// Human who receives the thread when the responder signals handoff
    pub escalation_agent_id: String,
}

impl ConvContext {
    pub fn new(
        conversation_id: impl Into<String>,
        contact_id: impl Into<String>,
        escalation_agent_id: impl Into<String>,
    ) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            contact_id: contact_id.into(),
            escalation_agent_id: escalation_agent_id.into(),
        }
    }
}
