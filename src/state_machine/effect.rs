//! Effects produced by state transitions

use crate::db::MessageKind;

/// Effects to be executed after a state transition, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Append the inbound customer message to the store (atomic with the
    /// conversation's summary-field update)
    PersistInbound { text: String },

    /// Append a human-authored message
    PersistAgentMessage {
        agent_id: String,
        text: String,
        kind: MessageKind,
    },

    /// Append the automated responder's reply
    PersistBotReply { text: String },

    /// Persist the conversation's current ownership to the registry
    PersistOwnership,

    /// Start a responder call for this inbound text (spawned in the
    /// background; completion comes back as `ReplyReady`/`ReplyFailed`)
    InvokeResponder {
        text: String,
        first_interaction: bool,
    },

    /// Surface a recoverable responder failure to operators
    NotifyResponderError { message: String },
}

impl Effect {
    pub fn agent_message(
        agent_id: impl Into<String>,
        text: impl Into<String>,
        kind: MessageKind,
    ) -> Self {
        Effect::PersistAgentMessage {
            agent_id: agent_id.into(),
            text: text.into(),
            kind,
        }
    }

    pub fn invoke_responder(text: impl Into<String>, first_interaction: bool) -> Self {
        Effect::InvokeResponder {
            text: text.into(),
            first_interaction,
        }
    }
}
