//! Events that can occur in a conversation

use crate::db::MessageKind;
use crate::responder::ResponderReply;

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    /// Inbound message from the external party.
    /// `first_interaction` is computed by the command layer before the
    /// event is queued: whether this is the party's first-ever message in
    /// the conversation.
    CustomerMessage {
        text: String,
        first_interaction: bool,
    },

    /// Outbound message authored by a roster member (chat or internal note)
    AgentMessage {
        agent_id: String,
        text: String,
        kind: MessageKind,
    },

    /// Explicit take-over without sending a message
    TakeOver { agent_id: String },

    /// Manual return of a human-owned thread to the automated responder
    ReturnToAutomated,

    /// The in-flight responder call produced a reply
    ReplyReady { reply: ResponderReply },

    /// The in-flight responder call failed or timed out
    ReplyFailed { message: String },
}
