//! API request/response types

use crate::db::{Contact, ContactActivity, Conversation, KbEntry, Message, MessageKind};
use crate::team::TeamMember;
use serde::{Deserialize, Serialize};

// ============================================================
// Requests
// ============================================================

/// Inbound message from the transport layer (or its simulation)
#[derive(Debug, Deserialize)]
pub struct IngressRequest {
    /// External-party identifier (phone/handle)
    pub contact_id: String,
    pub name: Option<String>,
    pub avatar: Option<String>,
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub text: String,
    #[serde(default)]
    pub kind: MessageKind,
}

#[derive(Debug, Deserialize)]
pub struct TakeOverRequest {
    pub agent_id: String,
}

#[derive(Debug, Deserialize)]
pub struct StartConversationRequest {
    pub contact_id: String,
    pub agent_id: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStageRequest {
    pub stage: crate::db::PipelineStage,
}

#[derive(Debug, Deserialize)]
pub struct AddActivityRequest {
    pub kind: crate::db::ActivityKind,
    pub body: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateKbEntryRequest {
    pub question: String,
    pub answer: String,
}

// ============================================================
// Responses
// ============================================================

#[derive(Debug, Serialize)]
pub struct IngressResponse {
    pub conversation_id: String,
    pub queued: bool,
}

#[derive(Debug, Serialize)]
pub struct ConversationListResponse {
    pub conversations: Vec<Conversation>,
}

#[derive(Debug, Serialize)]
pub struct ConversationResponse {
    pub conversation: Conversation,
}

#[derive(Debug, Serialize)]
pub struct ConversationWithMessagesResponse {
    pub conversation: Conversation,
    pub messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
pub struct ContactListResponse {
    pub contacts: Vec<Contact>,
}

#[derive(Debug, Serialize)]
pub struct ContactResponse {
    pub contact: Contact,
    pub activities: Vec<ContactActivity>,
}

#[derive(Debug, Serialize)]
pub struct KbListResponse {
    pub entries: Vec<KbEntry>,
}

#[derive(Debug, Serialize)]
pub struct TeamResponse {
    pub members: Vec<TeamMember>,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
