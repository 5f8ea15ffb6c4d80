//! Database schema and record types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// SQL schema for initialization
pub const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS contacts (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    avatar TEXT,
    tags TEXT NOT NULL DEFAULT '[]',
    stage TEXT NOT NULL DEFAULT 'contact',
    owner_id TEXT NOT NULL,
    value REAL NOT NULL DEFAULT 0,
    temperature TEXT NOT NULL DEFAULT 'warm',
    next_action_at TEXT,
    lead_source TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS conversations (
    id TEXT PRIMARY KEY,
    contact_id TEXT NOT NULL,
    display_name TEXT NOT NULL,
    avatar TEXT,
    owner_kind TEXT NOT NULL DEFAULT 'automated',
    owner_id TEXT,
    last_message TEXT,
    last_message_at TEXT,
    unread_count INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- contact_id is not an enforced foreign key: the conversation is created
-- first and the contact row is provisioned by reconciliation afterwards.
-- Cascade on contact deletion is handled in delete_contact.

CREATE UNIQUE INDEX IF NOT EXISTS idx_conversations_contact ON conversations(contact_id);
CREATE INDEX IF NOT EXISTS idx_conversations_updated ON conversations(updated_at DESC);

CREATE TABLE IF NOT EXISTS messages (
    id TEXT PRIMARY KEY,
    conversation_id TEXT NOT NULL,
    sequence_id INTEGER NOT NULL,
    sender_kind TEXT NOT NULL,
    sender_id TEXT,
    body TEXT NOT NULL,
    kind TEXT NOT NULL DEFAULT 'chat',
    delivery TEXT,
    created_at TEXT NOT NULL,

    FOREIGN KEY (conversation_id) REFERENCES conversations(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_messages_conversation ON messages(conversation_id, sequence_id);

CREATE TABLE IF NOT EXISTS contact_activities (
    id TEXT PRIMARY KEY,
    contact_id TEXT NOT NULL,
    sequence_id INTEGER NOT NULL,
    kind TEXT NOT NULL,
    body TEXT NOT NULL,
    created_at TEXT NOT NULL,

    FOREIGN KEY (contact_id) REFERENCES contacts(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_activities_contact ON contact_activities(contact_id, sequence_id);

CREATE TABLE IF NOT EXISTS kb_entries (
    id TEXT PRIMARY KEY,
    question TEXT NOT NULL,
    answer TEXT NOT NULL,
    created_at TEXT NOT NULL
);
";

// ============================================================
// Ownership
// ============================================================

/// Who answers a conversation right now
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Ownership {
    /// The automated responder owns the thread
    Automated,
    /// A specific roster member owns the thread
    Human { agent_id: String },
}

impl Ownership {
    pub fn human(agent_id: impl Into<String>) -> Self {
        Ownership::Human {
            agent_id: agent_id.into(),
        }
    }

    pub fn is_automated(&self) -> bool {
        matches!(self, Ownership::Automated)
    }

    /// Database column pair for this ownership
    pub fn to_columns(&self) -> (&'static str, Option<&str>) {
        match self {
            Ownership::Automated => ("automated", None),
            Ownership::Human { agent_id } => ("human", Some(agent_id)),
        }
    }

    /// Reconstruct from the column pair; a malformed row (human kind without
    /// an id) degrades to `Automated` rather than failing the read path.
    pub fn from_columns(kind: &str, id: Option<String>) -> Self {
        match (kind, id) {
            ("human", Some(agent_id)) => Ownership::Human { agent_id },
            _ => Ownership::Automated,
        }
    }
}

// ============================================================
// Conversations and messages
// ============================================================

/// Conversation record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    /// External-party identifier; also the id of the mirrored contact
    pub contact_id: String,
    pub display_name: String,
    pub avatar: Option<String>,
    #[serde(flatten)]
    pub ownership: Ownership,
    pub last_message: Option<String>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub unread_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SenderKind {
    /// The external party
    Contact,
    /// A roster member
    Agent,
    /// The automated responder
    Bot,
}

impl fmt::Display for SenderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SenderKind::Contact => write!(f, "contact"),
            SenderKind::Agent => write!(f, "agent"),
            SenderKind::Bot => write!(f, "bot"),
        }
    }
}

pub fn parse_sender_kind(s: &str) -> SenderKind {
    match s {
        "contact" => SenderKind::Contact,
        "agent" => SenderKind::Agent,
        _ => SenderKind::Bot,
    }
}

/// Customer-facing chat line or internal note
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    #[default]
    Chat,
    Note,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageKind::Chat => write!(f, "chat"),
            MessageKind::Note => write!(f, "note"),
        }
    }
}

pub fn parse_message_kind(s: &str) -> MessageKind {
    match s {
        "note" => MessageKind::Note,
        _ => MessageKind::Chat,
    }
}

/// Delivery status of a customer-facing message; internal notes carry none
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Delivery {
    Sent,
    Delivered,
    Read,
}

impl fmt::Display for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Delivery::Sent => write!(f, "sent"),
            Delivery::Delivered => write!(f, "delivered"),
            Delivery::Read => write!(f, "read"),
        }
    }
}

pub fn parse_delivery(s: &str) -> Option<Delivery> {
    match s {
        "sent" => Some(Delivery::Sent),
        "delivered" => Some(Delivery::Delivered),
        "read" => Some(Delivery::Read),
        _ => None,
    }
}

/// Message record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub sequence_id: i64,
    pub sender_kind: SenderKind,
    pub sender_id: Option<String>,
    pub body: String,
    pub kind: MessageKind,
    pub delivery: Option<Delivery>,
    pub created_at: DateTime<Utc>,
}

/// What to append: sender, body and kind of a new message
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub sender_kind: SenderKind,
    pub sender_id: Option<String>,
    pub body: String,
    pub kind: MessageKind,
}

impl NewMessage {
    pub fn from_contact(body: impl Into<String>) -> Self {
        Self {
            sender_kind: SenderKind::Contact,
            sender_id: None,
            body: body.into(),
            kind: MessageKind::Chat,
        }
    }

    pub fn from_agent(agent_id: impl Into<String>, body: impl Into<String>, kind: MessageKind) -> Self {
        Self {
            sender_kind: SenderKind::Agent,
            sender_id: Some(agent_id.into()),
            body: body.into(),
            kind,
        }
    }

    pub fn from_bot(body: impl Into<String>) -> Self {
        Self {
            sender_kind: SenderKind::Bot,
            sender_id: None,
            body: body.into(),
            kind: MessageKind::Chat,
        }
    }

    /// Internal notes carry no delivery status
    pub fn initial_delivery(&self) -> Option<Delivery> {
        match self.kind {
            MessageKind::Chat => Some(Delivery::Sent),
            MessageKind::Note => None,
        }
    }
}

// ============================================================
// Contacts (CRM)
// ============================================================

/// Sales pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    #[default]
    Contact,
    Qualification,
    Proposal,
    Closed,
    Lost,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineStage::Contact => write!(f, "contact"),
            PipelineStage::Qualification => write!(f, "qualification"),
            PipelineStage::Proposal => write!(f, "proposal"),
            PipelineStage::Closed => write!(f, "closed"),
            PipelineStage::Lost => write!(f, "lost"),
        }
    }
}

pub fn parse_stage(s: &str) -> PipelineStage {
    match s {
        "qualification" => PipelineStage::Qualification,
        "proposal" => PipelineStage::Proposal,
        "closed" => PipelineStage::Closed,
        "lost" => PipelineStage::Lost,
        _ => PipelineStage::Contact,
    }
}

/// Lead temperature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Temperature {
    Hot,
    #[default]
    Warm,
    Cold,
}

impl fmt::Display for Temperature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Temperature::Hot => write!(f, "hot"),
            Temperature::Warm => write!(f, "warm"),
            Temperature::Cold => write!(f, "cold"),
        }
    }
}

pub fn parse_temperature(s: &str) -> Temperature {
    match s {
        "hot" => Temperature::Hot,
        "cold" => Temperature::Cold,
        _ => Temperature::Warm,
    }
}

/// CRM record for an external party; `id` is the party identifier itself
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    pub id: String,
    pub name: String,
    pub avatar: Option<String>,
    pub tags: Vec<String>,
    pub stage: PipelineStage,
    pub owner_id: String,
    pub value: f64,
    pub temperature: Temperature,
    pub next_action_at: Option<DateTime<Utc>>,
    pub lead_source: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Kind of entry in a contact's activity log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Note,
    Email,
    StageChange,
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActivityKind::Note => write!(f, "note"),
            ActivityKind::Email => write!(f, "email"),
            ActivityKind::StageChange => write!(f, "stage_change"),
        }
    }
}

pub fn parse_activity_kind(s: &str) -> ActivityKind {
    match s {
        "email" => ActivityKind::Email,
        "stage_change" => ActivityKind::StageChange,
        _ => ActivityKind::Note,
    }
}

/// Ordered activity log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactActivity {
    pub id: String,
    pub contact_id: String,
    pub sequence_id: i64,
    pub kind: ActivityKind,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

// ============================================================
// Knowledge base
// ============================================================

/// A question/answer pair fed to the responder gateway as context
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KbEntry {
    pub id: String,
    pub question: String,
    pub answer: String,
    pub created_at: DateTime<Utc>,
}
