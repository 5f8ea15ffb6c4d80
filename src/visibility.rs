//! Per-role projection of the conversation and contact registries
//!
//! Pure functions, recomputed on every read; nothing here is cached, so a
//! role or ownership change is reflected on the next request and a viewer
//! holding a now-invisible conversation gets a not-found on refresh.

use crate::db::{Contact, Conversation, Ownership};
use crate::team::{Role, TeamRegistry};

/// The human reading the dashboard
#[derive(Debug, Clone)]
pub struct Viewer {
    pub agent_id: String,
    pub role: Role,
}

impl Viewer {
    pub fn from_roster(roster: &TeamRegistry, agent_id: &str) -> Option<Self> {
        roster.get(agent_id).map(|member| Viewer {
            agent_id: member.id.clone(),
            role: member.role,
        })
    }

    pub fn is_elevated(&self) -> bool {
        self.role == Role::Manager
    }
}

/// Whether `viewer` may see this conversation.
///
/// Managers see everything. A standard agent sees automated threads and
/// their own. A conversation owned by a human id the roster does not know
/// is a data error; the read path treats it as "owner unknown" and shows it
/// to elevated viewers only.
pub fn conversation_visible(
    conversation: &Conversation,
    viewer: &Viewer,
    roster: &TeamRegistry,
) -> bool {
    if viewer.is_elevated() {
        return true;
    }
    match &conversation.ownership {
        Ownership::Automated => true,
        Ownership::Human { agent_id } => {
            roster.contains(agent_id) && *agent_id == viewer.agent_id
        }
    }
}

/// Whether `viewer` may see this contact. Managers see everything; a
/// standard agent sees only contacts they own. An owner unknown to the
/// roster falls back to elevated-only, like conversations.
pub fn contact_visible(contact: &Contact, viewer: &Viewer, roster: &TeamRegistry) -> bool {
    if viewer.is_elevated() {
        return true;
    }
    roster.contains(&contact.owner_id) && contact.owner_id == viewer.agent_id
}

pub fn filter_conversations(
    conversations: Vec<Conversation>,
    viewer: &Viewer,
    roster: &TeamRegistry,
) -> Vec<Conversation> {
    conversations
        .into_iter()
        .filter(|c| conversation_visible(c, viewer, roster))
        .collect()
}

pub fn filter_contacts(
    contacts: Vec<Contact>,
    viewer: &Viewer,
    roster: &TeamRegistry,
) -> Vec<Contact> {
    contacts
        .into_iter()
        .filter(|c| contact_visible(c, viewer, roster))
        .collect()
}
