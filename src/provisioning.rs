//! Auto-provisioning: every conversation's external party gets a CRM contact
//!
//! Runs as a reconciliation pass after conversation-registry mutations and
//! once at startup. The generated record is a pure function of the party id
//! and creation time, and insertion dedupes on the contact id, so redundant
//! or racing passes converge on exactly one contact per party.

use crate::config::Config;
use crate::db::{Contact, Database, DbResult, PipelineStage, Temperature};
use chrono::{DateTime, Duration, Utc};

/// Tag marking contacts created by reconciliation rather than an operator
pub const AUTO_CREATED_TAG: &str = "auto-created";

/// Ensure a contact exists for every conversation's external party.
/// Returns how many contacts this pass created.
pub fn reconcile(db: &Database, config: &Config, now: DateTime<Utc>) -> DbResult<usize> {
    let mut created = 0;

    for (contact_id, display_name, avatar) in db.conversations_missing_contact()? {
        let contact = auto_contact(&contact_id, &display_name, avatar, config, now);
        if db.create_contact_if_absent(&contact)? {
            tracing::info!(contact_id = %contact.id, owner = %contact.owner_id, "Auto-provisioned contact");
            created += 1;
        }
    }

    Ok(created)
}

/// The deterministic record reconciliation creates for an unseen party
fn auto_contact(
    contact_id: &str,
    display_name: &str,
    avatar: Option<String>,
    config: &Config,
    now: DateTime<Utc>,
) -> Contact {
    Contact {
        id: contact_id.to_string(),
        name: display_name.to_string(),
        avatar,
        tags: vec![AUTO_CREATED_TAG.to_string()],
        stage: PipelineStage::Contact,
        owner_id: config.default_owner.clone(),
        value: 0.0,
        temperature: Temperature::Warm,
        next_action_at: Some(now + Duration::days(config.followup_days)),
        lead_source: Some("chat".to_string()),
        created_at: now,
        updated_at: now,
    }
}
