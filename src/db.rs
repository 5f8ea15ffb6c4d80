//! Persistence for conversations, messages and CRM contacts
//!
//! A message append and the owning conversation's summary-field update
//! (last message cache, unread counter) are applied in one transaction and
//! are never observed partially.

mod schema;

pub use schema::*;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Conversation not found: {0}")]
    ConversationNotFound(String),
    #[error("Contact not found: {0}")]
    ContactNotFound(String),
}

pub type DbResult<T> = Result<T, DbError>;

/// Thread-safe database handle
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> DbResult<Self> {
        conn.pragma_update(None, "foreign_keys", true)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn run_migrations(&self) -> DbResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    // ==================== Contact Operations ====================

    /// Insert a contact; the id is the external-party identifier
    pub fn create_contact(&self, contact: &Contact) -> DbResult<()> {
        let conn = self.conn.lock().unwrap();
        let tags = serde_json::to_string(&contact.tags).unwrap_or_else(|_| "[]".to_string());
        conn.execute(
            "INSERT INTO contacts (id, name, avatar, tags, stage, owner_id, value, temperature, next_action_at, lead_source, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)",
            params![
                contact.id,
                contact.name,
                contact.avatar,
                tags,
                contact.stage.to_string(),
                contact.owner_id,
                contact.value,
                contact.temperature.to_string(),
                contact.next_action_at.map(|t| t.to_rfc3339()),
                contact.lead_source,
                contact.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Insert a contact only if its id is absent. Returns whether a row was
    /// inserted; racing callers dedupe on the primary key.
    pub fn create_contact_if_absent(&self, contact: &Contact) -> DbResult<bool> {
        let conn = self.conn.lock().unwrap();
        let tags = serde_json::to_string(&contact.tags).unwrap_or_else(|_| "[]".to_string());
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO contacts (id, name, avatar, tags, stage, owner_id, value, temperature, next_action_at, lead_source, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)",
            params![
                contact.id,
                contact.name,
                contact.avatar,
                tags,
                contact.stage.to_string(),
                contact.owner_id,
                contact.value,
                contact.temperature.to_string(),
                contact.next_action_at.map(|t| t.to_rfc3339()),
                contact.lead_source,
                contact.created_at.to_rfc3339(),
            ],
        )?;
        Ok(inserted > 0)
    }

    pub fn get_contact(&self, id: &str) -> DbResult<Contact> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, name, avatar, tags, stage, owner_id, value, temperature, next_action_at, lead_source, created_at, updated_at
             FROM contacts WHERE id = ?1",
        )?;
        stmt.query_row(params![id], row_to_contact).map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => DbError::ContactNotFound(id.to_string()),
            other => DbError::Sqlite(other),
        })
    }

    pub fn list_contacts(&self) -> DbResult<Vec<Contact>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, name, avatar, tags, stage, owner_id, value, temperature, next_action_at, lead_source, created_at, updated_at
             FROM contacts ORDER BY updated_at DESC",
        )?;
        let rows = stmt.query_map([], row_to_contact)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    /// Move a contact to a new pipeline stage, recording the change in the
    /// activity log in the same transaction
    pub fn update_contact_stage(&self, id: &str, stage: PipelineStage) -> DbResult<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let now = Utc::now();

        let updated = tx.execute(
            "UPDATE contacts SET stage = ?1, updated_at = ?2 WHERE id = ?3",
            params![stage.to_string(), now.to_rfc3339(), id],
        )?;
        if updated == 0 {
            return Err(DbError::ContactNotFound(id.to_string()));
        }

        let seq: i64 = tx.query_row(
            "SELECT COALESCE(MAX(sequence_id), 0) + 1 FROM contact_activities WHERE contact_id = ?1",
            params![id],
            |row| row.get(0),
        )?;
        tx.execute(
            "INSERT INTO contact_activities (id, contact_id, sequence_id, kind, body, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                uuid::Uuid::new_v4().to_string(),
                id,
                seq,
                ActivityKind::StageChange.to_string(),
                format!("Stage changed to {stage}"),
                now.to_rfc3339(),
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Append a note or email record to a contact's activity log
    pub fn add_contact_activity(&self, contact_id: &str, kind: ActivityKind, body: &str) -> DbResult<ContactActivity> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now();
        let seq: i64 = conn.query_row(
            "SELECT COALESCE(MAX(sequence_id), 0) + 1 FROM contact_activities WHERE contact_id = ?1",
            params![contact_id],
            |row| row.get(0),
        )?;
        let id = uuid::Uuid::new_v4().to_string();
        conn.execute(
            "INSERT INTO contact_activities (id, contact_id, sequence_id, kind, body, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![id, contact_id, seq, kind.to_string(), body, now.to_rfc3339()],
        )?;
        Ok(ContactActivity {
            id,
            contact_id: contact_id.to_string(),
            sequence_id: seq,
            kind,
            body: body.to_string(),
            created_at: now,
        })
    }

    pub fn list_contact_activities(&self, contact_id: &str) -> DbResult<Vec<ContactActivity>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, contact_id, sequence_id, kind, body, created_at
             FROM contact_activities WHERE contact_id = ?1 ORDER BY sequence_id ASC",
        )?;
        let rows = stmt.query_map(params![contact_id], |row| {
            Ok(ContactActivity {
                id: row.get(0)?,
                contact_id: row.get(1)?,
                sequence_id: row.get(2)?,
                kind: parse_activity_kind(&row.get::<_, String>(3)?),
                body: row.get(4)?,
                created_at: parse_datetime(&row.get::<_, String>(5)?),
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    /// Delete a contact, its conversations and their messages in one
    /// transaction (operator-only cascade)
    pub fn delete_contact(&self, id: &str) -> DbResult<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        // Messages and activities cascade via foreign keys; the
        // conversation link is cleaned up explicitly (see schema note).
        tx.execute("DELETE FROM conversations WHERE contact_id = ?1", params![id])?;
        let deleted = tx.execute("DELETE FROM contacts WHERE id = ?1", params![id])?;
        tx.commit()?;

        if deleted == 0 {
            return Err(DbError::ContactNotFound(id.to_string()));
        }
        Ok(())
    }

    // ==================== Conversation Operations ====================

    /// Create a new conversation for an external party
    pub fn create_conversation(
        &self,
        id: &str,
        contact_id: &str,
        display_name: &str,
        avatar: Option<&str>,
        ownership: &Ownership,
    ) -> DbResult<Conversation> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now();
        let (kind, owner_id) = ownership.to_columns();

        conn.execute(
            "INSERT INTO conversations (id, contact_id, display_name, avatar, owner_kind, owner_id, unread_count, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7, ?7)",
            params![id, contact_id, display_name, avatar, kind, owner_id, now.to_rfc3339()],
        )?;

        Ok(Conversation {
            id: id.to_string(),
            contact_id: contact_id.to_string(),
            display_name: display_name.to_string(),
            avatar: avatar.map(String::from),
            ownership: ownership.clone(),
            last_message: None,
            last_message_at: None,
            unread_count: 0,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn get_conversation(&self, id: &str) -> DbResult<Conversation> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = ?1"
        ))?;
        stmt.query_row(params![id], row_to_conversation)
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => DbError::ConversationNotFound(id.to_string()),
                other => DbError::Sqlite(other),
            })
    }

    /// Find the conversation mirroring an external party, if any
    pub fn get_conversation_by_contact(&self, contact_id: &str) -> DbResult<Option<Conversation>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE contact_id = ?1"
        ))?;
        stmt.query_row(params![contact_id], row_to_conversation)
            .optional()
            .map_err(DbError::from)
    }

    pub fn list_conversations(&self) -> DbResult<Vec<Conversation>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations ORDER BY updated_at DESC"
        ))?;
        let rows = stmt.query_map([], row_to_conversation)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    /// Persist a conversation's current ownership
    pub fn update_ownership(&self, id: &str, ownership: &Ownership) -> DbResult<()> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now();
        let (kind, owner_id) = ownership.to_columns();

        let updated = conn.execute(
            "UPDATE conversations SET owner_kind = ?1, owner_id = ?2, updated_at = ?3 WHERE id = ?4",
            params![kind, owner_id, now.to_rfc3339(), id],
        )?;
        if updated == 0 {
            return Err(DbError::ConversationNotFound(id.to_string()));
        }
        Ok(())
    }

    /// A human viewed the conversation: clear the unread counter and mark
    /// the contact's customer-facing messages as read
    pub fn mark_read(&self, id: &str) -> DbResult<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let now = Utc::now();

        let updated = tx.execute(
            "UPDATE conversations SET unread_count = 0, updated_at = ?1 WHERE id = ?2",
            params![now.to_rfc3339(), id],
        )?;
        if updated == 0 {
            return Err(DbError::ConversationNotFound(id.to_string()));
        }
        tx.execute(
            "UPDATE messages SET delivery = 'read'
             WHERE conversation_id = ?1 AND sender_kind = 'contact' AND delivery IS NOT NULL AND delivery != 'read'",
            params![id],
        )?;
        tx.commit()?;
        Ok(())
    }

    // ==================== Message Operations ====================

    /// Append a message and update the conversation's summary fields as one
    /// logical step
    pub fn append_message(&self, conversation_id: &str, msg: &NewMessage) -> DbResult<Message> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let now = Utc::now();

        let sequence_id: i64 = tx.query_row(
            "SELECT COALESCE(MAX(sequence_id), 0) + 1 FROM messages WHERE conversation_id = ?1",
            params![conversation_id],
            |row| row.get(0),
        )?;

        let id = uuid::Uuid::new_v4().to_string();
        let delivery = msg.initial_delivery();
        tx.execute(
            "INSERT INTO messages (id, conversation_id, sequence_id, sender_kind, sender_id, body, kind, delivery, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                id,
                conversation_id,
                sequence_id,
                msg.sender_kind.to_string(),
                msg.sender_id,
                msg.body,
                msg.kind.to_string(),
                delivery.map(|d| d.to_string()),
                now.to_rfc3339(),
            ],
        )?;

        let unread_bump = i64::from(msg.sender_kind == SenderKind::Contact);
        let updated = tx.execute(
            "UPDATE conversations
             SET last_message = ?1, last_message_at = ?2, unread_count = unread_count + ?3, updated_at = ?2
             WHERE id = ?4",
            params![msg.body, now.to_rfc3339(), unread_bump, conversation_id],
        )?;
        if updated == 0 {
            return Err(DbError::ConversationNotFound(conversation_id.to_string()));
        }
        tx.commit()?;

        Ok(Message {
            id,
            conversation_id: conversation_id.to_string(),
            sequence_id,
            sender_kind: msg.sender_kind,
            sender_id: msg.sender_id.clone(),
            body: msg.body.clone(),
            kind: msg.kind,
            delivery,
            created_at: now,
        })
    }

    /// Messages in append order
    pub fn get_messages(&self, conversation_id: &str) -> DbResult<Vec<Message>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, conversation_id, sequence_id, sender_kind, sender_id, body, kind, delivery, created_at
             FROM messages WHERE conversation_id = ?1 ORDER BY sequence_id ASC",
        )?;
        let rows = stmt.query_map(params![conversation_id], |row| {
            Ok(Message {
                id: row.get(0)?,
                conversation_id: row.get(1)?,
                sequence_id: row.get(2)?,
                sender_kind: parse_sender_kind(&row.get::<_, String>(3)?),
                sender_id: row.get(4)?,
                body: row.get(5)?,
                kind: parse_message_kind(&row.get::<_, String>(6)?),
                delivery: row.get::<_, Option<String>>(7)?.as_deref().and_then(parse_delivery),
                created_at: parse_datetime(&row.get::<_, String>(8)?),
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    /// How many messages the external party has sent in this conversation
    pub fn count_contact_messages(&self, conversation_id: &str) -> DbResult<i64> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT COUNT(*) FROM messages WHERE conversation_id = ?1 AND sender_kind = 'contact'",
            params![conversation_id],
            |row| row.get(0),
        )
        .map_err(DbError::from)
    }

    // ==================== Reconciliation support ====================

    /// Conversations whose external party has no CRM contact yet:
    /// (contact_id, display_name, avatar)
    pub fn conversations_missing_contact(&self) -> DbResult<Vec<(String, String, Option<String>)>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT c.contact_id, c.display_name, c.avatar
             FROM conversations c LEFT JOIN contacts k ON k.id = c.contact_id
             WHERE k.id IS NULL",
        )?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    // ==================== Knowledge base ====================

    pub fn add_kb_entry(&self, question: &str, answer: &str) -> DbResult<KbEntry> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now();
        let id = uuid::Uuid::new_v4().to_string();
        conn.execute(
            "INSERT INTO kb_entries (id, question, answer, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![id, question, answer, now.to_rfc3339()],
        )?;
        Ok(KbEntry {
            id,
            question: question.to_string(),
            answer: answer.to_string(),
            created_at: now,
        })
    }

    pub fn list_kb_entries(&self) -> DbResult<Vec<KbEntry>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, question, answer, created_at FROM kb_entries ORDER BY created_at ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(KbEntry {
                id: row.get(0)?,
                question: row.get(1)?,
                answer: row.get(2)?,
                created_at: parse_datetime(&row.get::<_, String>(3)?),
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }
}

const CONVERSATION_COLUMNS: &str = "id, contact_id, display_name, avatar, owner_kind, owner_id, last_message, last_message_at, unread_count, created_at, updated_at";

fn row_to_conversation(row: &rusqlite::Row<'_>) -> rusqlite::Result<Conversation> {
    Ok(Conversation {
        id: row.get(0)?,
        contact_id: row.get(1)?,
        display_name: row.get(2)?,
        avatar: row.get(3)?,
        ownership: Ownership::from_columns(
            &row.get::<_, String>(4)?,
            row.get::<_, Option<String>>(5)?,
        ),
        last_message: row.get(6)?,
        last_message_at: row
            .get::<_, Option<String>>(7)?
            .as_deref()
            .map(parse_datetime),
        unread_count: row.get(8)?,
        created_at: parse_datetime(&row.get::<_, String>(9)?),
        updated_at: parse_datetime(&row.get::<_, String>(10)?),
    })
}

fn row_to_contact(row: &rusqlite::Row<'_>) -> rusqlite::Result<Contact> {
    Ok(Contact {
        id: row.get(0)?,
        name: row.get(1)?,
        avatar: row.get(2)?,
        tags: serde_json::from_str(&row.get::<_, String>(3)?).unwrap_or_default(),
        stage: parse_stage(&row.get::<_, String>(4)?),
        owner_id: row.get(5)?,
        value: row.get(6)?,
        temperature: parse_temperature(&row.get::<_, String>(7)?),
        next_action_at: row
            .get::<_, Option<String>>(8)?
            .as_deref()
            .map(parse_datetime),
        lead_source: row.get(9)?,
        created_at: parse_datetime(&row.get::<_, String>(10)?),
        updated_at: parse_datetime(&row.get::<_, String>(11)?),
    })
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.create_conversation(
            "conv-1",
            "+5511990000001",
            "Clara Nunes",
            None,
            &Ownership::Automated,
        )
        .unwrap();
        db
    }

    #[test]
    fn test_create_and_get_conversation() {
        let db = seeded_db();
        let conv = db.get_conversation("conv-1").unwrap();
        assert_eq!(conv.contact_id, "+5511990000001");
        assert_eq!(conv.ownership, Ownership::Automated);
        assert_eq!(conv.unread_count, 0);
        assert!(conv.last_message.is_none());
    }

    #[test]
    fn test_append_preserves_order_and_updates_summary() {
        let db = seeded_db();

        let m1 = db
            .append_message("conv-1", &NewMessage::from_contact("Oi"))
            .unwrap();
        let m2 = db
            .append_message("conv-1", &NewMessage::from_bot("Olá! Como posso ajudar?"))
            .unwrap();
        assert_eq!(m1.sequence_id, 1);
        assert_eq!(m2.sequence_id, 2);

        let messages = db.get_messages("conv-1").unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].id, m1.id);
        assert_eq!(messages[1].id, m2.id);
        assert!(messages[0].created_at <= messages[1].created_at);

        // Summary fields moved with the append, atomically
        let conv = db.get_conversation("conv-1").unwrap();
        assert_eq!(conv.last_message.as_deref(), Some("Olá! Como posso ajudar?"));
        assert_eq!(conv.unread_count, 1); // only the contact message counts
    }

    #[test]
    fn test_mark_read_resets_unread_and_delivery() {
        let db = seeded_db();
        db.append_message("conv-1", &NewMessage::from_contact("Oi"))
            .unwrap();
        db.append_message("conv-1", &NewMessage::from_contact("Tudo bem?"))
            .unwrap();
        assert_eq!(db.get_conversation("conv-1").unwrap().unread_count, 2);

        db.mark_read("conv-1").unwrap();
        assert_eq!(db.get_conversation("conv-1").unwrap().unread_count, 0);
        let messages = db.get_messages("conv-1").unwrap();
        assert!(messages.iter().all(|m| m.delivery == Some(Delivery::Read)));
    }

    #[test]
    fn test_internal_note_has_no_delivery_status() {
        let db = seeded_db();
        let note = db
            .append_message(
                "conv-1",
                &NewMessage::from_agent("ana", "customer seems upset", MessageKind::Note),
            )
            .unwrap();
        assert_eq!(note.kind, MessageKind::Note);
        assert!(note.delivery.is_none());
    }

    #[test]
    fn test_ownership_round_trip() {
        let db = seeded_db();
        db.update_ownership("conv-1", &Ownership::human("ana")).unwrap();
        assert_eq!(
            db.get_conversation("conv-1").unwrap().ownership,
            Ownership::human("ana")
        );
        db.update_ownership("conv-1", &Ownership::Automated).unwrap();
        assert_eq!(
            db.get_conversation("conv-1").unwrap().ownership,
            Ownership::Automated
        );
    }

    #[test]
    fn test_contact_create_if_absent_is_idempotent() {
        let db = seeded_db();
        let contact = Contact {
            id: "+5511990000001".to_string(),
            name: "Clara Nunes".to_string(),
            avatar: None,
            tags: vec!["auto-created".to_string()],
            stage: PipelineStage::Contact,
            owner_id: "marcos".to_string(),
            value: 0.0,
            temperature: Temperature::Warm,
            next_action_at: None,
            lead_source: Some("chat".to_string()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(db.create_contact_if_absent(&contact).unwrap());
        assert!(!db.create_contact_if_absent(&contact).unwrap());
        assert_eq!(db.list_contacts().unwrap().len(), 1);
    }

    #[test]
    fn test_conversations_missing_contact() {
        let db = seeded_db();
        let missing = db.conversations_missing_contact().unwrap();
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].0, "+5511990000001");

        let contact = Contact {
            id: "+5511990000001".to_string(),
            name: "Clara Nunes".to_string(),
            avatar: None,
            tags: vec![],
            stage: PipelineStage::Contact,
            owner_id: "marcos".to_string(),
            value: 0.0,
            temperature: Temperature::Warm,
            next_action_at: None,
            lead_source: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        db.create_contact(&contact).unwrap();
        assert!(db.conversations_missing_contact().unwrap().is_empty());
    }

    #[test]
    fn test_delete_contact_cascades_conversations_and_messages() {
        let db = seeded_db();
        db.append_message("conv-1", &NewMessage::from_contact("Oi"))
            .unwrap();
        let contact = Contact {
            id: "+5511990000001".to_string(),
            name: "Clara Nunes".to_string(),
            avatar: None,
            tags: vec![],
            stage: PipelineStage::Contact,
            owner_id: "marcos".to_string(),
            value: 0.0,
            temperature: Temperature::Warm,
            next_action_at: None,
            lead_source: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        db.create_contact(&contact).unwrap();

        db.delete_contact("+5511990000001").unwrap();
        assert!(matches!(
            db.get_conversation("conv-1"),
            Err(DbError::ConversationNotFound(_))
        ));
        assert!(db.get_messages("conv-1").unwrap().is_empty());
        assert!(matches!(
            db.get_contact("+5511990000001"),
            Err(DbError::ContactNotFound(_))
        ));
    }

    #[test]
    fn test_reopen_preserves_data_and_reruns_migrations() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inboxd.db");
        {
            let db = Database::open(&path).unwrap();
            db.create_conversation("conv-1", "+551100", "Rui", None, &Ownership::human("ana"))
                .unwrap();
            db.append_message("conv-1", &NewMessage::from_contact("Oi"))
                .unwrap();
        }

        let db = Database::open(&path).unwrap();
        let conv = db.get_conversation("conv-1").unwrap();
        assert_eq!(conv.ownership, Ownership::human("ana"));
        assert_eq!(db.get_messages("conv-1").unwrap().len(), 1);
    }

    #[test]
    fn test_stage_change_appends_activity() {
        let db = Database::open_in_memory().unwrap();
        let contact = Contact {
            id: "+551100".to_string(),
            name: "Rui".to_string(),
            avatar: None,
            tags: vec![],
            stage: PipelineStage::Contact,
            owner_id: "ana".to_string(),
            value: 1500.0,
            temperature: Temperature::Hot,
            next_action_at: None,
            lead_source: Some("referral".to_string()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        db.create_contact(&contact).unwrap();
        db.update_contact_stage("+551100", PipelineStage::Proposal).unwrap();

        let activities = db.list_contact_activities("+551100").unwrap();
        assert_eq!(activities.len(), 1);
        assert_eq!(activities[0].kind, ActivityKind::StageChange);
        assert_eq!(
            db.get_contact("+551100").unwrap().stage,
            PipelineStage::Proposal
        );
    }
}
