//! Runtime for executing conversations
//!
//! One `ConversationRuntime` per conversation, each behind its own event
//! channel: the loop is the per-conversation mutual exclusion required for
//! ownership evaluation. Different conversations run in parallel; the only
//! long-latency operation (the responder call) is spawned off the loop and
//! completes by sending an event back.

mod executor;

#[cfg(test)]
pub mod testing;

pub use executor::ConversationRuntime;

use crate::config::Config;
use crate::db::{Database, Message, Ownership};
use crate::responder::ResponderGateway;
use crate::state_machine::{ConvContext, ConvState, Event};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, RwLock};

/// Events sent to SSE clients
#[derive(Debug, Clone)]
pub enum SseEvent {
    /// Snapshot sent once when a stream is opened
    Init {
        conversation: Box<crate::db::Conversation>,
        messages: Vec<Message>,
    },
    Message {
        message: Message,
    },
    OwnershipChanged {
        conversation_id: String,
        ownership: Ownership,
    },
    /// Recoverable responder failure, surfaced to operators
    ResponderError {
        message: String,
    },
    Error {
        message: String,
    },
}

/// Handle to interact with a running conversation
pub struct ConversationHandle {
    pub event_tx: mpsc::Sender<Event>,
    pub broadcast_tx: broadcast::Sender<SseEvent>,
}

impl ConversationHandle {
    fn duplicate(&self) -> Self {
        Self {
            event_tx: self.event_tx.clone(),
            broadcast_tx: self.broadcast_tx.clone(),
        }
    }
}

/// Manager for all conversation runtimes
pub struct RuntimeManager {
    db: Database,
    gateway: Arc<dyn ResponderGateway>,
    config: Config,
    runtimes: RwLock<HashMap<String, ConversationHandle>>,
}

impl RuntimeManager {
    pub fn new(db: Database, gateway: Arc<dyn ResponderGateway>, config: Config) -> Self {
        Self {
            db,
            gateway,
            config,
            runtimes: RwLock::new(HashMap::new()),
        }
    }

    /// Get or create a runtime for a conversation. Creation happens under
    /// the write lock so two callers can never spawn competing loops for
    /// the same conversation id.
    pub async fn get_or_create(&self, conversation_id: &str) -> Result<ConversationHandle, String> {
        {
            let runtimes = self.runtimes.read().await;
            if let Some(handle) = runtimes.get(conversation_id) {
                return Ok(handle.duplicate());
            }
        }

        let mut runtimes = self.runtimes.write().await;
        if let Some(handle) = runtimes.get(conversation_id) {
            return Ok(handle.duplicate());
        }

        let conv = self
            .db
            .get_conversation(conversation_id)
            .map_err(|e| e.to_string())?;

        let context = ConvContext::new(
            &conv.id,
            &conv.contact_id,
            &self.config.escalation_agent,
        );
        // An in-flight responder call is never persisted, so the loaded
        // state is always quiescent
        let state = ConvState::from_ownership(&conv.ownership);

        let (event_tx, event_rx) = mpsc::channel(32);
        let (broadcast_tx, _) = broadcast::channel(128);

        let runtime = ConversationRuntime::new(
            context,
            state,
            self.db.clone(),
            self.gateway.clone(),
            &self.config,
            event_rx,
            broadcast_tx.clone(),
        );

        let conv_id = conversation_id.to_string();
        tokio::spawn(async move {
            runtime.run().await;
            tracing::info!(conv_id = %conv_id, "Conversation runtime finished");
        });

        let handle = ConversationHandle {
            event_tx,
            broadcast_tx,
        };
        let result = handle.duplicate();
        runtimes.insert(conversation_id.to_string(), handle);

        Ok(result)
    }

    /// Send an event to a conversation
    pub async fn send_event(&self, conversation_id: &str, event: Event) -> Result<(), String> {
        let handle = self.get_or_create(conversation_id).await?;
        handle
            .event_tx
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {e}"))
    }

    /// Subscribe to conversation updates
    pub async fn subscribe(
        &self,
        conversation_id: &str,
    ) -> Result<broadcast::Receiver<SseEvent>, String> {
        let handle = self.get_or_create(conversation_id).await?;
        Ok(handle.broadcast_tx.subscribe())
    }

    /// Drop the runtime of a deleted conversation; closing the event
    /// channel lets its loop drain and exit
    pub async fn remove(&self, conversation_id: &str) {
        self.runtimes.write().await.remove(conversation_id);
    }

    /// Get the database handle
    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
