//! Conversation runtime executor

use super::SseEvent;
use crate::config::Config;
use crate::db::{Database, NewMessage};
use crate::responder::{
    KnowledgeEntry, ResponderError, ResponderGateway, ResponderReply, ResponderRequest,
};
use crate::state_machine::{transition, ConvContext, ConvState, Effect, Event};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

/// Completion of a background responder call. `call_id` identifies which
/// invocation produced it so results of calls that were superseded (the
/// thread was taken over and later returned to automated) are dropped
/// instead of being mistaken for the current call's outcome.
struct Completion {
    call_id: u64,
    result: Result<ResponderReply, ResponderError>,
}

/// Event loop for a single conversation. Processing one event at a time is
/// what serializes ownership evaluation per conversation.
pub struct ConversationRuntime {
    context: ConvContext,
    state: ConvState,
    db: Database,
    gateway: Arc<dyn ResponderGateway>,
    tone: String,
    responder_timeout: Duration,
    event_rx: mpsc::Receiver<Event>,
    completion_tx: mpsc::Sender<Completion>,
    completion_rx: mpsc::Receiver<Completion>,
    broadcast_tx: broadcast::Sender<SseEvent>,
    /// Monotonic id of the most recent responder invocation
    call_seq: u64,
}

impl ConversationRuntime {
    pub fn new(
        context: ConvContext,
        state: ConvState,
        db: Database,
        gateway: Arc<dyn ResponderGateway>,
        config: &Config,
        event_rx: mpsc::Receiver<Event>,
        broadcast_tx: broadcast::Sender<SseEvent>,
    ) -> Self {
        let (completion_tx, completion_rx) = mpsc::channel(8);
        Self {
            context,
            state,
            db,
            gateway,
            tone: config.tone.clone(),
            responder_timeout: config.responder.timeout,
            event_rx,
            completion_tx,
            completion_rx,
            broadcast_tx,
            call_seq: 0,
        }
    }

    pub async fn run(mut self) {
        tracing::info!(conv_id = %self.context.conversation_id, "Starting conversation runtime");

        loop {
            tokio::select! {
                maybe_event = self.event_rx.recv() => {
                    let Some(event) = maybe_event else {
                        // Handle dropped (conversation deleted); drain out
                        break;
                    };
                    if let Err(e) = self.process_event(event) {
                        tracing::error!(error = %e, conv_id = %self.context.conversation_id, "Error handling event");
                        let _ = self.broadcast_tx.send(SseEvent::Error { message: e });
                    }
                }
                Some(done) = self.completion_rx.recv() => {
                    if done.call_id != self.call_seq {
                        tracing::debug!(
                            conv_id = %self.context.conversation_id,
                            call_id = done.call_id,
                            "Dropping superseded responder completion"
                        );
                        continue;
                    }
                    let event = match done.result {
                        Ok(reply) => Event::ReplyReady { reply },
                        Err(e) => Event::ReplyFailed { message: e.to_string() },
                    };
                    if let Err(e) = self.process_event(event) {
                        tracing::error!(error = %e, conv_id = %self.context.conversation_id, "Error handling completion");
                        let _ = self.broadcast_tx.send(SseEvent::Error { message: e });
                    }
                }
            }
        }

        tracing::info!(conv_id = %self.context.conversation_id, "Conversation runtime stopped");
    }

    fn process_event(&mut self, event: Event) -> Result<(), String> {
        // Pure state transition
        let result = transition(&self.state, &self.context, event);
        self.state = result.new_state;

        // Execute effects in order
        for effect in result.effects {
            self.execute_effect(effect)?;
        }
        Ok(())
    }

    fn execute_effect(&mut self, effect: Effect) -> Result<(), String> {
        match effect {
            Effect::PersistInbound { text } => {
                self.append(&NewMessage::from_contact(text))
            }

            Effect::PersistAgentMessage {
                agent_id,
                text,
                kind,
            } => self.append(&NewMessage::from_agent(agent_id, text, kind)),

            Effect::PersistBotReply { text } => self.append(&NewMessage::from_bot(text)),

            Effect::PersistOwnership => {
                let ownership = self.state.ownership();
                self.db
                    .update_ownership(&self.context.conversation_id, &ownership)
                    .map_err(|e| e.to_string())?;
                let _ = self.broadcast_tx.send(SseEvent::OwnershipChanged {
                    conversation_id: self.context.conversation_id.clone(),
                    ownership,
                });
                Ok(())
            }

            Effect::InvokeResponder {
                text,
                first_interaction,
            } => {
                self.call_seq += 1;
                let call_id = self.call_seq;

                let knowledge = self
                    .db
                    .list_kb_entries()
                    .map_err(|e| e.to_string())?
                    .into_iter()
                    .map(|entry| KnowledgeEntry {
                        question: entry.question,
                        answer: entry.answer,
                    })
                    .collect();

                let request = ResponderRequest {
                    message_text: text,
                    knowledge,
                    tone: self.tone.clone(),
                    first_interaction,
                };

                let gateway = self.gateway.clone();
                let completion_tx = self.completion_tx.clone();
                let deadline = self.responder_timeout;
                let conv_id = self.context.conversation_id.clone();

                tokio::spawn(async move {
                    tracing::debug!(conv_id = %conv_id, call_id, "Invoking responder (background)");
                    let result =
                        match tokio::time::timeout(deadline, gateway.complete(&request)).await {
                            Ok(result) => result,
                            Err(_) => Err(ResponderError::timeout(format!(
                                "responder call exceeded {}s deadline",
                                deadline.as_secs()
                            ))),
                        };
                    // The loop may have exited (conversation deleted); a
                    // failed send is fine
                    let _ = completion_tx.send(Completion { call_id, result }).await;
                });
                Ok(())
            }

            Effect::NotifyResponderError { message } => {
                tracing::error!(
                    conv_id = %self.context.conversation_id,
                    error = %message,
                    "Responder call failed; conversation stays automated"
                );
                let _ = self
                    .broadcast_tx
                    .send(SseEvent::ResponderError { message });
                Ok(())
            }
        }
    }

    /// Append a message; the store updates the conversation's summary
    /// fields in the same transaction
    fn append(&self, msg: &NewMessage) -> Result<(), String> {
        let message = self
            .db
            .append_message(&self.context.conversation_id, msg)
            .map_err(|e| e.to_string())?;
        let _ = self.broadcast_tx.send(SseEvent::Message { message });
        Ok(())
    }
}
