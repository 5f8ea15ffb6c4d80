//! Test harness for conversation runtimes
//!
//! A scripted responder stands in for the external gateway so ordering and
//! ownership behavior can be exercised end to end against a real in-memory
//! store.

use super::{RuntimeManager, SseEvent};
use crate::config::Config;
use crate::db::{Database, MessageKind, Ownership, SenderKind};
use crate::responder::{
    ResponderError, ResponderGateway, ResponderReply, ResponderRequest,
};
use crate::state_machine::Event;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Responder that pops scripted outcomes in order, optionally sleeping
/// first to model gateway latency, and records every request it saw
pub struct ScriptedResponder {
    script: Mutex<Vec<Result<ResponderReply, ResponderError>>>,
    delay: Duration,
    requests: Mutex<Vec<ResponderRequest>>,
}

impl ScriptedResponder {
    pub fn new(script: Vec<Result<ResponderReply, ResponderError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script),
            delay: Duration::ZERO,
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn with_delay(
        script: Vec<Result<ResponderReply, ResponderError>>,
        delay: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script),
            delay,
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn reply(text: &str, requires_handoff: bool) -> Result<ResponderReply, ResponderError> {
        Ok(ResponderReply {
            reply_text: text.to_string(),
            requires_handoff,
        })
    }

    pub fn requests(&self) -> Vec<ResponderRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl ResponderGateway for ScriptedResponder {
    async fn complete(&self, request: &ResponderRequest) -> Result<ResponderReply, ResponderError> {
        self.requests.lock().unwrap().push(request.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let mut script = self.script.lock().unwrap();
        if script.is_empty() {
            return Err(ResponderError::server_error("script exhausted"));
        }
        script.remove(0)
    }
}

/// Manager over an in-memory store with one automated conversation seeded
pub fn manager_with_conversation(gateway: Arc<dyn ResponderGateway>) -> (RuntimeManager, Database) {
    let db = Database::open_in_memory().unwrap();
    db.create_conversation(
        "conv-1",
        "+5511990000001",
        "Clara Nunes",
        None,
        &Ownership::Automated,
    )
    .unwrap();
    let config = Config::for_tests("marcos", "marcos");
    let manager = RuntimeManager::new(db.clone(), gateway, config);
    (manager, db)
}

/// Poll until `check` passes or the deadline expires
pub async fn wait_for(mut check: impl FnMut() -> bool) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached within deadline");
}

fn customer(text: &str, first_interaction: bool) -> Event {
    Event::CustomerMessage {
        text: text.to_string(),
        first_interaction,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_automated_reply_is_appended_after_inbound() {
        let gateway = ScriptedResponder::new(vec![ScriptedResponder::reply(
            "Temos três planos: Start, Pro e Max.",
            false,
        )]);
        let (manager, db) = manager_with_conversation(gateway.clone());

        manager
            .send_event("conv-1", customer("Quais são os planos?", true))
            .await
            .unwrap();

        wait_for(|| db.get_messages("conv-1").unwrap().len() == 2).await;

        let messages = db.get_messages("conv-1").unwrap();
        assert_eq!(messages[0].sender_kind, SenderKind::Contact);
        assert_eq!(messages[1].sender_kind, SenderKind::Bot);
        assert_eq!(messages[1].body, "Temos três planos: Start, Pro e Max.");
        assert_eq!(
            db.get_conversation("conv-1").unwrap().ownership,
            Ownership::Automated
        );

        // The gateway saw the inbound text and the first-interaction flag
        let requests = gateway.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].message_text, "Quais são os planos?");
        assert!(requests[0].first_interaction);
    }

    #[tokio::test]
    async fn test_handoff_escalates_to_configured_manager() {
        // Empty knowledge base, responder gives up and asks for a human
        let gateway = ScriptedResponder::new(vec![ScriptedResponder::reply(
            "Vou chamar um atendente para ajudar você.",
            true,
        )]);
        let (manager, db) = manager_with_conversation(gateway);

        manager
            .send_event("conv-1", customer("Quais são os planos?", true))
            .await
            .unwrap();

        wait_for(|| {
            db.get_conversation("conv-1").unwrap().ownership == Ownership::human("marcos")
        })
        .await;

        // Exactly one reply from the automated sender, then the escalation
        let messages = db.get_messages("conv-1").unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].sender_kind, SenderKind::Bot);
    }

    #[tokio::test]
    async fn test_back_to_back_inbound_serializes_calls() {
        let gateway = ScriptedResponder::with_delay(
            vec![
                ScriptedResponder::reply("resposta um", false),
                ScriptedResponder::reply("resposta dois", false),
            ],
            Duration::from_millis(50),
        );
        let (manager, db) = manager_with_conversation(gateway.clone());

        manager
            .send_event("conv-1", customer("primeira pergunta", true))
            .await
            .unwrap();
        manager
            .send_event("conv-1", customer("segunda pergunta", false))
            .await
            .unwrap();

        wait_for(|| db.get_messages("conv-1").unwrap().len() == 4).await;

        // Reply one lands before the second message's evaluation begins:
        // inbound, inbound, reply one, reply two
        let bodies: Vec<_> = db
            .get_messages("conv-1")
            .unwrap()
            .into_iter()
            .map(|m| m.body)
            .collect();
        assert_eq!(
            bodies,
            vec![
                "primeira pergunta",
                "segunda pergunta",
                "resposta um",
                "resposta dois"
            ]
        );

        // The second call only started after the first resolved
        let requests = gateway.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].message_text, "primeira pergunta");
        assert_eq!(requests[1].message_text, "segunda pergunta");
    }

    #[tokio::test]
    async fn test_human_send_takes_over_without_automated_reply() {
        let gateway = ScriptedResponder::new(vec![]);
        let (manager, db) = manager_with_conversation(gateway.clone());

        manager
            .send_event(
                "conv-1",
                Event::AgentMessage {
                    agent_id: "ana".to_string(),
                    text: "Oi! Aqui é a Ana, posso ajudar?".to_string(),
                    kind: MessageKind::Chat,
                },
            )
            .await
            .unwrap();

        wait_for(|| db.get_messages("conv-1").unwrap().len() == 1).await;

        assert_eq!(
            db.get_conversation("conv-1").unwrap().ownership,
            Ownership::human("ana")
        );
        assert_eq!(gateway.call_count(), 0);
    }

    #[tokio::test]
    async fn test_take_over_then_send_keeps_owner_and_suppresses_bot() {
        let gateway = ScriptedResponder::new(vec![]);
        let (manager, db) = manager_with_conversation(gateway.clone());

        manager
            .send_event(
                "conv-1",
                Event::TakeOver {
                    agent_id: "bruno".to_string(),
                },
            )
            .await
            .unwrap();
        manager
            .send_event(
                "conv-1",
                Event::AgentMessage {
                    agent_id: "bruno".to_string(),
                    text: "bom dia!".to_string(),
                    kind: MessageKind::Chat,
                },
            )
            .await
            .unwrap();

        wait_for(|| db.get_messages("conv-1").unwrap().len() == 1).await;

        assert_eq!(
            db.get_conversation("conv-1").unwrap().ownership,
            Ownership::human("bruno")
        );
        assert_eq!(gateway.call_count(), 0);
    }

    #[tokio::test]
    async fn test_takeover_mid_call_discards_late_reply() {
        let gateway = ScriptedResponder::with_delay(
            vec![ScriptedResponder::reply("resposta tardia", false)],
            Duration::from_millis(80),
        );
        let (manager, db) = manager_with_conversation(gateway);

        manager
            .send_event("conv-1", customer("alguém aí?", true))
            .await
            .unwrap();
        // Human takes over while the call is in flight
        manager
            .send_event(
                "conv-1",
                Event::TakeOver {
                    agent_id: "ana".to_string(),
                },
            )
            .await
            .unwrap();

        // Give the late reply time to arrive and be discarded
        tokio::time::sleep(Duration::from_millis(200)).await;

        let messages = db.get_messages("conv-1").unwrap();
        assert_eq!(messages.len(), 1);
        assert!(messages.iter().all(|m| m.sender_kind != SenderKind::Bot));
        assert_eq!(
            db.get_conversation("conv-1").unwrap().ownership,
            Ownership::human("ana")
        );
    }

    #[tokio::test]
    async fn test_gateway_failure_leaves_state_and_surfaces_error() {
        let gateway = ScriptedResponder::new(vec![Err(ResponderError::server_error(
            "502 from responder",
        ))]);
        let (manager, db) = manager_with_conversation(gateway);

        let mut events = manager.subscribe("conv-1").await.unwrap();
        manager
            .send_event("conv-1", customer("oi", true))
            .await
            .unwrap();

        // The failure is broadcast to operators
        let mut saw_error = false;
        for _ in 0..20 {
            match tokio::time::timeout(Duration::from_millis(100), events.recv()).await {
                Ok(Ok(SseEvent::ResponderError { message })) => {
                    assert!(message.contains("502"));
                    saw_error = true;
                    break;
                }
                Ok(Ok(_)) => {}
                Ok(Err(_)) => break,
                Err(_) => {}
            }
        }
        assert!(saw_error);

        // No reply appended, ownership untouched
        let messages = db.get_messages("conv-1").unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(
            db.get_conversation("conv-1").unwrap().ownership,
            Ownership::Automated
        );
    }

    #[tokio::test]
    async fn test_inbound_while_human_owned_gets_no_reply() {
        let gateway = ScriptedResponder::new(vec![]);
        let (manager, db) = manager_with_conversation(gateway.clone());
        db.update_ownership("conv-1", &Ownership::human("ana")).unwrap();

        manager
            .send_event("conv-1", customer("ainda estou esperando", false))
            .await
            .unwrap();

        wait_for(|| db.get_messages("conv-1").unwrap().len() == 1).await;
        assert_eq!(gateway.call_count(), 0);
        assert_eq!(
            db.get_conversation("conv-1").unwrap().ownership,
            Ownership::human("ana")
        );
    }

    #[tokio::test]
    async fn test_responder_receives_knowledge_context() {
        let gateway = ScriptedResponder::new(vec![ScriptedResponder::reply("ok", false)]);
        let (manager, db) = manager_with_conversation(gateway.clone());
        db.add_kb_entry("Quais são os planos?", "Start, Pro e Max").unwrap();

        manager
            .send_event("conv-1", customer("planos?", true))
            .await
            .unwrap();

        wait_for(|| gateway.call_count() == 1).await;
        let requests = gateway.requests();
        assert_eq!(requests[0].knowledge.len(), 1);
        assert_eq!(requests[0].knowledge[0].answer, "Start, Pro e Max");
        assert_eq!(requests[0].tone, "friendly and concise");
    }
}
