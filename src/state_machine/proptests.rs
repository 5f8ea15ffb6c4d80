//! Property-based tests for the ownership state machine
//!
//! These tests verify the routing invariants hold across all possible
//! event sequences, not just the scripted scenarios.

use super::state::*;
use super::transition::*;
use super::*;
use crate::db::MessageKind;
use crate::responder::ResponderReply;
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;

// ============================================================================
// Test Helpers
// ============================================================================

const ESCALATION: &str = "marcos";

fn test_context() -> ConvContext {
    ConvContext::new("test-conv", "+550000", ESCALATION)
}

/// Abstract command: `Resolve` is only applied when a call is outstanding,
/// modelling that a responder completion can only arrive for a call that
/// was actually made.
#[derive(Debug, Clone)]
enum Command {
    Customer(String),
    Agent(String, MessageKind),
    TakeOver(String),
    Return,
    ResolveOk(String, bool),
    ResolveErr(String),
}

fn arb_agent_id() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("ana".to_string()),
        Just("bruno".to_string()),
        Just(ESCALATION.to_string()),
    ]
}

fn arb_message_kind() -> impl Strategy<Value = MessageKind> {
    prop_oneof![Just(MessageKind::Chat), Just(MessageKind::Note)]
}

fn arb_command() -> impl Strategy<Value = Command> {
    prop_oneof![
        "[a-z ]{1,20}".prop_map(Command::Customer),
        (arb_agent_id(), arb_message_kind()).prop_map(|(id, kind)| Command::Agent(id, kind)),
        arb_agent_id().prop_map(Command::TakeOver),
        Just(Command::Return),
        ("[a-z ]{1,20}", any::<bool>()).prop_map(|(text, handoff)| Command::ResolveOk(text, handoff)),
        "[a-z ]{1,20}".prop_map(Command::ResolveErr),
    ]
}

fn arb_commands() -> impl Strategy<Value = Vec<Command>> {
    proptest::collection::vec(arb_command(), 0..40)
}

fn command_to_event(command: Command) -> Event {
    match command {
        Command::Customer(text) => Event::CustomerMessage {
            text,
            first_interaction: false,
        },
        Command::Agent(agent_id, kind) => Event::AgentMessage {
            agent_id,
            text: "resposta manual".to_string(),
            kind,
        },
        Command::TakeOver(agent_id) => Event::TakeOver { agent_id },
        Command::Return => Event::ReturnToAutomated,
        Command::ResolveOk(text, handoff) => Event::ReplyReady {
            reply: ResponderReply {
                reply_text: text,
                requires_handoff: handoff,
            },
        },
        Command::ResolveErr(message) => Event::ReplyFailed { message },
    }
}

/// Replay commands from `Automated`, skipping resolutions when no call is
/// outstanding, and hand each (state, event, result) step to `check`
fn replay(
    commands: Vec<Command>,
    mut check: impl FnMut(&ConvState, &Event, &TransitionResult) -> Result<(), TestCaseError>,
) -> Result<(), TestCaseError> {
    let context = test_context();
    let mut state = ConvState::Automated;
    let mut outstanding = false;

    for command in commands {
        if matches!(command, Command::ResolveOk(..) | Command::ResolveErr(..)) {
            if !outstanding {
                continue;
            }
            outstanding = false;
        }

        let event = command_to_event(command);
        let result = transition(&state, &context, event.clone());
        check(&state, &event, &result)?;

        if result
            .effects
            .iter()
            .any(|e| matches!(e, Effect::InvokeResponder { .. }))
        {
            outstanding = true;
        }
        state = result.new_state;
    }
    Ok(())
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    /// Ownership moves from automated to a human only via a handoff
    /// signal, a human-authored outbound message, or an explicit take-over
    #[test]
    fn prop_ownership_changes_only_via_defined_triggers(commands in arb_commands()) {
        replay(commands, |state, event, result| {
            let was_automated = state.ownership().is_automated();
            let now_human = !result.new_state.ownership().is_automated();
            if was_automated && now_human {
                let legitimate = matches!(
                    event,
                    Event::AgentMessage { .. }
                        | Event::TakeOver { .. }
                        | Event::ReplyReady { reply: ResponderReply { requires_handoff: true, .. } }
                );
                prop_assert!(legitimate, "illegitimate takeover on {event:?}");
            }
            Ok(())
        })?;
    }

    /// At most one responder call per transition, and never a new call
    /// while one is already in flight
    #[test]
    fn prop_single_outstanding_responder_call(commands in arb_commands()) {
        replay(commands, |state, event, result| {
            let invocations = result
                .effects
                .iter()
                .filter(|e| matches!(e, Effect::InvokeResponder { .. }))
                .count();
            prop_assert!(invocations <= 1);

            // An inbound message during an in-flight call queues instead of
            // starting a second call
            if state.is_reply_pending() && matches!(event, Event::CustomerMessage { .. }) {
                prop_assert_eq!(invocations, 0);
            }

            // A call only ever starts together with entering ReplyPending
            if invocations == 1 {
                prop_assert!(result.new_state.is_reply_pending());
            }
            Ok(())
        })?;
    }

    /// Every customer message is appended exactly once, whatever the state
    #[test]
    fn prop_customer_messages_always_persisted(commands in arb_commands()) {
        replay(commands, |_state, event, result| {
            if let Event::CustomerMessage { text, .. } = event {
                let appended: Vec<_> = result
                    .effects
                    .iter()
                    .filter_map(|e| match e {
                        Effect::PersistInbound { text } => Some(text.clone()),
                        _ => None,
                    })
                    .collect();
                prop_assert_eq!(appended, vec![text.clone()]);
            }
            Ok(())
        })?;
    }

    /// On takeover-by-send the ownership write precedes the message append
    #[test]
    fn prop_takeover_persists_ownership_before_append(commands in arb_commands()) {
        replay(commands, |state, event, result| {
            if state.ownership().is_automated() {
                if let Event::AgentMessage { .. } = event {
                    let ownership_at = result
                        .effects
                        .iter()
                        .position(|e| matches!(e, Effect::PersistOwnership));
                    let append_at = result
                        .effects
                        .iter()
                        .position(|e| matches!(e, Effect::PersistAgentMessage { .. }));
                    prop_assert!(ownership_at.is_some() && append_at.is_some());
                    prop_assert!(ownership_at < append_at);
                }
            }
            Ok(())
        })?;
    }

    /// A resolution arriving outside ReplyPending is stale: no state change,
    /// no effects, in particular no appended reply
    #[test]
    fn prop_stale_resolutions_are_inert(
        state in prop_oneof![
            Just(ConvState::Automated),
            arb_agent_id().prop_map(|agent_id| ConvState::Human { agent_id }),
        ],
        text in "[a-z ]{1,20}",
        handoff in any::<bool>(),
    ) {
        let context = test_context();
        let ready = transition(
            &state,
            &context,
            Event::ReplyReady {
                reply: ResponderReply {
                    reply_text: text.clone(),
                    requires_handoff: handoff,
                },
            },
        );
        prop_assert_eq!(&ready.new_state, &state);
        prop_assert!(ready.effects.is_empty());

        let failed = transition(&state, &context, Event::ReplyFailed { message: text });
        prop_assert_eq!(&failed.new_state, &state);
        prop_assert!(failed.effects.is_empty());
    }

    /// Queued evaluations drain in arrival order, one responder call per
    /// resolution
    #[test]
    fn prop_queue_drains_in_arrival_order(texts in proptest::collection::vec("[a-z]{1,10}", 1..6)) {
        let context = test_context();

        // First message opens the call; the rest arrive while it is in flight
        let mut state = transition(
            &ConvState::Automated,
            &context,
            Event::CustomerMessage {
                text: "first".to_string(),
                first_interaction: true,
            },
        )
        .new_state;

        for text in &texts {
            state = transition(
                &state,
                &context,
                Event::CustomerMessage {
                    text: text.clone(),
                    first_interaction: false,
                },
            )
            .new_state;
        }

        // Resolve repeatedly; each resolution starts the next queued call
        let mut drained = Vec::new();
        while state.is_reply_pending() {
            let result = transition(
                &state,
                &context,
                Event::ReplyReady {
                    reply: ResponderReply {
                        reply_text: "ok".to_string(),
                        requires_handoff: false,
                    },
                },
            );
            for effect in &result.effects {
                if let Effect::InvokeResponder { text, .. } = effect {
                    drained.push(text.clone());
                }
            }
            state = result.new_state;
        }

        prop_assert_eq!(drained, texts);
        prop_assert_eq!(state, ConvState::Automated);
    }
}
