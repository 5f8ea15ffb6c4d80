//! Pure state transition function

use super::state::QueuedInbound;
use super::{ConvContext, ConvState, Effect, Event};

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: ConvState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: ConvState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Pure transition function
///
/// Given the same inputs it always produces the same outputs, with no I/O
/// side effects. Identity validation (roster membership, permissions)
/// happens at the command boundary before an event is ever constructed, so
/// every (state, event) combination here has a defined outcome:
///
/// - Ownership moves from automated to a human only on a handoff signal,
///   a human-authored outbound message, or an explicit take-over.
/// - At most one responder call is in flight per conversation; inbound
///   messages arriving during a call are appended at once and their
///   evaluation queued behind it.
/// - Responder results arriving after ownership changed are stale and are
///   discarded without touching the store.
pub fn transition(state: &ConvState, context: &ConvContext, event: Event) -> TransitionResult {
    match (state, event) {
        // ============================================================
        // Inbound customer messages
        // ============================================================

        // Automated + CustomerMessage -> evaluate via the responder
        (
            ConvState::Automated,
            Event::CustomerMessage {
                text,
                first_interaction,
            },
        ) => TransitionResult::new(ConvState::ReplyPending { queued: vec![] })
            .with_effect(Effect::PersistInbound { text: text.clone() })
            .with_effect(Effect::invoke_responder(text, first_interaction)),

        // ReplyPending + CustomerMessage -> append now, evaluate after the
        // in-flight call resolves
        (
            ConvState::ReplyPending { queued },
            Event::CustomerMessage {
                text,
                first_interaction,
            },
        ) => {
            let mut queued = queued.clone();
            queued.push(QueuedInbound {
                text: text.clone(),
                first_interaction,
            });
            TransitionResult::new(ConvState::ReplyPending { queued })
                .with_effect(Effect::PersistInbound { text })
        }

        // Human + CustomerMessage -> append only; humans respond manually
        (ConvState::Human { agent_id }, Event::CustomerMessage { text, .. }) => {
            TransitionResult::new(ConvState::Human {
                agent_id: agent_id.clone(),
            })
            .with_effect(Effect::PersistInbound { text })
        }

        // ============================================================
        // Human-authored outbound messages
        // ============================================================

        // A human typing into a bot-owned conversation always takes
        // ownership; the ownership write precedes the message append so the
        // takeover is never observed after its own message. Any in-flight
        // responder call becomes stale and its result is discarded.
        (
            ConvState::Automated | ConvState::ReplyPending { .. },
            Event::AgentMessage {
                agent_id,
                text,
                kind,
            },
        ) => TransitionResult::new(ConvState::Human {
            agent_id: agent_id.clone(),
        })
        .with_effect(Effect::PersistOwnership)
        .with_effect(Effect::agent_message(agent_id, text, kind)),

        // Already human-owned: append without reassigning. Reassignment is
        // an explicit take-over, not a side effect of replying.
        (
            ConvState::Human { agent_id },
            Event::AgentMessage {
                agent_id: sender,
                text,
                kind,
            },
        ) => TransitionResult::new(ConvState::Human {
            agent_id: agent_id.clone(),
        })
        .with_effect(Effect::agent_message(sender, text, kind)),

        // ============================================================
        // Explicit ownership commands
        // ============================================================

        (_, Event::TakeOver { agent_id }) => TransitionResult::new(ConvState::Human { agent_id })
            .with_effect(Effect::PersistOwnership),

        // Return-to-automated acts on human ownership; for a thread that is
        // already automated (quiescent or mid-call) it changes nothing.
        (ConvState::Human { .. }, Event::ReturnToAutomated) => {
            TransitionResult::new(ConvState::Automated).with_effect(Effect::PersistOwnership)
        }
        (state, Event::ReturnToAutomated) => TransitionResult::new(state.clone()),

        // ============================================================
        // Responder call resolution
        // ============================================================

        // Reply with handoff: append the reply, then escalate to the
        // configured fallback human. Queued evaluations are dropped (their
        // messages are in the store; a human owns the thread now).
        (ConvState::ReplyPending { .. }, Event::ReplyReady { reply })
            if reply.requires_handoff =>
        {
            TransitionResult::new(ConvState::Human {
                agent_id: context.escalation_agent_id.clone(),
            })
            .with_effect(Effect::PersistBotReply {
                text: reply.reply_text,
            })
            .with_effect(Effect::PersistOwnership)
        }

        // Reply without handoff: append it, then evaluate the next queued
        // inbound message, if any
        (ConvState::ReplyPending { queued }, Event::ReplyReady { reply }) => {
            let result = TransitionResult::new(ConvState::Automated).with_effect(
                Effect::PersistBotReply {
                    text: reply.reply_text,
                },
            );
            drain_next_queued(result, queued)
        }

        // Call failed or timed out: no reply is appended, ownership is
        // untouched, the failure is surfaced as recoverable. The next
        // queued inbound message is the retry trigger.
        (ConvState::ReplyPending { queued }, Event::ReplyFailed { message }) => {
            let result = TransitionResult::new(ConvState::Automated)
                .with_effect(Effect::NotifyResponderError { message });
            drain_next_queued(result, queued)
        }

        // Stale responder results: ownership changed (or the thread was
        // returned to automated) while the call was in flight. Discard.
        (state, Event::ReplyReady { .. } | Event::ReplyFailed { .. }) => {
            TransitionResult::new(state.clone())
        }
    }
}

/// Pop the next queued inbound evaluation, if any, replacing the quiescent
/// state the caller proposed with a fresh `ReplyPending`
fn drain_next_queued(mut result: TransitionResult, queued: &[QueuedInbound]) -> TransitionResult {
    if let Some((next, rest)) = queued.split_first() {
        result.new_state = ConvState::ReplyPending {
            queued: rest.to_vec(),
        };
        result
            .effects
            .push(Effect::invoke_responder(next.text.clone(), next.first_interaction));
    }
    result
}
