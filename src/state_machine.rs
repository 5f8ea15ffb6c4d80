//! Conversation ownership state machine
//!
//! Implements the Elm Architecture pattern with pure state transitions:
//! every change of ownership is a transition on a `ConvState`, and all I/O
//! (appends, persistence, responder calls) is emitted as effects for the
//! runtime to execute.

mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use effect::Effect;
pub use event::Event;
pub use state::{ConvContext, ConvState, QueuedInbound};
pub use transition::{transition, TransitionResult};
