//! Hearth Brain - Intent routing and answer delivery
//!
//! [`IntentRouter`] owns the conversation state and drives each utterance
//! through slot filling, skill and action selection, and skill execution.
//! Answers flow out through the [`AnswerQueue`], which delivers them in
//! order to a [`DeliverySink`] and an optional [`SpeechSynthesizer`].

pub mod conversation;
pub mod delivery;
pub mod router;
pub mod state;
pub mod talk;

#[cfg(test)]
pub(crate) mod testing;

pub use conversation::{ConversationLog, ConversationTurn, DEFAULT_MAX_TURNS};
pub use delivery::{DeliverySink, SpeechSynthesizer};
pub use router::{
    deterministic_shortcut, ActionCaller, Duties, IntentRouter, RouterConfig, RouterError,
    SkillRouter, SlotFiller, TurnOutcome,
};
pub use state::{ConversationState, FlowCursor, Phase};
pub use talk::{AnswerQueue, Paraphraser, TalkConfig};
