//! Hearth Provider - Completion duties over an inference backend
//!
//! The inference engine is only reached through [`InferenceBackend`]. All
//! duties share one [`SharedContext`], which serializes calls and releases
//! the context after a period of inactivity.

pub mod action_calling;
pub mod backend;
pub mod duty;
pub mod paraphrase;
pub mod parse;
pub mod session;
pub mod skill_router;
pub mod slot_filling;

pub use action_calling::{ActionCallingDuty, ActionCallingInput, ActionSummary};
pub use backend::{
    CompletionRequest, GenerationParams, InferenceBackend, InferenceContext, OpenAIBackend,
};
pub use duty::{Duty, DutyError};
pub use paraphrase::{ParaphraseDuty, ParaphraseInput};
pub use session::{SharedContext, DEFAULT_IDLE_TIMEOUT};
pub use skill_router::{SkillRouterDuty, SkillRouterInput, SkillSummary};
pub use slot_filling::{SlotFillingDuty, SlotFillingInput};
