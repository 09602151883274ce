//! `Hearth` Skills System
//!
//! Read side of the skill configuration: every skill is a directory holding a
//! `skill.json` (or `skill.yaml`) that declares its actions, their parameter
//! schemas, loop flags and the skill's flow.
//!
//! ## Architecture
//!
//! Discovery: at startup, scan the configured directories and load every skill config
//! Lookup: the router resolves `skill` / `skill:action` names through [`SkillRegistry`]

#![deny(unsafe_code, dead_code, unused_imports, unused_variables, missing_docs)]

pub mod registry;
pub mod skill;

pub use registry::{SkillRegistry, SkillsRegistry};
pub use skill::{ActionConfig, ActionType, ParameterDecl, SkillConfig};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{ActionConfig, SkillConfig, SkillRegistry, SkillsRegistry};
}
