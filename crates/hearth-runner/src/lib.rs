//! `Hearth` Skill Process Runner
//!
//! Runs skill actions in isolated processes.
//!
//! ## Protocol
//!
//! - The intent context is written to a uniquely named JSON file whose path
//!   is the last argument of the spawned command
//! - Stdout is newline-delimited: lines starting with the log marker are
//!   diagnostics, every other non-empty line is a JSON result line
//! - The last valid result line is the invocation result
//! - Stderr output, a non-zero exit or a timeout fail the invocation

#![deny(unsafe_code, dead_code, unused_imports, unused_variables, missing_docs)]

pub mod config;
pub mod error;
pub mod frame;
pub mod intent_file;
pub mod runner;

pub use config::{RunnerConfig, DEFAULT_LOG_MARKER};
pub use error::RunnerError;
pub use frame::{classify, Frame, LineFramer, StdoutDemux};
pub use intent_file::{IntentFile, IntentFileGuard};
pub use runner::{SkillExecutor, SkillProcessRunner};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{RunnerConfig, RunnerError, SkillExecutor, SkillProcessRunner};
}
