//! Configuration of the skill process runner

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Marker prefix identifying diagnostic lines on a skill's stdout
pub const DEFAULT_LOG_MARKER: &str = "[HEARTH_TOOL_LOG]";

/// How skill processes are launched and supervised
#[derive(Debug, Deserialize, Clone)]
pub struct RunnerConfig {
    /// Program executed for every action (the skill bridge)
    #[serde(default = "default_command")]
    pub command: String,

    /// Fixed arguments placed before the intent file path
    #[serde(default)]
    pub args: Vec<String>,

    /// Working directory of the spawned process
    #[serde(default)]
    pub working_dir: Option<PathBuf>,

    /// Directory receiving the intent files
    #[serde(default = "default_intent_dir")]
    pub intent_dir: PathBuf,

    /// Kill the process after this many seconds
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// Time between the terminate signal and the forced kill
    #[serde(default = "default_kill_grace_ms")]
    pub kill_grace_ms: u64,

    /// Prefix of diagnostic lines
    #[serde(default = "default_log_marker")]
    pub log_marker: String,
}

fn default_command() -> String {
    "hearth-python-bridge".to_string()
}

fn default_intent_dir() -> PathBuf {
    std::env::temp_dir().join("hearth").join("intents")
}

fn default_kill_grace_ms() -> u64 {
    2000
}

fn default_log_marker() -> String {
    DEFAULT_LOG_MARKER.to_string()
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            command: default_command(),
            args: Vec::new(),
            working_dir: None,
            intent_dir: default_intent_dir(),
            timeout_secs: None,
            kill_grace_ms: default_kill_grace_ms(),
            log_marker: default_log_marker(),
        }
    }
}

impl RunnerConfig {
    /// Runner launching `command` with no fixed arguments
    #[must_use]
    pub fn with_command(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            ..Self::default()
        }
    }

    /// Process timeout, if any
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    /// Grace period before the forced kill
    #[must_use]
    pub fn kill_grace(&self) -> Duration {
        Duration::from_millis(self.kill_grace_ms)
    }
}
