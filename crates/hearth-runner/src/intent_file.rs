//! Intent file handed to every skill process
//!
//! The file is the only input of the process: its path is the last
//! argument of the command line.

use crate::error::Result;
use hearth_skills::SkillConfig;
use hearth_types::{
    Arguments, ConversationContext, Entity, IntentContext, Sentiment, TemporalContext, TurnId,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Skill identity block of the intent file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillConfigBlock {
    /// Skill name
    pub name: String,
    /// Bridge the skill is written for
    pub bridge: Option<String>,
    /// Skill version
    pub version: Option<String>,
    /// Declared flow
    pub flow: Vec<String>,
}

/// Serialized intent context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentFile {
    /// Turn identifier
    pub id: TurnId,
    /// Language of the utterance
    pub lang: String,
    /// Raw utterance
    pub utterance: String,
    /// Resolved arguments of the action
    pub action_arguments: Arguments,
    /// Entities of the utterance
    pub entities: Vec<Entity>,
    /// Sentiment of the utterance
    pub sentiment: Sentiment,
    /// Name of the conversation context, the skill name
    pub context_name: String,
    /// Skill to run
    pub skill_name: String,
    /// Action to run
    pub action_name: String,
    /// Conversation history
    pub context: ConversationContext,
    /// Skill identity
    pub skill_config: SkillConfigBlock,
    /// Path of the skill configuration file
    pub skill_config_path: String,
    /// Date and time of the invocation
    pub extra_context: TemporalContext,
}

impl IntentFile {
    /// Build the file content for a resolved intent
    #[must_use]
    pub fn new(intent: &IntentContext, skill: &SkillConfig) -> Self {
        let skill_name = intent
            .skill_name
            .clone()
            .unwrap_or_else(|| skill.name.clone());

        Self {
            id: intent.id,
            lang: intent.lang.clone(),
            utterance: intent.utterance.clone(),
            action_arguments: intent.action_arguments.clone(),
            entities: intent.entities.clone(),
            sentiment: intent.sentiment.clone(),
            context_name: skill_name.clone(),
            skill_name,
            action_name: intent.action_name.clone().unwrap_or_default(),
            context: intent.context.clone(),
            skill_config: SkillConfigBlock {
                name: skill.name.clone(),
                bridge: skill.bridge.clone(),
                version: skill.version.clone(),
                flow: skill.flow.clone(),
            },
            skill_config_path: skill.config_path.to_string_lossy().into_owned(),
            extra_context: TemporalContext::now(&intent.lang),
        }
    }

    /// Unique file name for this turn
    #[must_use]
    pub fn file_name(&self) -> String {
        format!("intent-{}-{}.json", self.id, uuid::Uuid::new_v4().simple())
    }

    /// Write the file into `dir`, creating it if needed
    ///
    /// # Errors
    /// Returns an error if the directory or the file cannot be written
    pub async fn write(&self, dir: &Path) -> Result<IntentFileGuard> {
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(self.file_name());
        let content = serde_json::to_vec(self)?;
        tokio::fs::write(&path, content).await?;
        debug!("Intent file written to {:?}", path);
        Ok(IntentFileGuard { path })
    }
}

/// Owns a written intent file and deletes it when dropped
#[derive(Debug)]
pub struct IntentFileGuard {
    path: PathBuf,
}

impl IntentFileGuard {
    /// Location of the file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for IntentFileGuard {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Intent file {:?} removed", self.path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove intent file {:?}: {}", self.path, e),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use hearth_types::Utterance;

    fn skill() -> SkillConfig {
        serde_json::from_str(
            r#"{"name": "timer_skill", "bridge": "python", "version": "1.0.0",
                "actions": {"set_timer": {"parameters": {"duration": {"type": "string"}}}}}"#,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_write_and_cleanup() {
        let dir = tempfile::tempdir().unwrap();
        let utterance = Utterance::new("set a timer for 10 minutes", "en");
        let mut intent = IntentContext::new(&utterance, ConversationContext::default());
        intent.set_skill("timer_skill");
        let mut args = Arguments::new();
        args.insert("duration".into(), serde_json::json!("10 minutes"));
        intent.set_action("set_timer", args, Vec::new());

        let file = IntentFile::new(&intent, &skill());
        let guard = file.write(dir.path()).await.unwrap();
        let path = guard.path().to_path_buf();

        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw["skill_name"], "timer_skill");
        assert_eq!(raw["action_name"], "set_timer");
        assert_eq!(raw["action_arguments"]["duration"], "10 minutes");
        assert_eq!(raw["skill_config"]["bridge"], "python");
        assert_eq!(raw["extra_context"]["lang"], "en");
        assert!(raw["context"]["utterances"].is_array());

        drop(guard);
        assert!(!path.exists());
    }

    #[test]
    fn test_file_names_are_unique() {
        let intent = IntentContext::new(&Utterance::new("hi", "en"), ConversationContext::default());
        let file = IntentFile::new(&intent, &skill());
        assert_ne!(file.file_name(), file.file_name());
    }
}
