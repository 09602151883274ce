//! Skill process stdout protocol
//!
//! Every non-diagnostic line a skill process prints is one JSON object with
//! at least an `output` member. Any other members (skills echo their intent
//! object back) are ignored.

use crate::answer::Answer;
use crate::intent::Arguments;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One parsed result line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillOutputLine {
    pub output: SkillOutput,
}

impl SkillOutputLine {
    pub fn parse(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }
}

/// Answer text, either a plain string or a text/speech pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerContent {
    Text(String),
    Rich {
        #[serde(default)]
        text: Option<String>,
        #[serde(default)]
        speech: Option<String>,
    },
}

impl Default for AnswerContent {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

impl AnswerContent {
    pub fn text(&self) -> &str {
        match self {
            Self::Text(text) => text,
            Self::Rich { text, speech } => text.as_deref().or(speech.as_deref()).unwrap_or(""),
        }
    }

    /// Speech falls back to the display text
    pub fn speech(&self) -> &str {
        match self {
            Self::Text(text) => text,
            Self::Rich { text, speech } => speech.as_deref().or(text.as_deref()).unwrap_or(""),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text().trim().is_empty()
    }
}

/// Control metadata a skill attaches to its answer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SkillCore {
    /// `Some(false)` breaks the loop of a looping action
    #[serde(default, alias = "isInActionLoop")]
    pub is_in_action_loop: Option<bool>,
    /// Explicit jump, `skill:action` or a bare action of the same skill
    #[serde(default, alias = "nextAction")]
    pub next_action: Option<String>,
    /// Progress reported by a tool, the turn goes on after it
    #[serde(default, alias = "isToolOutput")]
    pub is_tool_output: Option<bool>,
    /// Merged into the conversation data store
    #[serde(default, alias = "contextData")]
    pub context_data: Option<Arguments>,
    #[serde(default)]
    pub suggestions: Option<Vec<String>>,
}

/// The `output` member of a result line
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SkillOutput {
    #[serde(default)]
    pub codes: Option<String>,
    #[serde(default)]
    pub answer: AnswerContent,
    #[serde(default)]
    pub core: Option<SkillCore>,
    #[serde(default)]
    pub widget: Option<Value>,
    #[serde(default, rename = "replaceMessageId")]
    pub replace_message_id: Option<String>,
}

impl SkillOutput {
    pub fn text(answer: impl Into<String>) -> Self {
        Self {
            answer: AnswerContent::Text(answer.into()),
            ..Self::default()
        }
    }

    pub fn with_core(mut self, core: SkillCore) -> Self {
        self.core = Some(core);
        self
    }

    pub fn core(&self) -> SkillCore {
        self.core.clone().unwrap_or_default()
    }

    pub fn next_action(&self) -> Option<&str> {
        self.core
            .as_ref()
            .and_then(|c| c.next_action.as_deref())
            .filter(|a| !a.trim().is_empty())
    }

    /// The skill explicitly asked to leave its action loop
    pub fn breaks_loop(&self) -> bool {
        self.core
            .as_ref()
            .and_then(|c| c.is_in_action_loop)
            .map(|in_loop| !in_loop)
            .unwrap_or(false)
    }

    pub fn is_tool_output(&self) -> bool {
        self.core
            .as_ref()
            .and_then(|c| c.is_tool_output)
            .unwrap_or(false)
    }

    /// Whether there is anything to show or say
    pub fn has_content(&self) -> bool {
        !self.answer.is_empty() || self.widget.is_some()
    }

    pub fn to_answer(&self) -> Answer {
        Answer::with_speech(self.answer.text(), self.answer.speech())
    }
}
