use crate::intent::Arguments;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Outcome of the Action Calling duty for one requested operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ActionCallingOutput {
    /// The action can run with these arguments
    Success {
        name: String,
        #[serde(default)]
        arguments: Arguments,
    },
    /// The action was identified but required parameters are still missing
    MissingParams {
        name: String,
        required_params: Vec<String>,
        #[serde(default)]
        arguments: Arguments,
    },
    /// No action of the skill matches the utterance
    NotFound,
}

impl ActionCallingOutput {
    /// Success without arguments
    pub fn success(name: impl Into<String>) -> Self {
        Self::Success {
            name: name.into(),
            arguments: Arguments::new(),
        }
    }

    pub fn action_name(&self) -> Option<&str> {
        match self {
            Self::Success { name, .. } | Self::MissingParams { name, .. } => Some(name),
            Self::NotFound => None,
        }
    }
}

/// Outcome of the Slot Filling duty
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SlotFillingOutput {
    Success { filled_slots: Arguments },
    NotFound,
}

/// Errors raised while parsing a `skill:action` reference
#[derive(Debug, Error, PartialEq)]
pub enum ReferenceError {
    #[error("empty action reference")]
    Empty,

    #[error("action reference '{0}' has no action name")]
    MissingAction(String),
}

/// A fully qualified `skill:action` reference
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SkillActionRef {
    pub skill: String,
    pub action: String,
}

impl SkillActionRef {
    pub fn new(skill: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            skill: skill.into(),
            action: action.into(),
        }
    }

    /// Parse `skill:action`, or a bare `action` resolved against `current_skill`.
    ///
    /// A skill name given without `suffix` gets it appended, so
    /// `guess_the_number:set_up` and `guess_the_number_skill:set_up` name the
    /// same action.
    pub fn parse(reference: &str, current_skill: &str, suffix: &str) -> Result<Self, ReferenceError> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(ReferenceError::Empty);
        }

        let Some((skill, action)) = reference.split_once(':') else {
            return Ok(Self::new(current_skill, reference));
        };

        let action = action.trim();
        if action.is_empty() {
            return Err(ReferenceError::MissingAction(reference.to_string()));
        }

        let skill = skill.trim();
        let skill = if skill.is_empty() {
            current_skill.to_string()
        } else if suffix.is_empty() || skill.ends_with(suffix) {
            skill.to_string()
        } else {
            format!("{skill}{suffix}")
        };

        Ok(Self::new(skill, action))
    }

    /// Whether a flow step names an action of another skill
    pub fn is_qualified(step: &str) -> bool {
        step.contains(':')
    }
}

impl fmt::Display for SkillActionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.skill, self.action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_appends_suffix() {
        let r = SkillActionRef::parse("guess_the_number:set_up", "other_skill", "_skill").unwrap();
        assert_eq!(r, SkillActionRef::new("guess_the_number_skill", "set_up"));

        let r = SkillActionRef::parse("rochambeau_skill:set_up", "x", "_skill").unwrap();
        assert_eq!(r.skill, "rochambeau_skill");
    }

    #[test]
    fn test_parse_bare_action_uses_current_skill() {
        let r = SkillActionRef::parse("replay", "guess_the_number_skill", "_skill").unwrap();
        assert_eq!(r.to_string(), "guess_the_number_skill:replay");
    }

    #[test]
    fn test_parse_rejects_missing_action() {
        assert_eq!(
            SkillActionRef::parse("timer_skill:", "x", "_skill"),
            Err(ReferenceError::MissingAction("timer_skill:".into()))
        );
        assert_eq!(SkillActionRef::parse("  ", "x", "_skill"), Err(ReferenceError::Empty));
    }

    #[test]
    fn test_action_calling_output_wire_format() {
        let json = serde_json::json!({
            "status": "missing_params",
            "name": "add_todos",
            "required_params": ["list_name"],
            "arguments": {"items": ["milk"]}
        });
        let output: ActionCallingOutput = serde_json::from_value(json).unwrap();
        assert_eq!(output.action_name(), Some("add_todos"));
        assert!(matches!(output, ActionCallingOutput::MissingParams { ref required_params, .. } if required_params == &vec!["list_name".to_string()]));

        let not_found: ActionCallingOutput =
            serde_json::from_value(serde_json::json!({"status": "not_found"})).unwrap();
        assert_eq!(not_found, ActionCallingOutput::NotFound);
    }
}
