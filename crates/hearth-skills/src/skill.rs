//! Skill configuration and parsing
//!
//! Each skill is a folder containing `skill.json` or `skill.yaml`

use anyhow::{anyhow, Context, Result};
use hearth_types::{ParameterSpec, SkillActionRef};
use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Config file names looked up in a skill directory, in order
pub const CONFIG_FILE_NAMES: &[&str] = &["skill.json", "skill.yaml", "skill.yml"];

/// Maximum allowed description length
const MAX_DESCRIPTION_LENGTH: usize = 1024;

/// Kind of action
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    /// Runs skill code in a process
    #[default]
    Logic,
    /// Answers with one of its configured lines, no process is spawned
    Dialog,
}

/// Declared parameter of an action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDecl {
    /// Value type, as understood by the inference prompts (`string`, `array`, ...)
    #[serde(rename = "type", default = "default_param_type")]
    pub param_type: String,
    /// What the value means
    #[serde(default)]
    pub description: Option<String>,
}

fn default_param_type() -> String {
    "string".to_string()
}

/// Configuration of one action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionConfig {
    /// Kind of action
    #[serde(rename = "type", default)]
    pub action_type: ActionType,
    /// What the action does, shown to the Action Calling duty
    #[serde(default)]
    pub description: String,
    /// Parameters in declaration order
    #[serde(default)]
    pub parameters: IndexMap<String, ParameterDecl>,
    /// Declared parameters that are not required
    #[serde(default)]
    pub optional_parameters: Vec<String>,
    /// Keep re-triggering on new input until the skill breaks the loop
    #[serde(default)]
    pub is_loop: bool,
    /// Lines a dialog action answers with, one picked at random
    #[serde(default)]
    pub answers: Vec<String>,
}

impl ActionConfig {
    /// Names of required parameters, in declaration order
    pub fn required_parameters(&self) -> Vec<String> {
        self.parameters
            .keys()
            .filter(|name| !self.optional_parameters.contains(name))
            .cloned()
            .collect()
    }

    /// Whether the action declares any slot at all
    pub fn has_slots(&self) -> bool {
        !self.parameters.is_empty()
    }

    /// Full parameter schema with the required flag resolved
    pub fn parameter_specs(&self) -> Vec<ParameterSpec> {
        self.parameters
            .iter()
            .map(|(name, decl)| self.to_spec(name, decl))
            .collect()
    }

    /// Schema of one parameter
    pub fn parameter(&self, name: &str) -> Option<ParameterSpec> {
        self.parameters
            .get_key_value(name)
            .map(|(name, decl)| self.to_spec(name, decl))
    }

    fn to_spec(&self, name: &str, decl: &ParameterDecl) -> ParameterSpec {
        ParameterSpec {
            name: name.to_string(),
            param_type: decl.param_type.clone(),
            description: decl.description.clone(),
            required: !self.optional_parameters.iter().any(|o| o == name),
        }
    }
}

/// A complete skill configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillConfig {
    /// Skill name (lowercase letters, numbers and underscores)
    pub name: String,
    /// What the skill is for, shown to the Skill Router duty
    #[serde(default)]
    pub description: String,
    /// Runtime the skill actions are written for
    #[serde(default)]
    pub bridge: Option<String>,
    /// Skill version
    #[serde(default)]
    pub version: Option<String>,
    /// Ordered steps: action names or `other_skill:action` references
    #[serde(default)]
    pub flow: Vec<String>,
    /// Actions in declaration order
    pub actions: IndexMap<String, ActionConfig>,
    /// Path of the file the config was loaded from
    #[serde(skip)]
    pub config_path: PathBuf,
}

impl SkillConfig {
    /// Load the skill config from a directory
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let config_file = CONFIG_FILE_NAMES
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.exists())
            .ok_or_else(|| anyhow!("No skill config found in {:?}", dir))?;

        let content = fs::read_to_string(&config_file)
            .with_context(|| format!("Failed to read {:?}", config_file))?;

        let is_json = config_file.extension().is_some_and(|ext| ext == "json");
        let mut skill = parse_skill_config(&content, is_json)
            .with_context(|| format!("Failed to parse skill from {:?}", config_file))?;

        validate_config(&skill)?;

        skill.config_path = config_file;
        Ok(skill)
    }

    /// Get an action by name
    pub fn action(&self, name: &str) -> Option<&ActionConfig> {
        self.actions.get(name)
    }

    /// Position of a bare action name in the flow
    pub fn flow_position(&self, action: &str) -> Option<usize> {
        self.flow.iter().position(|step| step == action)
    }

    /// Flow steps after the given action, empty when it is not in the flow
    pub fn flow_after(&self, action: &str) -> Vec<String> {
        match self.flow_position(action) {
            Some(index) => self.flow[index + 1..].to_vec(),
            None => Vec::new(),
        }
    }
}

/// Parse skill config content, JSON or YAML
fn parse_skill_config(content: &str, is_json: bool) -> Result<SkillConfig> {
    if is_json {
        serde_json::from_str(content).with_context(|| "Failed to parse JSON skill config")
    } else {
        serde_yaml::from_str(content).with_context(|| "Failed to parse YAML skill config")
    }
}

/// Validate a skill configuration
fn validate_config(skill: &SkillConfig) -> Result<()> {
    let name_re = Regex::new(r"^[a-z0-9_]+$")
        .map_err(|e| anyhow!("Failed to compile name validation regex: {}", e))?;

    if skill.name.is_empty() {
        return Err(anyhow!("Skill name cannot be empty"));
    }

    if !name_re.is_match(&skill.name) {
        return Err(anyhow!(
            "Skill name '{}' must contain only lowercase letters, numbers, and underscores",
            skill.name
        ));
    }

    if skill.actions.is_empty() {
        return Err(anyhow!("Skill '{}' declares no action", skill.name));
    }

    for (action_name, action) in &skill.actions {
        if !name_re.is_match(action_name) {
            return Err(anyhow!(
                "Action '{}:{}' must contain only lowercase letters, numbers, and underscores",
                skill.name,
                action_name
            ));
        }

        for optional in &action.optional_parameters {
            if !action.parameters.contains_key(optional) {
                warn!(
                    "Action '{}:{}' lists undeclared optional parameter '{}'",
                    skill.name, action_name, optional
                );
            }
        }
    }

    for step in &skill.flow {
        if SkillActionRef::is_qualified(step) {
            continue;
        }
        if !skill.actions.contains_key(step) {
            return Err(anyhow!(
                "Flow of skill '{}' names unknown action '{}'",
                skill.name,
                step
            ));
        }
    }

    if skill.description.len() > MAX_DESCRIPTION_LENGTH {
        warn!(
            "Skill '{}' description exceeds {} characters (was {}), may be truncated",
            skill.name,
            MAX_DESCRIPTION_LENGTH,
            skill.description.len()
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const GUESS_THE_NUMBER: &str = r#"{
        "name": "guess_the_number_skill",
        "description": "Play guess the number",
        "bridge": "python",
        "version": "1.0.0",
        "flow": ["set_up", "guess", "replay"],
        "actions": {
            "set_up": {"type": "logic", "description": "Start a new game"},
            "guess": {
                "type": "logic",
                "description": "Guess the number",
                "parameters": {"number": {"type": "number", "description": "The guessed number"}},
                "is_loop": true
            },
            "replay": {
                "type": "logic",
                "parameters": {"confirmation": {"type": "boolean"}}
            }
        }
    }"#;

    #[test]
    fn test_parse_json_config() {
        let skill = parse_skill_config(GUESS_THE_NUMBER, true).unwrap();
        assert!(validate_config(&skill).is_ok());
        assert_eq!(skill.flow_position("guess"), Some(1));
        assert_eq!(skill.flow_after("guess"), vec!["replay".to_string()]);
        assert!(skill.flow_after("unknown").is_empty());

        let guess = skill.action("guess").unwrap();
        assert!(guess.is_loop);
        assert_eq!(guess.required_parameters(), vec!["number".to_string()]);
        assert_eq!(guess.parameter("number").unwrap().param_type, "number");
    }

    #[test]
    fn test_parameters_keep_declaration_order() {
        let yaml = r#"
name: todo_list_skill
actions:
  add_todos:
    description: Add items to a list
    parameters:
      list_name:
        type: string
      items:
        type: array
      due_date:
        type: string
    optional_parameters: [due_date]
"#;
        let skill = parse_skill_config(yaml, false).unwrap();
        let action = skill.action("add_todos").unwrap();
        assert_eq!(
            action.required_parameters(),
            vec!["list_name".to_string(), "items".to_string()]
        );
        let specs = action.parameter_specs();
        assert_eq!(specs.len(), 3);
        assert!(!specs[2].required);
        assert_eq!(action.action_type, ActionType::Logic);
    }

    #[test]
    fn test_validate_rejects_unknown_flow_step() {
        let mut skill = parse_skill_config(GUESS_THE_NUMBER, true).unwrap();
        skill.flow.push("celebrate".into());
        assert!(validate_config(&skill).is_err());

        skill.flow.pop();
        skill.flow.push("party_skill:celebrate".into());
        assert!(validate_config(&skill).is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_name() {
        let mut skill = parse_skill_config(GUESS_THE_NUMBER, true).unwrap();
        skill.name = "Guess-The-Number".into();
        assert!(validate_config(&skill).is_err());
    }
}
