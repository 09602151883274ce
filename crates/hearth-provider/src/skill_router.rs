//! Skill Router duty: utterance → skill name or none

use crate::backend::{CompletionRequest, GenerationParams};
use crate::duty::{Duty, DutyError};
use crate::parse::extract_json;
use crate::session::SharedContext;
use async_trait::async_trait;
use hearth_types::ChatMessage;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Name and description of a routable skill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillSummary {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct SkillRouterInput {
    pub utterance: String,
    pub skills: Vec<SkillSummary>,
}

pub struct SkillRouterDuty {
    context: SharedContext,
}

impl SkillRouterDuty {
    pub fn new(context: SharedContext) -> Self {
        Self { context }
    }

    fn system_prompt(skills: &[SkillSummary]) -> String {
        let list = skills
            .iter()
            .map(|s| format!("- {}: {}", s.name, s.description))
            .collect::<Vec<_>>()
            .join("\n");
        format!(
            "You pick the skill that best handles the user's request.\n\
             Available skills:\n{list}\n\n\
             Reply with a JSON object {{\"skill_name\": \"<name>\"}}. \
             Use {{\"skill_name\": null}} when no skill fits."
        )
    }
}

/// Read the skill name from the model reply and check it is routable
fn parse_skill_name(reply: &str, skills: &[SkillSummary]) -> Option<String> {
    let raw = match extract_json(reply) {
        Some(value) => value
            .get("skill_name")
            .and_then(|v| v.as_str())
            .map(str::to_string)?,
        None => reply.trim().trim_matches(|c| c == '"' || c == '\'' || c == '.').to_string(),
    };

    let name = raw.trim();
    if name.is_empty() || name.eq_ignore_ascii_case("none") || name.eq_ignore_ascii_case("null") {
        return None;
    }

    match skills.iter().find(|s| s.name == name) {
        Some(skill) => Some(skill.name.clone()),
        None => {
            warn!("Skill router proposed unknown skill '{}'", name);
            None
        }
    }
}

#[async_trait]
impl Duty for SkillRouterDuty {
    type Input = SkillRouterInput;
    type Output = Option<String>;

    fn name(&self) -> &'static str {
        "skill_router"
    }

    async fn init(&self, force: bool) -> Result<(), DutyError> {
        self.context.warm_up(force).await?;
        Ok(())
    }

    async fn execute(&self, input: SkillRouterInput) -> Result<Option<String>, DutyError> {
        if input.skills.is_empty() {
            return Ok(None);
        }

        let request = CompletionRequest::new(
            vec![
                ChatMessage::system(Self::system_prompt(&input.skills)),
                ChatMessage::user(input.utterance.clone()),
            ],
            GenerationParams::structured(),
        );

        let response = self.context.complete(&request).await?;
        let reply = response.content.unwrap_or_default();
        debug!("Skill router reply: {}", reply);

        Ok(parse_skill_name(&reply, &input.skills))
    }
}
