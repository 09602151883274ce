//! Action Calling duty: utterance + skill actions → tagged outputs
//!
//! The model may answer with native tool calls or with a JSON blob in plain
//! text. Both shapes go through [`classify`] so equivalent intents produce
//! identical [`ActionCallingOutput`] values.

use crate::backend::{CompletionRequest, GenerationParams};
use crate::duty::{Duty, DutyError};
use crate::parse::{arguments_from_value, clean_arguments, extract_json};
use crate::session::SharedContext;
use async_trait::async_trait;
use hearth_types::{ActionCallingOutput, Arguments, ChatMessage, ParameterSpec, Tool, ToolCall};
use serde_json::{json, Value};
use tracing::{debug, warn};

/// An action offered to the model
#[derive(Debug, Clone, PartialEq)]
pub struct ActionSummary {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ParameterSpec>,
}

impl ActionSummary {
    /// Function calling schema of the action
    pub fn to_tool(&self) -> Tool {
        let mut properties = serde_json::Map::new();
        for param in &self.parameters {
            let mut schema = json!({ "type": param.param_type });
            if param.param_type == "array" {
                schema["items"] = json!({ "type": "string" });
            }
            if let Some(description) = &param.description {
                schema["description"] = json!(description);
            }
            properties.insert(param.name.clone(), schema);
        }

        let required: Vec<&str> = self
            .parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();

        Tool::function(
            &self.name,
            &self.description,
            json!({
                "type": "object",
                "properties": properties,
                "required": required,
            }),
        )
    }

    fn missing(&self, arguments: &Arguments) -> Vec<String> {
        self.parameters
            .iter()
            .filter(|p| p.required && !arguments.contains_key(&p.name))
            .map(|p| p.name.clone())
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct ActionCallingInput {
    pub utterance: String,
    pub skill_name: String,
    pub actions: Vec<ActionSummary>,
}

pub struct ActionCallingDuty {
    context: SharedContext,
}

impl ActionCallingDuty {
    pub fn new(context: SharedContext) -> Self {
        Self { context }
    }

    fn system_prompt(skill_name: &str) -> String {
        format!(
            "You map the user's request to actions of the '{skill_name}' skill. \
             Call one function per requested operation, in the order the user asked. \
             Only fill arguments the user actually gave. \
             When no function matches, reply with {{\"status\": \"not_found\"}}."
        )
    }
}

/// Turn one proposed call into a tagged output
pub fn classify(name: &str, raw_arguments: Arguments, actions: &[ActionSummary]) -> ActionCallingOutput {
    let Some(action) = actions.iter().find(|a| a.name == name) else {
        warn!("Action calling proposed unknown action '{}'", name);
        return ActionCallingOutput::NotFound;
    };

    let known: Arguments = raw_arguments
        .into_iter()
        .filter(|(key, _)| action.parameters.iter().any(|p| &p.name == key))
        .collect();
    let arguments = clean_arguments(known);
    let missing = action.missing(&arguments);

    if missing.is_empty() {
        ActionCallingOutput::Success {
            name: action.name.clone(),
            arguments,
        }
    } else {
        ActionCallingOutput::MissingParams {
            name: action.name.clone(),
            required_params: missing,
            arguments,
        }
    }
}

/// Outputs from native tool calls
pub fn from_tool_calls(calls: &[ToolCall], actions: &[ActionSummary]) -> Vec<ActionCallingOutput> {
    calls
        .iter()
        .map(|call| {
            let arguments = call.parse_args::<Arguments>().unwrap_or_else(|e| {
                warn!("Tool call '{}' has unparsable arguments: {}", call.function.name, e);
                Arguments::new()
            });
            classify(&call.function.name, arguments, actions)
        })
        .collect()
}

/// Outputs from a free-text reply
///
/// Accepts an array of calls, a single call, a `tool_calls` wrapper, an
/// OpenAI `function_call` object, or a status object.
pub fn from_text(reply: &str, actions: &[ActionSummary]) -> Vec<ActionCallingOutput> {
    let Some(value) = extract_json(reply) else {
        debug!("Action calling reply has no JSON: {}", reply);
        return Vec::new();
    };
    from_value(&value, actions)
}

fn from_value(value: &Value, actions: &[ActionSummary]) -> Vec<ActionCallingOutput> {
    match value {
        Value::Array(items) => items.iter().flat_map(|item| from_value(item, actions)).collect(),
        Value::Object(map) => {
            if let Some(calls) = map.get("tool_calls").or_else(|| map.get("actions")) {
                return from_value(calls, actions);
            }
            if let Some(call) = map.get("function_call").or_else(|| map.get("function")) {
                return from_value(call, actions);
            }

            let status = map.get("status").and_then(Value::as_str);
            if status == Some("not_found") {
                return vec![ActionCallingOutput::NotFound];
            }

            let name = map
                .get("name")
                .or_else(|| map.get("action"))
                .and_then(Value::as_str);
            match name {
                Some(name) => {
                    let arguments = arguments_from_value(
                        map.get("arguments").or_else(|| map.get("parameters")),
                    );
                    vec![classify(name, arguments, actions)]
                }
                None => vec![ActionCallingOutput::NotFound],
            }
        }
        _ => Vec::new(),
    }
}

#[async_trait]
impl Duty for ActionCallingDuty {
    type Input = ActionCallingInput;
    type Output = Vec<ActionCallingOutput>;

    fn name(&self) -> &'static str {
        "action_calling"
    }

    async fn init(&self, force: bool) -> Result<(), DutyError> {
        self.context.warm_up(force).await?;
        Ok(())
    }

    async fn execute(&self, input: ActionCallingInput) -> Result<Vec<ActionCallingOutput>, DutyError> {
        if input.actions.is_empty() {
            return Ok(vec![ActionCallingOutput::NotFound]);
        }

        let tools = input.actions.iter().map(ActionSummary::to_tool).collect();
        let request = CompletionRequest::new(
            vec![
                ChatMessage::system(Self::system_prompt(&input.skill_name)),
                ChatMessage::user(input.utterance.clone()),
            ],
            GenerationParams::structured(),
        )
        .with_tools(tools);

        let response = self.context.complete(&request).await?;

        let outputs = if response.has_tool_calls() {
            from_tool_calls(&response.tool_calls, &input.actions)
        } else {
            let reply = response.content.as_deref().unwrap_or_default();
            if reply.trim().is_empty() {
                return Err(DutyError::MalformedResponse(
                    "reply has neither tool calls nor text".to_string(),
                ));
            }
            from_text(reply, &input.actions)
        };

        debug!("Action calling produced {} output(s)", outputs.len());

        if outputs.is_empty() {
            Ok(vec![ActionCallingOutput::NotFound])
        } else {
            Ok(outputs)
        }
    }
}
