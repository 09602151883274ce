//! Slot Filling duty: utterance + one missing slot → filled value or not-found

use crate::backend::{CompletionRequest, GenerationParams};
use crate::duty::{Duty, DutyError};
use crate::parse::{clean_arguments, extract_json};
use crate::session::SharedContext;
use async_trait::async_trait;
use hearth_types::{Arguments, ChatMessage, ParameterSpec, SlotFillingOutput};
use serde_json::Value;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct SlotFillingInput {
    pub utterance: String,
    pub slot: ParameterSpec,
    /// Utterances since the pending interaction started, oldest first
    pub history: Vec<String>,
}

pub struct SlotFillingDuty {
    context: SharedContext,
}

impl SlotFillingDuty {
    pub fn new(context: SharedContext) -> Self {
        Self { context }
    }

    fn system_prompt(slot: &ParameterSpec, history: &[String]) -> String {
        let description = slot
            .description
            .as_deref()
            .map(|d| format!(" ({d})"))
            .unwrap_or_default();
        let history = if history.is_empty() {
            "(none)".to_string()
        } else {
            history.join("\n")
        };
        format!(
            "The assistant asked the user for the value of '{name}', of type {param_type}{description}.\n\
             Earlier messages of this exchange:\n{history}\n\n\
             Extract the value from the user's reply. Reply with a JSON object \
             {{\"status\": \"success\", \"filled_slots\": {{\"{name}\": <value>}}}} \
             or {{\"status\": \"not_found\"}} when the reply does not answer the question.",
            name = slot.name,
            param_type = slot.param_type,
        )
    }
}

/// Read the filled slots from the model reply
///
/// A value for the asked slot is required; values for other slots the
/// user volunteered in the same reply are kept.
fn parse_slot_reply(reply: &str, slot: &ParameterSpec) -> SlotFillingOutput {
    let Some(Value::Object(map)) = extract_json(reply) else {
        return SlotFillingOutput::NotFound;
    };

    if map.get("status").and_then(Value::as_str) == Some("not_found") {
        return SlotFillingOutput::NotFound;
    }

    let filled = match map.get("filled_slots") {
        Some(Value::Object(slots)) => slots.clone(),
        // Bare `{"<slot>": value}` replies
        _ => map
            .into_iter()
            .filter(|(key, _)| key != "status")
            .collect::<Arguments>(),
    };
    let filled = clean_arguments(filled);

    if filled.contains_key(&slot.name) {
        SlotFillingOutput::Success {
            filled_slots: filled,
        }
    } else {
        SlotFillingOutput::NotFound
    }
}

#[async_trait]
impl Duty for SlotFillingDuty {
    type Input = SlotFillingInput;
    type Output = SlotFillingOutput;

    fn name(&self) -> &'static str {
        "slot_filling"
    }

    async fn init(&self, force: bool) -> Result<(), DutyError> {
        self.context.warm_up(force).await?;
        Ok(())
    }

    async fn execute(&self, input: SlotFillingInput) -> Result<SlotFillingOutput, DutyError> {
        let request = CompletionRequest::new(
            vec![
                ChatMessage::system(Self::system_prompt(&input.slot, &input.history)),
                ChatMessage::user(input.utterance.clone()),
            ],
            GenerationParams::structured(),
        );

        let response = self.context.complete(&request).await?;
        let reply = response.content.unwrap_or_default();
        debug!("Slot filling reply for '{}': {}", input.slot.name, reply);

        Ok(parse_slot_reply(&reply, &input.slot))
    }
}
