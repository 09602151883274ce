use crate::backend::{CompletionRequest, GenerationParams};
use crate::duty::{Duty, DutyError};
use crate::session::SharedContext;
use async_trait::async_trait;
use hearth_types::ChatMessage;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct ParaphraseInput {
    pub text: String,
    pub lang: String,
}

/// Rewrites an answer in a more natural way, keeping its meaning
pub struct ParaphraseDuty {
    context: SharedContext,
}

impl ParaphraseDuty {
    pub fn new(context: SharedContext) -> Self {
        Self { context }
    }
}

#[async_trait]
impl Duty for ParaphraseDuty {
    type Input = ParaphraseInput;
    type Output = String;

    fn name(&self) -> &'static str {
        "paraphrase"
    }

    async fn init(&self, force: bool) -> Result<(), DutyError> {
        self.context.warm_up(force).await?;
        Ok(())
    }

    async fn execute(&self, input: ParaphraseInput) -> Result<String, DutyError> {
        let request = CompletionRequest::new(
            vec![
                ChatMessage::system(format!(
                    "Rephrase the assistant's answer so it sounds natural in a spoken \
                     conversation. Keep every fact, number and name. Answer in the \
                     language '{}' and reply with the rephrased text only.",
                    input.lang
                )),
                ChatMessage::user(input.text.clone()),
            ],
            GenerationParams::creative(),
        );

        let response = self.context.complete(&request).await?;
        let rewritten = response.content.unwrap_or_default();
        let rewritten = rewritten.trim().trim_matches('"').trim();

        if rewritten.is_empty() {
            debug!("Paraphrase came back empty, keeping original text");
            return Ok(input.text);
        }
        Ok(rewritten.to_string())
    }
}
