//! Inference backends
//!
//! The inference engine is an external collaborator. The duties only need
//! "propose a completion for these messages, with these generation
//! parameters", which is what [`InferenceContext::complete`] offers.

use anyhow::Result;
use async_openai::{config::OpenAIConfig, Client};
use async_trait::async_trait;
use hearth_types::{ChatMessage, CompletionResponse, Provider, Role, Tool, ToolCall};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Generation parameters of one completion
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    /// Ask the backend to constrain the output to a JSON object
    pub json_output: bool,
}

impl GenerationParams {
    /// Deterministic, JSON-constrained output for routing duties
    pub fn structured() -> Self {
        Self {
            temperature: 0.0,
            max_tokens: Some(512),
            json_output: true,
        }
    }

    /// Free text output for rewriting
    pub fn creative() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: Some(256),
            json_output: false,
        }
    }
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self::structured()
    }
}

/// One completion request
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<Tool>,
    pub params: GenerationParams,
}

impl CompletionRequest {
    pub fn new(messages: Vec<ChatMessage>, params: GenerationParams) -> Self {
        Self {
            messages,
            tools: Vec::new(),
            params,
        }
    }

    pub fn with_tools(mut self, tools: Vec<Tool>) -> Self {
        self.tools = tools;
        self
    }
}

/// An acquired inference context
///
/// Calls against one context are serialized by its owner.
#[async_trait]
pub trait InferenceContext: Send {
    async fn complete(&mut self, request: &CompletionRequest) -> Result<CompletionResponse>;
}

/// Factory of inference contexts
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    async fn open(&self) -> Result<Box<dyn InferenceContext>>;
}

/// Backend for OpenAI-compatible chat completion endpoints
pub struct OpenAIBackend {
    provider: Provider,
}

impl OpenAIBackend {
    pub fn new(provider: Provider) -> Self {
        info!("Inference backend configured with: {:?}", provider.model());
        Self { provider }
    }

    fn client(&self) -> Client<OpenAIConfig> {
        match &self.provider {
            Provider::OpenAI {
                api_key, base_url, ..
            } => {
                let mut config = OpenAIConfig::new();
                if let Some(key) = api_key {
                    config = config.with_api_key(key);
                }
                if let Some(url) = base_url {
                    config = config.with_api_base(url);
                }
                Client::with_config(config)
            }
            Provider::Ollama { base_url, .. } => {
                // Ollama serves the OpenAI protocol under /v1
                let base = base_url.trim_end_matches('/');
                let api_base = if base.ends_with("/v1") {
                    base.to_string()
                } else {
                    format!("{base}/v1")
                };
                Client::with_config(OpenAIConfig::new().with_api_base(api_base))
            }
        }
    }
}

#[async_trait]
impl InferenceBackend for OpenAIBackend {
    async fn open(&self) -> Result<Box<dyn InferenceContext>> {
        let context = OpenAIContext {
            id: Uuid::new_v4(),
            client: self.client(),
            model: self.provider.model().to_string(),
        };
        debug!("Opened inference context {} for model {}", context.id, context.model);
        Ok(Box::new(context))
    }
}

struct OpenAIContext {
    id: Uuid,
    client: Client<OpenAIConfig>,
    model: String,
}

#[async_trait]
impl InferenceContext for OpenAIContext {
    #[allow(deprecated)]
    async fn complete(&mut self, request: &CompletionRequest) -> Result<CompletionResponse> {
        use async_openai::types::{
            ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
            ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
            ChatCompletionToolArgs, ChatCompletionToolType, CreateChatCompletionRequestArgs,
            FunctionObjectArgs, ResponseFormat,
        };

        let mut messages: Vec<ChatCompletionRequestMessage> =
            Vec::with_capacity(request.messages.len());
        for msg in &request.messages {
            let message = match msg.role {
                Role::System => ChatCompletionRequestSystemMessageArgs::default()
                    .content(msg.content.clone())
                    .build()?
                    .into(),
                Role::User => ChatCompletionRequestUserMessageArgs::default()
                    .content(msg.content.clone())
                    .build()?
                    .into(),
                Role::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
                    .content(msg.content.clone())
                    .build()?
                    .into(),
            };
            messages.push(message);
        }

        let mut builder = CreateChatCompletionRequestArgs::default();
        builder
            .model(self.model.clone())
            .messages(messages)
            .temperature(request.params.temperature);

        if let Some(max_tokens) = request.params.max_tokens {
            builder.max_tokens(max_tokens);
        }

        if !request.tools.is_empty() {
            let mut tools = Vec::with_capacity(request.tools.len());
            for tool in &request.tools {
                tools.push(
                    ChatCompletionToolArgs::default()
                        .r#type(ChatCompletionToolType::Function)
                        .function(
                            FunctionObjectArgs::default()
                                .name(tool.function.name.clone())
                                .description(tool.function.description.clone())
                                .parameters(tool.function.parameters.clone())
                                .build()?,
                        )
                        .build()?,
                );
            }
            builder.tools(tools);
        } else if request.params.json_output {
            builder.response_format(ResponseFormat::JsonObject);
        }

        let response = self.client.chat().create(builder.build()?).await?;

        let Some(choice) = response.choices.into_iter().next() else {
            warn!("Inference context {} returned no choices", self.id);
            return Ok(CompletionResponse::text(String::new()));
        };

        let tool_calls: Vec<ToolCall> = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|call| ToolCall::new(call.id, call.function.name, call.function.arguments))
            .collect();

        Ok(CompletionResponse {
            content: choice.message.content,
            tool_calls,
            finish_reason: choice
                .finish_reason
                .map(|reason| format!("{reason:?}").to_lowercase())
                .unwrap_or_else(|| "stop".to_string()),
        })
    }
}
