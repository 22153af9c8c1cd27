//! The language-model seam the agent loop decides through.

use super::memory::{MemoryEntry, ModelToolCall};
use crate::config::Settings;
use crate::error::{CloserError, Result};
use crate::openai::create_client;
use crate::tools::ToolDescriptor;
use async_openai::types::{
    ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs,
    ChatCompletionTool, ChatCompletionToolType, CreateChatCompletionRequestArgs, FunctionCall,
    FunctionObject,
};
use async_trait::async_trait;
use tracing::{debug, instrument};

/// What the model decided to do next.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelReply {
    /// Answer the user; the turn is over.
    Final(String),
    /// Run these tools, then ask again.
    ToolCalls(Vec<ModelToolCall>),
}

/// A model that picks the next step given instructions, history and tools.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn next_step(
        &self,
        system: &str,
        history: &[MemoryEntry],
        tools: &[ToolDescriptor],
    ) -> Result<ModelReply>;
}

/// OpenAI chat-completions binding.
pub struct OpenAIModel {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    temperature: f32,
}

impl OpenAIModel {
    /// Build from settings. Fails fast when no API key is configured.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Ok(Self {
            client: create_client(settings)?,
            model: settings.openai.model.clone(),
            temperature: settings.openai.temperature,
        })
    }

    /// Use a different model name.
    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl LanguageModel for OpenAIModel {
    #[instrument(skip_all, fields(model = %self.model, history = history.len()))]
    async fn next_step(
        &self,
        system: &str,
        history: &[MemoryEntry],
        tools: &[ToolDescriptor],
    ) -> Result<ModelReply> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .temperature(self.temperature)
            .messages(to_request_messages(system, history)?)
            .tools(to_openai_tools(tools))
            .build()
            .map_err(|e| CloserError::Agent(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| CloserError::OpenAI(format!("Chat API error: {}", e)))?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| CloserError::Agent("No response from model".to_string()))?;

        match choice.message.tool_calls {
            Some(calls) if !calls.is_empty() => {
                debug!("Model requested {} tool call(s)", calls.len());
                Ok(ModelReply::ToolCalls(
                    calls
                        .into_iter()
                        .map(|c| ModelToolCall {
                            id: c.id,
                            name: c.function.name,
                            arguments: c.function.arguments,
                        })
                        .collect(),
                ))
            }
            _ => Ok(ModelReply::Final(choice.message.content.unwrap_or_default())),
        }
    }
}

/// Convert descriptors to OpenAI function tools.
pub fn to_openai_tools(tools: &[ToolDescriptor]) -> Vec<ChatCompletionTool> {
    tools
        .iter()
        .map(|t| ChatCompletionTool {
            r#type: ChatCompletionToolType::Function,
            function: FunctionObject {
                name: t.name.clone(),
                description: Some(t.description.clone()),
                parameters: Some(t.parameters.clone()),
                strict: None,
            },
        })
        .collect()
}

/// Convert the system prompt and memory into request messages.
pub fn to_request_messages(
    system: &str,
    history: &[MemoryEntry],
) -> Result<Vec<ChatCompletionRequestMessage>> {
    let build_err = |e: async_openai::error::OpenAIError| CloserError::Agent(e.to_string());

    let mut messages: Vec<ChatCompletionRequestMessage> = Vec::with_capacity(history.len() + 1);
    messages.push(
        ChatCompletionRequestSystemMessageArgs::default()
            .content(system)
            .build()
            .map_err(build_err)?
            .into(),
    );

    for entry in history {
        let message: ChatCompletionRequestMessage = match entry {
            MemoryEntry::User { content } => ChatCompletionRequestUserMessageArgs::default()
                .content(content.as_str())
                .build()
                .map_err(build_err)?
                .into(),
            MemoryEntry::Assistant { content, tool_calls } => {
                let mut args = ChatCompletionRequestAssistantMessageArgs::default();
                if let Some(content) = content {
                    args.content(content.as_str());
                }
                if !tool_calls.is_empty() {
                    args.tool_calls(
                        tool_calls
                            .iter()
                            .map(|c| ChatCompletionMessageToolCall {
                                id: c.id.clone(),
                                r#type: ChatCompletionToolType::Function,
                                function: FunctionCall {
                                    name: c.name.clone(),
                                    arguments: c.arguments.clone(),
                                },
                            })
                            .collect::<Vec<_>>(),
                    );
                }
                args.build().map_err(build_err)?.into()
            }
            MemoryEntry::ToolResult { call_id, content } => {
                ChatCompletionRequestToolMessageArgs::default()
                    .tool_call_id(call_id.as_str())
                    .content(content.as_str())
                    .build()
                    .map_err(build_err)?
                    .into()
            }
        };
        messages.push(message);
    }

    Ok(messages)
}
