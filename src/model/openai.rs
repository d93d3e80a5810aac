//! OpenAI-compatible chat completions adapter.

use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs,
    ChatCompletionTool, ChatCompletionToolType, CreateChatCompletionRequestArgs, FunctionCall,
    FunctionObject,
};
use async_openai::Client;
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, instrument};

use super::{AssistantTurn, ChatModel};
use crate::config::LlmSettings;
use crate::conversation::{Message, Role, ToolCallRequest};
use crate::error::{AgentError, Result};
use crate::openai::create_client_with;
use crate::tools::ToolDescriptor;

/// Chat model backed by an OpenAI-compatible endpoint.
pub struct OpenAiModel {
    client: Client<OpenAIConfig>,
    model: String,
    temperature: f32,
}

impl OpenAiModel {
    pub fn new(settings: &LlmSettings) -> Result<Self> {
        Ok(Self {
            client: create_client_with(settings)?,
            model: settings.model.clone(),
            temperature: settings.temperature,
        })
    }
}

#[async_trait]
impl ChatModel for OpenAiModel {
    #[instrument(skip_all, fields(model = %self.model, messages = messages.len(), tools = tools.len()))]
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolDescriptor],
    ) -> Result<AssistantTurn> {
        let request_messages = messages
            .iter()
            .map(to_request_message)
            .collect::<Result<Vec<_>>>()?;

        let mut builder = CreateChatCompletionRequestArgs::default();
        builder
            .model(&self.model)
            .messages(request_messages)
            .temperature(self.temperature);
        if !tools.is_empty() {
            builder.tools(tools.iter().map(tool_definition).collect::<Vec<_>>());
        }
        let request = builder
            .build()
            .map_err(|e| AgentError::Model(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| AgentError::Model(e.to_string()))?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AgentError::Model("No response from model".to_string()))?;

        let tool_calls: Vec<ToolCallRequest> = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|call| {
                // Unparseable arguments are passed on as a string and fail validation.
                let arguments = serde_json::from_str::<Value>(&call.function.arguments)
                    .unwrap_or(Value::String(call.function.arguments));
                ToolCallRequest::new(call.id, call.function.name, arguments)
            })
            .collect();

        debug!("Model returned {} tool call(s)", tool_calls.len());

        Ok(AssistantTurn {
            content: choice.message.content.unwrap_or_default(),
            tool_calls,
        })
    }

    fn name(&self) -> &str {
        &self.model
    }
}

fn tool_definition(descriptor: &ToolDescriptor) -> ChatCompletionTool {
    ChatCompletionTool {
        r#type: ChatCompletionToolType::Function,
        function: FunctionObject {
            name: descriptor.name.clone(),
            description: Some(descriptor.description.clone()),
            parameters: Some(descriptor.input_schema.to_json_schema()),
            strict: None,
        },
    }
}

fn to_request_message(message: &Message) -> Result<ChatCompletionRequestMessage> {
    let build_err = |e: async_openai::error::OpenAIError| AgentError::Model(e.to_string());

    let converted: ChatCompletionRequestMessage = match message.role {
        Role::System => ChatCompletionRequestSystemMessageArgs::default()
            .content(message.content.clone())
            .build()
            .map_err(build_err)?
            .into(),
        Role::User => ChatCompletionRequestUserMessageArgs::default()
            .content(message.content.clone())
            .build()
            .map_err(build_err)?
            .into(),
        Role::Assistant => {
            let mut args = ChatCompletionRequestAssistantMessageArgs::default();
            if !message.content.is_empty() {
                args.content(message.content.clone());
            }
            if message.has_tool_calls() {
                let calls = message
                    .tool_calls
                    .iter()
                    .map(|call| ChatCompletionMessageToolCall {
                        id: call.id.clone(),
                        r#type: ChatCompletionToolType::Function,
                        function: FunctionCall {
                            name: call.tool_name.clone(),
                            arguments: match &call.arguments {
                                Value::String(raw) => raw.clone(),
                                other => other.to_string(),
                            },
                        },
                    })
                    .collect::<Vec<_>>();
                args.tool_calls(calls);
            }
            args.build().map_err(build_err)?.into()
        }
        Role::ToolResult => ChatCompletionRequestToolMessageArgs::default()
            .tool_call_id(message.tool_call_id.clone().unwrap_or_default())
            .content(message.content.clone())
            .build()
            .map_err(build_err)?
            .into(),
    };

    Ok(converted)
}
