//! Conversational adapter: system prompt, bounded history and streamed turns.

use crate::error::Result as ToolResult;
use crate::history::{DEFAULT_MAX_HISTORY, HistoryMessage, MessageHistory};
use crate::traits::{Tool, ToolSpec, optional_string, require_string};
use async_trait::async_trait;
use futures_util::StreamExt;
use lm_llm::{
    HISTORY_CONTEXT_KEY, LlmError, LlmRequest, ProviderClient, Result, Role, TextStream,
};
use serde_json::{Map, Value, json};
use std::sync::Arc;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant.";

#[derive(Debug, Clone, PartialEq)]
pub struct ChatSettings {
    pub model: Option<String>,
    pub system_prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub stream: bool,
    /// Messages (staged user turn included) sent as context on each turn.
    pub context_window: usize,
    pub max_history: usize,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            model: None,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            temperature: 0.7,
            max_tokens: 4000,
            stream: true,
            context_window: 10,
            max_history: DEFAULT_MAX_HISTORY,
        }
    }
}

#[derive(Clone)]
pub struct ChatBot {
    client: Arc<dyn ProviderClient>,
    settings: ChatSettings,
}

impl ChatBot {
    pub fn new(client: Arc<dyn ProviderClient>, settings: ChatSettings) -> Self {
        Self { client, settings }
    }

    pub fn settings(&self) -> &ChatSettings {
        &self.settings
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.settings.system_prompt = system_prompt.into();
        self
    }

    pub fn session(&self) -> Result<ChatSession> {
        Ok(ChatSession {
            bot: self.clone(),
            history: MessageHistory::new(self.settings.max_history)?,
        })
    }

    /// Single-shot reply; no history is read or written.
    #[tracing::instrument(level = "info", skip_all)]
    pub async fn generate_response(&self, prompt: &str) -> Result<String> {
        let request = self.request(prompt, None)?;
        let response = self.client.generate(&request).await?;
        Ok(response.into_content())
    }

    #[tracing::instrument(level = "info", skip_all)]
    pub async fn stream_response(&self, prompt: &str) -> Result<TextStream> {
        let request = self.request(prompt, None)?;
        self.client.stream_generate(&request).await
    }

    fn request(&self, prompt: &str, context: Option<Map<String, Value>>) -> Result<LlmRequest> {
        let mut builder = LlmRequest::builder(prompt)
            .provider(self.client.provider())
            .model(self.settings.model.as_deref())
            .system_prompt(Some(self.settings.system_prompt.as_str()))
            .temperature(self.settings.temperature)
            .max_tokens(self.settings.max_tokens);
        if let Some(context) = context {
            builder = builder.context(context);
        }
        builder.build()
    }
}

/// One conversation. Turns are sequential; history changes only after a turn succeeds.
pub struct ChatSession {
    bot: ChatBot,
    history: MessageHistory,
}

impl ChatSession {
    pub async fn send_message(&mut self, input: &str) -> Result<String> {
        self.send_message_with(input, |_| {}).await
    }

    /// Sends one turn, forwarding streamed fragments to `on_fragment` as they arrive.
    #[tracing::instrument(level = "info", skip_all, fields(history_len = self.history.len()))]
    pub async fn send_message_with<F>(&mut self, input: &str, mut on_fragment: F) -> Result<String>
    where
        F: FnMut(&str) + Send,
    {
        let input = input.trim();
        if input.is_empty() {
            return Err(LlmError::InvalidInput("message must not be empty".to_string()));
        }

        let staged = HistoryMessage::new(Role::User, input);
        let context = self.window_context(&staged);
        let request = self.bot.request(input, Some(context))?;

        let reply = if self.bot.settings.stream {
            let mut stream = self.bot.client.stream_generate(&request).await?;
            let mut reply = String::new();
            while let Some(fragment) = stream.next().await {
                let fragment = fragment?;
                on_fragment(&fragment);
                reply.push_str(&fragment);
            }
            reply
        } else {
            let response = self.bot.client.generate(&request).await?;
            on_fragment(response.content());
            response.into_content()
        };
        if reply.trim().is_empty() {
            return Err(LlmError::Validation {
                provider: self.bot.client.provider(),
                message: "reply contained no text content".to_string(),
                payload: reply,
            });
        }

        self.history.push(staged);
        self.history.add_message(Role::Assistant, reply.clone());
        tracing::debug!(history_len = self.history.len(), "chat turn committed");
        Ok(reply)
    }

    pub fn history(&self) -> &MessageHistory {
        &self.history
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    fn window_context(&self, staged: &HistoryMessage) -> Map<String, Value> {
        let window = self.bot.settings.context_window;
        let entries: Vec<Value> = self
            .history
            .last(window.saturating_sub(1))
            .chain((window > 0).then_some(staged))
            .map(|m| json!({"role": m.role, "content": m.content, "timestamp": m.timestamp}))
            .collect();
        let mut context = Map::new();
        context.insert(HISTORY_CONTEXT_KEY.to_string(), Value::Array(entries));
        context
    }
}

pub struct ChatTool {
    bot: ChatBot,
}

impl ChatTool {
    pub fn new(bot: ChatBot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl Tool for ChatTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "chat".to_string(),
            description: "Single-shot conversational reply from the configured model.".to_string(),
            parameters_schema: json!({
                "type": "object",
                "additionalProperties": false,
                "properties": {
                    "prompt": { "type": "string" },
                    "system_prompt": { "type": "string" }
                },
                "required": ["prompt"]
            }),
        }
    }

    #[tracing::instrument(level = "info", skip_all)]
    async fn execute(&self, arguments: Value) -> ToolResult<Value> {
        let prompt = require_string(&arguments, "prompt")?;
        let response = match optional_string(&arguments, "system_prompt")? {
            Some(system) => {
                self.bot
                    .clone()
                    .with_system_prompt(system)
                    .generate_response(&prompt)
                    .await?
            }
            None => self.bot.generate_response(&prompt).await?,
        };
        Ok(json!({ "response": response }))
    }
}
