use crate::client::{TextStream, guard_fragments, stream_failure, upstream_failure};
use crate::context::{Turn, conversation_turns};
use crate::error::{LlmError, Result};
use crate::sse::decode_sse;
use crate::types::{LlmRequest, LlmResponse, Provider, Role, Usage};
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};

pub const ANTHROPIC_DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
pub const ANTHROPIC_DEFAULT_MODEL: &str = "claude-3-sonnet-20240229";
pub const ANTHROPIC_DEFAULT_MAX_TOKENS: u32 = 4000;
const ANTHROPIC_VERSION: &str = "2023-06-01";

const PROVIDER: Provider = Provider::Anthropic;

/// Messages-API client: `system` travels separately from the user/assistant turns.
#[derive(Clone)]
pub struct AnthropicClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl AnthropicClient {
    pub fn new(http: reqwest::Client, api_key: &str, base_url: Option<&str>) -> Self {
        let base_url = base_url
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(ANTHROPIC_DEFAULT_BASE_URL)
            .trim_end_matches('/')
            .to_string();
        Self {
            http,
            api_key: api_key.to_string(),
            base_url,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.base_url)
    }

    async fn send(&self, req: &AnthropicRequest) -> Result<reqwest::Response> {
        let response = self
            .http
            .post(self.messages_url())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(req)
            .send()
            .await
            .map_err(|e| LlmError::transport(PROVIDER, e))?;

        if !response.status().is_success() {
            return Err(upstream_failure(PROVIDER, response).await);
        }
        Ok(response)
    }

    #[tracing::instrument(level = "info", skip_all, fields(provider = "anthropic"))]
    pub async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse> {
        let req = AnthropicRequest::new(request, false);
        tracing::debug!(model = %req.model, turns = req.messages.len(), "anthropic generate");

        let response = self.send(&req).await?;
        let body = response
            .text()
            .await
            .map_err(|e| LlmError::transport(PROVIDER, e))?;

        let parsed: AnthropicResponse = serde_json::from_str(&body).map_err(|e| {
            LlmError::validation(PROVIDER, format!("undecodable message: {e}"), &body)
        })?;
        parsed.into_response(&req.model, &body)
    }

    #[tracing::instrument(level = "info", skip_all, fields(provider = "anthropic"))]
    pub async fn stream_generate(&self, request: &LlmRequest) -> Result<TextStream> {
        let req = AnthropicRequest::new(request, true);
        tracing::debug!(model = %req.model, turns = req.messages.len(), "anthropic stream");

        let response = self.send(&req).await?;
        let status = response.status().as_u16();
        let sse = Box::pin(decode_sse(PROVIDER, response.bytes_stream()));

        let fragments = futures_util::stream::unfold(sse, move |mut sse| async move {
            loop {
                let event = match sse.as_mut().next().await? {
                    Ok(v) => v,
                    Err(e) => return Some((Err(e), sse)),
                };

                match event.event.as_str() {
                    "content_block_delta" => {
                        let v: AnthropicContentBlockDelta = match serde_json::from_str(&event.data)
                        {
                            Ok(v) => v,
                            Err(e) => {
                                return Some((
                                    Err(LlmError::validation(
                                        PROVIDER,
                                        format!("undecodable delta: {e}"),
                                        &event.data,
                                    )),
                                    sse,
                                ));
                            }
                        };
                        if let AnthropicDelta::TextDelta { text } = v.delta {
                            if !text.is_empty() {
                                return Some((Ok(text), sse));
                            }
                        }
                    }
                    "message_stop" => return None,
                    "error" => {
                        return Some((Err(stream_failure(PROVIDER, status, &event.data)), sse));
                    }
                    _ => {}
                }
            }
        });

        Ok(guard_fragments(PROVIDER, fragments))
    }
}

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: &'static str,
    content: String,
}

impl AnthropicRequest {
    fn new(request: &LlmRequest, stream: bool) -> Self {
        let mut system = request.system_prompt().unwrap_or_default().trim().to_string();
        let mut messages: Vec<AnthropicMessage> = Vec::new();

        for Turn { role, content } in conversation_turns(request) {
            if role == Role::System {
                if !system.is_empty() {
                    system.push('\n');
                }
                system.push_str(content.trim());
                continue;
            }
            // The messages API wants a user turn first and strictly alternating roles.
            if messages.is_empty() && role != Role::User {
                continue;
            }
            match messages.last_mut() {
                Some(last) if last.role == role.as_str() => {
                    last.content.push_str("\n\n");
                    last.content.push_str(&content);
                }
                _ => messages.push(AnthropicMessage {
                    role: role.as_str(),
                    content,
                }),
            }
        }

        Self {
            model: request
                .model()
                .unwrap_or(ANTHROPIC_DEFAULT_MODEL)
                .to_string(),
            max_tokens: request.max_tokens().unwrap_or(ANTHROPIC_DEFAULT_MAX_TOKENS),
            system: Some(system).filter(|s| !s.is_empty()),
            messages,
            temperature: request.temperature(),
            stream: stream.then_some(true),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    content: Vec<AnthropicContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: Option<AnthropicUsage>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicContentBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Default, Deserialize)]
struct AnthropicUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

impl AnthropicResponse {
    fn into_response(self, requested_model: &str, raw: &str) -> Result<LlmResponse> {
        let content: String = self
            .content
            .into_iter()
            .filter_map(|block| match block {
                AnthropicContentBlock::Text { text } => Some(text),
                AnthropicContentBlock::Other => None,
            })
            .collect();

        let model = self.model.unwrap_or_else(|| requested_model.to_string());
        let mut response = LlmResponse::new(PROVIDER, model, content, raw)?;

        if let Some(u) = self.usage {
            response = response.with_usage(Usage {
                prompt_tokens: u.input_tokens,
                completion_tokens: u.output_tokens,
                total_tokens: u.input_tokens + u.output_tokens,
            });
        }
        if let Some(reason) = self.stop_reason {
            response = response.with_metadata("stop_reason", reason);
        }
        if let Some(id) = self.id {
            response = response.with_metadata("id", id);
        }
        Ok(response)
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicContentBlockDelta {
    delta: AnthropicDelta,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicDelta {
    TextDelta {
        text: String,
    },
    #[serde(other)]
    Other,
}
