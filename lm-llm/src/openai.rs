use crate::client::{TextStream, guard_fragments, stream_failure, upstream_failure};
use crate::context::conversation_turns;
use crate::error::{LlmError, Result};
use crate::sse::decode_sse;
use crate::types::{LlmRequest, LlmResponse, Provider, Role, Usage};
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};

pub const OPENAI_DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const OPENAI_DEFAULT_MODEL: &str = "gpt-4";
pub const OPENAI_DEFAULT_MAX_TOKENS: u32 = 4000;

const PROVIDER: Provider = Provider::OpenAi;

/// Chat-completions client: flat role/content turns with an optional leading system turn.
#[derive(Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenAiClient {
    pub fn new(http: reqwest::Client, api_key: &str, base_url: Option<&str>) -> Self {
        let base_url = base_url
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(OPENAI_DEFAULT_BASE_URL)
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

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    async fn send(&self, req: &OpenAiChatRequest) -> Result<reqwest::Response> {
        let response = self
            .http
            .post(self.completions_url())
            .bearer_auth(&self.api_key)
            .json(req)
            .send()
            .await
            .map_err(|e| LlmError::transport(PROVIDER, e))?;

        if !response.status().is_success() {
            return Err(upstream_failure(PROVIDER, response).await);
        }
        Ok(response)
    }

    #[tracing::instrument(level = "info", skip_all, fields(provider = "openai"))]
    pub async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse> {
        let req = OpenAiChatRequest::new(request, false);
        tracing::debug!(model = %req.model, turns = req.messages.len(), "openai generate");

        let response = self.send(&req).await?;
        let body = response
            .text()
            .await
            .map_err(|e| LlmError::transport(PROVIDER, e))?;

        let parsed: OpenAiChatResponse = serde_json::from_str(&body).map_err(|e| {
            LlmError::validation(PROVIDER, format!("undecodable chat completion: {e}"), &body)
        })?;
        parsed.into_response(&req.model, &body)
    }

    #[tracing::instrument(level = "info", skip_all, fields(provider = "openai"))]
    pub async fn stream_generate(&self, request: &LlmRequest) -> Result<TextStream> {
        let req = OpenAiChatRequest::new(request, true);
        tracing::debug!(model = %req.model, turns = req.messages.len(), "openai stream");

        let response = self.send(&req).await?;
        let status = response.status().as_u16();
        let sse = Box::pin(decode_sse(PROVIDER, response.bytes_stream()));

        let fragments = futures_util::stream::unfold(sse, move |mut sse| async move {
            loop {
                let event = match sse.as_mut().next().await? {
                    Ok(v) => v,
                    Err(e) => return Some((Err(e), sse)),
                };
                let data = event.data.trim();
                if data.is_empty() {
                    continue;
                }
                if data == "[DONE]" {
                    return None;
                }

                let chunk: OpenAiStreamChunk = match serde_json::from_str(data) {
                    Ok(v) => v,
                    Err(e) => {
                        return Some((
                            Err(LlmError::validation(
                                PROVIDER,
                                format!("undecodable stream chunk: {e}"),
                                data,
                            )),
                            sse,
                        ));
                    }
                };
                if chunk.error.is_some() {
                    return Some((Err(stream_failure(PROVIDER, status, data)), sse));
                }

                let content = chunk
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|c| c.delta.content)
                    .unwrap_or_default();
                if !content.is_empty() {
                    return Some((Ok(content), sse));
                }
            }
        });

        Ok(guard_fragments(PROVIDER, fragments))
    }
}

#[derive(Debug, Serialize)]
struct OpenAiChatRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Debug, Serialize)]
struct OpenAiMessage {
    role: &'static str,
    content: String,
}

impl OpenAiChatRequest {
    fn new(request: &LlmRequest, stream: bool) -> Self {
        let mut messages = Vec::new();
        if let Some(system) = request.system_prompt() {
            messages.push(OpenAiMessage {
                role: Role::System.as_str(),
                content: system.to_string(),
            });
        }
        messages.extend(conversation_turns(request).into_iter().map(|t| OpenAiMessage {
            role: t.role.as_str(),
            content: t.content,
        }));

        Self {
            model: request.model().unwrap_or(OPENAI_DEFAULT_MODEL).to_string(),
            messages,
            max_tokens: request.max_tokens().unwrap_or(OPENAI_DEFAULT_MAX_TOKENS),
            temperature: request.temperature(),
            stream: stream.then_some(true),
        }
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiChatResponse {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<OpenAiChoice>,
    #[serde(default)]
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: Option<u32>,
}

impl OpenAiChatResponse {
    fn into_response(self, requested_model: &str, raw: &str) -> Result<LlmResponse> {
        let choice = self.choices.into_iter().next().ok_or_else(|| {
            LlmError::validation(PROVIDER, "chat completion has no choices", raw)
        })?;

        let model = self.model.unwrap_or_else(|| requested_model.to_string());
        let mut response =
            LlmResponse::new(PROVIDER, model, choice.message.content.unwrap_or_default(), raw)?;

        if let Some(u) = self.usage {
            response = response.with_usage(Usage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u
                    .total_tokens
                    .unwrap_or(u.prompt_tokens + u.completion_tokens),
            });
        }
        if let Some(reason) = choice.finish_reason {
            response = response.with_metadata("finish_reason", reason);
        }
        if let Some(id) = self.id {
            response = response.with_metadata("id", id);
        }
        Ok(response)
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamChunk {
    #[serde(default)]
    choices: Vec<OpenAiStreamChoice>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamChoice {
    #[serde(default)]
    delta: OpenAiStreamDelta,
}

#[derive(Debug, Default, Deserialize)]
struct OpenAiStreamDelta {
    #[serde(default)]
    content: Option<String>,
}
