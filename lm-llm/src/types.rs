use crate::error::{LlmError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    #[serde(rename = "openai")]
    OpenAi,
    Anthropic,
}

impl Provider {
    pub const ALL: [Provider; 2] = [Provider::OpenAi, Provider::Anthropic];

    pub fn as_str(self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::Anthropic => "anthropic",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = LlmError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Provider::OpenAi),
            "anthropic" => Ok(Provider::Anthropic),
            other => Err(LlmError::UnsupportedProvider(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// Token accounting in the shared vocabulary, whatever the upstream field names were.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Canonical request. Built and validated through [`LlmRequest::builder`].
#[derive(Debug, Clone, Serialize)]
pub struct LlmRequest {
    prompt: String,
    model: Option<String>,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
    provider: Provider,
    system_prompt: Option<String>,
    context: Option<Map<String, Value>>,
}

impl LlmRequest {
    pub fn builder(prompt: impl Into<String>) -> LlmRequestBuilder {
        LlmRequestBuilder {
            prompt: prompt.into(),
            model: None,
            max_tokens: None,
            temperature: None,
            provider: Provider::default(),
            system_prompt: None,
            context: None,
        }
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    pub fn max_tokens(&self) -> Option<u32> {
        self.max_tokens
    }

    pub fn temperature(&self) -> Option<f32> {
        self.temperature
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn system_prompt(&self) -> Option<&str> {
        self.system_prompt.as_deref()
    }

    pub fn context(&self) -> Option<&Map<String, Value>> {
        self.context.as_ref()
    }
}

#[derive(Debug, Clone)]
pub struct LlmRequestBuilder {
    prompt: String,
    model: Option<String>,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
    provider: Provider,
    system_prompt: Option<String>,
    context: Option<Map<String, Value>>,
}

impl LlmRequestBuilder {
    pub fn model(mut self, model: Option<impl Into<String>>) -> Self {
        self.model = model.map(Into::into).filter(|m: &String| !m.trim().is_empty());
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn provider(mut self, provider: Provider) -> Self {
        self.provider = provider;
        self
    }

    pub fn system_prompt(mut self, system_prompt: Option<impl Into<String>>) -> Self {
        self.system_prompt = system_prompt
            .map(Into::into)
            .filter(|s: &String| !s.trim().is_empty());
        self
    }

    pub fn context(mut self, context: Map<String, Value>) -> Self {
        self.context = Some(context);
        self
    }

    pub fn build(self) -> Result<LlmRequest> {
        if self.prompt.trim().is_empty() {
            return Err(LlmError::InvalidInput("prompt must not be empty".to_string()));
        }
        if self.max_tokens == Some(0) {
            return Err(LlmError::InvalidInput("max_tokens must be > 0".to_string()));
        }
        if let Some(t) = self.temperature {
            if !t.is_finite() || !(0.0..=2.0).contains(&t) {
                return Err(LlmError::InvalidInput(format!(
                    "temperature must be within 0.0..=2.0, got {t}"
                )));
            }
        }
        Ok(LlmRequest {
            prompt: self.prompt,
            model: self.model,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            provider: self.provider,
            system_prompt: self.system_prompt,
            context: self.context,
        })
    }
}

/// Canonical response. Content is never empty.
#[derive(Debug, Clone, Serialize)]
pub struct LlmResponse {
    content: String,
    model: String,
    provider: Provider,
    usage: Option<Usage>,
    metadata: Map<String, Value>,
}

impl LlmResponse {
    /// Fails with `Validation` when `content` is blank; `raw` is attached for diagnosis.
    pub fn new(
        provider: Provider,
        model: impl Into<String>,
        content: impl Into<String>,
        raw: &str,
    ) -> Result<Self> {
        let content = content.into();
        if content.trim().is_empty() {
            return Err(LlmError::validation(
                provider,
                "response contained no text content",
                raw,
            ));
        }
        Ok(Self {
            content,
            model: model.into(),
            provider,
            usage: None,
            metadata: Map::new(),
        })
    }

    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = Some(usage);
        self
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn into_content(self) -> String {
        self.content
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn usage(&self) -> Option<&Usage> {
        self.usage.as_ref()
    }

    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_rejects_blank_prompt() {
        let err = LlmRequest::builder("   ").build().expect_err("blank prompt");
        assert!(matches!(err, LlmError::InvalidInput(_)));
    }

    #[test]
    fn builder_rejects_zero_max_tokens_and_wild_temperature() {
        assert!(LlmRequest::builder("hi").max_tokens(0).build().is_err());
        assert!(LlmRequest::builder("hi").temperature(f32::NAN).build().is_err());
        assert!(LlmRequest::builder("hi").temperature(3.5).build().is_err());
    }

    #[test]
    fn builder_drops_blank_optionals() {
        let req = LlmRequest::builder("hi")
            .model(Some(" "))
            .system_prompt(Some(""))
            .build()
            .expect("valid request");
        assert_eq!(req.model(), None);
        assert_eq!(req.system_prompt(), None);
        assert_eq!(req.provider(), Provider::OpenAi);
    }

    #[test]
    fn response_requires_content() {
        let err = LlmResponse::new(Provider::Anthropic, "claude", "  \n", "{\"content\":[]}")
            .expect_err("empty content");
        match err {
            LlmError::Validation { provider, payload, .. } => {
                assert_eq!(provider, Provider::Anthropic);
                assert!(payload.contains("content"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn provider_parses_case_insensitively() {
        assert_eq!("OpenAI".parse::<Provider>().expect("openai"), Provider::OpenAi);
        assert_eq!(
            " anthropic ".parse::<Provider>().expect("anthropic"),
            Provider::Anthropic
        );
        let err = "google".parse::<Provider>().expect_err("unsupported");
        assert!(matches!(err, LlmError::UnsupportedProvider(name) if name == "google"));
    }

    #[test]
    fn provider_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&Provider::OpenAi).expect("serialize"),
            "\"openai\""
        );
    }
}
