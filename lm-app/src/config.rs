//! `llm-modules` configuration loader.
//!
//! Precedence: built-in defaults, then the TOML file, then environment variables.

use anyhow::Context;
use lm_llm::{DEFAULT_REQUEST_TIMEOUT, Provider, ProviderCredentials};
use lm_tools::{DEFAULT_MAX_HISTORY, DEFAULT_SYSTEM_PROMPT};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const UNKNOWN_MODULE_MODEL: &str = "gpt-4";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub keys: KeysConfig,
    pub models: ModelsConfig,
    pub chat: ChatConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Providers tried in order; the first one with a key is used.
    pub provider_preference: Vec<Provider>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub request_timeout_secs: u64,
    pub openai_base_url: Option<String>,
    pub anthropic_base_url: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider_preference: Provider::ALL.to_vec(),
            max_tokens: 4000,
            temperature: 0.7,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT.as_secs(),
            openai_base_url: None,
            anthropic_base_url: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeysConfig {
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
}

/// Per-module model names. Unset means the selected provider's default model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    pub chat_bot: Option<String>,
    pub text_analyzer: Option<String>,
    pub code_generator: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub system_prompt: String,
    pub stream: bool,
    pub context_window: usize,
    pub max_history: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            stream: true,
            context_window: 10,
            max_history: DEFAULT_MAX_HISTORY,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModuleConfig {
    pub model: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl AppConfig {
    /// Loads `path`, or the default location when it exists, or built-in defaults.
    pub async fn load_with_path(path: Option<PathBuf>) -> anyhow::Result<(Self, Option<PathBuf>)> {
        Self::load_with_env(path, |key| std::env::var(key).ok()).await
    }

    /// Same as `load_with_path`, with environment overrides read through `lookup`.
    pub async fn load_with_env(
        path: Option<PathBuf>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> anyhow::Result<(Self, Option<PathBuf>)> {
        let (path, required) = match path {
            Some(p) => (p, true),
            None => (default_config_path(), false),
        };

        let from_file = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => Some(Self::from_toml_str(&contents).with_context(|| {
                format!("parse config {}", path.display())
            })?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !required => None,
            Err(e) => return Err(anyhow::anyhow!("read config {}: {e}", path.display())),
        };
        let source = from_file.as_ref().map(|_| path.clone());

        let mut cfg = from_file.unwrap_or_default();
        cfg.apply_env_overrides(lookup)?;
        cfg.validate()?;
        Ok((cfg, source))
    }

    pub fn from_toml_str(contents: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub fn apply_env_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> anyhow::Result<()> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = var("OPENAI_API_KEY") {
            self.keys.openai_api_key = Some(v);
        }
        if let Some(v) = var("ANTHROPIC_API_KEY") {
            self.keys.anthropic_api_key = Some(v);
        }
        if let Some(v) = var("OPENAI_BASE_URL") {
            self.llm.openai_base_url = Some(v);
        }
        if let Some(v) = var("ANTHROPIC_BASE_URL") {
            self.llm.anthropic_base_url = Some(v);
        }
        if let Some(v) = var("LLM_PROVIDER_PREFERENCE") {
            self.llm.provider_preference = v
                .split(',')
                .filter(|name| !name.trim().is_empty())
                .map(str::parse::<Provider>)
                .collect::<Result<Vec<_>, _>>()
                .context("LLM_PROVIDER_PREFERENCE")?;
        }
        if let Some(v) = var("MAX_TOKENS") {
            self.llm.max_tokens = v
                .trim()
                .parse()
                .with_context(|| format!("MAX_TOKENS={v:?} is not a positive integer"))?;
        }
        if let Some(v) = var("TEMPERATURE") {
            self.llm.temperature = v
                .trim()
                .parse()
                .with_context(|| format!("TEMPERATURE={v:?} is not a number"))?;
        }
        if let Some(v) = var("LLM_REQUEST_TIMEOUT_SECS") {
            self.llm.request_timeout_secs = v.trim().parse().with_context(|| {
                format!("LLM_REQUEST_TIMEOUT_SECS={v:?} is not a positive integer")
            })?;
        }
        if let Some(v) = var("CHAT_BOT_MODEL") {
            self.models.chat_bot = Some(v);
        }
        if let Some(v) = var("TEXT_ANALYZER_MODEL") {
            self.models.text_analyzer = Some(v);
        }
        if let Some(v) = var("CODE_GENERATOR_MODEL") {
            self.models.code_generator = Some(v);
        }
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.llm.provider_preference.is_empty() {
            return Err(anyhow::anyhow!(
                "llm.provider_preference must name at least one provider"
            ));
        }
        if self.llm.max_tokens == 0 {
            return Err(anyhow::anyhow!("llm.max_tokens must be > 0"));
        }
        let t = self.llm.temperature;
        if !t.is_finite() || !(0.0..=2.0).contains(&t) {
            return Err(anyhow::anyhow!(
                "llm.temperature must be within 0.0..=2.0, got {t}"
            ));
        }
        if self.llm.request_timeout_secs == 0 {
            return Err(anyhow::anyhow!("llm.request_timeout_secs must be > 0"));
        }
        if self.chat.max_history == 0 {
            return Err(anyhow::anyhow!("chat.max_history must be > 0"));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.llm.request_timeout_secs)
    }

    /// Credential list in preference order, for `ClientFactory::create_from_configuration`.
    pub fn credentials(&self) -> Vec<ProviderCredentials> {
        self.llm
            .provider_preference
            .iter()
            .map(|&provider| self.credentials_for(provider))
            .collect()
    }

    pub fn credentials_for(&self, provider: Provider) -> ProviderCredentials {
        let (api_key, base_url) = match provider {
            Provider::OpenAi => (&self.keys.openai_api_key, &self.llm.openai_base_url),
            Provider::Anthropic => (&self.keys.anthropic_api_key, &self.llm.anthropic_base_url),
        };
        ProviderCredentials {
            provider,
            api_key: api_key.clone(),
            base_url: base_url.clone(),
        }
    }

    pub fn has_key(&self, provider: Provider) -> bool {
        let key = match provider {
            Provider::OpenAi => &self.keys.openai_api_key,
            Provider::Anthropic => &self.keys.anthropic_api_key,
        };
        key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }

    pub fn module_config(&self, module: &str) -> ModuleConfig {
        let (model, temperature) = match module {
            "chat_bot" => (self.models.chat_bot.clone(), self.llm.temperature),
            "text_analyzer" => (self.models.text_analyzer.clone(), 0.3),
            "code_generator" => (self.models.code_generator.clone(), 0.1),
            _ => (Some(UNKNOWN_MODULE_MODEL.to_string()), self.llm.temperature),
        };
        ModuleConfig {
            model,
            max_tokens: self.llm.max_tokens,
            temperature,
        }
    }
}

pub fn default_config_path() -> PathBuf {
    config_root().join("config.toml")
}

pub fn config_root() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    Path::new(&home).join(".llm-modules")
}
