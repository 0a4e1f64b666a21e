//! Wires one provider client and the adapters built on it from the loaded config.

use crate::config::AppConfig;
use anyhow::Context;
use lm_llm::{ClientFactory, Provider, ProviderClient};
use lm_tools::{ChatBot, ChatSettings, CodeGenerator, TextAnalyzer, ToolSettings};
use std::path::Path;
use std::sync::Arc;

/// Command-line selections that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub provider: Option<Provider>,
    pub model: Option<String>,
}

pub struct Runtime {
    config: AppConfig,
    client: Arc<dyn ProviderClient>,
    model_override: Option<String>,
}

impl Runtime {
    pub fn connect(config: AppConfig, overrides: Overrides) -> anyhow::Result<Self> {
        let credentials = match overrides.provider {
            Some(provider) => vec![config.credentials_for(provider)],
            None => config.credentials(),
        };
        let factory = ClientFactory::new(config.request_timeout());
        let client = factory
            .create_from_configuration(&credentials)
            .context("no usable provider; set OPENAI_API_KEY or ANTHROPIC_API_KEY")?;
        Ok(Self::with_client(config, Arc::new(client), overrides.model))
    }

    pub fn with_client(
        config: AppConfig,
        client: Arc<dyn ProviderClient>,
        model_override: Option<String>,
    ) -> Self {
        Self {
            config,
            client,
            model_override: model_override.filter(|m| !m.trim().is_empty()),
        }
    }

    pub fn provider(&self) -> Provider {
        self.client.provider()
    }

    fn model_for(&self, module: &str) -> Option<String> {
        self.model_override
            .clone()
            .or_else(|| self.config.module_config(module).model)
    }

    pub fn chat_settings(&self) -> ChatSettings {
        let module = self.config.module_config("chat_bot");
        let chat = &self.config.chat;
        ChatSettings {
            model: self.model_for("chat_bot"),
            system_prompt: chat.system_prompt.clone(),
            temperature: module.temperature,
            max_tokens: module.max_tokens,
            stream: chat.stream,
            context_window: chat.context_window,
            max_history: chat.max_history,
        }
    }

    pub fn chat_bot(&self, settings: ChatSettings) -> ChatBot {
        ChatBot::new(self.client.clone(), settings)
    }

    pub fn code_generator(&self) -> CodeGenerator {
        CodeGenerator::new(self.client.clone(), self.model_for("code_generator"))
    }

    pub fn text_analyzer(&self) -> TextAnalyzer {
        let module = self.config.module_config("text_analyzer");
        TextAnalyzer::new(self.client.clone(), self.model_for("text_analyzer"))
            .with_temperature(module.temperature)
    }

    pub fn tool_settings(&self) -> ToolSettings {
        ToolSettings {
            chat: self.chat_settings(),
            code_generator_model: self.model_for("code_generator"),
            text_analyzer_model: self.model_for("text_analyzer"),
        }
    }

    pub fn client(&self) -> Arc<dyn ProviderClient> {
        self.client.clone()
    }
}

/// Human-readable summary for `llm-modules doctor`.
pub fn doctor_report(config: &AppConfig, source: Option<&Path>) -> String {
    let mut lines = vec![match source {
        Some(path) => format!("config: {}", path.display()),
        None => "config: built-in defaults (no config file found)".to_string(),
    }];

    let preference: Vec<&str> = config
        .llm
        .provider_preference
        .iter()
        .map(|p| p.as_str())
        .collect();
    lines.push(format!("provider preference: {}", preference.join(", ")));
    for provider in Provider::ALL {
        let status = if config.has_key(provider) {
            "api key configured"
        } else {
            "no api key"
        };
        lines.push(format!("  {provider}: {status}"));
    }

    let selected = config
        .llm
        .provider_preference
        .iter()
        .find(|p| config.has_key(**p));
    lines.push(match selected {
        Some(provider) => format!("selected provider: {provider}"),
        None => "selected provider: none (set OPENAI_API_KEY or ANTHROPIC_API_KEY)".to_string(),
    });

    for module in ["chat_bot", "text_analyzer", "code_generator"] {
        let module_cfg = config.module_config(module);
        lines.push(format!(
            "{module}: model={} temperature={} max_tokens={}",
            module_cfg.model.as_deref().unwrap_or("provider default"),
            module_cfg.temperature,
            module_cfg.max_tokens
        ));
    }
    lines.push(format!(
        "request timeout: {}s",
        config.llm.request_timeout_secs
    ));
    lines.join("\n")
}
