use crate::anthropic::AnthropicClient;
use crate::client::LlmClient;
use crate::error::{LlmError, Result};
use crate::openai::OpenAiClient;
use crate::types::Provider;
use std::time::Duration;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// One entry of the ordered credential preference list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderCredentials {
    pub provider: Provider,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

impl ProviderCredentials {
    fn usable_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }
}

/// Builds concrete clients that share one HTTP connection pool and per-call timeout.
#[derive(Clone)]
pub struct ClientFactory {
    http: reqwest::Client,
}

impl ClientFactory {
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn new(timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(%e, "reqwest client build failed; falling back to default client");
                reqwest::Client::new()
            });
        Self { http }
    }

    /// Resolves `provider` by name; unknown names are `UnsupportedProvider`.
    pub fn create(
        &self,
        provider: &str,
        api_key: &str,
        base_url: Option<&str>,
    ) -> Result<LlmClient> {
        let provider: Provider = provider.parse()?;
        self.create_with(provider, api_key, base_url)
    }

    pub fn create_with(
        &self,
        provider: Provider,
        api_key: &str,
        base_url: Option<&str>,
    ) -> Result<LlmClient> {
        if api_key.trim().is_empty() {
            return Err(LlmError::NoCredentials);
        }
        let api_key = api_key.trim();
        let client = match provider {
            Provider::OpenAi => {
                LlmClient::OpenAi(OpenAiClient::new(self.http.clone(), api_key, base_url))
            }
            Provider::Anthropic => {
                LlmClient::Anthropic(AnthropicClient::new(self.http.clone(), api_key, base_url))
            }
        };
        tracing::debug!(%provider, base_url = %client.base_url(), "llm client created");
        Ok(client)
    }

    /// First entry with a non-blank key wins; only that one client is built.
    pub fn create_from_configuration(
        &self,
        credentials: &[ProviderCredentials],
    ) -> Result<LlmClient> {
        for entry in credentials {
            let Some(key) = entry.usable_key() else {
                tracing::debug!(provider = %entry.provider, "no api key; trying next provider");
                continue;
            };
            tracing::info!(provider = %entry.provider, "selected llm provider");
            return self.create_with(entry.provider, key, entry.base_url.as_deref());
        }
        Err(LlmError::NoCredentials)
    }
}

impl Default for ClientFactory {
    fn default() -> Self {
        Self::new(DEFAULT_REQUEST_TIMEOUT)
    }
}
