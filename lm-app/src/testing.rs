use async_trait::async_trait;
use futures_util::stream;
use lm_llm::{LlmRequest, LlmResponse, Provider, ProviderClient, Result, TextStream};
use std::sync::Mutex;

/// Replies with the same text to every request and remembers the prompts it saw.
pub(crate) struct CannedClient {
    reply: String,
    prompts: Mutex<Vec<String>>,
}

impl CannedClient {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("prompts lock").clone()
    }

    fn record(&self, request: &LlmRequest) {
        self.prompts
            .lock()
            .expect("prompts lock")
            .push(request.prompt().to_string());
    }
}

#[async_trait]
impl ProviderClient for CannedClient {
    fn provider(&self) -> Provider {
        Provider::OpenAi
    }

    async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse> {
        self.record(request);
        LlmResponse::new(Provider::OpenAi, "canned", self.reply.clone(), &self.reply)
    }

    async fn stream_generate(&self, request: &LlmRequest) -> Result<TextStream> {
        self.record(request);
        let fragments: Vec<Result<String>> = self
            .reply
            .split_inclusive(' ')
            .map(|f| Ok(f.to_string()))
            .collect();
        Ok(Box::pin(stream::iter(fragments)))
    }
}
