use async_trait::async_trait;
use futures_util::stream;
use lm_llm::{
    ApiErrorKind, LlmError, LlmRequest, LlmResponse, Provider, ProviderClient, Result, TextStream,
};
use std::sync::Mutex;

type Responder = Box<dyn Fn(&LlmRequest) -> Result<String> + Send + Sync>;

/// Deterministic in-process backend. Streams split the scripted reply on spaces.
pub(crate) struct ScriptedClient {
    responder: Responder,
    break_stream: bool,
    requests: Mutex<Vec<LlmRequest>>,
}

impl ScriptedClient {
    pub fn new(responder: impl Fn(&LlmRequest) -> Result<String> + Send + Sync + 'static) -> Self {
        Self {
            responder: Box::new(responder),
            break_stream: false,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn replying(reply: &str) -> Self {
        let reply = reply.to_string();
        Self::new(move |_| Ok(reply.clone()))
    }

    pub fn failing(status: u16) -> Self {
        Self::new(move |_| Err(upstream(status)))
    }

    /// Streams yield the first fragment, then a transport error.
    pub fn breaking_stream(reply: &str) -> Self {
        let mut client = Self::replying(reply);
        client.break_stream = true;
        client
    }

    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().expect("requests lock").clone()
    }

    fn answer(&self, request: &LlmRequest) -> Result<String> {
        self.requests
            .lock()
            .expect("requests lock")
            .push(request.clone());
        (self.responder)(request)
    }
}

pub(crate) fn upstream(status: u16) -> LlmError {
    LlmError::Upstream {
        provider: Provider::OpenAi,
        status,
        kind: ApiErrorKind::from_status(status),
        message: "scripted failure".to_string(),
    }
}

#[async_trait]
impl ProviderClient for ScriptedClient {
    fn provider(&self) -> Provider {
        Provider::OpenAi
    }

    async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse> {
        let content = self.answer(request)?;
        LlmResponse::new(
            Provider::OpenAi,
            request.model().unwrap_or("scripted"),
            content.clone(),
            &content,
        )
    }

    async fn stream_generate(&self, request: &LlmRequest) -> Result<TextStream> {
        let content = self.answer(request)?;
        let mut fragments: Vec<Result<String>> = content
            .split_inclusive(' ')
            .map(|f| Ok(f.to_string()))
            .collect();
        if self.break_stream {
            fragments.truncate(1);
            fragments.push(Err(LlmError::Transport {
                provider: Provider::OpenAi,
                message: "connection reset".to_string(),
                timed_out: false,
            }));
        }
        Ok(Box::pin(stream::iter(fragments)))
    }
}
