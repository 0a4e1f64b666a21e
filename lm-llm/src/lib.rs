//! Provider-agnostic LLM client.
//!
//! One capability (`generate`, `stream_generate`) over the OpenAI chat-completions API and
//! the Anthropic messages API, with a factory that picks the client from explicit
//! credentials. Pure HTTP, no global state.

mod anthropic;
mod client;
mod context;
mod error;
mod factory;
mod openai;
mod sse;
mod types;

pub use anthropic::{
    ANTHROPIC_DEFAULT_BASE_URL, ANTHROPIC_DEFAULT_MAX_TOKENS, ANTHROPIC_DEFAULT_MODEL, AnthropicClient,
};
pub use client::{LlmClient, ProviderClient, TextStream};
pub use context::HISTORY_CONTEXT_KEY;
pub use error::{ApiErrorKind, LlmError, Result};
pub use factory::{ClientFactory, DEFAULT_REQUEST_TIMEOUT, ProviderCredentials};
pub use openai::{
    OPENAI_DEFAULT_BASE_URL, OPENAI_DEFAULT_MAX_TOKENS, OPENAI_DEFAULT_MODEL, OpenAiClient,
};
pub use types::{LlmRequest, LlmRequestBuilder, LlmResponse, Provider, Role, Usage};
