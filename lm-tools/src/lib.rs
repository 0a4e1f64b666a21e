//! Adapters that turn canonical LLM calls into use-case operations.
//!
//! Chat with bounded history, code generation with fenced-block extraction, and a
//! concurrent text-analysis fan-out. Each adapter is also exposed as a JSON [`Tool`].
//! None of them does networking of its own; they all sit on a [`lm_llm::ProviderClient`].

mod chat;
mod code_generator;
mod error;
mod history;
mod text_analyzer;
mod traits;

#[cfg(test)]
mod testing;

pub use chat::{ChatBot, ChatSession, ChatSettings, ChatTool, DEFAULT_SYSTEM_PROMPT};
pub use code_generator::{
    CodeGenerationRequest, CodeGenerator, CodeGeneratorTool, DetailLevel, detect_language,
    extract_code,
};
pub use error::{Result, ToolError};
pub use history::{DEFAULT_MAX_HISTORY, HistoryMessage, MessageHistory};
pub use text_analyzer::{
    AnalysisOptions, AnalysisResult, SentimentReport, TextAnalyzer, TextAnalyzerTool, clean_text,
};
pub use traits::{Tool, ToolSettings, ToolSpec, builtin_tools};
