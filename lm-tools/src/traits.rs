use crate::chat::{ChatBot, ChatSettings, ChatTool};
use crate::code_generator::{CodeGenerator, CodeGeneratorTool};
use crate::error::{Result, ToolError};
use crate::text_analyzer::{TextAnalyzer, TextAnalyzerTool};
use async_trait::async_trait;
use lm_llm::ProviderClient;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters_schema: serde_json::Value,
}

/// JSON-in, JSON-out entry point over one adapter.
#[async_trait]
pub trait Tool: Send + Sync {
    fn spec(&self) -> ToolSpec;
    async fn execute(&self, arguments: serde_json::Value) -> Result<serde_json::Value>;
}

/// Per-adapter models and chat defaults for [`builtin_tools`].
#[derive(Debug, Clone, Default)]
pub struct ToolSettings {
    pub chat: ChatSettings,
    pub code_generator_model: Option<String>,
    pub text_analyzer_model: Option<String>,
}

/// `chat`, `code_generator` and `text_analyzer`, all sharing one client.
pub fn builtin_tools(client: Arc<dyn ProviderClient>, settings: &ToolSettings) -> Vec<Box<dyn Tool>> {
    vec![
        Box::new(ChatTool::new(ChatBot::new(
            client.clone(),
            settings.chat.clone(),
        ))),
        Box::new(CodeGeneratorTool::new(CodeGenerator::new(
            client.clone(),
            settings.code_generator_model.clone(),
        ))),
        Box::new(TextAnalyzerTool::new(TextAnalyzer::new(
            client,
            settings.text_analyzer_model.clone(),
        ))),
    ]
}

pub(crate) fn require_string(args: &serde_json::Value, key: &str) -> Result<String> {
    let Some(v) = args.get(key) else {
        return Err(ToolError::InvalidArguments(format!("missing key: {key}")));
    };
    match v {
        serde_json::Value::String(s) if !s.trim().is_empty() => Ok(s.clone()),
        serde_json::Value::String(_) => Err(ToolError::InvalidArguments(format!(
            "key {key} must not be blank"
        ))),
        other => Err(ToolError::InvalidArguments(format!(
            "key {key} must be string, got {other:?}"
        ))),
    }
}

pub(crate) fn optional_string(args: &serde_json::Value, key: &str) -> Result<Option<String>> {
    let Some(v) = args.get(key) else {
        return Ok(None);
    };
    match v {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::String(s) if s.trim().is_empty() => Ok(None),
        serde_json::Value::String(s) => Ok(Some(s.clone())),
        other => Err(ToolError::InvalidArguments(format!(
            "key {key} must be string, got {other:?}"
        ))),
    }
}

pub(crate) fn optional_bool(args: &serde_json::Value, key: &str, default: bool) -> Result<bool> {
    match args.get(key) {
        None | Some(serde_json::Value::Null) => Ok(default),
        Some(serde_json::Value::Bool(b)) => Ok(*b),
        Some(other) => Err(ToolError::InvalidArguments(format!(
            "key {key} must be boolean, got {other:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedClient;
    use serde_json::json;

    #[test]
    fn builtin_tool_names() {
        let client = Arc::new(ScriptedClient::replying("ok"));
        let names: Vec<String> = builtin_tools(client, &ToolSettings::default())
            .iter()
            .map(|t| t.spec().name)
            .collect();
        assert_eq!(names, vec!["chat", "code_generator", "text_analyzer"]);
    }

    #[test]
    fn argument_helpers() {
        let args = json!({"a": "x", "blank": "  ", "n": 3, "flag": false});
        assert_eq!(require_string(&args, "a").expect("a"), "x");
        assert!(matches!(
            require_string(&args, "blank"),
            Err(ToolError::InvalidArguments(_))
        ));
        assert!(matches!(
            require_string(&args, "missing"),
            Err(ToolError::InvalidArguments(_))
        ));
        assert_eq!(optional_string(&args, "blank").expect("blank"), None);
        assert!(optional_string(&args, "n").is_err());
        assert!(!optional_bool(&args, "flag", true).expect("flag"));
        assert!(optional_bool(&args, "missing", true).expect("default"));
        assert!(optional_bool(&args, "a", true).is_err());
    }
}
