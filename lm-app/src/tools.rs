//! `tools` and `call` commands over the JSON tool surface.

use anyhow::Context;
use lm_tools::Tool;

pub fn describe(tools: &[Box<dyn Tool>]) -> anyhow::Result<String> {
    let mut out = Vec::new();
    for tool in tools {
        let spec = tool.spec();
        out.push(format!(
            "{}: {}\n{}",
            spec.name,
            spec.description,
            serde_json::to_string_pretty(&spec.parameters_schema)?
        ));
    }
    Ok(out.join("\n\n"))
}

pub async fn call(
    tools: &[Box<dyn Tool>],
    name: &str,
    arguments: &str,
) -> anyhow::Result<serde_json::Value> {
    let tool = tools
        .iter()
        .find(|t| t.spec().name == name)
        .ok_or_else(|| {
            let known: Vec<String> = tools.iter().map(|t| t.spec().name).collect();
            anyhow::anyhow!("unknown tool {name:?}; available: {}", known.join(", "))
        })?;
    let arguments: serde_json::Value =
        serde_json::from_str(arguments).context("tool arguments must be a JSON object")?;
    if !arguments.is_object() {
        return Err(anyhow::anyhow!("tool arguments must be a JSON object"));
    }
    Ok(tool.execute(arguments).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::CannedClient;
    use lm_tools::{ToolSettings, builtin_tools};
    use std::sync::Arc;

    fn tools() -> Vec<Box<dyn Tool>> {
        builtin_tools(Arc::new(CannedClient::new("pong")), &ToolSettings::default())
    }

    #[test]
    fn describe_lists_every_tool() {
        let text = describe(&tools()).expect("describe");
        for name in ["chat:", "code_generator:", "text_analyzer:"] {
            assert!(text.contains(name), "missing {name}");
        }
    }

    #[tokio::test]
    async fn call_dispatches_by_name() {
        let out = call(&tools(), "chat", r#"{"prompt": "ping"}"#)
            .await
            .expect("call");
        assert_eq!(out, serde_json::json!({"response": "pong"}));
    }

    #[tokio::test]
    async fn call_rejects_unknown_tools_and_bad_arguments() {
        let tools = tools();
        let err = call(&tools, "weather", "{}").await.err().expect("unknown");
        assert!(err.to_string().contains("available: chat, code_generator, text_analyzer"));
        assert!(call(&tools, "chat", "[1, 2]").await.is_err());
        assert!(call(&tools, "chat", "not json").await.is_err());
    }
}
