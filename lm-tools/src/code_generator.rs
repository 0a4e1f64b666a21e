//! Code generation adapter.
//!
//! Every operation builds a deterministic prompt, issues one low-temperature `generate`
//! call and, for code-producing operations, pulls the code out of the first matching
//! fenced block.

use crate::error::{Result as ToolResult, ToolError};
use crate::traits::{Tool, ToolSpec, optional_bool, optional_string, require_string};
use async_trait::async_trait;
use lm_llm::{LlmError, LlmRequest, ProviderClient, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, LazyLock};

const CODE_TEMPERATURE: f32 = 0.1;
const PROSE_TEMPERATURE: f32 = 0.3;
const CODE_MAX_TOKENS: u32 = 4000;
const TESTS_MAX_TOKENS: u32 = 3000;
const PROSE_MAX_TOKENS: u32 = 2000;

const FENCED_BLOCK_PATTERN: &str = r"(?s)```[ \t]*([\w+#.-]*)[^\n]*\n(.*?)```";

static FENCED_BLOCK: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(FENCED_BLOCK_PATTERN).ok());

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeGenerationRequest {
    pub description: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub framework: Option<String>,
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default)]
    pub include_tests: bool,
    #[serde(default = "default_true")]
    pub include_docs: bool,
}

fn default_language() -> String {
    "python".to_string()
}

fn default_true() -> bool {
    true
}

impl CodeGenerationRequest {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            language: default_language(),
            framework: None,
            style: None,
            include_tests: false,
            include_docs: true,
        }
    }

    /// Deterministic prompt text for this request.
    pub fn prompt(&self) -> String {
        let mut parts = vec![
            format!("Generate {} code for the following description:", self.language),
            format!("Description: {}", self.description),
        ];
        if let Some(framework) = self.framework.as_deref() {
            parts.push(format!("Framework: {framework}"));
        }
        if let Some(style) = self.style.as_deref() {
            parts.push(format!("Code style: {style}"));
        }
        if self.include_tests {
            parts.push("Include comprehensive unit tests.".to_string());
        }
        if self.include_docs {
            parts.push("Include detailed documentation and docstrings.".to_string());
        }
        parts.extend(
            [
                "",
                "Requirements:",
                "- Write clean, well-documented code",
                "- Follow best practices for the language",
                "- Include error handling where appropriate",
                "- Use meaningful variable and function names",
            ]
            .map(str::to_string),
        );
        if self.language.eq_ignore_ascii_case("python") {
            parts.push("- Follow PEP 8 style guidelines".to_string());
            parts.push("- Use type hints where appropriate".to_string());
        }
        parts.join("\n")
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetailLevel {
    Low,
    #[default]
    Medium,
    High,
}

impl DetailLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            DetailLevel::Low => "low",
            DetailLevel::Medium => "medium",
            DetailLevel::High => "high",
        }
    }

    fn instruction(self) -> &'static str {
        match self {
            DetailLevel::Low => "Provide a brief overview of what this code does.",
            DetailLevel::Medium => "Explain the code structure, main functions, and key logic.",
            DetailLevel::High => {
                "Provide a detailed explanation including algorithms, data structures, and design patterns used."
            }
        }
    }
}

impl fmt::Display for DetailLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DetailLevel {
    type Err = LlmError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(DetailLevel::Low),
            "medium" => Ok(DetailLevel::Medium),
            "high" => Ok(DetailLevel::High),
            other => Err(LlmError::InvalidInput(format!(
                "detail level must be low, medium or high, got {other:?}"
            ))),
        }
    }
}

#[derive(Clone)]
pub struct CodeGenerator {
    client: Arc<dyn ProviderClient>,
    model: Option<String>,
}

impl CodeGenerator {
    pub fn new(client: Arc<dyn ProviderClient>, model: Option<String>) -> Self {
        Self { client, model }
    }

    #[tracing::instrument(level = "info", skip_all, fields(language = %request.language))]
    pub async fn generate_code(&self, request: &CodeGenerationRequest) -> Result<String> {
        if request.description.trim().is_empty() {
            return Err(LlmError::InvalidInput(
                "description must not be empty".to_string(),
            ));
        }
        let reply = self
            .complete(request.prompt(), CODE_TEMPERATURE, CODE_MAX_TOKENS)
            .await?;
        Ok(extract_code(&reply, &request.language))
    }

    #[tracing::instrument(level = "info", skip_all)]
    pub async fn refactor_code(&self, code: &str, instructions: &str) -> Result<String> {
        let language = detect_language(code);
        let prompt = format!(
            "Refactor the following {language} code according to these instructions:\n\
             {instructions}\n\n\
             Original code:\n```{language}\n{code}\n```\n\n\
             Provide the refactored code with explanations of changes made."
        );
        let reply = self
            .complete(prompt, CODE_TEMPERATURE, CODE_MAX_TOKENS)
            .await?;
        Ok(extract_code(&reply, language))
    }

    /// Returns the model's prose unmodified.
    #[tracing::instrument(level = "info", skip_all, fields(detail = %detail))]
    pub async fn explain_code(&self, code: &str, detail: DetailLevel) -> Result<String> {
        let language = detect_language(code);
        let prompt = format!(
            "{}\n\nCode to explain:\n```{language}\n{code}\n```\n\n\
             Provide a clear, structured explanation.",
            detail.instruction()
        );
        self.complete(prompt, PROSE_TEMPERATURE, PROSE_MAX_TOKENS)
            .await
    }

    #[tracing::instrument(level = "info", skip_all, fields(language = %language))]
    pub async fn generate_tests(&self, code: &str, language: &str) -> Result<String> {
        let prompt = format!(
            "Generate comprehensive unit tests for the following {language} code:\n\n\
             ```{language}\n{code}\n```\n\n\
             Include:\n\
             - Test cases for all functions/methods\n\
             - Edge cases and error conditions\n\
             - Mock objects where appropriate\n\
             - Clear test descriptions"
        );
        let reply = self
            .complete(prompt, CODE_TEMPERATURE, TESTS_MAX_TOKENS)
            .await?;
        Ok(extract_code(&reply, language))
    }

    #[tracing::instrument(level = "info", skip_all, fields(language = %language))]
    pub async fn generate_documentation(&self, code: &str, language: &str) -> Result<String> {
        let prompt = format!(
            "Generate comprehensive documentation for the following {language} code:\n\n\
             ```{language}\n{code}\n```\n\n\
             Include:\n\
             - Overview of functionality\n\
             - API documentation for all functions/classes\n\
             - Usage examples\n\
             - Parameter descriptions\n\
             - Return value descriptions"
        );
        self.complete(prompt, PROSE_TEMPERATURE, PROSE_MAX_TOKENS)
            .await
    }

    async fn complete(&self, prompt: String, temperature: f32, max_tokens: u32) -> Result<String> {
        let request = LlmRequest::builder(prompt)
            .provider(self.client.provider())
            .model(self.model.as_deref())
            .temperature(temperature)
            .max_tokens(max_tokens)
            .build()?;
        let response = self.client.generate(&request).await?;
        tracing::debug!(model = %response.model(), "code generator call completed");
        Ok(response.into_content())
    }
}

/// First fenced block tagged `language`, else the first fenced block, else the trimmed text.
pub fn extract_code(response: &str, language: &str) -> String {
    let Some(fenced_block) = FENCED_BLOCK.as_ref() else {
        return response.trim().to_string();
    };
    let mut first_any = None;
    for caps in fenced_block.captures_iter(response) {
        let tag = caps.get(1).map_or("", |m| m.as_str());
        let body = caps.get(2).map_or("", |m| m.as_str());
        if !language.is_empty() && tag.eq_ignore_ascii_case(language) {
            return body.trim().to_string();
        }
        first_any.get_or_insert(body);
    }
    first_any.unwrap_or(response).trim().to_string()
}

/// Keyword heuristic; anything unrecognised is treated as python.
pub fn detect_language(code: &str) -> &'static str {
    if code.contains("def ") && code.contains("import ") {
        "python"
    } else if code.contains("function ") && code.contains('{') {
        "javascript"
    } else if code.contains("class ") && code.contains("public ") {
        "java"
    } else if code.contains("#include") {
        "cpp"
    } else {
        "python"
    }
}

pub struct CodeGeneratorTool {
    generator: CodeGenerator,
}

impl CodeGeneratorTool {
    pub fn new(generator: CodeGenerator) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl Tool for CodeGeneratorTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "code_generator".to_string(),
            description: "Generate, refactor, explain, test or document source code.".to_string(),
            parameters_schema: json!({
                "type": "object",
                "additionalProperties": false,
                "properties": {
                    "action": {
                        "type": "string",
                        "enum": ["generate", "refactor", "explain", "tests", "docs"]
                    },
                    "description": { "type": "string" },
                    "language": { "type": "string" },
                    "framework": { "type": "string" },
                    "style": { "type": "string" },
                    "include_tests": { "type": "boolean" },
                    "include_docs": { "type": "boolean" },
                    "code": { "type": "string" },
                    "instructions": { "type": "string" },
                    "detail": { "type": "string", "enum": ["low", "medium", "high"] }
                },
                "required": ["action"]
            }),
        }
    }

    #[tracing::instrument(level = "info", skip_all)]
    async fn execute(&self, arguments: Value) -> ToolResult<Value> {
        let action = require_string(&arguments, "action")?;
        let language = optional_string(&arguments, "language")?;

        match action.as_str() {
            "generate" => {
                let request = CodeGenerationRequest {
                    description: require_string(&arguments, "description")?,
                    language: language.unwrap_or_else(default_language),
                    framework: optional_string(&arguments, "framework")?,
                    style: optional_string(&arguments, "style")?,
                    include_tests: optional_bool(&arguments, "include_tests", false)?,
                    include_docs: optional_bool(&arguments, "include_docs", true)?,
                };
                let code = self.generator.generate_code(&request).await?;
                Ok(json!({ "code": code, "language": request.language }))
            }
            "refactor" => {
                let code = require_string(&arguments, "code")?;
                let instructions = require_string(&arguments, "instructions")?;
                let code = self.generator.refactor_code(&code, &instructions).await?;
                Ok(json!({ "code": code }))
            }
            "explain" => {
                let code = require_string(&arguments, "code")?;
                let detail = match optional_string(&arguments, "detail")? {
                    Some(d) => d
                        .parse::<DetailLevel>()
                        .map_err(|e| ToolError::InvalidArguments(e.to_string()))?,
                    None => DetailLevel::default(),
                };
                let explanation = self.generator.explain_code(&code, detail).await?;
                Ok(json!({ "explanation": explanation }))
            }
            "tests" => {
                let code = require_string(&arguments, "code")?;
                let language = language.unwrap_or_else(|| detect_language(&code).to_string());
                let tests = self.generator.generate_tests(&code, &language).await?;
                Ok(json!({ "code": tests, "language": language }))
            }
            "docs" => {
                let code = require_string(&arguments, "code")?;
                let language = language.unwrap_or_else(|| detect_language(&code).to_string());
                let docs = self
                    .generator
                    .generate_documentation(&code, &language)
                    .await?;
                Ok(json!({ "documentation": docs }))
            }
            other => Err(ToolError::InvalidArguments(format!(
                "unknown action: {other}"
            ))),
        }
    }
}
