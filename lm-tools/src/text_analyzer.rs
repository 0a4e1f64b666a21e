//! Text analysis fan-out.
//!
//! `analyze_text` never fails: every enabled sub-task runs concurrently and a failing
//! sub-task contributes its degraded default instead of an error. The individual
//! sub-operations stay public and do propagate upstream errors.

use crate::code_generator::extract_code;
use crate::error::Result as ToolResult;
use crate::traits::{Tool, ToolSpec, optional_bool, require_string};
use async_trait::async_trait;
use lm_llm::{LlmRequest, ProviderClient, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;

const DEFAULT_TEMPERATURE: f32 = 0.3;
const LANGUAGE_TEMPERATURE: f32 = 0.1;
const LANGUAGE_SAMPLE_CHARS: usize = 500;

/// Sub-tasks to run; all enabled by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisOptions {
    pub sentiment: bool,
    pub entities: bool,
    pub topics: bool,
    pub summary: bool,
    pub language: bool,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            sentiment: true,
            entities: true,
            topics: true,
            summary: true,
            language: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub sentiment: Option<String>,
    pub confidence: Option<f32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub indicators: Vec<String>,
    #[serde(default)]
    pub entities: Vec<String>,
    #[serde(default)]
    pub topics: Vec<String>,
    pub summary: Option<String>,
    pub language: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentReport {
    pub sentiment: String,
    #[serde(default)]
    pub confidence: Option<f32>,
    #[serde(default)]
    pub indicators: Vec<String>,
}

impl SentimentReport {
    /// Used when the model's reply is not the requested JSON.
    pub fn neutral() -> Self {
        Self {
            sentiment: "neutral".to_string(),
            confidence: Some(0.5),
            indicators: Vec::new(),
        }
    }

    fn parse(reply: &str) -> Option<Self> {
        let body = extract_code(reply, "json");
        let mut report: SentimentReport = serde_json::from_str(&body).ok()?;
        report.sentiment = report.sentiment.trim().to_ascii_lowercase();
        if report.sentiment.is_empty() {
            return None;
        }
        report.confidence = report.confidence.map(|c| c.clamp(0.0, 1.0));
        Some(report)
    }
}

#[derive(Clone)]
pub struct TextAnalyzer {
    client: Arc<dyn ProviderClient>,
    model: Option<String>,
    summary_temperature: f32,
}

impl TextAnalyzer {
    pub fn new(client: Arc<dyn ProviderClient>, model: Option<String>) -> Self {
        Self {
            client,
            model,
            summary_temperature: DEFAULT_TEMPERATURE,
        }
    }

    /// Applies to summaries only; sentiment, entity and topic extraction stay at 0.3.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.summary_temperature = temperature;
        self
    }

    #[tracing::instrument(level = "info", skip_all, fields(chars = text.len()))]
    pub async fn analyze_text(&self, text: &str, options: &AnalysisOptions) -> AnalysisResult {
        let text = clean_text(text);
        if text.is_empty() {
            return AnalysisResult::default();
        }
        let text = text.as_str();

        let (sentiment, entities, topics, summary, language) = tokio::join!(
            run_if(options.sentiment, "sentiment", self.analyze_sentiment(text)),
            run_if(options.entities, "entities", self.extract_entities(text)),
            run_if(options.topics, "topics", self.extract_topics(text)),
            run_if(options.summary, "summary", self.summarize(text)),
            run_if(options.language, "language", self.detect_language(text)),
        );

        let (sentiment, confidence, indicators) = match sentiment {
            Some(report) => (Some(report.sentiment), report.confidence, report.indicators),
            None => (None, None, Vec::new()),
        };
        AnalysisResult {
            sentiment,
            confidence,
            indicators,
            entities: entities.unwrap_or_default(),
            topics: topics.unwrap_or_default(),
            summary,
            language,
        }
    }

    /// An undecodable reply degrades to [`SentimentReport::neutral`]; upstream errors propagate.
    pub async fn analyze_sentiment(&self, text: &str) -> Result<SentimentReport> {
        let prompt = format!(
            "Analyze the sentiment of the following text and provide:\n\
             1. Overall sentiment (positive, negative, neutral)\n\
             2. Confidence score (0-1)\n\
             3. Key emotional indicators\n\n\
             Text: {text}\n\n\
             Respond in JSON format:\n\
             {{\n    \"sentiment\": \"positive/negative/neutral\",\n    \"confidence\": 0.85,\n    \"indicators\": [\"joy\", \"excitement\", \"satisfaction\"]\n}}"
        );
        let reply = self.complete(prompt, DEFAULT_TEMPERATURE, 500).await?;
        Ok(SentimentReport::parse(&reply).unwrap_or_else(|| {
            tracing::warn!("sentiment reply was not valid json; using neutral default");
            SentimentReport::neutral()
        }))
    }

    pub async fn extract_entities(&self, text: &str) -> Result<Vec<String>> {
        let prompt = format!(
            "Extract all named entities from the following text. Include:\n\
             - Person names\n\
             - Organization names\n\
             - Location names\n\
             - Product names\n\
             - Important dates\n\
             - Other significant entities\n\n\
             Text: {text}\n\n\
             Return only a comma-separated list of entities, no explanations."
        );
        let reply = self.complete(prompt, DEFAULT_TEMPERATURE, 1000).await?;
        Ok(comma_list(&reply))
    }

    pub async fn extract_topics(&self, text: &str) -> Result<Vec<String>> {
        let prompt = format!(
            "Identify the main topics and themes in the following text. Return 3-5 key topics.\n\n\
             Text: {text}\n\n\
             Return only a comma-separated list of topics, no explanations."
        );
        let reply = self.complete(prompt, DEFAULT_TEMPERATURE, 500).await?;
        Ok(comma_list(&reply))
    }

    pub async fn summarize(&self, text: &str) -> Result<String> {
        let prompt = format!(
            "Summarize the following text in 2-3 sentences, capturing the main points:\n\n{text}"
        );
        let reply = self.complete(prompt, self.summary_temperature, 300).await?;
        Ok(reply.trim().to_string())
    }

    /// Only the first 500 characters are sent.
    pub async fn detect_language(&self, text: &str) -> Result<String> {
        let sample: String = text.chars().take(LANGUAGE_SAMPLE_CHARS).collect();
        let prompt = format!(
            "Detect the language of the following text. Return only the language name in English:\n\n{sample}"
        );
        let reply = self.complete(prompt, LANGUAGE_TEMPERATURE, 50).await?;
        Ok(reply.trim().to_string())
    }

    async fn complete(&self, prompt: String, temperature: f32, max_tokens: u32) -> Result<String> {
        let request = LlmRequest::builder(prompt)
            .provider(self.client.provider())
            .model(self.model.as_deref())
            .temperature(temperature)
            .max_tokens(max_tokens)
            .build()?;
        Ok(self.client.generate(&request).await?.into_content())
    }
}

async fn run_if<T>(
    enabled: bool,
    task: &'static str,
    fut: impl Future<Output = Result<T>>,
) -> Option<T> {
    if !enabled {
        return None;
    }
    match fut.await {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(task, error = %e, "analysis sub-task failed; using default");
            None
        }
    }
}

fn comma_list(reply: &str) -> Vec<String> {
    reply
        .split(',')
        .map(str::trim)
        .filter(|item| item.chars().count() > 1)
        .map(str::to_string)
        .collect()
}

/// Collapses whitespace runs to one space and drops control characters.
pub fn clean_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .filter(|c| !c.is_control())
        .collect::<String>()
        .trim()
        .to_string()
}

pub struct TextAnalyzerTool {
    analyzer: TextAnalyzer,
}

impl TextAnalyzerTool {
    pub fn new(analyzer: TextAnalyzer) -> Self {
        Self { analyzer }
    }
}

#[async_trait]
impl Tool for TextAnalyzerTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "text_analyzer".to_string(),
            description: "Sentiment, entities, topics, summary and language of a text.".to_string(),
            parameters_schema: json!({
                "type": "object",
                "additionalProperties": false,
                "properties": {
                    "text": { "type": "string" },
                    "sentiment": { "type": "boolean" },
                    "entities": { "type": "boolean" },
                    "topics": { "type": "boolean" },
                    "summary": { "type": "boolean" },
                    "language": { "type": "boolean" }
                },
                "required": ["text"]
            }),
        }
    }

    #[tracing::instrument(level = "info", skip_all)]
    async fn execute(&self, arguments: Value) -> ToolResult<Value> {
        let text = require_string(&arguments, "text")?;
        let options = AnalysisOptions {
            sentiment: optional_bool(&arguments, "sentiment", true)?,
            entities: optional_bool(&arguments, "entities", true)?,
            topics: optional_bool(&arguments, "topics", true)?,
            summary: optional_bool(&arguments, "summary", true)?,
            language: optional_bool(&arguments, "language", true)?,
        };
        let result = self.analyzer.analyze_text(&text, &options).await;
        Ok(serde_json::to_value(result)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedClient, upstream};

    fn routed(sentiment: &'static str) -> ScriptedClient {
        ScriptedClient::new(move |req| {
            let prompt = req.prompt();
            let reply = if prompt.starts_with("Analyze the sentiment") {
                sentiment
            } else if prompt.starts_with("Extract all named entities") {
                "Acme Corp, Paris, x, "
            } else if prompt.starts_with("Identify the main topics") {
                "finance,  travel"
            } else if prompt.starts_with("Summarize") {
                "  Acme opened an office in Paris.  "
            } else if prompt.starts_with("Detect the language") {
                "English\n"
            } else {
                return Err(upstream(400));
            };
            Ok(reply.to_string())
        })
    }

    #[tokio::test]
    async fn invalid_sentiment_json_degrades_to_neutral() {
        let client = Arc::new(routed("I think it is upbeat!"));
        let analyzer = TextAnalyzer::new(client.clone(), None);

        let result = analyzer
            .analyze_text("Acme Corp opened an office in Paris.", &AnalysisOptions::default())
            .await;

        assert_eq!(result.sentiment.as_deref(), Some("neutral"));
        assert_eq!(result.confidence, Some(0.5));
        assert!(result.indicators.is_empty());
        assert_eq!(result.entities, vec!["Acme Corp", "Paris"]);
        assert_eq!(result.topics, vec!["finance", "travel"]);
        assert_eq!(result.summary.as_deref(), Some("Acme opened an office in Paris."));
        assert_eq!(result.language.as_deref(), Some("English"));
        assert_eq!(client.requests().len(), 5);
    }

    #[tokio::test]
    async fn fenced_sentiment_json_is_parsed() {
        let client = Arc::new(routed(
            "```json\n{\"sentiment\": \"Positive\", \"confidence\": 0.92, \"indicators\": [\"joy\"]}\n```",
        ));
        let report = TextAnalyzer::new(client, None)
            .analyze_sentiment("What a great day")
            .await
            .expect("report");
        assert_eq!(report.sentiment, "positive");
        assert_eq!(report.confidence, Some(0.92));
        assert_eq!(report.indicators, vec!["joy"]);
    }

    #[tokio::test]
    async fn upstream_failures_map_to_per_task_defaults() {
        let analyzer = TextAnalyzer::new(Arc::new(ScriptedClient::failing(500)), None);
        let result = analyzer
            .analyze_text("Some text.", &AnalysisOptions::default())
            .await;
        assert_eq!(result, AnalysisResult::default());

        assert!(analyzer.extract_entities("Some text.").await.is_err());
    }

    #[tokio::test]
    async fn blank_text_makes_no_calls() {
        let client = Arc::new(routed("{}"));
        let analyzer = TextAnalyzer::new(client.clone(), None);
        let result = analyzer
            .analyze_text(" \n\t\u{0007} ", &AnalysisOptions::default())
            .await;
        assert_eq!(result, AnalysisResult::default());
        assert!(client.requests().is_empty());
    }

    #[tokio::test]
    async fn disabled_tasks_are_not_requested() {
        let client = Arc::new(routed("{\"sentiment\": \"negative\", \"confidence\": 0.7}"));
        let analyzer = TextAnalyzer::new(client.clone(), Some("gpt-4".to_string()));
        let options = AnalysisOptions {
            entities: false,
            topics: false,
            summary: false,
            language: false,
            ..AnalysisOptions::default()
        };

        let result = analyzer.analyze_text("Bad service.", &options).await;
        assert_eq!(result.sentiment.as_deref(), Some("negative"));
        assert_eq!(result.confidence, Some(0.7));
        assert!(result.entities.is_empty());
        assert_eq!(result.summary, None);

        let requests = client.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].temperature(), Some(0.3));
        assert_eq!(requests[0].model(), Some("gpt-4"));
    }

    #[tokio::test]
    async fn configured_temperature_only_reaches_the_summary() {
        let client = Arc::new(routed(r#"{"sentiment": "neutral", "confidence": 0.5}"#));
        let analyzer = TextAnalyzer::new(client.clone(), None).with_temperature(0.9);

        analyzer
            .analyze_text("Acme opened an office in Paris.", &AnalysisOptions::default())
            .await;

        let requests = client.requests();
        assert_eq!(requests.len(), 5);
        for request in &requests {
            let expected = match request.prompt() {
                p if p.starts_with("Summarize") => 0.9,
                p if p.starts_with("Detect the language") => 0.1,
                _ => 0.3,
            };
            assert_eq!(request.temperature(), Some(expected), "{}", request.prompt());
        }
    }

    #[tokio::test]
    async fn language_detection_sends_a_bounded_sample() {
        let client = Arc::new(routed("{}"));
        let analyzer = TextAnalyzer::new(client.clone(), None);
        let text = "é".repeat(800);

        analyzer.detect_language(&text).await.expect("language");

        let request = &client.requests()[0];
        assert_eq!(request.prompt().matches('é').count(), 500);
        assert_eq!(request.temperature(), Some(0.1));
        assert_eq!(request.max_tokens(), Some(50));
    }

    #[test]
    fn clean_text_collapses_whitespace_and_strips_controls() {
        assert_eq!(clean_text("  a\n\n b\t\tc\u{0000}d\u{009f} "), "a b cd");
        assert_eq!(clean_text("\r\n"), "");
    }

    #[tokio::test]
    async fn tool_returns_serialized_result() {
        let client = Arc::new(routed("{\"sentiment\": \"neutral\"}"));
        let tool = TextAnalyzerTool::new(TextAnalyzer::new(client, None));

        let out = tool
            .execute(json!({"text": "Acme Corp in Paris", "topics": false, "language": false}))
            .await
            .expect("analysis");
        assert_eq!(out["sentiment"], "neutral");
        assert_eq!(out["confidence"], Value::Null);
        assert_eq!(out["entities"], json!(["Acme Corp", "Paris"]));
        assert_eq!(out["topics"], json!([]));
        assert!(tool.execute(json!({"text": 5})).await.is_err());
    }
}
