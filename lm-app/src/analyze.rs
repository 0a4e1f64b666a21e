//! `analyze` and `analyze-batch` commands with json, markdown and text rendering.

use crate::output::{emit, read_input};
use anyhow::Context;
use clap::ValueEnum;
use lm_tools::{AnalysisOptions, AnalysisResult, TextAnalyzer};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Json,
    Markdown,
    Text,
}

pub fn render(result: &AnalysisResult, format: OutputFormat) -> anyhow::Result<String> {
    Ok(match format {
        OutputFormat::Json => serde_json::to_string_pretty(result)?,
        OutputFormat::Markdown => render_markdown(result),
        OutputFormat::Text => render_text(result),
    })
}

fn joined_or(items: &[String], fallback: &str) -> String {
    if items.is_empty() {
        fallback.to_string()
    } else {
        items.join(", ")
    }
}

fn render_markdown(result: &AnalysisResult) -> String {
    let confidence = result
        .confidence
        .map(|c| format!("{c:.2}"))
        .unwrap_or_else(|| "N/A".to_string());
    format!(
        "# Text Analysis Results\n\n\
         ## Sentiment\n**Sentiment**: {}\n\n\
         ## Entities\n{}\n\n\
         ## Topics\n{}\n\n\
         ## Summary\n{}\n\n\
         ## Language\n**Language**: {}\n\n\
         ## Confidence\n**Confidence**: {confidence}\n",
        result.sentiment.as_deref().unwrap_or("N/A"),
        joined_or(&result.entities, "None found"),
        joined_or(&result.topics, "None found"),
        result.summary.as_deref().unwrap_or("No summary generated"),
        result.language.as_deref().unwrap_or("N/A"),
    )
}

/// Two-column `metric: value` listing; absent metrics are omitted.
fn render_text(result: &AnalysisResult) -> String {
    let mut rows: Vec<(&str, String)> = Vec::new();
    if let Some(sentiment) = &result.sentiment {
        rows.push(("Sentiment", sentiment.clone()));
    }
    if !result.indicators.is_empty() {
        rows.push(("Indicators", result.indicators.join(", ")));
    }
    if !result.entities.is_empty() {
        rows.push(("Entities", result.entities.join(", ")));
    }
    if !result.topics.is_empty() {
        rows.push(("Topics", result.topics.join(", ")));
    }
    if let Some(summary) = &result.summary {
        rows.push(("Summary", summary.clone()));
    }
    if let Some(language) = &result.language {
        rows.push(("Language", language.clone()));
    }
    if let Some(confidence) = result.confidence {
        rows.push(("Confidence", format!("{confidence:.2}")));
    }
    if rows.is_empty() {
        return "No analysis results.".to_string();
    }
    let width = rows.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
    rows.iter()
        .map(|(k, v)| format!("{k:<width$}  {v}"))
        .collect::<Vec<_>>()
        .join("\n")
}

pub async fn analyze(
    analyzer: &TextAnalyzer,
    text: &str,
    options: &AnalysisOptions,
    format: OutputFormat,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    if text.trim().is_empty() {
        return Err(anyhow::anyhow!("no text to analyze"));
    }
    let result = analyzer.analyze_text(text, options).await;
    emit(output, &render(&result, format)?).await
}

#[derive(Debug, Serialize)]
struct CombinedEntry<'a> {
    file: String,
    analysis: &'a AnalysisResult,
}

/// Analyzes every `*.<extension>` file in `input_dir`, writing `<stem>_analysis.json` per
/// file and `combined_analysis.json` into `output_dir`. Returns the written paths.
pub async fn analyze_batch(
    analyzer: &TextAnalyzer,
    input_dir: &Path,
    output_dir: &Path,
    extension: &str,
) -> anyhow::Result<Vec<PathBuf>> {
    let files = matching_files(input_dir, extension).await?;
    if files.is_empty() {
        return Err(anyhow::anyhow!(
            "no *.{extension} files found in {}",
            input_dir.display()
        ));
    }
    tokio::fs::create_dir_all(output_dir)
        .await
        .with_context(|| format!("create output dir {}", output_dir.display()))?;

    let options = AnalysisOptions::default();
    let mut results = Vec::with_capacity(files.len());
    let mut written = Vec::with_capacity(files.len() + 1);
    for (i, file) in files.iter().enumerate() {
        tracing::info!(index = i + 1, total = files.len(), file = %file.display(), "analyzing file");
        let text = read_input(file).await?;
        let result = analyzer.analyze_text(&text, &options).await;

        let stem = file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("file{i}"));
        let target = output_dir.join(format!("{stem}_analysis.json"));
        write_json(&target, &result).await?;
        written.push(target);
        results.push((file.display().to_string(), result));
    }

    let combined: Vec<CombinedEntry<'_>> = results
        .iter()
        .map(|(file, analysis)| CombinedEntry {
            file: file.clone(),
            analysis,
        })
        .collect();
    let combined_path = output_dir.join("combined_analysis.json");
    write_json(&combined_path, &combined).await?;
    written.push(combined_path);
    Ok(written)
}

async fn matching_files(dir: &Path, extension: &str) -> anyhow::Result<Vec<PathBuf>> {
    let extension = extension.trim_start_matches('.');
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("read input dir {}", dir.display()))?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let matches = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(extension));
        if matches && entry.file_type().await?.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

async fn write_json(path: &Path, value: &impl Serialize) -> anyhow::Result<()> {
    let body = serde_json::to_string_pretty(value)?;
    tokio::fs::write(path, body)
        .await
        .with_context(|| format!("write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::CannedClient;
    use std::sync::Arc;

    fn sample() -> AnalysisResult {
        AnalysisResult {
            sentiment: Some("positive".to_string()),
            confidence: Some(0.9),
            indicators: vec!["joy".to_string()],
            entities: vec!["Acme".to_string(), "Paris".to_string()],
            topics: Vec::new(),
            summary: None,
            language: Some("English".to_string()),
        }
    }

    #[test]
    fn markdown_uses_placeholders_for_missing_parts() {
        let md = render(&sample(), OutputFormat::Markdown).expect("render");
        assert!(md.starts_with("# Text Analysis Results"));
        assert!(md.contains("**Sentiment**: positive"));
        assert!(md.contains("## Entities\nAcme, Paris"));
        assert!(md.contains("## Topics\nNone found"));
        assert!(md.contains("## Summary\nNo summary generated"));
        assert!(md.contains("**Confidence**: 0.90"));
    }

    #[test]
    fn text_lists_only_present_metrics() {
        let text = render(&sample(), OutputFormat::Text).expect("render");
        assert!(text.contains("Sentiment   positive"));
        assert!(text.contains("Confidence  0.90"));
        assert!(!text.contains("Topics"));
        assert_eq!(
            render(&AnalysisResult::default(), OutputFormat::Text).expect("render"),
            "No analysis results."
        );
    }

    #[test]
    fn json_round_trips() {
        let json = render(&sample(), OutputFormat::Json).expect("render");
        let parsed: AnalysisResult = serde_json::from_str(&json).expect("parse");
        assert_eq!(parsed, sample());
    }

    #[tokio::test]
    async fn batch_writes_per_file_and_combined_results() {
        let input = tempfile::tempdir().expect("input dir");
        let output = tempfile::tempdir().expect("output dir");
        std::fs::write(input.path().join("a.txt"), "Alpha text.").expect("write a");
        std::fs::write(input.path().join("b.TXT"), "Beta text.").expect("write b");
        std::fs::write(input.path().join("skip.md"), "ignored").expect("write md");

        let analyzer = TextAnalyzer::new(Arc::new(CannedClient::new("Acme, Paris")), None);
        let written = analyze_batch(&analyzer, input.path(), output.path(), "txt")
            .await
            .expect("batch");

        let names: Vec<String> = written
            .iter()
            .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .collect();
        assert_eq!(
            names,
            vec!["a_analysis.json", "b_analysis.json", "combined_analysis.json"]
        );

        let combined: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(output.path().join("combined_analysis.json"))
                .expect("combined"),
        )
        .expect("json");
        let entries = combined.as_array().expect("array");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["analysis"]["entities"], serde_json::json!(["Acme", "Paris"]));
        assert_eq!(entries[0]["analysis"]["sentiment"], "neutral");
    }

    #[tokio::test]
    async fn batch_without_matching_files_fails() {
        let input = tempfile::tempdir().expect("input dir");
        let output = tempfile::tempdir().expect("output dir");
        let analyzer = TextAnalyzer::new(Arc::new(CannedClient::new("x")), None);
        assert!(
            analyze_batch(&analyzer, input.path(), output.path(), "txt")
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn blank_text_is_rejected() {
        let analyzer = TextAnalyzer::new(Arc::new(CannedClient::new("x")), None);
        let err = analyze(
            &analyzer,
            "  ",
            &AnalysisOptions::default(),
            OutputFormat::Json,
            None,
        )
        .await
        .err()
        .expect("error");
        assert!(err.to_string().contains("no text"));
    }
}
