//! `chat`, `ask` and `batch` commands.

use crate::commands::{ChatInput, classify};
use crate::output::{emit, read_input};
use crate::runtime::Runtime;
use futures_util::StreamExt;
use lm_tools::{ChatBot, ChatSettings};
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Runs until an exit word, end of input or Ctrl-C. An interrupted turn is not recorded.
pub async fn interactive(runtime: &Runtime, settings: ChatSettings) -> anyhow::Result<()> {
    let bot = runtime.chat_bot(settings);
    let mut session = bot.session()?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!(
        "Chat session started with {}. Type quit, exit or bye to leave; /clear and /history manage the conversation.",
        runtime.provider()
    );

    loop {
        prompt("\nYou: ")?;
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            println!();
            break;
        };

        let message = match classify(&mut session, &line) {
            ChatInput::Empty => continue,
            ChatInput::Quit => break,
            ChatInput::Reply(text) => {
                println!("{text}");
                continue;
            }
            ChatInput::Message(message) => message,
        };

        prompt("Assistant: ")?;
        let turn = session.send_message_with(message, |fragment| {
            echo_fragment(&mut std::io::stdout(), fragment);
        });
        tokio::select! {
            result = turn => {
                println!();
                if let Err(e) = result {
                    tracing::warn!(error = %e, "chat turn failed");
                    eprintln!("error: {e}");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("\n(interrupted)");
                break;
            }
        }
    }

    println!("Goodbye!");
    Ok(())
}

/// Mid-turn output is best effort; the reply is still recorded if the terminal goes away.
fn echo_fragment(out: &mut impl Write, fragment: &str) {
    if let Err(e) = out
        .write_all(fragment.as_bytes())
        .and_then(|()| out.flush())
    {
        tracing::debug!(error = %e, "fragment echo failed");
    }
}

/// Single-shot reply, streamed to stdout when streaming is enabled.
pub async fn ask(bot: &ChatBot, prompt_text: &str) -> anyhow::Result<()> {
    if !bot.settings().stream {
        println!("{}", bot.generate_response(prompt_text).await?);
        return Ok(());
    }
    let mut stream = bot.stream_response(prompt_text).await?;
    let mut stdout = std::io::stdout();
    while let Some(fragment) = stream.next().await {
        write!(stdout, "{}", fragment?)?;
        stdout.flush()?;
    }
    writeln!(stdout)?;
    Ok(())
}

#[derive(Debug, Serialize, PartialEq)]
pub struct BatchEntry {
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One prompt per non-blank line, answered in order; a failed prompt does not stop the batch.
pub async fn run_batch(bot: &ChatBot, prompts: &str) -> Vec<BatchEntry> {
    let prompts: Vec<&str> = prompts
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    let total = prompts.len();
    let mut entries = Vec::with_capacity(total);

    for (i, prompt_text) in prompts.into_iter().enumerate() {
        tracing::info!(index = i + 1, total, "processing batch prompt");
        let entry = match bot.generate_response(prompt_text).await {
            Ok(response) => BatchEntry {
                prompt: prompt_text.to_string(),
                response: Some(response),
                error: None,
            },
            Err(e) => {
                tracing::warn!(index = i + 1, error = %e, "batch prompt failed");
                BatchEntry {
                    prompt: prompt_text.to_string(),
                    response: None,
                    error: Some(e.to_string()),
                }
            }
        };
        entries.push(entry);
    }
    entries
}

pub async fn batch(bot: &ChatBot, input: &Path, output: Option<&Path>) -> anyhow::Result<()> {
    let prompts = read_input(input).await?;
    let entries = run_batch(bot, &prompts).await;
    let failed = entries.iter().filter(|e| e.error.is_some()).count();
    emit(output, &serde_json::to_string_pretty(&entries)?).await?;
    eprintln!(
        "processed {} prompt(s), {failed} failed",
        entries.len()
    );
    Ok(())
}

fn prompt(label: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    write!(stdout, "{label}")?;
    stdout.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::CannedClient;
    use std::sync::Arc;

    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
            Err(std::io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Err(std::io::ErrorKind::BrokenPipe.into())
        }
    }

    #[test]
    fn echoed_fragments_reach_the_writer() {
        let mut out = Vec::new();
        echo_fragment(&mut out, "Hel");
        echo_fragment(&mut out, "lo");
        assert_eq!(out, b"Hello");
    }

    #[test]
    fn echo_failure_is_swallowed() {
        echo_fragment(&mut ClosedPipe, "lost");
    }

    #[tokio::test]
    async fn batch_answers_each_non_blank_line() {
        let client = Arc::new(CannedClient::new("answer"));
        let bot = ChatBot::new(client.clone(), ChatSettings::default());

        let entries = run_batch(&bot, "first\n\n   \n second \n").await;

        assert_eq!(
            entries,
            vec![
                BatchEntry {
                    prompt: "first".to_string(),
                    response: Some("answer".to_string()),
                    error: None,
                },
                BatchEntry {
                    prompt: "second".to_string(),
                    response: Some("answer".to_string()),
                    error: None,
                },
            ]
        );
        assert_eq!(client.prompts(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn batch_writes_json_array() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("prompts.txt");
        let output = dir.path().join("out").join("results.json");
        std::fs::write(&input, "hello\n").expect("write prompts");

        let bot = ChatBot::new(Arc::new(CannedClient::new("hi there")), ChatSettings::default());
        batch(&bot, &input, Some(&output)).await.expect("batch");

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(output).expect("read output"))
                .expect("json");
        assert_eq!(
            written,
            serde_json::json!([{"prompt": "hello", "response": "hi there"}])
        );
    }
}
