//! `llm-modules` binary: chat, code generation and text analysis over one LLM provider.

mod analyze;
mod chat;
mod code;
mod commands;
mod config;
mod init;
mod output;
mod runtime;
mod tools;

#[cfg(test)]
mod testing;

use analyze::OutputFormat;
use clap::{Parser, Subcommand};
use config::AppConfig;
use lm_llm::Provider;
use lm_tools::{AnalysisOptions, CodeGenerationRequest, DetailLevel, builtin_tools};
use runtime::{Overrides, Runtime};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

#[derive(Debug, Parser)]
#[command(
    name = "llm-modules",
    version,
    about = "Chat, code generation and text analysis backed by OpenAI or Anthropic"
)]
struct Cli {
    /// Config file (default: ~/.llm-modules/config.toml).
    #[arg(long, global = true, env = "LLM_MODULES_CONFIG")]
    config: Option<PathBuf>,
    /// Use this provider instead of the configured preference order.
    #[arg(long, global = true)]
    provider: Option<Provider>,
    /// Model for every adapter, overriding per-module models.
    #[arg(long, global = true)]
    model: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Interactive chat session.
    Chat {
        #[arg(long)]
        system: Option<String>,
        #[arg(long)]
        temperature: Option<f32>,
        #[arg(long)]
        max_tokens: Option<u32>,
        /// Wait for the whole reply instead of streaming it.
        #[arg(long)]
        no_stream: bool,
    },
    /// Single-shot chat reply.
    Ask {
        prompt: String,
        #[arg(long)]
        system: Option<String>,
    },
    /// Answer one prompt per line of FILE, writing a JSON array.
    Batch {
        file: PathBuf,
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Generate code from a description.
    Generate {
        description: String,
        #[arg(long, short, default_value = "python")]
        language: String,
        #[arg(long)]
        framework: Option<String>,
        #[arg(long)]
        style: Option<String>,
        /// Ask for unit tests alongside the code.
        #[arg(long)]
        tests: bool,
        #[arg(long)]
        no_docs: bool,
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Refactor the code in FILE according to INSTRUCTIONS.
    Refactor {
        file: PathBuf,
        instructions: String,
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Explain the code in FILE.
    Explain {
        file: PathBuf,
        /// low, medium or high.
        #[arg(long, short, default_value = "medium")]
        detail: DetailLevel,
    },
    /// Generate unit tests for the code in FILE.
    TestGen {
        file: PathBuf,
        #[arg(long, short)]
        language: Option<String>,
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Generate documentation for the code in FILE.
    Docs {
        file: PathBuf,
        #[arg(long, short)]
        language: Option<String>,
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Analyze text given inline or from a file.
    Analyze {
        #[arg(long, short, conflicts_with = "file", required_unless_present = "file")]
        text: Option<String>,
        #[arg(long, short)]
        file: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
        #[arg(long, short)]
        output: Option<PathBuf>,
        #[arg(long)]
        no_sentiment: bool,
        #[arg(long)]
        no_entities: bool,
        #[arg(long)]
        no_topics: bool,
        #[arg(long)]
        no_summary: bool,
        #[arg(long)]
        no_language: bool,
    },
    /// Analyze every matching file in DIR.
    AnalyzeBatch {
        dir: PathBuf,
        #[arg(long, short, default_value = "output")]
        output_dir: PathBuf,
        #[arg(long, default_value = "txt")]
        extension: String,
    },
    /// List the JSON tools and their parameter schemas.
    Tools,
    /// Invoke a JSON tool with a JSON object of arguments.
    Call {
        tool: String,
        #[arg(default_value = "{}")]
        arguments: String,
    },
    /// Write a config template to ~/.llm-modules (never overwrites).
    Init,
    /// Validate config and report provider credentials.
    Doctor,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing()?;
    install_panic_hook();

    let cli = Cli::parse();

    match cli.command {
        Command::Init => {
            match init::initialize_default().await? {
                init::InitOutcome::Created(path) => {
                    println!("llm-modules init: created {}", path.display());
                }
                init::InitOutcome::AlreadyPresent(path) => {
                    println!(
                        "llm-modules init: {} already exists, left unchanged",
                        path.display()
                    );
                }
            }
            return Ok(());
        }
        Command::Doctor => {
            let (cfg, source) = AppConfig::load_with_path(cli.config).await?;
            tracing::info!(config_path = ?source, "config ok");
            println!("{}", runtime::doctor_report(&cfg, source.as_deref()));
            return Ok(());
        }
        _ => {}
    }

    let (cfg, _) = AppConfig::load_with_path(cli.config).await?;
    let runtime = Runtime::connect(
        cfg,
        Overrides {
            provider: cli.provider,
            model: cli.model,
        },
    )?;
    tracing::debug!(provider = %runtime.provider(), "runtime ready");

    match cli.command {
        Command::Chat {
            system,
            temperature,
            max_tokens,
            no_stream,
        } => {
            let mut settings = runtime.chat_settings();
            if let Some(system) = system {
                settings.system_prompt = system;
            }
            if let Some(temperature) = temperature {
                settings.temperature = temperature;
            }
            if let Some(max_tokens) = max_tokens {
                settings.max_tokens = max_tokens;
            }
            settings.stream &= !no_stream;
            chat::interactive(&runtime, settings).await
        }
        Command::Ask { prompt, system } => {
            let mut settings = runtime.chat_settings();
            if let Some(system) = system {
                settings.system_prompt = system;
            }
            chat::ask(&runtime.chat_bot(settings), &prompt).await
        }
        Command::Batch { file, output } => {
            let bot = runtime.chat_bot(runtime.chat_settings());
            chat::batch(&bot, &file, output.as_deref()).await
        }
        Command::Generate {
            description,
            language,
            framework,
            style,
            tests,
            no_docs,
            output,
        } => {
            let request = CodeGenerationRequest {
                description,
                language,
                framework,
                style,
                include_tests: tests,
                include_docs: !no_docs,
            };
            code::generate(&runtime.code_generator(), &request, output.as_deref()).await
        }
        Command::Refactor {
            file,
            instructions,
            output,
        } => {
            code::refactor(
                &runtime.code_generator(),
                &file,
                &instructions,
                output.as_deref(),
            )
            .await
        }
        Command::Explain { file, detail } => {
            code::explain(&runtime.code_generator(), &file, detail).await
        }
        Command::TestGen {
            file,
            language,
            output,
        } => {
            code::test_gen(
                &runtime.code_generator(),
                &file,
                language.as_deref(),
                output.as_deref(),
            )
            .await
        }
        Command::Docs {
            file,
            language,
            output,
        } => {
            code::docs(
                &runtime.code_generator(),
                &file,
                language.as_deref(),
                output.as_deref(),
            )
            .await
        }
        Command::Analyze {
            text,
            file,
            format,
            output,
            no_sentiment,
            no_entities,
            no_topics,
            no_summary,
            no_language,
        } => {
            let text = match (text, file) {
                (Some(text), _) => text,
                (None, Some(file)) => output::read_input(&file).await?,
                (None, None) => return Err(anyhow::anyhow!("pass --text or --file")),
            };
            let options = AnalysisOptions {
                sentiment: !no_sentiment,
                entities: !no_entities,
                topics: !no_topics,
                summary: !no_summary,
                language: !no_language,
            };
            analyze::analyze(
                &runtime.text_analyzer(),
                &text,
                &options,
                format,
                output.as_deref(),
            )
            .await
        }
        Command::AnalyzeBatch {
            dir,
            output_dir,
            extension,
        } => {
            let written =
                analyze::analyze_batch(&runtime.text_analyzer(), &dir, &output_dir, &extension)
                    .await?;
            println!(
                "analysis complete: {} file(s) written to {}",
                written.len(),
                output_dir.display()
            );
            Ok(())
        }
        Command::Tools => {
            let tools = builtin_tools(runtime.client(), &runtime.tool_settings());
            println!("{}", tools::describe(&tools)?);
            Ok(())
        }
        Command::Call { tool, arguments } => {
            let tools = builtin_tools(runtime.client(), &runtime.tool_settings());
            let result = tools::call(&tools, &tool, &arguments).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
        Command::Init | Command::Doctor => Ok(()),
    }
}

fn init_tracing() -> anyhow::Result<()> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(v) => v,
        Err(_) => EnvFilter::new("warn,llm_modules=info,lm_llm=info,lm_tools=info"),
    };
    let log_format = std::env::var("LLM_MODULES_LOG_FORMAT")
        .unwrap_or_else(|_| "compact".to_string())
        .to_ascii_lowercase();

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_span_events(FmtSpan::CLOSE)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .json()
                .flatten_event(true)
                .with_current_span(true)
                .with_span_list(true)
                .init();
        }
        "pretty" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_span_events(FmtSpan::CLOSE)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .pretty()
                .init();
        }
        "compact" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_target(true)
                .compact()
                .init();
        }
        other => {
            return Err(anyhow::anyhow!(
                "unsupported LLM_MODULES_LOG_FORMAT={other:?}; expected one of: json, pretty, compact"
            ));
        }
    }

    tracing::debug!(
        log_format = %log_format,
        env_filter = ?std::env::var("RUST_LOG").ok(),
        "tracing initialized"
    );
    Ok(())
}

fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let location = info.location().map_or_else(
            || "unknown".to_string(),
            |loc| format!("{}:{}", loc.file(), loc.line()),
        );
        let payload = info
            .payload()
            .downcast_ref::<&str>()
            .map(|msg| msg.to_string())
            .or_else(|| info.payload().downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        tracing::error!(panic_location = %location, panic_payload = %payload, "panic captured");
        default_hook(info);
    }));
}
