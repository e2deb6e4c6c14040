//! Transcript compression dry-run

use anyhow::{Context, anyhow};
use colored::*;
use pmctx_core::context::{AdaptiveBudget, CompressionResult, CompressionStrategy, MessageClassifier};
use pmctx_core::llm::{ExtractiveSummaryClient, Message, ModelId, context_window, renumber};
use pmctx_core::settings::PmctxSettings;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::console::CliConsole;

/// Arguments of `pmctx compress`
pub struct CompressOptions {
    pub input: PathBuf,
    pub agent: String,
    pub model: String,
    pub window: Option<usize>,
    pub history: usize,
    pub strategy: Option<CompressionStrategy>,
    pub output: Option<PathBuf>,
    pub json: bool,
}

/// Read a transcript, numbering it when it carries no usable sequence
pub fn load_transcript(path: &Path) -> anyhow::Result<Vec<Message>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading transcript '{}'", path.display()))?;
    let mut messages: Vec<Message> = serde_json::from_str(&content)
        .with_context(|| format!("'{}' is not a JSON array of messages", path.display()))?;

    let ordered = messages
        .windows(2)
        .all(|pair| pair[0].sequence_index < pair[1].sequence_index);
    if !ordered {
        tracing::info!(
            count = messages.len(),
            "Transcript has no strictly increasing sequence_index, renumbering"
        );
        renumber(&mut messages);
    }
    Ok(messages)
}

pub async fn run(settings: &PmctxSettings, options: CompressOptions) -> anyhow::Result<()> {
    let messages = load_transcript(&options.input)?;
    let model = ModelId::from(options.model);
    let window = match options.window {
        Some(window) => window,
        None => context_window(&model).ok_or_else(|| {
            anyhow!("no known context window for model '{}', pass --window", model)
        })?,
    };

    let mut budget_settings = settings.budget.clone();
    if let Some(strategy) = options.strategy {
        budget_settings.strategy = strategy;
    }
    let manager = AdaptiveBudget::new(budget_settings)
        .with_classifier(MessageClassifier::new(settings.classifier))
        .with_summary_client(Arc::new(ExtractiveSummaryClient::new()))
        .build_context_manager(&options.agent, window, options.history)?;

    let result = manager.compress_messages(messages, &model).await;

    if let Some(path) = &options.output {
        fs::write(path, serde_json::to_string_pretty(&result.messages)?)
            .with_context(|| format!("writing '{}'", path.display()))?;
    }

    if options.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_summary(&result, &options.agent, &model, window);
        if let Some(path) = &options.output {
            CliConsole::new()
                .success(&format!("Wrote compressed transcript to {}", path.display()));
        }
    }
    Ok(())
}

fn print_summary(result: &CompressionResult, agent: &str, model: &ModelId, window: usize) {
    let console = CliConsole::new();
    console.print_header("Compression Result");
    console.field("agent", agent.cyan());
    console.field("model", format!("{} ({} token window)", model, window));
    console.field("token limit", result.token_limit);
    console.field(
        "tokens",
        format!(
            "{} -> {} ({:.0}%)",
            result.original_tokens,
            result.final_tokens,
            result.compression_ratio() * 100.0
        ),
    );
    console.field("messages", result.messages.len());
    console.field("removed", result.removed_count);

    let strategy = if result.escalated() {
        format!(
            "{} (escalated from {} after {} attempt(s))",
            result.strategy, result.requested_strategy, result.attempts
        )
    } else {
        result.strategy.to_string()
    };
    console.field("strategy", strategy);
    console.field("summarized", result.summarized);

    println!();
    if !result.was_compressed {
        console.success("Already within budget, nothing to compress");
    } else if let Some(notice) = result.degraded_notice() {
        console.error(&format!("Over budget after all retries: {}", notice));
    } else {
        console.success(&format!("Within budget, saved {} tokens", result.tokens_saved()));
    }
}
