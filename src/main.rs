//! # AI Weekly Brief
//!
//! A weekly batch job that collects AI news from several public sources,
//! has an LLM write a three-section briefing from them, and delivers the
//! briefing to one or more Telegram chats.
//!
//! ## Features
//!
//! - Collects from Reddit, Product Hunt, Synced (機器之心) and QbitAI (量子位)
//!   concurrently; a failing source is logged and skipped
//! - Generates the report through the Anthropic Messages API with bounded retry
//! - Splits the report into message-sized chunks and sends them in order
//! - Optionally archives each report as JSON
//!
//! ## Usage
//!
//! ```sh
//! export ANTHROPIC_API_KEY=... TELEGRAM_BOT_TOKEN=... TELEGRAM_CHAT_ID=...
//! ai_weekly_brief          # collect, generate, deliver
//! ai_weekly_brief --test   # collect, generate, print
//! ```
//!
//! ## Exit codes
//!
//! - `0`: report generated (and delivered unless `--test`)
//! - `1`: generation or delivery failed
//! - `2`: configuration error

use clap::Parser;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod cli;
mod collectors;
mod config;
mod delivery;
mod error;
mod models;
mod outputs;
mod pipeline;
mod report;
mod utils;

use api::{AnthropicClient, RetryAsk};
use cli::Cli;
use config::{Secrets, Settings};
use delivery::telegram::TelegramSender;
use error::RunError;
use models::RunSummary;
use pipeline::RunMode;

#[tokio::main]
async fn main() -> ExitCode {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("ai_weekly_brief starting up");

    let args = Cli::parse();
    debug!(test = args.test, "Parsed CLI arguments");
    let mode = if args.test {
        RunMode::Preview
    } else {
        RunMode::Deliver
    };

    let result = run(mode).await;
    let elapsed = start_time.elapsed();

    match result {
        Ok(summary) => {
            info!(
                ?elapsed,
                items = summary.items_collected,
                failed_sources = ?summary.failed_sources,
                chunks_delivered = summary.chunks_delivered,
                delivered = summary.delivered,
                "Execution complete"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(?elapsed, error = %e, "Run failed");
            e.exit_code()
        }
    }
}

/// Load configuration, wire the real clients and run the pipeline once.
#[instrument(level = "info")]
async fn run(mode: RunMode) -> Result<RunSummary, RunError> {
    let secrets = Secrets::from_env()?;
    let settings = Settings::load().await?;
    info!(
        chats = secrets.telegram_chat_ids.len(),
        model = %settings.generator.model,
        archive = settings.archive_dir.is_some(),
        "Configuration loaded"
    );

    let http = collectors::build_http_client(&settings.collectors)
        .map_err(|e| RunError::Config(format!("collector HTTP client: {e}")))?;
    let sources = collectors::default_collectors(&http, &settings.collectors);

    let client = AnthropicClient::new(secrets.anthropic_api_key.clone(), &settings.generator)
        .map_err(|e| RunError::Config(format!("generation client: {e}")))?;
    let asker = RetryAsk::new(client, settings.generator.max_retries, Duration::from_secs(1));

    let sender = TelegramSender::new(&secrets.telegram_bot_token, &settings.delivery)
        .map_err(|e| RunError::Config(format!("delivery client: {e}")))?;

    pipeline::run(
        &sources,
        &asker,
        &sender,
        &secrets.telegram_chat_ids,
        &settings,
        mode,
    )
    .await
}
