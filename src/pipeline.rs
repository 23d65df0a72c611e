//! One weekly run: collect, generate, then deliver or print.
//!
//! ```text
//! COLLECT → GENERATE → DELIVER      → DONE
//!                    ↘ SKIP-DELIVER ↗
//!            ↓           ↓
//!          FAILED      FAILED
//! ```
//!
//! Collection never fails the run. Generation and delivery failures end it
//! with a [`RunError`]; the caller maps that to the exit code.

use crate::api::AskAsync;
use crate::collectors::{Collector, collect_all};
use crate::config::Settings;
use crate::delivery::{Deliver, RetryPolicy, deliver_report};
use crate::error::RunError;
use crate::models::{Report, RunSummary};
use crate::outputs::json;
use crate::report::generate_report;
use std::fmt;
use tracing::{error, info, instrument, warn};

/// Whether the report is sent or only printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Deliver,
    /// Generate and print the report; nothing is sent.
    Preview,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Collect,
    Generate,
    Deliver,
    SkipDeliver,
    Done,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Collect => "collect",
            Stage::Generate => "generate",
            Stage::Deliver => "deliver",
            Stage::SkipDeliver => "skip-deliver",
            Stage::Done => "done",
            Stage::Failed => "failed",
        };
        f.write_str(s)
    }
}

fn enter(stage: Stage) {
    info!(%stage, "Entering stage");
}

/// Print the report body to stdout, where it is kept apart from the logs.
fn print_report(report: &Report) {
    println!("{}", report.text);
}

/// Run every stage once.
#[instrument(level = "info", skip_all, fields(mode = ?mode))]
pub async fn run<A, D>(
    collectors: &[Box<dyn Collector>],
    asker: &A,
    sender: &D,
    chat_ids: &[String],
    settings: &Settings,
    mode: RunMode,
) -> Result<RunSummary, RunError>
where
    A: AskAsync<Response = String>,
    D: Deliver,
{
    enter(Stage::Collect);
    let collected = collect_all(collectors).await;
    let failed_sources = collected.failed_sources();
    if collected.is_empty() {
        warn!("No items collected from any source; the report will say so");
    }

    enter(Stage::Generate);
    let report = match generate_report(asker, &collected, &settings.generator.language).await {
        Ok(report) => report,
        Err(e) => {
            enter(Stage::Failed);
            return Err(e);
        }
    };

    if let Some(dir) = settings.archive_dir.as_deref() {
        if let Err(e) = json::write_report(&report, &collected, dir).await {
            warn!(archive_dir = %dir, error = %e, "Failed to archive report; continuing");
        }
    }

    let mut summary = RunSummary {
        items_collected: collected.total(),
        failed_sources,
        chunks_delivered: 0,
        delivered: false,
    };

    if mode == RunMode::Preview {
        enter(Stage::SkipDeliver);
        print_report(&report);
        enter(Stage::Done);
        return Ok(summary);
    }

    enter(Stage::Deliver);
    let delivered = deliver_report(
        sender,
        chat_ids,
        &report.text,
        settings.delivery.max_message_chars,
        RetryPolicy::from(&settings.delivery),
    )
    .await;

    match delivered {
        Ok(chunks) => {
            summary.chunks_delivered = chunks;
            summary.delivered = true;
            enter(Stage::Done);
            Ok(summary)
        }
        Err(e) => {
            error!(error = %e, "Delivery failed; printing report to stdout");
            print_report(&report);
            enter(Stage::Failed);
            Err(e)
        }
    }
}
