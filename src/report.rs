//! Report generation: prompt assembly and the generative API call.
//!
//! The prompt lists every collected item grouped by source and asks for a
//! three-section report in Telegram HTML:
//!
//! 1. Industry trends
//! 2. Trending tools
//! 3. Deep observations
//!
//! The model is told to ground every claim in the listed items. When no
//! items were collected the prompt says so explicitly, and the report must
//! state that instead of inventing news.

use crate::api::AskAsync;
use crate::error::RunError;
use crate::models::{Collected, Item, Report, SourceKind};
use chrono::{DateTime, Datelike, Local, Utc};
use std::fmt::Write;
use tracing::{error, info, instrument};

pub const SECTION_TRENDS: &str = "Industry Trends";
pub const SECTION_TOOLS: &str = "Trending Tools";
pub const SECTION_OBSERVATIONS: &str = "Deep Observations";

/// Placeholder written into the prompt when every source came back empty.
pub const NO_DATA_NOTICE: &str = "No source data could be collected this week (all sources failed or returned nothing).";

/// Render one item as a single prompt line.
fn item_line(item: &Item) -> String {
    let mut line = format!("- {}", item.title);
    if item.source == SourceKind::LinkAggregator {
        if let Some(score) = item.score {
            write!(line, " | score {score}").ok();
        }
        if let Some(comments) = item.comments {
            write!(line, " | {comments} comments").ok();
        }
    }
    if let Some(summary) = &item.summary {
        write!(line, " | {summary}").ok();
    }
    if let Some(ts) = item.published_at {
        write!(line, " | {}", ts.format("%Y-%m-%d")).ok();
    }
    write!(line, " | {}", item.url).ok();
    line
}

/// Render the collected items grouped by source, or the no-data notice.
pub fn source_context(collected: &Collected) -> String {
    if collected.is_empty() {
        return NO_DATA_NOTICE.to_string();
    }
    let mut ctx = String::new();
    for batch in collected.non_empty() {
        if !ctx.is_empty() {
            ctx.push('\n');
        }
        writeln!(ctx, "[{}]", batch.source.label()).ok();
        for item in &batch.items {
            writeln!(ctx, "{}", item_line(item)).ok();
        }
    }
    ctx.trim_end().to_string()
}

/// Build the full prompt for one run.
pub fn build_prompt(collected: &Collected, language: &str, now: DateTime<Local>) -> String {
    let date = now.format("%Y/%m/%d");
    let year = now.year();
    let month = now.month();
    let context = source_context(collected);
    let grounding = if collected.is_empty() {
        format!(
            "There is no source material this week. Every section must say plainly that no data \
             was collected ({NO_DATA_NOTICE}) and must not invent news, tools, numbers or links."
        )
    } else {
        "Ground every claim in the items above. Do not introduce news, tools, numbers or links \
         that do not appear in them. Every URL you output must be copied from the items."
            .to_string()
    };

    format!(
        r#"You are a senior AI industry analyst writing a weekly AI briefing for a software company
(web product engineers, C++ engineers working on inference and edge deployment, plus PM/QA/design).

Date of this issue: {date}

Items collected this week ({total} total):

{context}

{grounding}

Write the report in {language}. Output only the report, in exactly this structure, using Telegram HTML:

🚀 <b>{year}-{month:02}: {SECTION_TRENDS}</b>
Two or three trend themes. For each: a one-line summary in <b>bold</b>, then two or three bullet
points ("• ") with the concrete news items behind it and why they matter.

─────────────────────
🛠️ <b>{SECTION_TOOLS}</b>
Four or five tools or frameworks from the items. For each: name in <b>bold</b>, a maturity tag
(<i>ready now</i>, <i>worth evaluating</i> or <i>keep watching</i>), why it is getting attention,
what it offers engineers, and 🔗 <a href="URL">link</a> with a URL taken from the items.

─────────────────────
💡 <b>{SECTION_OBSERVATIONS}</b>
Three numbered observations of three or four sentences each about what these developments mean for
a software team, with a concrete recommended action.

Formatting rules:
1. Use only these tags: <b> <i> <a href="..."> <code> <pre>
2. Escape &, < and > in plain text as &amp; &lt; &gt;
3. Separate sections with a blank line before and after the ───── divider
4. No preamble, no closing remarks
"#,
        total = collected.total(),
    )
}

/// Generate the report for `collected` through `asker`.
///
/// Any error from the API is terminal for the run.
#[instrument(level = "info", skip_all, fields(items = collected.total()))]
pub async fn generate_report<A>(
    asker: &A,
    collected: &Collected,
    language: &str,
) -> Result<Report, RunError>
where
    A: AskAsync<Response = String>,
{
    let prompt = build_prompt(collected, language, Local::now());
    info!(prompt_chars = prompt.chars().count(), "Requesting report");

    let text = asker.ask(&prompt).await.map_err(|e| {
        error!(error = %e, "Report generation failed");
        RunError::Generation(e.to_string())
    })?;
    let text = text.trim().to_string();
    if text.is_empty() {
        return Err(RunError::Generation("model returned an empty report".into()));
    }

    info!(chars = text.chars().count(), "Report generated");
    Ok(Report {
        text,
        item_count: collected.total(),
        generated_at: Utc::now(),
    })
}
