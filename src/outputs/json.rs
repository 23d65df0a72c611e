//! JSON archive of generated reports.
//!
//! One file per run date, holding the report text and every item it was
//! generated from. A later run on the same date overwrites the file.

use crate::error::BoxError;
use crate::models::{Collected, Report};
use chrono::Local;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info, instrument};

#[derive(Serialize)]
struct ArchivedReport<'a> {
    report: &'a Report,
    sources: &'a Collected,
}

/// Write `report` and `collected` to `{archive_dir}/{YYYY-MM-DD}.json`.
///
/// The directory is created when missing; an existing file for the same
/// day is overwritten.
///
/// # Arguments
///
/// * `report` - The generated report
/// * `collected` - The source batches the report was built from
/// * `archive_dir` - Directory holding the archive files
///
/// # Returns
///
/// The path written, or the I/O or serialization error.
#[instrument(level = "info", skip_all, fields(archive_dir = %archive_dir))]
pub async fn write_report(
    report: &Report,
    collected: &Collected,
    archive_dir: &str,
) -> Result<PathBuf, BoxError> {
    let json = serde_json::to_string_pretty(&ArchivedReport {
        report,
        sources: collected,
    })?;

    if let Err(e) = fs::create_dir_all(archive_dir).await {
        error!(%archive_dir, error = %e, "Failed to create archive dir");
        return Err(e.into());
    }

    let date = report.generated_at.with_timezone(&Local).date_naive();
    let path = Path::new(archive_dir).join(format!("{date}.json"));
    fs::write(&path, json).await?;
    info!(path = %path.display(), "Wrote report archive");

    Ok(path)
}
