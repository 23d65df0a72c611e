//! Command-line interface definitions for the weekly brief.
//!
//! Credentials are read from the environment, not from flags; see
//! [`crate::config`].

use clap::Parser;

/// Command-line arguments for one run.
///
/// # Examples
///
/// ```sh
/// # Collect, generate and deliver
/// ai_weekly_brief
///
/// # Generate and print the report without sending it
/// ai_weekly_brief --test
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Generate the report and print it to stdout instead of delivering it
    #[arg(long)]
    pub test: bool,
}
