//! Run-level error taxonomy.
//!
//! Collector failures never show up here: they are absorbed at the collector
//! boundary. Everything in [`RunError`] ends the run with a non-zero exit code.

use std::process::ExitCode;
use thiserror::Error;

/// Boxed error used inside collectors and API wrappers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum RunError {
    /// Startup configuration is unusable (missing variables, bad YAML).
    #[error("configuration error: {0}")]
    Config(String),

    /// The generative API call failed; there is no report to deliver.
    #[error("report generation failed: {0}")]
    Generation(String),

    /// One or more chunks could not be delivered after bounded retries.
    #[error("delivery failed: {undelivered} of {total} message(s) not delivered: {reason}")]
    Delivery {
        undelivered: usize,
        total: usize,
        reason: String,
    },
}

impl RunError {
    /// Process exit code for this failure.
    pub fn exit_code(&self) -> ExitCode {
        match self {
            RunError::Config(_) => ExitCode::from(2),
            RunError::Generation(_) | RunError::Delivery { .. } => ExitCode::from(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivery_error_names_counts() {
        let e = RunError::Delivery {
            undelivered: 2,
            total: 3,
            reason: "HTTP 502".into(),
        };
        assert_eq!(
            e.to_string(),
            "delivery failed: 2 of 3 message(s) not delivered: HTTP 502"
        );
    }

    #[test]
    fn config_errors_use_distinct_exit_code() {
        assert_eq!(RunError::Config("x".into()).exit_code(), ExitCode::from(2));
        assert_eq!(RunError::Generation("x".into()).exit_code(), ExitCode::from(1));
    }
}
