//! Generative-text API interaction with exponential backoff retry logic.
//!
//! # Architecture
//!
//! The module uses a trait-based design so the pipeline can run against a
//! stub in tests:
//! - [`AskAsync`]: Core trait defining async LLM interaction
//! - [`AnthropicClient`]: Calls the Anthropic Messages API
//! - [`RetryAsk`]: Decorator that adds retry logic to any `AskAsync` implementation
//!
//! # Retry Strategy
//!
//! - Bounded retry attempts (2 by default, configurable)
//! - Exponential backoff starting at 1 second
//! - Maximum delay capped at 30 seconds
//! - Random jitter (0-250ms) added to prevent thundering herd

use crate::config::GeneratorSettings;
use crate::error::BoxError;
use crate::utils::truncate_for_log;
use rand::{Rng, rng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration as StdDuration, Instant};
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Trait for async LLM interaction.
///
/// Implementors of this trait can send text to an LLM and receive a response.
/// This abstraction allows for different LLM backends or decorators (like retry logic).
pub trait AskAsync {
    /// The type of response returned by the LLM.
    type Response;

    /// Send text to the LLM and receive a response.
    async fn ask(&self, text: &str) -> Result<Self::Response, BoxError>;
}

/// Wrapper that adds exponential backoff retry logic to any [`AskAsync`] implementation.
///
/// The delay between retries follows this formula:
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
/// ```
pub struct RetryAsk<T> {
    /// The underlying LLM client to wrap.
    inner: T,
    /// Maximum number of retry attempts before giving up.
    max_retries: usize,
    /// Initial delay between retries (doubles with each attempt).
    base_delay: StdDuration,
    /// Maximum delay cap to prevent excessive waiting.
    max_delay: StdDuration,
}

impl<T> RetryAsk<T>
where
    T: AskAsync,
{
    /// Create a new retry wrapper around an existing [`AskAsync`] implementation.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let client = AnthropicClient::new(api_key, &settings)?;
    /// let retry_client = RetryAsk::new(client, 2, Duration::from_secs(1));
    /// ```
    pub fn new(inner: T, max_retries: usize, base_delay: StdDuration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: StdDuration::from_secs(30),
        }
    }
}

impl<T> fmt::Debug for RetryAsk<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryAsk")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T> AskAsync for RetryAsk<T>
where
    T: AskAsync + fmt::Debug,
{
    type Response = T::Response;

    #[instrument(level = "info", skip_all)]
    async fn ask(&self, text: &str) -> Result<Self::Response, BoxError> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            let attempt_t0 = Instant::now();
            match self.inner.ask(text).await {
                Ok(resp) => {
                    return Ok(resp);
                }
                Err(e) => {
                    attempt += 1;
                    let attempt_dt = attempt_t0.elapsed();
                    let total_dt = total_t0.elapsed();

                    if attempt > self.max_retries {
                        error!(
                            attempt,
                            max = self.max_retries,
                            elapsed_ms_attempt = attempt_dt.as_millis() as u64,
                            elapsed_ms_total = total_dt.as_millis() as u64,
                            error = %e,
                            "ask() exhausted retries"
                        );
                        return Err(e);
                    }

                    let mut delay = self.base_delay.saturating_mul(1 << (attempt - 1));
                    if delay > self.max_delay {
                        delay = self.max_delay;
                    }
                    let jitter_ms: u64 = rng().random_range(0..=250);
                    let delay = delay + StdDuration::from_millis(jitter_ms);

                    warn!(
                        attempt,
                        max = self.max_retries,
                        elapsed_ms_attempt = attempt_dt.as_millis() as u64,
                        elapsed_ms_total = total_dt.as_millis() as u64,
                        ?delay,
                        error = %e,
                        "ask() attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: [Message<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(rename = "type")]
    kind: String,
    message: String,
}

/// Client for the Anthropic Messages API that implements [`AskAsync`].
pub struct AnthropicClient {
    http: reqwest::Client,
    api_key: String,
    endpoint: String,
    model: String,
    max_tokens: u32,
}

impl fmt::Debug for AnthropicClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnthropicClient")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl AnthropicClient {
    pub fn new(api_key: String, settings: &GeneratorSettings) -> Result<Self, BoxError> {
        let http = reqwest::Client::builder()
            .connect_timeout(StdDuration::from_secs(10))
            .timeout(StdDuration::from_secs(settings.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            api_key,
            endpoint: format!("{}/v1/messages", settings.api_base.trim_end_matches('/')),
            model: settings.model.clone(),
            max_tokens: settings.max_tokens,
        })
    }
}

impl AskAsync for AnthropicClient {
    type Response = String;

    #[instrument(level = "info", skip_all, fields(model = %self.model))]
    async fn ask(&self, text: &str) -> Result<Self::Response, BoxError> {
        let t0 = Instant::now();
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            messages: [Message {
                role: "user",
                content: text,
            }],
        };

        let res = self
            .http
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await;
        let rsp = match res {
            Ok(rsp) => rsp,
            Err(e) => {
                warn!(elapsed_ms = t0.elapsed().as_millis() as u64, error = %e, "API call failed");
                return Err(e.into());
            }
        };

        let status = rsp.status();
        let raw = rsp.text().await?;
        if !status.is_success() {
            let reason = serde_json::from_str::<ErrorEnvelope>(&raw)
                .map(|env| format!("{}: {}", env.error.kind, env.error.message))
                .unwrap_or_else(|_| truncate_for_log(&raw, 300));
            warn!(elapsed_ms = t0.elapsed().as_millis() as u64, %status, %reason, "API returned error status");
            return Err(format!("HTTP {status}: {reason}").into());
        }

        let parsed: MessagesResponse = serde_json::from_str(&raw)?;
        let text = extract_text(&parsed);
        if parsed.stop_reason.as_deref() == Some("max_tokens") {
            warn!(max_tokens = self.max_tokens, "Response hit max_tokens; report may be cut short");
        }
        if let Some(usage) = &parsed.usage {
            info!(
                elapsed_ms = t0.elapsed().as_millis() as u64,
                input_tokens = usage.input_tokens,
                output_tokens = usage.output_tokens,
                "API call succeeded"
            );
        }
        if text.is_empty() {
            return Err("API returned no text content".into());
        }
        Ok(text)
    }
}

/// Join every text block of a response, trimmed.
fn extract_text(rsp: &MessagesResponse) -> String {
    rsp.content
        .iter()
        .filter(|b| b.kind == "text")
        .filter_map(|b| b.text.as_deref())
        .collect::<Vec<_>>()
        .join("")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct Flaky {
        failures_left: AtomicUsize,
        calls: AtomicUsize,
    }

    impl AskAsync for Flaky {
        type Response = String;

        async fn ask(&self, text: &str) -> Result<String, BoxError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failures_left.load(Ordering::SeqCst) > 0 {
                self.failures_left.fetch_sub(1, Ordering::SeqCst);
                return Err("timed out".into());
            }
            Ok(format!("echo: {text}"))
        }
    }

    fn flaky(failures: usize) -> Flaky {
        Flaky {
            failures_left: AtomicUsize::new(failures),
            calls: AtomicUsize::new(0),
        }
    }

    #[tokio::test]
    async fn retry_recovers_after_transient_failure() {
        let api = RetryAsk::new(flaky(1), 2, StdDuration::from_millis(10));
        assert_eq!(api.ask("hi").await.unwrap(), "echo: hi");
        assert_eq!(api.inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn retry_gives_up_after_max_retries() {
        let api = RetryAsk::new(flaky(10), 2, StdDuration::from_millis(10));
        let err = api.ask("hi").await.unwrap_err();
        assert_eq!(err.to_string(), "timed out");
        assert_eq!(api.inner.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn extract_text_joins_text_blocks() {
        let rsp: MessagesResponse = serde_json::from_str(
            r#"{"content":[{"type":"text","text":"  Hello "},{"type":"tool_use"},{"type":"text","text":"world  "}],
                "stop_reason":"end_turn","usage":{"input_tokens":10,"output_tokens":3}}"#,
        )
        .unwrap();
        assert_eq!(extract_text(&rsp), "Hello world");
    }

    #[test]
    fn request_body_matches_messages_api() {
        let body = MessagesRequest {
            model: "claude-haiku-4-5-20251001",
            max_tokens: 3500,
            messages: [Message {
                role: "user",
                content: "prompt",
            }],
        };
        let v = serde_json::to_value(&body).unwrap();
        assert_eq!(v["max_tokens"], 3500);
        assert_eq!(v["messages"][0]["role"], "user");
        assert_eq!(v["messages"][0]["content"], "prompt");
    }

    #[test]
    fn endpoint_is_built_from_api_base() {
        let settings = GeneratorSettings {
            api_base: "https://proxy.local/".into(),
            ..Default::default()
        };
        let c = AnthropicClient::new("key".into(), &settings).unwrap();
        assert_eq!(c.endpoint, "https://proxy.local/v1/messages");
        assert!(!format!("{c:?}").contains("api_key"));
    }
}
