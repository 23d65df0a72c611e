//! Run configuration: secrets from the environment, tuning from optional YAML.
//!
//! Secrets are read once at startup. Every tuning knob has a default, so the
//! YAML file only needs to list what it overrides:
//!
//! ```yaml
//! generator:
//!   model: claude-haiku-4-5-20251001
//!   language: English
//! collectors:
//!   timeout_secs: 6
//!   reddit:
//!     subreddits: [LocalLLaMA, MachineLearning]
//!     max_items: 8
//! delivery:
//!   max_message_chars: 3500
//! archive_dir: ./reports
//! ```

use crate::error::RunError;
use serde::Deserialize;
use std::num::NonZeroUsize;
use std::path::Path;
use tracing::{debug, info, instrument};

pub const ENV_API_KEY: &str = "ANTHROPIC_API_KEY";
pub const ENV_BOT_TOKEN: &str = "TELEGRAM_BOT_TOKEN";
pub const ENV_CHAT_ID: &str = "TELEGRAM_CHAT_ID";
pub const ENV_CONFIG_PATH: &str = "AI_BRIEF_CONFIG";

/// Telegram's hard per-message limit.
const TELEGRAM_MAX_MESSAGE_CHARS: usize = 4096;
const DEFAULT_MAX_MESSAGE_CHARS: NonZeroUsize = NonZeroUsize::new(4000).unwrap();
/// Collectors are expected to answer within single-digit seconds.
const MAX_COLLECTOR_TIMEOUT_SECS: u64 = 9;

/// Credentials and destinations, all required.
#[derive(Clone)]
pub struct Secrets {
    pub anthropic_api_key: String,
    pub telegram_bot_token: String,
    /// One or more destination chats, from a comma-separated variable.
    pub telegram_chat_ids: Vec<String>,
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets")
            .field("anthropic_api_key", &"<redacted>")
            .field("telegram_bot_token", &"<redacted>")
            .field("telegram_chat_ids", &self.telegram_chat_ids)
            .finish()
    }
}

impl Secrets {
    /// Read secrets from the process environment.
    pub fn from_env() -> Result<Self, RunError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read secrets through `lookup`, naming every missing variable at once.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, RunError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api_key = get(ENV_API_KEY);
        let bot_token = get(ENV_BOT_TOKEN);
        let chat_ids: Vec<String> = get(ENV_CHAT_ID)
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        let mut missing = Vec::new();
        if api_key.is_none() {
            missing.push(ENV_API_KEY);
        }
        if bot_token.is_none() {
            missing.push(ENV_BOT_TOKEN);
        }
        if chat_ids.is_empty() {
            missing.push(ENV_CHAT_ID);
        }

        match (api_key, bot_token) {
            (Some(anthropic_api_key), Some(telegram_bot_token)) if missing.is_empty() => Ok(Self {
                anthropic_api_key,
                telegram_bot_token,
                telegram_chat_ids: chat_ids,
            }),
            _ => Err(RunError::Config(format!(
                "missing required environment variable(s): {}",
                missing.join(", ")
            ))),
        }
    }
}

/// Tuning for the whole run. Deserialized from YAML; all fields optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub generator: GeneratorSettings,
    pub collectors: CollectorSettings,
    pub delivery: DeliverySettings,
    /// When set, each generated report is also written here as JSON.
    pub archive_dir: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeneratorSettings {
    pub api_base: String,
    pub model: String,
    pub max_tokens: u32,
    /// Language the report is written in.
    pub language: String,
    pub timeout_secs: u64,
    /// Retries after the first failed attempt.
    pub max_retries: usize,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            api_base: "https://api.anthropic.com".into(),
            model: "claude-haiku-4-5-20251001".into(),
            max_tokens: 3500,
            language: "Traditional Chinese (zh-TW)".into(),
            timeout_secs: 60,
            max_retries: 2,
        }
    }
}

/// Collector tuning. Each field, including each field of a feed, can be
/// overridden on its own; the rest keep their per-source defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(from = "CollectorOverrides")]
pub struct CollectorSettings {
    /// Per-request timeout for every collector, in seconds (1-9).
    pub timeout_secs: u64,
    pub user_agent: String,
    pub accept_language: String,
    pub reddit: RedditSettings,
    pub product_hunt: FeedSettings,
    pub portal_a: FeedSettings,
    pub portal_b: FeedSettings,
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 8,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36"
                .into(),
            accept_language: "zh-TW,zh;q=0.9,en-US;q=0.8".into(),
            reddit: RedditSettings::default(),
            product_hunt: FeedSettings {
                url: "https://www.producthunt.com/feed".into(),
                max_items: 6,
                ai_filter: true,
            },
            portal_a: FeedSettings {
                url: "https://www.jiqizhixin.com/rss".into(),
                max_items: 4,
                ai_filter: false,
            },
            portal_b: FeedSettings {
                url: "https://www.qbitai.com/feed".into(),
                max_items: 3,
                ai_filter: false,
            },
        }
    }
}

/// The `collectors` section as written in YAML.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CollectorOverrides {
    timeout_secs: Option<u64>,
    user_agent: Option<String>,
    accept_language: Option<String>,
    reddit: RedditSettings,
    product_hunt: FeedOverrides,
    portal_a: FeedOverrides,
    portal_b: FeedOverrides,
}

impl From<CollectorOverrides> for CollectorSettings {
    fn from(o: CollectorOverrides) -> Self {
        let d = Self::default();
        Self {
            timeout_secs: o.timeout_secs.unwrap_or(d.timeout_secs),
            user_agent: o.user_agent.unwrap_or(d.user_agent),
            accept_language: o.accept_language.unwrap_or(d.accept_language),
            reddit: o.reddit,
            product_hunt: o.product_hunt.over(d.product_hunt),
            portal_a: o.portal_a.over(d.portal_a),
            portal_b: o.portal_b.over(d.portal_b),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RedditSettings {
    pub base_url: String,
    pub subreddits: Vec<String>,
    /// Posts requested per subreddit.
    pub per_subreddit: u32,
    /// Cap across all subreddits after ranking.
    pub max_items: usize,
}

impl Default for RedditSettings {
    fn default() -> Self {
        Self {
            base_url: "https://www.reddit.com".into(),
            subreddits: ["artificial", "MachineLearning", "LocalLLaMA", "ChatGPT", "singularity"]
                .into_iter()
                .map(String::from)
                .collect(),
            per_subreddit: 5,
            max_items: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FeedSettings {
    pub url: String,
    pub max_items: usize,
    /// Keep only entries that mention an AI keyword.
    pub ai_filter: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FeedOverrides {
    url: Option<String>,
    max_items: Option<usize>,
    ai_filter: Option<bool>,
}

impl FeedOverrides {
    fn over(self, base: FeedSettings) -> FeedSettings {
        FeedSettings {
            url: self.url.unwrap_or(base.url),
            max_items: self.max_items.unwrap_or(base.max_items),
            ai_filter: self.ai_filter.unwrap_or(base.ai_filter),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DeliverySettings {
    pub api_base: String,
    /// Per-message limit in characters. Telegram rejects anything over 4096.
    pub max_message_chars: NonZeroUsize,
    /// Attempts per chunk, including the first.
    pub max_attempts: u8,
    /// Delay before the first retry of a chunk; doubles per retry.
    pub retry_delay_ms: u64,
    pub timeout_secs: u64,
}

impl Default for DeliverySettings {
    fn default() -> Self {
        Self {
            api_base: "https://api.telegram.org".into(),
            max_message_chars: DEFAULT_MAX_MESSAGE_CHARS,
            max_attempts: 2,
            retry_delay_ms: 500,
            timeout_secs: 15,
        }
    }
}

impl Settings {
    /// Load settings from the file named by `AI_BRIEF_CONFIG`, or defaults.
    #[instrument(level = "info")]
    pub async fn load() -> Result<Self, RunError> {
        match std::env::var(ENV_CONFIG_PATH) {
            Ok(path) if !path.trim().is_empty() => Self::from_file(path.trim()).await,
            _ => {
                debug!("No config file set; using defaults");
                Ok(Self::default())
            }
        }
    }

    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, RunError> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            RunError::Config(format!("cannot read config file {}: {e}", path.display()))
        })?;
        let settings = Self::from_yaml(&raw)
            .map_err(|e| RunError::Config(format!("{}: {e}", path.display())))?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(settings)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, RunError> {
        let settings: Settings = if raw.trim().is_empty() {
            Settings::default()
        } else {
            serde_yaml::from_str(raw).map_err(|e| RunError::Config(format!("invalid YAML: {e}")))?
        };
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), RunError> {
        let limit = self.delivery.max_message_chars.get();
        if limit > TELEGRAM_MAX_MESSAGE_CHARS {
            return Err(RunError::Config(format!(
                "delivery.max_message_chars must be between 1 and {TELEGRAM_MAX_MESSAGE_CHARS}, got {limit}"
            )));
        }
        if self.delivery.max_attempts == 0 {
            return Err(RunError::Config("delivery.max_attempts must be at least 1".into()));
        }
        let timeout = self.collectors.timeout_secs;
        if !(1..=MAX_COLLECTOR_TIMEOUT_SECS).contains(&timeout) {
            return Err(RunError::Config(format!(
                "collectors.timeout_secs must be between 1 and {MAX_COLLECTOR_TIMEOUT_SECS}, got {timeout}"
            )));
        }
        if self.generator.timeout_secs == 0 {
            return Err(RunError::Config("generator.timeout_secs must be at least 1".into()));
        }
        if self.delivery.timeout_secs == 0 {
            return Err(RunError::Config("delivery.timeout_secs must be at least 1".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn secrets_name_every_missing_variable() {
        let err = Secrets::from_lookup(lookup(&[(ENV_BOT_TOKEN, "tok")])).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains(ENV_API_KEY));
        assert!(msg.contains(ENV_CHAT_ID));
        assert!(!msg.contains(ENV_BOT_TOKEN));
    }

    #[test]
    fn blank_values_count_as_missing() {
        let err = Secrets::from_lookup(lookup(&[
            (ENV_API_KEY, "  "),
            (ENV_BOT_TOKEN, "tok"),
            (ENV_CHAT_ID, " , "),
        ]))
        .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains(ENV_API_KEY));
        assert!(msg.contains(ENV_CHAT_ID));
    }

    #[test]
    fn chat_ids_split_on_commas() {
        let s = Secrets::from_lookup(lookup(&[
            (ENV_API_KEY, "key"),
            (ENV_BOT_TOKEN, "tok"),
            (ENV_CHAT_ID, "112966076, 987654321,"),
        ]))
        .unwrap();
        assert_eq!(s.telegram_chat_ids, vec!["112966076", "987654321"]);
    }

    #[test]
    fn debug_redacts_credentials() {
        let s = Secrets::from_lookup(lookup(&[
            (ENV_API_KEY, "sk-secret"),
            (ENV_BOT_TOKEN, "123:abc"),
            (ENV_CHAT_ID, "1"),
        ]))
        .unwrap();
        let dbg = format!("{s:?}");
        assert!(!dbg.contains("sk-secret"));
        assert!(!dbg.contains("123:abc"));
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let raw = r#"
generator:
  language: English
collectors:
  reddit:
    subreddits: [LocalLLaMA]
delivery:
  max_message_chars: 3000
archive_dir: ./reports
"#;
        let s = Settings::from_yaml(raw).unwrap();
        assert_eq!(s.generator.language, "English");
        assert_eq!(s.generator.max_tokens, 3500);
        assert_eq!(s.collectors.reddit.subreddits, vec!["LocalLLaMA"]);
        assert_eq!(s.collectors.reddit.max_items, 10);
        assert_eq!(s.collectors.portal_b.max_items, 3);
        assert_eq!(s.delivery.max_message_chars.get(), 3000);
        assert_eq!(s.archive_dir.as_deref(), Some("./reports"));
    }

    #[test]
    fn empty_yaml_is_defaults() {
        let s = Settings::from_yaml("").unwrap();
        assert_eq!(s.delivery.max_message_chars.get(), 4000);
        assert!(s.collectors.product_hunt.ai_filter);
    }

    #[test]
    fn oversized_message_limit_is_rejected() {
        let err = Settings::from_yaml("delivery:\n  max_message_chars: 5000\n").unwrap_err();
        assert!(err.to_string().contains("max_message_chars"));
    }

    #[test]
    fn zero_message_limit_is_rejected() {
        assert!(Settings::from_yaml("delivery:\n  max_message_chars: 0\n").is_err());
    }

    #[test]
    fn single_feed_field_override_keeps_other_defaults() {
        let s = Settings::from_yaml("collectors:\n  product_hunt:\n    max_items: 3\n").unwrap();
        let ph = &s.collectors.product_hunt;
        assert_eq!(ph.max_items, 3);
        assert_eq!(ph.url, "https://www.producthunt.com/feed");
        assert!(ph.ai_filter);
        assert_eq!(s.collectors.portal_a.max_items, 4);
        assert_eq!(s.collectors.timeout_secs, 8);
    }

    #[test]
    fn feed_url_override_keeps_cap_and_filter() {
        let s = Settings::from_yaml("collectors:\n  portal_b:\n    url: http://127.0.0.1:8080/feed\n  timeout_secs: 5\n")
            .unwrap();
        assert_eq!(s.collectors.portal_b.url, "http://127.0.0.1:8080/feed");
        assert_eq!(s.collectors.portal_b.max_items, 3);
        assert!(!s.collectors.portal_b.ai_filter);
        assert_eq!(s.collectors.timeout_secs, 5);
    }

    #[test]
    fn collector_timeout_must_be_single_digit() {
        let err = Settings::from_yaml("collectors:\n  timeout_secs: 60\n").unwrap_err();
        assert!(err.to_string().contains("collectors.timeout_secs"));
        assert!(Settings::from_yaml("collectors:\n  timeout_secs: 0\n").is_err());
        assert!(Settings::from_yaml("collectors:\n  timeout_secs: 9\n").is_ok());
    }

    #[test]
    fn zero_api_timeouts_are_rejected() {
        let err = Settings::from_yaml("generator:\n  timeout_secs: 0\n").unwrap_err();
        assert!(err.to_string().contains("generator.timeout_secs"));
        let err = Settings::from_yaml("delivery:\n  timeout_secs: 0\n").unwrap_err();
        assert!(err.to_string().contains("delivery.timeout_secs"));
    }
}
