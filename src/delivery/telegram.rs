//! Telegram Bot API sender.
//!
//! Posts to `{api_base}/bot{token}/sendMessage` with HTML parse mode and
//! link previews disabled. A response is a success only when the HTTP status
//! is 2xx and the body carries `"ok": true`.

use super::Deliver;
use crate::config::DeliverySettings;
use crate::error::BoxError;
use crate::utils::truncate_for_log;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, instrument};

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
    disable_web_page_preview: bool,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    result: Option<SentMessage>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
}

pub struct TelegramSender {
    http: reqwest::Client,
    endpoint: String,
}

impl fmt::Debug for TelegramSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The endpoint embeds the bot token.
        f.debug_struct("TelegramSender").finish_non_exhaustive()
    }
}

impl TelegramSender {
    pub fn new(bot_token: &str, settings: &DeliverySettings) -> Result<Self, BoxError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            endpoint: send_message_url(&settings.api_base, bot_token),
        })
    }
}

fn send_message_url(api_base: &str, bot_token: &str) -> String {
    format!("{}/bot{bot_token}/sendMessage", api_base.trim_end_matches('/'))
}

/// Interpret a `sendMessage` reply.
fn check_response(status: reqwest::StatusCode, raw: &str) -> Result<i64, BoxError> {
    match serde_json::from_str::<ApiResponse>(raw) {
        Ok(ApiResponse {
            ok: true,
            result: Some(msg),
            ..
        }) if status.is_success() => Ok(msg.message_id),
        Ok(ApiResponse { description, .. }) => Err(format!(
            "HTTP {status}: {}",
            description.unwrap_or_else(|| "request rejected".into())
        )
        .into()),
        Err(_) => Err(format!("HTTP {status}: {}", truncate_for_log(raw, 200)).into()),
    }
}

impl Deliver for TelegramSender {
    #[instrument(level = "debug", skip(self, text), fields(chars = text.chars().count()))]
    async fn send_message(&self, chat_id: &str, text: &str) -> Result<(), BoxError> {
        let body = SendMessage {
            chat_id,
            text,
            parse_mode: "HTML",
            disable_web_page_preview: true,
        };
        // reqwest errors carry the request URL, which holds the token.
        let rsp = self
            .http
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| e.without_url())?;
        let status = rsp.status();
        let raw = rsp.text().await.map_err(|e| e.without_url())?;
        let message_id = check_response(status, &raw)?;
        debug!(message_id, "Message accepted");
        Ok(())
    }
}
