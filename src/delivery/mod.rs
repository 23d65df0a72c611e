//! Report delivery to the chat-bot messaging API.
//!
//! The report is split into message-sized chunks by [`chunking`] and sent in
//! order to every destination chat. Each chunk gets a bounded number of
//! attempts; when a chunk still fails, the remaining chunks for that chat are
//! not sent and the undelivered chunk numbers are logged.
//!
//! # Submodules
//!
//! - [`chunking`]: Boundary-aware splitting under the per-message limit
//! - [`telegram`]: Telegram Bot API sender

pub mod chunking;
pub mod telegram;

use crate::config::DeliverySettings;
use crate::error::{BoxError, RunError};
use std::num::NonZeroUsize;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

/// Capability of sending one message to one chat.
pub trait Deliver {
    async fn send_message(&self, chat_id: &str, text: &str) -> Result<(), BoxError>;
}

/// Per-chunk retry policy.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Attempts per chunk, including the first.
    pub max_attempts: u8,
    /// Delay before the first retry; doubles on each further retry.
    pub base_delay: Duration,
}

impl From<&DeliverySettings> for RetryPolicy {
    fn from(s: &DeliverySettings) -> Self {
        Self {
            max_attempts: s.max_attempts.max(1),
            base_delay: Duration::from_millis(s.retry_delay_ms),
        }
    }
}

/// Send one chunk, retrying up to the policy's attempt limit.
async fn send_with_retry<D: Deliver>(
    sender: &D,
    chat_id: &str,
    text: &str,
    policy: RetryPolicy,
) -> Result<(), BoxError> {
    let mut attempt: u8 = 0;
    loop {
        attempt += 1;
        match sender.send_message(chat_id, text).await {
            Ok(()) => return Ok(()),
            Err(e) if attempt < policy.max_attempts => {
                let delay = policy.base_delay * (1u32 << (attempt - 1));
                warn!(%chat_id, attempt, ?delay, error = %e, "Send failed; retrying");
                sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Chunk `text` and send every chunk, in order, to every chat.
///
/// Chats are served one after another. A chunk that still fails after
/// `policy.max_attempts` attempts ends delivery to that chat only.
///
/// # Arguments
///
/// * `sender` - Transport used for every message
/// * `chat_ids` - Destination chats, each of which receives every chunk
/// * `text` - The report body in Telegram HTML
/// * `max_chars` - Per-message limit in characters
/// * `policy` - Attempts and backoff per chunk
///
/// # Returns
///
/// The number of chunks delivered across all chats, or
/// [`RunError::Delivery`] with the undelivered count when any chunk could
/// not be delivered.
#[instrument(level = "info", skip_all, fields(chats = chat_ids.len()))]
pub async fn deliver_report<D: Deliver>(
    sender: &D,
    chat_ids: &[String],
    text: &str,
    max_chars: NonZeroUsize,
    policy: RetryPolicy,
) -> Result<usize, RunError> {
    let chunks = chunking::split_chunks(text, max_chars);
    let total = chunks.len() * chat_ids.len();
    info!(chunks = chunks.len(), max_chars = max_chars.get(), "Report split into messages");

    let mut delivered = 0usize;
    let mut last_error = None;

    for chat_id in chat_ids {
        for (i, chunk) in chunks.iter().enumerate() {
            match send_with_retry(sender, chat_id, chunk, policy).await {
                Ok(()) => {
                    delivered += 1;
                    info!(%chat_id, part = i + 1, of = chunks.len(), "Delivered message");
                }
                Err(e) => {
                    let undelivered: Vec<usize> = (i + 1..=chunks.len()).collect();
                    error!(
                        %chat_id,
                        failed_part = i + 1,
                        of = chunks.len(),
                        ?undelivered,
                        error = %e,
                        "Giving up on chat; remaining parts not delivered"
                    );
                    last_error = Some(e.to_string());
                    break;
                }
            }
        }
    }

    match last_error {
        None => Ok(delivered),
        Some(reason) => Err(RunError::Delivery {
            undelivered: total - delivered,
            total,
            reason,
        }),
    }
}

#[cfg(test)]
pub(crate) mod stub {
    use super::*;
    use std::sync::Mutex;

    /// Sender that records every attempt and fails on request.
    #[derive(Default)]
    pub struct RecordingSender {
        pub sent: Mutex<Vec<(String, String)>>,
        pub attempts: Mutex<usize>,
        /// Fail every attempt whose 1-based number is listed here.
        pub fail_attempts: Vec<usize>,
    }

    impl RecordingSender {
        pub fn failing_on(attempts: &[usize]) -> Self {
            Self {
                fail_attempts: attempts.to_vec(),
                ..Default::default()
            }
        }

        pub fn attempts(&self) -> usize {
            *self.attempts.lock().unwrap()
        }

        pub fn sent_texts(&self) -> Vec<String> {
            self.sent.lock().unwrap().iter().map(|(_, t)| t.clone()).collect()
        }
    }

    impl Deliver for RecordingSender {
        async fn send_message(&self, chat_id: &str, text: &str) -> Result<(), BoxError> {
            let n = {
                let mut a = self.attempts.lock().unwrap();
                *a += 1;
                *a
            };
            if self.fail_attempts.contains(&n) {
                return Err(format!("HTTP 502 on attempt {n}").into());
            }
            self.sent
                .lock()
                .unwrap()
                .push((chat_id.to_string(), text.to_string()));
            Ok(())
        }
    }
}
