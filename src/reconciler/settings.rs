//! Tunables for one chat session.

use std::time::Duration;

use crate::stream::RevealSettings;

/// Greeting shown in a fresh or cleared conversation.
pub const DEFAULT_GREETING: &str = "Xin chào! Hãy gửi một tin nhắn để bắt đầu cuộc trò chuyện.";

/// Text of the bot placeholder before the first delta arrives.
pub const DEFAULT_PLACEHOLDER_TEXT: &str = "Đang suy nghĩ...";

/// Caption sent when the user attaches an image without typing anything.
pub const DEFAULT_FALLBACK_CAPTION: &str = "Hãy giới thiệu về";

/// Prefix of error bubbles.
pub const DEFAULT_ERROR_PREFIX: &str = "❌ Lỗi: ";

/// Inactivity window before a request is abandoned.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Backend user id when none is configured.
pub const DEFAULT_USER_ID: &str = "user111";

/// Settings for a [`ChatSession`](super::ChatSession).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatSettings {
    /// Sent as `user_id` with every chat request.
    pub user_id: String,
    /// Greeting bot message.
    pub greeting: String,
    /// Placeholder text shown until the first delta.
    pub placeholder_text: String,
    /// Caption substituted for an image-only send.
    pub fallback_caption: String,
    /// Prepended to the failure reason in error bubbles.
    pub error_prefix: String,
    /// No-data window; re-armed on every delta.
    pub timeout: Duration,
    /// Sends inside this window supersede each other. Zero disables it.
    pub debounce: Duration,
    /// Publish placeholder text every N deltas.
    pub update_every: usize,
    /// Pause after each published update.
    pub chunk_delay: Duration,
    /// Pacing for buffered replies.
    pub reveal: RevealSettings,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            user_id: DEFAULT_USER_ID.to_string(),
            greeting: DEFAULT_GREETING.to_string(),
            placeholder_text: DEFAULT_PLACEHOLDER_TEXT.to_string(),
            fallback_caption: DEFAULT_FALLBACK_CAPTION.to_string(),
            error_prefix: DEFAULT_ERROR_PREFIX.to_string(),
            timeout: DEFAULT_TIMEOUT,
            debounce: Duration::ZERO,
            update_every: 1,
            chunk_delay: Duration::ZERO,
            reveal: RevealSettings::default(),
        }
    }
}
