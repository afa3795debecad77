//! Request and response bodies of the backend API.

use serde::{Deserialize, Serialize};

use crate::conversation::ImageFile;

// =============================================================================
// Chat
// =============================================================================

/// One `POST /chat/stream` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    /// Identifies the conversation owner on the backend.
    pub user_id: String,
    /// The effective message text (never empty).
    pub message: String,
    /// Optional image uploaded alongside the text.
    pub image: Option<ImageFile>,
}

// =============================================================================
// Transcription
// =============================================================================

/// Body returned by `POST /asr`.
#[derive(Debug, Clone, Deserialize)]
pub struct TranscriptionResponse {
    /// Recognized speech.
    pub text: String,
}

// =============================================================================
// Auth
// =============================================================================

/// `POST /auth/register` body.
#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub email: String,
    pub full_name: String,
    pub password: String,
}

/// `POST /auth/login` body.
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Token issued by login and register.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    /// Bearer token for subsequent calls.
    pub access_token: String,
    /// Usually `"bearer"`.
    pub token_type: String,
}

/// `GET /auth/me` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub full_name: String,
    pub created_at: String,
}

// =============================================================================
// Irrigation
// =============================================================================

/// `POST /irrigation/on` body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IrrigationOnRequest {
    /// Soil moisture percentage at which the pump stops (0-100).
    pub limit: u32,
}

/// Reply to a pump command. Only `message` is read; other fields are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PumpCommandResponse {
    #[serde(default)]
    pub message: Option<String>,
}

/// One watering run from `GET /irrigation/history`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrrigationSession {
    pub id: String,
    pub start_time: String,
    #[serde(default)]
    pub end_time: Option<String>,
    /// Run length in seconds, absent while the pump is still on.
    #[serde(default)]
    pub duration: Option<f64>,
    /// Moisture limit the run was started with.
    pub target: f64,
    /// `"auto"` or `"manual"`.
    pub source: String,
}

/// Totals over a watering history.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct IrrigationStats {
    pub total_sessions: usize,
    pub auto_sessions: usize,
    pub manual_sessions: usize,
    pub total_duration: f64,
    /// Rounded mean duration, 0 for an empty history.
    pub avg_duration: f64,
}

impl IrrigationStats {
    /// Summarise a history; runs without a duration count as zero.
    pub fn from_sessions(sessions: &[IrrigationSession]) -> Self {
        let total_sessions = sessions.len();
        let count = |source: &str| sessions.iter().filter(|s| s.source == source).count();
        let total_duration: f64 = sessions.iter().map(|s| s.duration.unwrap_or(0.0)).sum();
        #[allow(clippy::cast_precision_loss)]
        let avg_duration = if total_sessions == 0 {
            0.0
        } else {
            (total_duration / total_sessions as f64).round()
        };
        Self {
            total_sessions,
            auto_sessions: count("auto"),
            manual_sessions: count("manual"),
            total_duration,
            avg_duration,
        }
    }
}

// =============================================================================
// Blog
// =============================================================================

/// A post in the community feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub author: String,
    pub author_avatar: String,
    pub content: String,
    #[serde(default)]
    pub image: Option<String>,
    pub likes: u32,
    pub comments: u32,
    pub is_liked: bool,
    pub tag: String,
    pub created_at: String,
}

/// A post to publish. At least one of `content` and `image` must be set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPost {
    pub content: String,
    pub tag: String,
    pub image: Option<ImageFile>,
}

/// Error body used by the backend (`{"detail": "..."}`).
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ErrorDetail {
    pub detail: String,
}
