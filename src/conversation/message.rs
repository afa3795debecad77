//! Chat messages and id generation.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque message identifier, unique within a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    /// Wrap an existing identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    /// Typed or attached by the user.
    User,
    /// Produced by the backend.
    Bot,
    /// Failure surfaced to the user.
    Error,
}

/// A single chat bubble.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Unique identifier.
    pub id: MessageId,
    /// Author of the message.
    pub sender: Sender,
    /// Visible text.
    pub text: String,
    /// Local URI of an attached image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Image preview not yet sent, or bot placeholder still receiving.
    #[serde(default, rename = "isPending")]
    pub is_pending: bool,
}

impl Message {
    /// Create a finalized message.
    #[must_use]
    pub fn new(id: MessageId, sender: Sender, text: impl Into<String>) -> Self {
        Self {
            id,
            sender,
            text: text.into(),
            image: None,
            is_pending: false,
        }
    }

    /// Attach an image URI.
    #[must_use]
    pub fn with_image(mut self, uri: Option<String>) -> Self {
        self.image = uri;
        self
    }

    /// Mark the message as pending.
    #[must_use]
    pub fn pending(mut self) -> Self {
        self.is_pending = true;
        self
    }

    /// User bubble for an attached image that has not been sent yet.
    #[must_use]
    pub fn is_preview(&self) -> bool {
        self.sender == Sender::User && self.is_pending
    }

    /// Bot bubble still receiving text.
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        self.sender == Sender::Bot && self.is_pending
    }
}

/// Source of message identifiers.
///
/// Injected into the conversation so tests get deterministic ids and no
/// state is shared between sessions.
pub trait IdGenerator: Send + Sync + fmt::Debug {
    /// Produce an id that has never been returned before.
    fn next_id(&self) -> MessageId;
}

/// Random v4 UUID ids.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidIdGenerator;

impl IdGenerator for UuidIdGenerator {
    fn next_id(&self) -> MessageId {
        MessageId(Uuid::new_v4().to_string())
    }
}

/// Monotonic `prefix-N` ids.
#[derive(Debug)]
pub struct SequentialIdGenerator {
    prefix: String,
    next: AtomicU64,
}

impl SequentialIdGenerator {
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(1),
        }
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn next_id(&self) -> MessageId {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        MessageId(format!("{}-{n}", self.prefix))
    }
}
