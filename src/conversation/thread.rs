//! The message list owned by one chat view.

use std::sync::Arc;

use super::{IdGenerator, Message, MessageId, Sender};

/// Ordered list of chat messages.
///
/// Messages are mutated in place by id. Removal only happens for an
/// abandoned bot placeholder, a replaced image preview, or a full reset.
#[derive(Debug, Clone)]
pub struct Conversation {
    messages: Vec<Message>,
    greeting: String,
    ids: Arc<dyn IdGenerator>,
}

impl Conversation {
    /// Start a conversation holding only the greeting bot message.
    pub fn new(greeting: impl Into<String>, ids: Arc<dyn IdGenerator>) -> Self {
        let mut conv = Self {
            messages: Vec::new(),
            greeting: greeting.into(),
            ids,
        };
        conv.reset();
        conv
    }

    /// All messages in display order.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Look up a message by id.
    #[must_use]
    pub fn get(&self, id: &MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| &m.id == id)
    }

    /// Replace everything with a fresh greeting.
    pub fn reset(&mut self) {
        let id = self.ids.next_id();
        self.messages = vec![Message::new(id, Sender::Bot, self.greeting.clone())];
    }

    /// Append a finalized user message.
    pub fn push_user(&mut self, text: impl Into<String>, image: Option<String>) -> MessageId {
        let id = self.ids.next_id();
        self.messages
            .push(Message::new(id.clone(), Sender::User, text).with_image(image));
        id
    }

    /// Show an attached image before it is sent. Any older preview is dropped.
    pub fn set_preview(&mut self, text: impl Into<String>, image_uri: impl Into<String>) -> MessageId {
        self.messages.retain(|m| !m.is_preview());
        let id = self.ids.next_id();
        self.messages.push(
            Message::new(id.clone(), Sender::User, text)
                .with_image(Some(image_uri.into()))
                .pending(),
        );
        id
    }

    /// Turn the preview into a sent message carrying `text`.
    ///
    /// Returns the preview id, or `None` when there was no preview.
    pub fn finalize_preview(&mut self, text: &str) -> Option<MessageId> {
        let msg = self.messages.iter_mut().find(|m| m.is_preview())?;
        msg.is_pending = false;
        msg.text = text.to_string();
        Some(msg.id.clone())
    }

    /// Append the pending bot bubble.
    pub fn push_placeholder(&mut self, text: impl Into<String>) -> MessageId {
        let id = self.ids.next_id();
        self.messages
            .push(Message::new(id.clone(), Sender::Bot, text).pending());
        id
    }

    /// Append an error bubble.
    pub fn push_error(&mut self, text: impl Into<String>) -> MessageId {
        let id = self.ids.next_id();
        self.messages.push(Message::new(id.clone(), Sender::Error, text));
        id
    }

    /// Replace the text of a message. Returns false if the id is unknown.
    pub fn set_text(&mut self, id: &MessageId, text: &str) -> bool {
        match self.messages.iter_mut().find(|m| &m.id == id) {
            Some(msg) => {
                if msg.text != text {
                    msg.text = text.to_string();
                }
                true
            }
            None => false,
        }
    }

    /// Clear the pending flag. Returns true only on the call that cleared it.
    pub fn finalize(&mut self, id: &MessageId) -> bool {
        match self.messages.iter_mut().find(|m| &m.id == id) {
            Some(msg) if msg.is_pending => {
                msg.is_pending = false;
                true
            }
            _ => false,
        }
    }

    /// Remove a message. Returns false if the id is unknown.
    pub fn remove(&mut self, id: &MessageId) -> bool {
        let before = self.messages.len();
        self.messages.retain(|m| &m.id != id);
        self.messages.len() != before
    }

    /// The bot bubble currently receiving text, if any.
    #[must_use]
    pub fn placeholder(&self) -> Option<&Message> {
        self.messages.iter().find(|m| m.is_placeholder())
    }

    /// The unsent image preview, if any.
    #[must_use]
    pub fn preview(&self) -> Option<&Message> {
        self.messages.iter().find(|m| m.is_preview())
    }
}
