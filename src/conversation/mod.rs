//! Conversation model: messages, ids and the pending image slot.
//!
//! A [`Conversation`] is the ordered message list owned by one chat view.
//! It knows nothing about the network; the reconciler drives it.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use durian_chat::conversation::{Conversation, Sender, SequentialIdGenerator};
//!
//! let mut conv = Conversation::new("Xin chào!", Arc::new(SequentialIdGenerator::new("m")));
//! conv.push_user("Sầu riêng bao lâu ra quả?", None);
//!
//! assert_eq!(conv.messages().len(), 2);
//! assert_eq!(conv.messages()[1].sender, Sender::User);
//! ```

mod image;
mod message;
mod thread;

pub use image::{ImageFile, PendingImage};
pub use message::{
    IdGenerator, Message, MessageId, Sender, SequentialIdGenerator, UuidIdGenerator,
};
pub use thread::Conversation;
