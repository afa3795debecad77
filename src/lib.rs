//! Durian Consultant Chat Client
//!
//! Client core for a conversational assistant about durian cultivation. A
//! user sends text and optional images; the backend replies with text that
//! arrives incrementally and is rendered as it streams in.
//!
//! # Architecture
//!
//! - **Conversation**: ordered message list with optimistic user messages and a pending bot placeholder
//! - **Stream**: one delta pipeline for SSE, chunked and buffered replies
//! - **Reconciler**: the send cycle with cancellation, inactivity timeout and stale-update protection
//! - **API**: multipart chat, speech-to-text, auth, irrigation and blog calls over HTTP
//!
//! # Modules
//!
//! - [`api`]: HTTP client and the [`api::ChatBackend`] seam
//! - [`config`]: layered CLI/env/file configuration
//! - [`conversation`]: message model and list mutations
//! - [`reconciler`]: [`ChatSession`] and its send cycle
//! - [`stream`]: response shapes, decoders and the text accumulator

// Allow pedantic clippy warnings that don't add value for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::multiple_crate_versions)]

pub mod api;
pub mod config;
pub mod conversation;
pub mod error;
pub mod reconciler;
pub mod stream;

pub use error::{Error, Result};
pub use reconciler::{ChatSession, ChatSettings, Phase, SendOutcome, Snapshot};
