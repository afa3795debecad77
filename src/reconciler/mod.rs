//! Streaming response reconciler.
//!
//! A [`ChatSession`] owns one conversation view and runs the send/receive
//! cycle against a [`ChatBackend`]:
//!
//! 1. Reject the send if a cycle is already active
//! 2. Append the user message (or finalize the image preview)
//! 3. Append a pending bot placeholder
//! 4. Open the request and merge every delta into the placeholder
//! 5. Finalize the placeholder, or replace it with an error bubble
//!
//! Per cycle: `Idle → Sending → Streaming → {Completed | Failed | TimedOut} → Idle`.
//! Only one cycle is ever active. Every placeholder mutation carries the
//! cycle's [`RequestToken`]; updates from a cycle that is no longer current
//! are dropped.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use durian_chat::api::Client;
//! use durian_chat::reconciler::{ChatSession, ChatSettings, SendOutcome};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Client::new("http://localhost:8000")?;
//! let session = ChatSession::new(Arc::new(client), ChatSettings::default());
//!
//! session.set_draft("Sầu riêng bao lâu ra quả?");
//! if let SendOutcome::Completed(id) = session.send().await {
//!     let reply = session.messages().into_iter().find(|m| m.id == id);
//!     println!("{:?}", reply.map(|m| m.text));
//! }
//! # Ok(())
//! # }
//! ```

mod settings;

pub use settings::{
    ChatSettings, DEFAULT_ERROR_PREFIX, DEFAULT_FALLBACK_CAPTION, DEFAULT_GREETING,
    DEFAULT_PLACEHOLDER_TEXT, DEFAULT_TIMEOUT, DEFAULT_USER_ID,
};

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::StreamExt;
use serde::Serialize;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::{ChatBackend, ChatRequest};
use crate::conversation::{
    Conversation, IdGenerator, Message, MessageId, PendingImage, UuidIdGenerator,
};
use crate::error::{Error, Result};
use crate::stream::Accumulator;

/// Where the current send cycle is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// No request in flight.
    #[default]
    Idle,
    /// Request issued, waiting for the response to open.
    Sending,
    /// Receiving deltas.
    Streaming,
}

/// How a call to [`ChatSession::send`] ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Reply finalized in the placeholder with this id.
    Completed(MessageId),
    /// Transport, status, empty-body or abort failure; an error bubble was added.
    Failed(String),
    /// No data inside the timeout window; an error bubble was added.
    TimedOut,
    /// Nothing to send.
    Empty,
    /// Another cycle was already active.
    Busy,
    /// A later send inside the debounce window replaced this one.
    Superseded,
}

/// Identifies one send cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestToken(u64);

/// Conversation state published after every mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    /// Messages in display order.
    pub messages: Vec<Message>,
    /// Current cycle phase.
    pub phase: Phase,
}

impl Snapshot {
    /// Whether a reply is being fetched.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.phase != Phase::Idle
    }
}

#[derive(Debug)]
struct InFlight {
    token: RequestToken,
    placeholder: MessageId,
    cancel: CancellationToken,
}

#[derive(Debug)]
struct State {
    conversation: Conversation,
    draft: String,
    pending_image: Option<PendingImage>,
    phase: Phase,
    in_flight: Option<InFlight>,
    next_token: u64,
    debounce_generation: u64,
}

/// Everything `run` needs for one cycle.
struct Cycle {
    token: RequestToken,
    cancel: CancellationToken,
    request: ChatRequest,
}

/// One conversation view plus its in-flight request.
#[derive(Debug)]
pub struct ChatSession {
    backend: Arc<dyn ChatBackend>,
    settings: ChatSettings,
    state: Mutex<State>,
    updates: watch::Sender<Snapshot>,
}

impl ChatSession {
    /// Create a session with random message ids.
    pub fn new(backend: Arc<dyn ChatBackend>, settings: ChatSettings) -> Self {
        Self::with_id_generator(backend, settings, Arc::new(UuidIdGenerator))
    }

    /// Create a session with an explicit id generator.
    pub fn with_id_generator(
        backend: Arc<dyn ChatBackend>,
        settings: ChatSettings,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        let conversation = Conversation::new(settings.greeting.clone(), ids);
        let (updates, _) = watch::channel(Snapshot {
            messages: conversation.messages().to_vec(),
            phase: Phase::Idle,
        });

        Self {
            backend,
            settings,
            state: Mutex::new(State {
                conversation,
                draft: String::new(),
                pending_image: None,
                phase: Phase::Idle,
                in_flight: None,
                next_token: 0,
                debounce_generation: 0,
            }),
            updates,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // View state
    // ─────────────────────────────────────────────────────────────────────────

    #[must_use]
    pub fn settings(&self) -> &ChatSettings {
        &self.settings
    }

    /// Copy of the current message list.
    #[must_use]
    pub fn messages(&self) -> Vec<Message> {
        self.lock().conversation.messages().to_vec()
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.lock().phase
    }

    /// Whether a reply is being fetched.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.phase() != Phase::Idle
    }

    /// Receive a [`Snapshot`] after every conversation change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.updates.subscribe()
    }

    #[must_use]
    pub fn draft(&self) -> String {
        self.lock().draft.clone()
    }

    /// Replace the input box content.
    pub fn set_draft(&self, text: impl Into<String>) {
        self.lock().draft = text.into();
    }

    #[must_use]
    pub fn pending_image(&self) -> Option<PendingImage> {
        self.lock().pending_image.clone()
    }

    /// Attach an image to the next send and show its preview bubble.
    ///
    /// Returns false, leaving everything untouched, while a reply is in flight.
    pub fn attach_image(&self, image: PendingImage) -> bool {
        let mut state = self.lock();
        if state.phase != Phase::Idle {
            return false;
        }
        let caption = state.draft.trim().to_string();
        state.conversation.set_preview(caption, image.uri.clone());
        debug!(name: "chat.image.attached", file = %image.file.name, "Image attached");
        state.pending_image = Some(image);
        self.publish(&state);
        true
    }

    /// Reset to the greeting. Refused while a reply is in flight.
    pub fn clear(&self) -> bool {
        let mut state = self.lock();
        if state.phase != Phase::Idle {
            return false;
        }
        state.conversation.reset();
        state.draft.clear();
        state.pending_image = None;
        self.publish(&state);
        info!(name: "chat.cleared", "Conversation cleared");
        true
    }

    /// Abort the in-flight request. Returns false if there is none.
    pub fn cancel(&self) -> bool {
        let state = self.lock();
        match &state.in_flight {
            Some(in_flight) => {
                in_flight.cancel.cancel();
                info!(name: "chat.send.cancel", token = in_flight.token.0, "Cancel requested");
                true
            }
            None => false,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Send cycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Send the current draft and pending image.
    pub async fn send(&self) -> SendOutcome {
        self.dispatch(None).await
    }

    /// Send `text` instead of the draft, together with any pending image.
    ///
    /// An empty `text` falls back to the draft.
    pub async fn send_text(&self, text: impl Into<String>) -> SendOutcome {
        self.dispatch(Some(text.into())).await
    }

    async fn dispatch(&self, override_text: Option<String>) -> SendOutcome {
        if self.is_loading() {
            debug!(name: "chat.send.rejected", "Send ignored while a reply is in flight");
            return SendOutcome::Busy;
        }

        if !self.settings.debounce.is_zero() {
            let generation = {
                let mut state = self.lock();
                state.debounce_generation += 1;
                state.debounce_generation
            };
            tokio::time::sleep(self.settings.debounce).await;
            if self.lock().debounce_generation != generation {
                debug!(name: "chat.send.superseded", "Send replaced by a later one");
                return SendOutcome::Superseded;
            }
        }

        let cycle = match self.begin(override_text) {
            Ok(cycle) => cycle,
            Err(outcome) => return outcome,
        };

        let mut guard = CycleGuard {
            session: self,
            token: cycle.token,
            armed: true,
        };
        let result = self.run(cycle.token, cycle.request, &cycle.cancel).await;
        guard.armed = false;

        self.finish(cycle.token, result)
    }

    /// Apply the optimistic mutations and register the in-flight cycle.
    fn begin(&self, override_text: Option<String>) -> std::result::Result<Cycle, SendOutcome> {
        let mut state = self.lock();
        if state.phase != Phase::Idle {
            return Err(SendOutcome::Busy);
        }

        let typed = override_text
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| state.draft.trim().to_string());
        let has_image = state.pending_image.is_some();
        if typed.is_empty() && !has_image {
            return Err(SendOutcome::Empty);
        }

        let message = if typed.is_empty() {
            self.settings.fallback_caption.clone()
        } else {
            typed
        };
        let image = state.pending_image.take();

        if state.conversation.finalize_preview(&message).is_none() {
            let uri = image.as_ref().map(|i| i.uri.clone());
            state.conversation.push_user(message.clone(), uri);
        }
        state.draft.clear();

        let placeholder = state
            .conversation
            .push_placeholder(self.settings.placeholder_text.clone());
        state.next_token += 1;
        let token = RequestToken(state.next_token);
        let cancel = CancellationToken::new();
        state.in_flight = Some(InFlight {
            token,
            placeholder,
            cancel: cancel.clone(),
        });
        state.phase = Phase::Sending;
        self.publish(&state);

        info!(
            name: "chat.send.start",
            token = token.0,
            chars = message.chars().count(),
            has_image = image.is_some(),
            "Sending chat message"
        );

        Ok(Cycle {
            token,
            cancel,
            request: ChatRequest {
                user_id: self.settings.user_id.clone(),
                message,
                image: image.map(|i| i.file),
            },
        })
    }

    /// Network part of the cycle. Returns the full reply text.
    async fn run(
        &self,
        token: RequestToken,
        request: ChatRequest,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let window = self.settings.timeout;
        let mut deadline = Instant::now() + window;

        let body = self
            .guarded(cancel, deadline, self.backend.open(request))
            .await??;
        let shape = body.shape();
        self.set_phase(token, Phase::Streaming)?;
        debug!(name: "chat.stream.open", token = token.0, shape = shape.as_str(), "Reply stream opened");

        let mut deltas = body.into_deltas(self.settings.reveal);
        let mut acc = Accumulator::new();
        let update_every = self.settings.update_every.max(1);
        let mut unpublished = 0usize;

        while let Some(delta) = self.guarded(cancel, deadline, deltas.next()).await? {
            acc.push(&delta?);
            deadline = Instant::now() + window;
            unpublished += 1;

            if unpublished >= update_every {
                unpublished = 0;
                self.apply_text(token, acc.as_str())?;
                if !self.settings.chunk_delay.is_zero() {
                    self.guarded(cancel, deadline, tokio::time::sleep(self.settings.chunk_delay))
                        .await?;
                }
            }
        }

        if acc.is_empty() {
            return Err(Error::EmptyResponse);
        }
        debug!(
            name: "chat.stream.end",
            token = token.0,
            shape = shape.as_str(),
            deltas = acc.delta_count(),
            "Reply stream ended"
        );
        Ok(acc.into_string())
    }

    /// Race `fut` against cancellation and the inactivity deadline.
    async fn guarded<F: Future>(
        &self,
        cancel: &CancellationToken,
        deadline: Instant,
        fut: F,
    ) -> Result<F::Output> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(Error::Aborted),
            () = tokio::time::sleep_until(deadline) => Err(Error::Timeout(self.settings.timeout)),
            out = fut => Ok(out),
        }
    }

    /// Terminal mutation of the cycle; runs exactly once per token.
    fn finish(&self, token: RequestToken, result: Result<String>) -> SendOutcome {
        let mut state = self.lock();
        let Some(in_flight) = state.in_flight.take_if(|f| f.token == token) else {
            warn!(name: "chat.send.stale", token = token.0, "Cycle already finished");
            return SendOutcome::Failed(Error::Aborted.to_string());
        };

        let outcome = match result {
            Ok(text) => {
                state.conversation.set_text(&in_flight.placeholder, &text);
                if !state.conversation.finalize(&in_flight.placeholder) {
                    warn!(name: "chat.send.finalized_twice", token = token.0, "Placeholder was not pending");
                }
                info!(
                    name: "chat.send.completed",
                    token = token.0,
                    chars = text.chars().count(),
                    "Reply completed"
                );
                SendOutcome::Completed(in_flight.placeholder)
            }
            Err(e) => {
                state.conversation.remove(&in_flight.placeholder);
                state
                    .conversation
                    .push_error(format!("{}{e}", self.settings.error_prefix));
                if e.is_timeout() {
                    warn!(name: "chat.send.timeout", token = token.0, error = %e, "Reply timed out");
                    SendOutcome::TimedOut
                } else {
                    warn!(name: "chat.send.failed", token = token.0, error = %e, "Reply failed");
                    SendOutcome::Failed(e.to_string())
                }
            }
        };

        state.phase = Phase::Idle;
        self.publish(&state);
        outcome
    }

    fn set_phase(&self, token: RequestToken, phase: Phase) -> Result<()> {
        let mut state = self.lock();
        if !is_current(&state, token) {
            return Err(Error::Aborted);
        }
        state.phase = phase;
        self.publish(&state);
        Ok(())
    }

    /// Replace the placeholder text, unless the cycle is no longer current.
    fn apply_text(&self, token: RequestToken, text: &str) -> Result<()> {
        let mut state = self.lock();
        let Some(placeholder) = state
            .in_flight
            .as_ref()
            .filter(|f| f.token == token)
            .map(|f| f.placeholder.clone())
        else {
            debug!(name: "chat.stream.stale_update", token = token.0, "Dropped update from stale cycle");
            return Err(Error::Aborted);
        };
        state.conversation.set_text(&placeholder, text);
        self.publish(&state);
        Ok(())
    }

    fn publish(&self, state: &State) {
        self.updates.send_replace(Snapshot {
            messages: state.conversation.messages().to_vec(),
            phase: state.phase,
        });
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn is_current(state: &State, token: RequestToken) -> bool {
    state.in_flight.as_ref().is_some_and(|f| f.token == token)
}

/// Resolves the cycle as aborted if the `send` future is dropped mid-flight.
struct CycleGuard<'a> {
    session: &'a ChatSession,
    token: RequestToken,
    armed: bool,
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.session.finish(self.token, Err(Error::Aborted));
        }
    }
}
