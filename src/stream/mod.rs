//! Response consumption: from transport body to ordered text deltas.
//!
//! The chat backend may answer in one of three shapes and the client does
//! no protocol negotiation. [`ResponseShape::detect`] picks the shape once
//! from the response headers; [`ResponseBody::into_deltas`] then turns any
//! of them into the same stream of [`TextDelta`]s, consumed by a single
//! [`Accumulator`].
//!
//! | Shape          | Detected by                      | Delta unit          |
//! |----------------|----------------------------------|---------------------|
//! | `EventStream`  | `content-type: text/event-stream`| one `data:` frame   |
//! | `ChunkedBody`  | no `content-length`              | decoded byte chunk  |
//! | `BufferedText` | `content-length` present         | batch of words      |

mod chunked;
mod merge;
mod reveal;
mod sse;

use std::pin::Pin;

use futures::{Stream, StreamExt};

use crate::error::{Error, Result};

pub use chunked::Utf8Decoder;
pub use merge::{Accumulator, SpacingPolicy, needs_separator};
pub use reveal::{DEFAULT_BATCH_DELAY, DEFAULT_BATCH_WORDS, RevealSettings, reveal, word_batches};
pub use sse::SseDecoder;

/// Raw body bytes as they arrive from the transport.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>>> + Send>>;

/// Ordered text deltas for one reply.
pub type DeltaStream = Pin<Box<dyn Stream<Item = Result<TextDelta>> + Send>>;

/// One unit of reply text, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextDelta {
    /// The text fragment.
    pub text: String,
    /// How it joins the text before it.
    pub spacing: SpacingPolicy,
}

impl TextDelta {
    #[must_use]
    pub fn new(text: impl Into<String>, spacing: SpacingPolicy) -> Self {
        Self {
            text: text.into(),
            spacing,
        }
    }
}

/// The three response shapes the backend may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    /// Server-Sent Events, `data: <chunk>\n\n` frames.
    EventStream,
    /// Raw text streamed with chunked transfer encoding.
    ChunkedBody,
    /// A single, fully sized text body.
    BufferedText,
}

impl ResponseShape {
    /// Select the shape from the response's content type and length.
    #[must_use]
    pub fn detect(content_type: Option<&str>, content_length: Option<u64>) -> Self {
        let is_event_stream = content_type.is_some_and(|ct| {
            ct.split(';')
                .next()
                .is_some_and(|mime| mime.trim().eq_ignore_ascii_case("text/event-stream"))
        });

        if is_event_stream {
            Self::EventStream
        } else if content_length.is_some() {
            Self::BufferedText
        } else {
            Self::ChunkedBody
        }
    }

    /// Short name for logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::EventStream => "event_stream",
            Self::ChunkedBody => "chunked_body",
            Self::BufferedText => "buffered_text",
        }
    }
}

/// A successful transport response, ready to be consumed.
pub enum ResponseBody {
    /// SSE byte stream.
    EventStream(ByteStream),
    /// Raw streamed bytes.
    ChunkedBody(ByteStream),
    /// Whole body already read.
    BufferedText(String),
}

impl std::fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EventStream(_) => f.write_str("EventStream(..)"),
            Self::ChunkedBody(_) => f.write_str("ChunkedBody(..)"),
            Self::BufferedText(text) => f.debug_tuple("BufferedText").field(text).finish(),
        }
    }
}

impl ResponseBody {
    /// Which shape this body has.
    #[must_use]
    pub fn shape(&self) -> ResponseShape {
        match self {
            Self::EventStream(_) => ResponseShape::EventStream,
            Self::ChunkedBody(_) => ResponseShape::ChunkedBody,
            Self::BufferedText(_) => ResponseShape::BufferedText,
        }
    }

    /// Build an SSE body from an in-memory sequence of byte chunks.
    pub fn event_stream_from<I>(chunks: I) -> Self
    where
        I: IntoIterator<Item = Vec<u8>>,
        I::IntoIter: Send + 'static,
    {
        Self::EventStream(in_memory(chunks))
    }

    /// Build a raw streamed body from an in-memory sequence of byte chunks.
    pub fn chunked_from<I>(chunks: I) -> Self
    where
        I: IntoIterator<Item = Vec<u8>>,
        I::IntoIter: Send + 'static,
    {
        Self::ChunkedBody(in_memory(chunks))
    }

    /// Turn the body into ordered text deltas.
    pub fn into_deltas(self, reveal_settings: RevealSettings) -> DeltaStream {
        match self {
            Self::EventStream(bytes) => Box::pin(event_stream_deltas(bytes)),
            Self::ChunkedBody(bytes) => Box::pin(chunked_deltas(bytes)),
            Self::BufferedText(text) => Box::pin(reveal(text, reveal_settings)),
        }
    }
}

fn in_memory<I>(chunks: I) -> ByteStream
where
    I: IntoIterator<Item = Vec<u8>>,
    I::IntoIter: Send + 'static,
{
    Box::pin(futures::stream::iter(chunks.into_iter().map(Ok::<_, Error>)))
}

fn event_stream_deltas(mut bytes: ByteStream) -> impl Stream<Item = Result<TextDelta>> + Send {
    async_stream::stream! {
        let mut decoder = SseDecoder::new();
        while let Some(chunk) = bytes.next().await {
            match chunk {
                Ok(chunk) => {
                    for data in decoder.push(&chunk) {
                        yield Ok(TextDelta::new(data, SpacingPolicy::RepairWordBoundary));
                    }
                }
                Err(e) => {
                    yield Err(e);
                    return;
                }
            }
        }
        if let Some(data) = decoder.finish() {
            yield Ok(TextDelta::new(data, SpacingPolicy::RepairWordBoundary));
        }
    }
}

fn chunked_deltas(mut bytes: ByteStream) -> impl Stream<Item = Result<TextDelta>> + Send {
    async_stream::stream! {
        let mut decoder = Utf8Decoder::new();
        while let Some(chunk) = bytes.next().await {
            match chunk {
                Ok(chunk) => {
                    let text = decoder.push(&chunk);
                    if !text.is_empty() {
                        yield Ok(TextDelta::new(text, SpacingPolicy::Verbatim));
                    }
                }
                Err(e) => {
                    yield Err(e);
                    return;
                }
            }
        }
        let tail = decoder.finish();
        if !tail.is_empty() {
            yield Ok(TextDelta::new(tail, SpacingPolicy::Verbatim));
        }
    }
}
