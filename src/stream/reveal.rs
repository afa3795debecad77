//! Paced reveal of a fully buffered reply.
//!
//! When the backend answers with a single body, the text is split on
//! spaces and handed out a few words at a time so it still appears to
//! type itself out. Concatenating the batches gives back the body unchanged.

use std::time::Duration;

use futures::Stream;

use super::{SpacingPolicy, TextDelta};
use crate::error::Result;

/// Words per reveal batch.
pub const DEFAULT_BATCH_WORDS: usize = 5;

/// Pause between reveal batches.
pub const DEFAULT_BATCH_DELAY: Duration = Duration::from_millis(150);

/// Pacing for buffered replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevealSettings {
    /// Words per batch (at least 1).
    pub batch_words: usize,
    /// Delay between consecutive batches.
    pub delay: Duration,
}

impl Default for RevealSettings {
    fn default() -> Self {
        Self {
            batch_words: DEFAULT_BATCH_WORDS,
            delay: DEFAULT_BATCH_DELAY,
        }
    }
}

/// Split `text` into batches of `batch_words` space-separated words.
///
/// Every batch after the first starts with the space that separated it from
/// the previous one, so `batches.concat() == text`.
#[must_use]
pub fn word_batches(text: &str, batch_words: usize) -> Vec<String> {
    let batch_words = batch_words.max(1);
    let mut batches = Vec::new();
    let mut batch = String::new();

    for (i, word) in text.split(' ').enumerate() {
        if i > 0 {
            batch.push(' ');
        }
        batch.push_str(word);
        if i % batch_words == batch_words - 1 {
            batches.push(std::mem::take(&mut batch));
        }
    }
    if !batch.is_empty() {
        batches.push(batch);
    }
    batches
}

/// Stream the batches of `text`, sleeping between them.
pub fn reveal(text: String, settings: RevealSettings) -> impl Stream<Item = Result<TextDelta>> + Send {
    async_stream::stream! {
        for (i, batch) in word_batches(&text, settings.batch_words).into_iter().enumerate() {
            if i > 0 && !settings.delay.is_zero() {
                tokio::time::sleep(settings.delay).await;
            }
            yield Ok(TextDelta::new(batch, SpacingPolicy::Verbatim));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[test]
    fn test_batches_concat_to_original() {
        let text = "Sầu riêng thường ra quả sau 4-5 năm kể từ khi trồng.";
        let batches = word_batches(text, 5);
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0], "Sầu riêng thường ra quả");
        assert_eq!(batches[1], " sau 4-5 năm kể từ");
        assert_eq!(batches.concat(), text);
    }

    #[test]
    fn test_irregular_spacing_survives() {
        let text = "  a  b ";
        assert_eq!(word_batches(text, 2).concat(), text);
    }

    #[test]
    fn test_zero_batch_size_treated_as_one() {
        assert_eq!(word_batches("a b", 0), vec!["a", " b"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reveal_paces_batches() {
        let settings = RevealSettings {
            batch_words: 2,
            delay: Duration::from_millis(150),
        };
        let start = tokio::time::Instant::now();
        let out: Vec<_> = reveal("một hai ba bốn năm".to_string(), settings)
            .map(|d| d.unwrap().text)
            .collect()
            .await;

        assert_eq!(out, vec!["một hai", " ba bốn", " năm"]);
        assert_eq!(start.elapsed(), Duration::from_millis(300));
    }
}
