//! Merging text deltas into the growing bot reply.

use super::TextDelta;

/// Characters that attach to the preceding word and never get a space before them.
const CLOSING_PUNCTUATION: &[char] = &[
    '.', ',', '!', '?', ';', ':', ')', ']', '}', '…', '”', '’', '%',
];

/// How a delta joins the text accumulated so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpacingPolicy {
    /// Append exactly as received. Used where chunk boundaries are arbitrary
    /// byte splits or already carry their own spaces.
    #[default]
    Verbatim,
    /// Chunks are word-aligned and may have lost their separating space;
    /// insert one where two words would otherwise be glued together.
    RepairWordBoundary,
}

/// Whether a space must be inserted between `prev` and `next`.
///
/// A space goes in only when neither side already supplies whitespace and
/// `next` does not open with closing punctuation.
#[must_use]
pub fn needs_separator(prev: &str, next: &str) -> bool {
    let (Some(last), Some(first)) = (prev.chars().next_back(), next.chars().next()) else {
        return false;
    };
    !last.is_whitespace() && !first.is_whitespace() && !CLOSING_PUNCTUATION.contains(&first)
}

/// Accumulation buffer for one send cycle.
#[derive(Debug, Default, Clone)]
pub struct Accumulator {
    text: String,
    deltas: usize,
}

impl Accumulator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a delta according to its spacing policy.
    pub fn push(&mut self, delta: &TextDelta) {
        if delta.text.is_empty() {
            return;
        }
        if delta.spacing == SpacingPolicy::RepairWordBoundary
            && needs_separator(&self.text, &delta.text)
        {
            self.text.push(' ');
        }
        self.text.push_str(&delta.text);
        self.deltas += 1;
    }

    /// Text accumulated so far.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Number of non-empty deltas merged.
    #[must_use]
    pub fn delta_count(&self) -> usize {
        self.deltas
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    #[must_use]
    pub fn into_string(self) -> String {
        self.text
    }
}
