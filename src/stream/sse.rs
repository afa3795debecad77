//! Incremental `text/event-stream` frame decoder.
//!
//! Only `data:` fields matter to the chat backend; `event:`, `id:`,
//! `retry:` and comment lines are skipped. A frame's `data:` lines are
//! joined with `\n`. End of stream is the transport closing, so a trailing
//! frame without its blank line is still delivered by [`SseDecoder::finish`].

/// Sentinel some backends send before closing. Carries no text.
const DONE_SENTINEL: &str = "[DONE]";

/// Buffers raw bytes and yields the `data` payload of each complete frame.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
    /// Last byte seen was `\r`; a following `\n` belongs to the same line ending.
    after_cr: bool,
}

impl SseDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes, returning payloads of all frames completed by them.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        // CRLF and bare CR line endings collapse to LF.
        for &b in bytes {
            match b {
                b'\r' => {
                    self.buf.push(b'\n');
                    self.after_cr = true;
                }
                b'\n' if self.after_cr => self.after_cr = false,
                _ => {
                    self.buf.push(b);
                    self.after_cr = false;
                }
            }
        }

        let mut out = Vec::new();
        while let Some(pos) = find_double_newline(&self.buf) {
            let frame = self.buf.drain(..pos + 2).collect::<Vec<_>>();
            if let Some(data) = parse_frame(&String::from_utf8_lossy(&frame)) {
                out.push(data);
            }
        }
        out
    }

    /// Flush whatever is left once the transport has closed.
    pub fn finish(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            return None;
        }
        let frame = std::mem::take(&mut self.buf);
        parse_frame(&String::from_utf8_lossy(&frame))
    }
}

/// Extract the joined `data` payload of one frame.
fn parse_frame(frame: &str) -> Option<String> {
    let mut data: Option<String> = None;

    for line in frame.lines() {
        let Some(value) = line.strip_prefix("data:") else {
            continue;
        };
        // The field value drops exactly one leading space.
        let value = value.strip_prefix(' ').unwrap_or(value);
        match &mut data {
            Some(d) => {
                d.push('\n');
                d.push_str(value);
            }
            None => data = Some(value.to_string()),
        }
    }

    data.filter(|d| !d.is_empty() && d.trim() != DONE_SENTINEL)
}

/// Find the position of a double newline in the buffer.
fn find_double_newline(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\n\n")
}
