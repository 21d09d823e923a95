//! Incremental parser for the streamed propagation response.
//!
//! The response body is a sequence of JSON messages, each terminated by the
//! `frameseparator` sentinel. Chunks arrive at arbitrary byte offsets: a
//! message may span many chunks, and one chunk may carry many messages. The
//! parser accumulates bytes and only cuts at sentinel boundaries, retaining
//! the unconsumed tail for the next chunk.

use tracing::warn;

use crate::session::protocol::{FRAME_SEPARATOR, FrameResult};

#[derive(Debug, Default)]
pub struct FrameStreamParser {
    buffer: Vec<u8>,
}

impl FrameStreamParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk; returns every message completed by it, in order.
    ///
    /// A malformed message is logged and skipped; it never aborts the
    /// stream.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<FrameResult> {
        self.buffer.extend_from_slice(chunk);

        let sep = FRAME_SEPARATOR.as_bytes();
        let mut out = Vec::new();
        while let Some(pos) = find(&self.buffer, sep) {
            let rest = self.buffer.split_off(pos + sep.len());
            let message = std::mem::replace(&mut self.buffer, rest);
            let payload = &message[..pos];
            if payload.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            match serde_json::from_slice::<FrameResult>(payload) {
                Ok(frame) => out.push(frame),
                Err(e) => warn!(error = %e, bytes = payload.len(), "skipping malformed frame message"),
            }
        }
        out
    }

    /// Bytes buffered past the last complete message.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// End of stream: any unterminated trailing data is logged and dropped.
    /// Every well-formed message ends with the sentinel, so a non-empty
    /// remainder means the stream was cut mid-message.
    pub fn finish(self) {
        if !self.buffer.iter().all(u8::is_ascii_whitespace) {
            warn!(
                bytes = self.buffer.len(),
                "discarding unterminated trailing data at end of stream"
            );
        }
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}
