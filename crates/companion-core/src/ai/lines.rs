//! Line framing for streamed HTTP bodies.
//!
//! Network chunks don't respect line boundaries, so both NDJSON (Ollama) and
//! server-sent events (OpenAI) are reassembled here before parsing.

use futures_util::{Stream, StreamExt};

use crate::error::{ProviderError, Result};

#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds raw bytes and returns every line completed by them, without the
    /// trailing `\n` / `\r\n`. Blank lines are skipped.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\n', '\r']);
            if !line.trim().is_empty() {
                lines.push(line.to_string());
            }
        }
        lines
    }

    /// Whatever is left once the body ends without a final newline.
    pub fn finish(&mut self) -> Option<String> {
        let rest = String::from_utf8_lossy(&std::mem::take(&mut self.pending)).into_owned();
        let rest = rest.trim();
        (!rest.is_empty()).then(|| rest.to_string())
    }
}

/// Turns a response body into a stream of complete lines.
pub fn lines(response: reqwest::Response) -> impl Stream<Item = Result<String>> + Send {
    async_stream::stream! {
        let mut body = response.bytes_stream();
        let mut buffer = LineBuffer::new();

        let mut failed = false;

        while let Some(chunk) = body.next().await {
            match chunk {
                Ok(bytes) => {
                    for line in buffer.push(&bytes) {
                        yield Ok(line);
                    }
                }
                Err(e) => {
                    failed = true;
                    yield Err(ProviderError::from(e));
                    break;
                }
            }
        }

        if !failed {
            if let Some(line) = buffer.finish() {
                yield Ok(line);
            }
        }
    }
}
