//! Newline-delimited JSON decoding for the generate stream
//!
//! Network chunks do not respect line boundaries: a JSON object can be split
//! across two chunks and a multi-byte character across two reads. The decoder
//! buffers raw bytes and only parses complete lines.

use tracing::warn;

use super::traits::GenerateFragment;

/// Incremental NDJSON decoder
#[derive(Debug, Default)]
pub struct NdjsonDecoder {
    buffer: Vec<u8>,
    skipped: usize,
}

impl NdjsonDecoder {
    /// Create an empty decoder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a network chunk, returning every fragment completed by it
    pub fn push(&mut self, chunk: &[u8]) -> Vec<GenerateFragment> {
        self.buffer.extend_from_slice(chunk);

        let mut fragments = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(fragment) = self.parse_line(&line[..pos]) {
                fragments.push(fragment);
            }
        }
        fragments
    }

    /// Flush a trailing line that had no newline terminator
    pub fn finish(&mut self) -> Option<GenerateFragment> {
        let line = std::mem::take(&mut self.buffer);
        self.parse_line(&line)
    }

    /// Number of lines discarded because they were not valid fragments
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    fn parse_line(&mut self, raw: &[u8]) -> Option<GenerateFragment> {
        let line = String::from_utf8_lossy(raw);
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        match serde_json::from_str::<GenerateFragment>(line) {
            Ok(fragment) => Some(fragment),
            Err(e) => {
                self.skipped += 1;
                warn!(error = %e, line = %line, "Skipping malformed stream line");
                None
            }
        }
    }
}
