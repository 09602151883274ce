//! Framing and classification of a skill's stdout
//!
//! Bytes are accumulated, split on newlines, each complete line is
//! classified, and the caller dispatches the resulting frames.

use hearth_types::{SkillOutput, SkillOutputLine};

/// Accumulates raw bytes and yields complete lines
#[derive(Debug, Default)]
pub struct LineFramer {
    buffer: Vec<u8>,
}

impl LineFramer {
    /// Create an empty framer
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and drain every complete line
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            lines.push(decode(&line[..line.len() - 1]));
        }
        lines
    }

    /// Take the unterminated remainder at end of stream
    pub fn finish(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.buffer);
        Some(decode(&rest))
    }

    /// Bytes waiting for a newline
    #[must_use]
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

fn decode(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_end_matches('\r')
        .to_string()
}

/// A classified stdout line
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Marker-prefixed diagnostic, marker stripped
    Diagnostic(String),
    /// A valid result line
    Result(Box<SkillOutput>),
    /// A line that is neither a diagnostic nor valid structured data
    Malformed {
        /// The offending line
        line: String,
        /// Parse error
        error: String,
    },
    /// Whitespace only
    Blank,
}

/// Classify one complete line
#[must_use]
pub fn classify(line: &str, marker: &str) -> Frame {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Frame::Blank;
    }

    if !marker.is_empty() {
        if let Some(message) = trimmed.strip_prefix(marker) {
            return Frame::Diagnostic(message.trim().to_string());
        }
    }

    match SkillOutputLine::parse(trimmed) {
        Ok(parsed) => Frame::Result(Box::new(parsed.output)),
        Err(e) => Frame::Malformed {
            line: trimmed.to_string(),
            error: e.to_string(),
        },
    }
}

/// Stateful demultiplexer over one process stream
///
/// Keeps the last valid result seen, which becomes the invocation result
/// once the stream ends.
#[derive(Debug)]
pub struct StdoutDemux {
    framer: LineFramer,
    marker: String,
    last_result: Option<SkillOutput>,
    results: usize,
    malformed: usize,
}

impl StdoutDemux {
    /// Demultiplexer recognising `marker` as the diagnostic prefix
    #[must_use]
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            framer: LineFramer::new(),
            marker: marker.into(),
            last_result: None,
            results: 0,
            malformed: 0,
        }
    }

    /// Feed a chunk, returning the frames completed by it
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Frame> {
        let lines = self.framer.push(chunk);
        lines.iter().map(|line| self.record(line)).collect()
    }

    /// Flush the unterminated remainder at end of stream
    pub fn finish(&mut self) -> Option<Frame> {
        let rest = self.framer.finish()?;
        Some(self.record(&rest))
    }

    fn record(&mut self, line: &str) -> Frame {
        let frame = classify(line, &self.marker);
        match &frame {
            Frame::Result(output) => {
                self.results += 1;
                self.last_result = Some(output.as_ref().clone());
            }
            Frame::Malformed { .. } => self.malformed += 1,
            Frame::Diagnostic(_) | Frame::Blank => {}
        }
        frame
    }

    /// Last valid result line seen so far
    #[must_use]
    pub fn last_result(&self) -> Option<&SkillOutput> {
        self.last_result.as_ref()
    }

    /// Consume the demultiplexer, keeping the authoritative result
    #[must_use]
    pub fn into_result(self) -> Option<SkillOutput> {
        self.last_result
    }

    /// Number of valid result lines
    #[must_use]
    pub fn result_count(&self) -> usize {
        self.results
    }

    /// Number of lines that failed to parse
    #[must_use]
    pub fn malformed_count(&self) -> usize {
        self.malformed
    }
}
