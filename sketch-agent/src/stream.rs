//! # Stream Decoding
//!
//! Incremental decoder for the generation service's event stream:
//!
//! ```text
//! data: {"type":"reasoning","text":"The user drew a box..."}
//! data: {"type":"text-delta","text":"<diagram>graph TD\n  A"}
//! data: {"type":"text-delta","text":" --> B</diagram>"}
//! data: [DONE]
//! ```
//!
//! Reads may split a line anywhere, including inside a UTF-8 sequence, so
//! bytes are buffered until a newline arrives. The accumulator is passed in
//! and handed back on every step; nothing is shared between reads.

use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::AgentError;

/// Framing and extraction settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecoderConfig {
    /// Prefix of every event line.
    pub data_prefix: String,
    /// Body that terminates the stream.
    pub done_sentinel: String,
    /// Opening marker of the diagram body.
    pub diagram_open: String,
    /// Closing marker of the diagram body.
    pub diagram_close: String,
    /// Opening marker of the rationale.
    pub rationale_open: String,
    /// Closing marker of the rationale.
    pub rationale_close: String,
    /// Treat unparseable event lines as fatal.
    pub strict: bool,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            data_prefix: "data: ".to_string(),
            done_sentinel: "[DONE]".to_string(),
            diagram_open: "<diagram>".to_string(),
            diagram_close: "</diagram>".to_string(),
            rationale_open: "<rationale>".to_string(),
            rationale_close: "</rationale>".to_string(),
            strict: false,
        }
    }
}

/// One decoded event body.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type")]
pub enum StreamEvent {
    /// Model reasoning text.
    #[serde(rename = "reasoning")]
    Reasoning {
        /// Text fragment.
        #[serde(default)]
        text: String,
    },
    /// Output text fragment.
    #[serde(rename = "text-delta")]
    TextDelta {
        /// Text fragment.
        #[serde(default)]
        text: String,
    },
    /// The service failed mid-stream.
    #[serde(rename = "error")]
    Error {
        /// Error message.
        #[serde(default)]
        error: Option<String>,
        /// Some services put the message here instead.
        #[serde(default)]
        text: Option<String>,
    },
    /// Any other event type; ignored.
    #[serde(other)]
    Other,
}

/// Result of parsing one complete line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineParse {
    /// A well-formed event.
    Event(StreamEvent),
    /// The end-of-stream sentinel.
    Done,
    /// A data line whose body is not a valid event.
    Skipped {
        /// The offending body.
        body: String,
        /// Why it was rejected.
        reason: String,
    },
    /// Blank line or a line without the data prefix.
    Ignored,
}

/// Decoder state threaded through every read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamAccumulator {
    pending: Vec<u8>,
    /// Concatenated reasoning text.
    pub thinking: String,
    /// Concatenated output text.
    pub output: String,
    /// Number of malformed lines skipped.
    pub skipped: usize,
    done: bool,
}

impl StreamAccumulator {
    /// Whether the sentinel has been seen.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Bytes of an incomplete trailing line.
    #[must_use]
    pub fn remainder(&self) -> &[u8] {
        &self.pending
    }
}

/// Why decoding stopped without a result.
#[derive(Debug)]
pub enum StreamInterrupt {
    /// The cancellation token fired.
    Cancelled,
    /// The stream or the service failed.
    Failed {
        /// The failure.
        error: AgentError,
        /// Reasoning received before the failure.
        thinking: String,
    },
}

impl StreamInterrupt {
    /// A failure with no reasoning attached.
    #[must_use]
    pub fn failed(error: impl Into<AgentError>) -> Self {
        Self::Failed {
            error: error.into(),
            thinking: String::new(),
        }
    }

    /// Prefix the failure's trace with reasoning from earlier stages.
    #[must_use]
    pub fn after_trace(self, prior: &str) -> Self {
        match self {
            Self::Cancelled => Self::Cancelled,
            Self::Failed { error, thinking } => Self::Failed {
                error,
                thinking: join_traces(prior, &thinking),
            },
        }
    }
}

impl From<AgentError> for StreamInterrupt {
    fn from(error: AgentError) -> Self {
        Self::failed(error)
    }
}

impl From<sketch_core::CoreError> for StreamInterrupt {
    fn from(error: sketch_core::CoreError) -> Self {
        Self::failed(error)
    }
}

/// Final decoded output of one stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedStream {
    /// Concatenated reasoning text.
    pub thinking: String,
    /// Concatenated output text.
    pub output: String,
    /// Body between the diagram markers.
    pub diagram_text: Option<String>,
    /// Body between the rationale markers.
    pub rationale: Option<String>,
}

/// Line-oriented event stream decoder.
#[derive(Debug, Clone, Default)]
pub struct StreamDecoder {
    config: DecoderConfig,
}

impl StreamDecoder {
    /// Create a decoder with custom framing.
    #[must_use]
    pub fn new(config: DecoderConfig) -> Self {
        Self { config }
    }

    /// Current configuration.
    #[must_use]
    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Classify one complete line (without its newline).
    #[must_use]
    pub fn parse_line(&self, line: &str) -> LineParse {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            return LineParse::Ignored;
        }
        let Some(body) = line.strip_prefix(self.config.data_prefix.trim_end()) else {
            return LineParse::Ignored;
        };
        let body = body.trim();
        if body == self.config.done_sentinel {
            return LineParse::Done;
        }
        match serde_json::from_str::<StreamEvent>(body) {
            Ok(event) => LineParse::Event(event),
            Err(e) => LineParse::Skipped {
                body: body.to_string(),
                reason: e.to_string(),
            },
        }
    }

    /// Consume one chunk of bytes.
    ///
    /// Complete lines are applied to the accumulator; a trailing partial line
    /// is kept for the next call. Chunks after the sentinel are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`StreamInterrupt::Failed`] on an in-stream `error` event, or on
    /// a malformed line in strict mode.
    pub fn feed(
        &self,
        mut acc: StreamAccumulator,
        chunk: &[u8],
    ) -> Result<StreamAccumulator, StreamInterrupt> {
        if acc.done {
            return Ok(acc);
        }
        acc.pending.extend_from_slice(chunk);

        let mut start = 0;
        while let Some(offset) = acc.pending[start..].iter().position(|&b| b == b'\n') {
            let end = start + offset;
            let line = String::from_utf8_lossy(&acc.pending[start..end]).into_owned();
            start = end + 1;
            acc = self.apply_line(acc, &line)?;
            if acc.done {
                acc.pending.clear();
                return Ok(acc);
            }
        }
        acc.pending.drain(..start);
        Ok(acc)
    }

    fn apply_line(
        &self,
        mut acc: StreamAccumulator,
        line: &str,
    ) -> Result<StreamAccumulator, StreamInterrupt> {
        match self.parse_line(line) {
            LineParse::Event(StreamEvent::Reasoning { text }) => acc.thinking.push_str(&text),
            LineParse::Event(StreamEvent::TextDelta { text }) => acc.output.push_str(&text),
            LineParse::Event(StreamEvent::Error { error, text }) => {
                let message = error
                    .or(text)
                    .unwrap_or_else(|| "unknown error".to_string());
                return Err(StreamInterrupt::Failed {
                    error: AgentError::upstream(message),
                    thinking: acc.thinking,
                });
            }
            LineParse::Event(StreamEvent::Other) => debug!("Ignoring unknown stream event"),
            LineParse::Done => acc.done = true,
            LineParse::Skipped { body, reason } => {
                if self.config.strict {
                    return Err(StreamInterrupt::Failed {
                        error: AgentError::MalformedStreamEvent(format!("{reason}: {body}")),
                        thinking: acc.thinking,
                    });
                }
                warn!("Skipping malformed stream event ({}): {}", reason, body);
                acc.skipped += 1;
            }
            LineParse::Ignored => {}
        }
        Ok(acc)
    }

    /// Flush any unterminated final line and extract the structured fields.
    ///
    /// # Errors
    ///
    /// Same conditions as [`StreamDecoder::feed`], applied to the final line.
    pub fn finish(&self, mut acc: StreamAccumulator) -> Result<DecodedStream, StreamInterrupt> {
        if !acc.done && !acc.pending.is_empty() {
            let line = String::from_utf8_lossy(&acc.pending).into_owned();
            acc.pending.clear();
            acc = self.apply_line(acc, &line)?;
        }
        if !acc.done {
            debug!("Stream ended without {}", self.config.done_sentinel);
        }

        let diagram_text = extract_between(
            &acc.output,
            &self.config.diagram_open,
            &self.config.diagram_close,
        );
        let rationale = extract_between(
            &acc.output,
            &self.config.rationale_open,
            &self.config.rationale_close,
        );
        Ok(DecodedStream {
            thinking: acc.thinking,
            output: acc.output,
            diagram_text,
            rationale,
        })
    }

    /// Drive a byte stream to completion, abandoning it if `cancel` fires.
    ///
    /// # Errors
    ///
    /// Returns [`StreamInterrupt::Cancelled`] when cancelled, otherwise
    /// [`StreamInterrupt::Failed`] for transport or in-stream errors.
    pub async fn decode<S>(
        &self,
        mut stream: S,
        cancel: &CancellationToken,
    ) -> Result<DecodedStream, StreamInterrupt>
    where
        S: Stream<Item = Result<Vec<u8>, AgentError>> + Unpin,
    {
        let mut acc = StreamAccumulator::default();
        loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(StreamInterrupt::Cancelled),
                next = stream.next() => next,
            };
            match next {
                Some(Ok(chunk)) => {
                    acc = self.feed(acc, &chunk)?;
                    if acc.is_done() {
                        break;
                    }
                }
                Some(Err(error)) => {
                    return Err(StreamInterrupt::Failed {
                        error,
                        thinking: acc.thinking,
                    })
                }
                None => break,
            }
        }
        self.finish(acc)
    }
}

/// First `open ... close` body, trimmed. `None` if either marker is missing.
#[must_use]
pub fn extract_between(text: &str, open: &str, close: &str) -> Option<String> {
    let start = text.find(open)? + open.len();
    let len = text[start..].find(close)?;
    Some(text[start..start + len].trim().to_string())
}

/// Join two reasoning traces with a blank line, skipping empty ones.
#[must_use]
pub fn join_traces(first: &str, second: &str) -> String {
    match (first.is_empty(), second.is_empty()) {
        (true, _) => second.to_string(),
        (_, true) => first.to_string(),
        _ => format!("{first}\n\n{second}"),
    }
}
