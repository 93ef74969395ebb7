//! Line decoder turning the daemon's byte stream into [`BellEvent`]s.
//!
//! Wraps `LinesCodec` with a small length cap so a misbehaving peer that
//! never sends a newline cannot grow the read buffer without bound.

use std::io;

use thiserror::Error;
use tokio_util::bytes::BytesMut;
use tokio_util::codec::{Decoder, LinesCodec, LinesCodecError};

use crate::event::BellEvent;

/// Longest line the client accepts before declaring a protocol violation.
pub const MAX_LINE_LENGTH: usize = 64;

/// Errors produced while decoding the notification stream.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// A complete line that is not the bell literal
    #[error("unexpected message from server: {line:?}")]
    Violation { line: String },

    /// No line terminator within the length cap
    #[error("message from server exceeds {max} bytes")]
    LineTooLong { max: usize },

    #[error("message from server is not valid UTF-8")]
    InvalidUtf8,

    /// Transport failure while reading
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl DecodeError {
    /// True when the peer sent data outside the protocol (as opposed to a
    /// transport error).
    pub fn is_protocol_violation(&self) -> bool {
        !matches!(self, Self::Io(_))
    }

    fn from_lines(err: LinesCodecError, max: usize) -> Self {
        match err {
            LinesCodecError::MaxLineLengthExceeded => Self::LineTooLong { max },
            // LinesCodec only reports its own Io errors for bad UTF-8
            LinesCodecError::Io(_) => Self::InvalidUtf8,
        }
    }
}

/// Decoder yielding one [`BellEvent`] per bell line, skipping empty lines.
#[derive(Debug, Clone)]
pub struct BellCodec {
    lines: LinesCodec,
    max_length: usize,
}

impl BellCodec {
    /// Creates a codec with the default [`MAX_LINE_LENGTH`].
    pub fn new() -> Self {
        Self::with_max_length(MAX_LINE_LENGTH)
    }

    pub fn with_max_length(max_length: usize) -> Self {
        Self {
            lines: LinesCodec::new_with_max_length(max_length),
            max_length,
        }
    }

    fn next_event(
        &mut self,
        mut line: Option<String>,
        src: &mut BytesMut,
        at_eof: bool,
    ) -> Result<Option<BellEvent>, DecodeError> {
        loop {
            let Some(current) = line.take() else {
                return Ok(None);
            };
            if let Some(event) = BellEvent::decode_line(&current)? {
                return Ok(Some(event));
            }
            // Empty line: keep going with whatever else is buffered
            line = self.pull_line(src, at_eof)?;
        }
    }

    fn pull_line(
        &mut self,
        src: &mut BytesMut,
        at_eof: bool,
    ) -> Result<Option<String>, DecodeError> {
        let max = self.max_length;
        let result = if at_eof {
            self.lines.decode_eof(src)
        } else {
            self.lines.decode(src)
        };
        result.map_err(|e| DecodeError::from_lines(e, max))
    }
}

impl Default for BellCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for BellCodec {
    type Item = BellEvent;
    type Error = DecodeError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let line = self.pull_line(src, false)?;
        self.next_event(line, src, false)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let line = self.pull_line(src, true)?;
        self.next_event(line, src, true)
    }
}
