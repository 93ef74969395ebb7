//! The notification event carried on the wire.

use std::fmt;

use crate::codec::DecodeError;

/// Wire literal for a bell press (without the line terminator).
pub const BELL_PRESSED_LINE: &str = "1";

/// Encoded frame written by the daemon, terminator included.
const BELL_PRESSED_FRAME: &[u8] = b"1\n";

/// Events the daemon can send. The vocabulary is closed: exactly one member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BellEvent {
    /// Someone pressed the doorbell (rising edge on the sensor input)
    BellPressed,
}

impl BellEvent {
    /// Returns the line literal for this event.
    pub const fn as_line(&self) -> &'static str {
        match self {
            Self::BellPressed => BELL_PRESSED_LINE,
        }
    }

    /// Returns the bytes to put on the wire, including the `\n` terminator.
    pub const fn encode(&self) -> &'static [u8] {
        match self {
            Self::BellPressed => BELL_PRESSED_FRAME,
        }
    }

    /// Decodes one line (terminator already removed).
    ///
    /// Returns `Ok(None)` for an empty line, which carries no event.
    /// A trailing `\r` is tolerated.
    ///
    /// # Errors
    ///
    /// Any other content is [`DecodeError::Violation`].
    pub fn decode_line(line: &str) -> Result<Option<Self>, DecodeError> {
        let line = line.strip_suffix('\r').unwrap_or(line);
        match line {
            "" => Ok(None),
            BELL_PRESSED_LINE => Ok(Some(Self::BellPressed)),
            other => Err(DecodeError::Violation {
                line: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for BellEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BellPressed => write!(f, "bell pressed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_is_literal_one_newline() {
        assert_eq!(BellEvent::BellPressed.encode(), b"1\n");
        assert_eq!(BellEvent::BellPressed.as_line(), "1");
    }

    #[test]
    fn test_decode_bell_pressed() {
        assert_eq!(
            BellEvent::decode_line("1").unwrap(),
            Some(BellEvent::BellPressed)
        );
        assert_eq!(
            BellEvent::decode_line("1\r").unwrap(),
            Some(BellEvent::BellPressed)
        );
    }

    #[test]
    fn test_decode_empty_line_is_no_event() {
        assert_eq!(BellEvent::decode_line("").unwrap(), None);
    }

    #[test]
    fn test_decode_other_content_is_violation() {
        for line in ["0", "2", "11", " 1", "ring", "HTTP/1.1 200 OK"] {
            let err = BellEvent::decode_line(line).unwrap_err();
            assert!(err.is_protocol_violation(), "{line:?} should be rejected");
        }
    }
}
