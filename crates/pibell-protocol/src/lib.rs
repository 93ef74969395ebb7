//! pibell protocol - wire format for daemon-to-client notifications
//!
//! The channel is one-way: the daemon writes newline-terminated ASCII
//! lines, the client never sends application data. The only defined line
//! is `"1"` ([`BellEvent::BellPressed`]); anything else is a protocol
//! violation.

pub mod codec;
pub mod event;

pub use codec::{BellCodec, DecodeError, MAX_LINE_LENGTH};
pub use event::{BellEvent, BELL_PRESSED_LINE};
