//! Coloured terminal presentation of session output.
//!
//! One line per notification, prefixed with a coloured tag. Alarms also ring
//! the terminal bell.

use std::io::{self, Stdout, Write};
use std::sync::Mutex;

use crossterm::queue;
use crossterm::style::{Attribute, Color, Print, ResetColor, SetAttribute, SetForegroundColor};

use crate::sink::NotificationSink;

/// ASCII BEL, makes most terminals beep or flash.
const TERMINAL_BELL: char = '\x07';

/// Kind of line being printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineKind {
    Log,
    Error,
    Success,
    Alarm,
}

impl LineKind {
    fn tag(self) -> &'static str {
        match self {
            Self::Log => "[log]",
            Self::Error => "[error]",
            Self::Success => "[ok]",
            Self::Alarm => "[BELL]",
        }
    }

    /// Color coding:
    /// - DarkGrey: routine progress
    /// - Red: failures
    /// - Green: connected
    /// - Yellow: the doorbell
    fn color(self) -> Color {
        match self {
            Self::Log => Color::DarkGrey,
            Self::Error => Color::Red,
            Self::Success => Color::Green,
            Self::Alarm => Color::Yellow,
        }
    }
}

/// Sink printing to a terminal (stdout by default).
pub struct TerminalSink<W: Write + Send = Stdout> {
    out: Mutex<W>,
}

impl TerminalSink<Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> TerminalSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        match self.out.into_inner() {
            Ok(out) => out,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn print(&self, kind: LineKind, message: &str) {
        let mut out = match self.out.lock() {
            Ok(out) => out,
            Err(poisoned) => poisoned.into_inner(),
        };
        // Nowhere to report a broken terminal; the next line may work
        let _ = write_line(&mut *out, kind, message);
    }
}

fn write_line<W: Write>(out: &mut W, kind: LineKind, message: &str) -> io::Result<()> {
    if kind == LineKind::Alarm {
        queue!(out, Print(TERMINAL_BELL), SetAttribute(Attribute::Bold))?;
    }
    queue!(
        out,
        SetForegroundColor(kind.color()),
        Print(kind.tag()),
        ResetColor,
        SetAttribute(Attribute::Reset),
        Print(' '),
        Print(message),
        Print('\n'),
    )?;
    out.flush()
}

impl<W: Write + Send> NotificationSink for TerminalSink<W> {
    fn write_log(&self, message: &str) {
        self.print(LineKind::Log, message);
    }

    fn write_error(&self, message: &str) {
        self.print(LineKind::Error, message);
    }

    fn write_success(&self, message: &str) {
        self.print(LineKind::Success, message);
    }

    fn create_alarm(&self, message: &str) {
        self.print(LineKind::Alarm, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(f: impl FnOnce(&TerminalSink<Vec<u8>>)) -> String {
        let sink = TerminalSink::new(Vec::new());
        f(&sink);
        String::from_utf8(sink.into_inner()).unwrap()
    }

    #[test]
    fn test_line_contains_tag_and_message() {
        let out = render(|s| s.write_error("Failed to connect"));
        assert!(out.contains("[error]"));
        assert!(out.ends_with("Failed to connect\n"));
    }

    #[test]
    fn test_alarm_rings_terminal_bell() {
        let out = render(|s| s.create_alarm("The doorbell rang"));
        assert!(out.starts_with(TERMINAL_BELL));
        assert!(out.contains("[BELL]"));
    }

    #[test]
    fn test_only_alarm_rings() {
        let out = render(|s| {
            s.write_log("a");
            s.write_success("b");
        });
        assert!(!out.contains(TERMINAL_BELL));
        assert_eq!(out.lines().count(), 2);
    }
}
