//! Connection states of a [`ResilientClient`](crate::ResilientClient) session.

use std::fmt;

/// Where a session is in its lifecycle.
///
/// ```text
/// Disconnected ──▶ Connecting ──▶ Connected ──▶ Disconnected (clean close)
///                     │  ▲            │
///                     │  └─ Backoff ◀─┤ (I/O error)
///                     ▼               ▼
///                   Closed ◀──────────┘ (protocol violation, close)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    /// Not connected; the next step is an immediate connect attempt.
    #[default]
    Disconnected,

    /// Resolving the host and opening the TCP connection.
    Connecting,

    /// Reading bell events from the server.
    Connected,

    /// Waiting out the retry delay after an I/O error.
    Backoff,

    /// Terminal. The session will not reconnect.
    Closed,
}

impl SessionState {
    /// Returns true for the terminal state.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Backoff => "backoff",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}
