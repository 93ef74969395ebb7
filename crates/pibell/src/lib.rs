//! pibell client - library modules
//!
//! This library provides the client side of pibell: a session that keeps a
//! TCP connection to the daemon open and turns every bell event into an alarm.
//!
//! # Architecture
//!
//! The client is built from three pieces:
//!
//! 1. **Session Task**: Spawned by [`ResilientClient::start`]; connects, reads
//!    bell events and reconnects according to the session state machine
//! 2. **Notification Sink**: Receives one callback per state change and one
//!    per bell ([`TerminalSink`], [`TracingSink`] or a channel)
//! 3. **App**: Owns the current session and replaces it when the user enters
//!    a new address
//!
//! All tasks respect a shared `CancellationToken` for graceful shutdown.

pub mod app;
pub mod client;
pub mod error;
pub mod sink;
pub mod state;
pub mod terminal;

// Re-export commonly used types
pub use app::App;
pub use client::{ClientConfig, ResilientClient, ALARM_MESSAGE};
pub use error::{ClientError, Result};
pub use sink::{Notification, NotificationSink, TracingSink};
pub use state::SessionState;
pub use terminal::TerminalSink;
