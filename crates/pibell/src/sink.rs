//! Destinations for user-facing session output.
//!
//! A session reports every state change and every bell through a
//! [`NotificationSink`]. The sink is called from the session task, so
//! implementations must not block for long.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Receiver of session output.
pub trait NotificationSink: Send + Sync {
    /// Routine progress ("connecting", "server closed the connection").
    fn write_log(&self, message: &str);

    /// A failure the user should see.
    fn write_error(&self, message: &str);

    /// The connection is up.
    fn write_success(&self, message: &str);

    /// The doorbell rang.
    fn create_alarm(&self, message: &str);
}

impl<S: NotificationSink + ?Sized> NotificationSink for Arc<S> {
    fn write_log(&self, message: &str) {
        (**self).write_log(message);
    }

    fn write_error(&self, message: &str) {
        (**self).write_error(message);
    }

    fn write_success(&self, message: &str) {
        (**self).write_success(message);
    }

    fn create_alarm(&self, message: &str) {
        (**self).create_alarm(message);
    }
}

/// One sink callback, as sent over a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Log(String),
    Error(String),
    Success(String),
    Alarm(String),
}

impl Notification {
    /// Replays this notification into another sink.
    pub fn deliver(&self, sink: &dyn NotificationSink) {
        match self {
            Self::Log(m) => sink.write_log(m),
            Self::Error(m) => sink.write_error(m),
            Self::Success(m) => sink.write_success(m),
            Self::Alarm(m) => sink.create_alarm(m),
        }
    }
}

/// Forwards callbacks to a presentation loop. Sends after the receiver is
/// gone are dropped.
impl NotificationSink for mpsc::UnboundedSender<Notification> {
    fn write_log(&self, message: &str) {
        let _ = self.send(Notification::Log(message.to_string()));
    }

    fn write_error(&self, message: &str) {
        let _ = self.send(Notification::Error(message.to_string()));
    }

    fn write_success(&self, message: &str) {
        let _ = self.send(Notification::Success(message.to_string()));
    }

    fn create_alarm(&self, message: &str) {
        let _ = self.send(Notification::Alarm(message.to_string()));
    }
}

/// Writes every callback to the `tracing` subscriber.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn write_log(&self, message: &str) {
        info!("{message}");
    }

    fn write_error(&self, message: &str) {
        error!("{message}");
    }

    fn write_success(&self, message: &str) {
        info!("{message}");
    }

    fn create_alarm(&self, message: &str) {
        warn!(alarm = true, "{message}");
    }
}
