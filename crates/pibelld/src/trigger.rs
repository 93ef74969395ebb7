//! Bell press sources and the task that turns presses into broadcasts.
//!
//! Presses arrive from wherever the sensor is wired (a GPIO edge callback, a
//! signal, a line on stdin) and are queued through a [`TriggerHandle`]. A
//! single trigger task drains the queue and calls [`Broadcaster::notify`], so
//! broadcasts never overlap.

use std::fmt;
use std::str::FromStr;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::broadcast::Broadcaster;

/// Presses that can wait while a broadcast is in flight.
pub const TRIGGER_QUEUE_SIZE: usize = 8;

/// Logic level reported by the bell input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Low,
    High,
}

impl FromStr for Level {
    type Err = UnknownLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1" | "high" | "press" => Ok(Self::High),
            "0" | "low" | "release" => Ok(Self::Low),
            other => Err(UnknownLevel(other.to_string())),
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::High => write!(f, "high"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown level {0:?}")]
pub struct UnknownLevel(String);

/// Queue side of the trigger. Cheap to clone, usable from any thread.
#[derive(Debug, Clone)]
pub struct TriggerHandle {
    sender: mpsc::Sender<()>,
}

impl TriggerHandle {
    fn channel(capacity: usize) -> (Self, mpsc::Receiver<()>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender }, receiver)
    }

    /// Queues one broadcast without blocking.
    ///
    /// Returns `false` if the press was dropped because the queue is full or
    /// the trigger task has stopped.
    pub fn notify(&self) -> bool {
        match self.sender.try_send(()) {
            Ok(()) => true,
            Err(TrySendError::Full(())) => {
                warn!("Trigger queue full, dropping bell press");
                false
            }
            Err(TrySendError::Closed(())) => {
                debug!("Trigger task stopped, ignoring bell press");
                false
            }
        }
    }

    /// Edge callback for the bell input. Only the rising edge rings.
    pub fn on_level_change(&self, level: Level) -> bool {
        match level {
            Level::High => self.notify(),
            Level::Low => false,
        }
    }
}

/// Spawns the task that broadcasts once per queued press.
pub fn spawn_trigger(
    broadcaster: Broadcaster,
    cancel: CancellationToken,
) -> (TriggerHandle, JoinHandle<()>) {
    let (handle, receiver) = TriggerHandle::channel(TRIGGER_QUEUE_SIZE);
    let task = tokio::spawn(run_trigger(broadcaster, receiver, cancel));
    (handle, task)
}

async fn run_trigger(
    broadcaster: Broadcaster,
    mut receiver: mpsc::Receiver<()>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Trigger task shutting down");
                break;
            }

            press = receiver.recv() => {
                if press.is_none() {
                    debug!("All trigger handles dropped");
                    break;
                }
                let clients = broadcaster.registry().len().await;
                info!(clients, "bell press detected");
                broadcaster.notify().await;
            }
        }
    }
}

/// Reads presses from a line-oriented source such as stdin.
///
/// A line naming a level (`1`, `high`, `0`, `low`, ...) goes through
/// [`TriggerHandle::on_level_change`]; any other line, including an empty
/// one, is a press. Ends at end-of-input or on cancellation.
pub fn spawn_line_source<R>(
    reader: R,
    trigger: TriggerHandle,
    cancel: CancellationToken,
) -> JoinHandle<()>
where
    R: AsyncRead + Send + Unpin + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,

                line = lines.next_line() => {
                    match line {
                        Ok(Some(line)) => match line.parse::<Level>() {
                            Ok(level) => {
                                trigger.on_level_change(level);
                            }
                            Err(_) => {
                                trigger.notify();
                            }
                        },
                        Ok(None) => {
                            debug!("Line source reached end of input");
                            break;
                        }
                        Err(e) => {
                            warn!(error = %e, "Line source read failed");
                            break;
                        }
                    }
                }
            }
        }
    })
}

/// Rings once per `SIGUSR1` until cancelled.
///
/// # Errors
///
/// Returns the error from installing the signal handler.
#[cfg(unix)]
pub fn spawn_signal_source(
    trigger: TriggerHandle,
    cancel: CancellationToken,
) -> std::io::Result<JoinHandle<()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut usr1 = signal(SignalKind::user_defined1())?;

    Ok(tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,

                received = usr1.recv() => {
                    if received.is_none() {
                        break;
                    }
                    debug!("SIGUSR1 received");
                    trigger.notify();
                }
            }
        }
    }))
}
