//! pibell daemon - connection registry and bell broadcast server
//!
//! This crate provides the core infrastructure for the pibell daemon:
//! - `registry` - Actor owning every connected client
//! - `server` - TCP listener feeding the registry
//! - `broadcast` - Writes a bell event to every registered client
//! - `trigger` - Bell press sources and the task that broadcasts them
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       pibelld daemon                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐    │
//! │  │  ListenServer   │────▶│     RegistryActor           │    │
//! │  │     (TCP)       │     │  (connection owner)         │    │
//! │  └────────┬────────┘     └──────────────▲──────────────┘    │
//! │           │                             │                   │
//! │           │ per connection              │ for_each          │
//! │           ▼                             │                   │
//! │  ┌─────────────────┐     ┌──────────────┴──────────────┐    │
//! │  │  close watcher  │     │  Broadcaster ◀── trigger    │    │
//! │  │  (per client)   │     │  (GPIO / signal / stdin)    │    │
//! │  └─────────────────┘     └─────────────────────────────┘    │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All production code in this crate follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

pub mod broadcast;
pub mod registry;
pub mod server;
pub mod trigger;

pub use broadcast::{BroadcastReport, Broadcaster, DEFAULT_WRITE_TIMEOUT};
pub use server::{ListenServer, ServerError};
pub use trigger::{spawn_line_source, spawn_trigger, Level, TriggerHandle};
