//! pibell core - shared types for the doorbell relay
//!
//! This crate provides the types shared between the daemon (`pibelld`)
//! and the client (`pibell`): validated addresses and the optional
//! configuration file.
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod address;
pub mod config;
pub mod error;

// Re-exports for convenience
pub use address::{
    Address, AddressFault, AddressParseError, PortPolicy, DEFAULT_LISTEN_ADDRESS, DEFAULT_PORT,
};
pub use config::{ClientSection, PibellConfig, ServerSection};
pub use error::{ConfigError, ConfigResult};
