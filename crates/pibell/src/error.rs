//! Error types for the pibell client.
//!
//! Each variant maps to one outcome of the session state machine:
//! - `Resolve` ends the session (the address will not start working)
//! - `Connect` and `Io` send the session into backoff
//! - `Protocol` ends the session (the peer is not a pibell server)
//!
//! **Panic-Free Policy:** This module follows the project's panic-free guidelines.
//! No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, or `todo!()`.

use std::io;

use pibell_protocol::DecodeError;
use thiserror::Error;

// ============================================================================
// Client Error Type
// ============================================================================

/// Why a connection attempt or an established connection failed.
#[derive(Error, Debug)]
pub enum ClientError {
    /// The server host name did not resolve.
    #[error("Failed to resolve {address}: {source}")]
    Resolve {
        address: String,
        #[source]
        source: io::Error,
    },

    /// The host resolved but no address accepted the connection.
    #[error("Failed to connect to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: io::Error,
    },

    /// The established connection failed.
    #[error("Lost connection to server: {0}")]
    Io(#[from] io::Error),

    /// The server sent something other than a bell event.
    #[error("Unknown response from server: {0}")]
    Protocol(DecodeError),
}

impl ClientError {
    /// Returns true if the session should wait and try again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connect { .. } | Self::Io(_))
    }
}

impl From<DecodeError> for ClientError {
    fn from(err: DecodeError) -> Self {
        match err {
            DecodeError::Io(e) => Self::Io(e),
            other => Self::Protocol(other),
        }
    }
}

// ============================================================================
// Result Type Alias
// ============================================================================

/// Convenience Result type alias for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_io_becomes_io() {
        let err = ClientError::from(DecodeError::Io(io::Error::from(
            io::ErrorKind::ConnectionReset,
        )));
        assert!(matches!(err, ClientError::Io(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_violation_becomes_protocol() {
        let err = ClientError::from(DecodeError::Violation {
            line: "hello".to_string(),
        });
        assert!(matches!(err, ClientError::Protocol(_)));
        assert!(!err.is_retryable());
        assert!(err.to_string().starts_with("Unknown response from server"));
    }

    #[test]
    fn test_resolve_is_not_retryable() {
        let err = ClientError::Resolve {
            address: "nosuchhost:1".to_string(),
            source: io::Error::from(io::ErrorKind::NotFound),
        };
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("nosuchhost:1"));
    }
}
