//! `host:port` address parsing.
//!
//! Both the daemon's listen address and the client's connect address go
//! through [`Address::parse_with`]; the only difference between the two is
//! whether port `0` (ephemeral bind) is acceptable.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Default port the daemon listens on and clients connect to.
pub const DEFAULT_PORT: u16 = 12321;

/// Default listen address for the daemon (all interfaces).
pub const DEFAULT_LISTEN_ADDRESS: &str = "0.0.0.0:12321";

/// Which port values the parser accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortPolicy {
    /// Port must be in `1..=65535` (connect addresses).
    NonZero,
    /// Port `0` is allowed and means "let the OS pick" (listen addresses).
    AllowEphemeral,
}

/// A validated host and port pair.
///
/// Only constructed through the parser, so `host` is never empty and `port`
/// respects the [`PortPolicy`] it was parsed with.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    host: String,
    port: u16,
}

impl Address {
    /// Parses a connect address like `"192.168.1.20:12321"` or `"[::1]:12321"`.
    ///
    /// # Errors
    ///
    /// Returns [`AddressParseError::InvalidAddress`] when the host is empty or
    /// the port is missing, non-numeric, zero or out of range.
    pub fn parse(raw: &str) -> Result<Self, AddressParseError> {
        Self::parse_with(raw, PortPolicy::NonZero)
    }

    /// Parses a listen address. Same rules as [`Address::parse`] except that
    /// port `0` is accepted for ephemeral binds.
    pub fn parse_listen(raw: &str) -> Result<Self, AddressParseError> {
        Self::parse_with(raw, PortPolicy::AllowEphemeral)
    }

    /// Shared parsing routine behind [`Address::parse`] and [`Address::parse_listen`].
    pub fn parse_with(raw: &str, policy: PortPolicy) -> Result<Self, AddressParseError> {
        let input = raw.trim();
        let invalid = |fault| AddressParseError::InvalidAddress {
            input: input.to_string(),
            fault,
        };

        let (host, port) = if let Some(rest) = input.strip_prefix('[') {
            // Bracketed IPv6 literal: [addr]:port
            let (host, after) = rest
                .split_once(']')
                .ok_or_else(|| invalid(AddressFault::MissingHost))?;
            let port = after
                .strip_prefix(':')
                .ok_or_else(|| invalid(AddressFault::MissingPort))?;
            (host, port)
        } else {
            let (host, port) = input
                .rsplit_once(':')
                .ok_or_else(|| invalid(AddressFault::MissingPort))?;
            if host.contains(':') {
                // Unbracketed IPv6 is ambiguous about where the port starts
                return Err(invalid(AddressFault::MissingHost));
            }
            (host, port)
        };

        if host.is_empty() || host.chars().any(char::is_whitespace) {
            return Err(invalid(AddressFault::MissingHost));
        }
        if port.is_empty() {
            return Err(invalid(AddressFault::MissingPort));
        }
        if !port.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid(AddressFault::NonNumericPort));
        }

        let port: u16 = port
            .parse()
            .map_err(|_| invalid(AddressFault::PortOutOfRange))?;
        if port == 0 && policy == PortPolicy::NonZero {
            return Err(invalid(AddressFault::PortOutOfRange));
        }

        Ok(Self {
            host: host.to_string(),
            port,
        })
    }

    /// Host part, without IPv6 brackets.
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// What was wrong with a rejected address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressFault {
    MissingHost,
    MissingPort,
    NonNumericPort,
    PortOutOfRange,
}

impl fmt::Display for AddressFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingHost => write!(f, "address needs a host part"),
            Self::MissingPort => write!(f, "address needs a port part"),
            Self::NonNumericPort => write!(f, "port is not a number"),
            Self::PortOutOfRange => write!(f, "port must be between 1 and 65535"),
        }
    }
}

/// Error returned by the address parser.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressParseError {
    #[error("invalid address '{input}': {fault}")]
    InvalidAddress { input: String, fault: AddressFault },
}

impl AddressParseError {
    pub fn fault(&self) -> AddressFault {
        match self {
            Self::InvalidAddress { fault, .. } => *fault,
        }
    }
}
