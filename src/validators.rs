//! Input validation for port fields
//!
//! Shared by the rule and query parsers and by the stress generator, so all
//! of them agree on what a valid port is.

use crate::core::error::{Error, Result};

/// Highest port number
pub const MAX_PORT: u16 = u16::MAX;

/// Parses a port number (0-65535).
///
/// Surrounding whitespace is ignored; signs and other non-digit characters
/// are not.
///
/// # Examples
///
/// ```
/// use portgate::validators::parse_port;
///
/// assert_eq!(parse_port(" 443 ").unwrap(), 443);
/// assert!(parse_port("+443").is_err());
/// assert!(parse_port("65536").is_err());
/// ```
///
/// # Errors
///
/// Returns [`Error::InvalidPort`] for empty, non-numeric or out-of-range
/// input.
pub fn parse_port(input: &str) -> Result<u16> {
    let trimmed = input.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::invalid_port(trimmed));
    }
    trimmed
        .parse::<u16>()
        .map_err(|_| Error::invalid_port(trimmed))
}

/// Validates a port range.
///
/// # Errors
///
/// Returns [`Error::InvalidPort`] if `start` is greater than `end`.
pub fn validate_port_range(start: u16, end: u16) -> Result<(u16, u16)> {
    if start > end {
        Err(Error::invalid_port(format!("{start}-{end}")))
    } else {
        Ok((start, end))
    }
}
