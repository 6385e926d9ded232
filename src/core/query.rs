//! Query records and verdicts
//!
//! A query line has exactly four comma-separated fields:
//!
//! ```text
//! direction,protocol,port,ip
//! ```
//!
//! Direction and protocol stay textual; the index rejects values it does
//! not recognize when the query is evaluated.

use super::address::NumericIp;
use super::error::{Error, Result};
use crate::validators::parse_port;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One packet descriptor to evaluate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRecord {
    pub direction: String,
    pub protocol: String,
    pub port: u16,
    pub source_ip: String,
}

impl QueryRecord {
    /// Parses `direction,protocol,port,ip`. Fields are trimmed.
    ///
    /// # Errors
    ///
    /// - [`Error::MalformedLine`] unless there are exactly four fields
    /// - [`Error::InvalidPort`] if the port is not a number in 0-65535
    pub fn parse(line: &str) -> Result<Self> {
        let fields: Vec<&str> = line.trim().split(',').map(str::trim).collect();
        let [direction, protocol, port, source_ip] = fields.as_slice() else {
            return Err(Error::malformed(format!(
                "expected 4 fields, found {}",
                fields.len()
            )));
        };

        Ok(Self {
            direction: (*direction).to_string(),
            protocol: (*protocol).to_string(),
            port: parse_port(port)?,
            source_ip: (*source_ip).to_string(),
        })
    }
}

impl fmt::Display for QueryRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{}",
            self.direction, self.protocol, self.port, self.source_ip
        )
    }
}

/// Why a query was accepted or rejected
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DecisionReason {
    UnrecognizedDirection,
    UnrecognizedProtocol,
    PortNotAllowed,
    /// Source address is not a dotted quad
    InvalidAddress,
    /// Query line could not be parsed at all
    MalformedQuery { message: String },
    /// Source address is listed as a single-address rule
    AddressMatched,
    RangeMatched { low: NumericIp, high: NumericIp },
    /// Port allowed, but the address matched no rule. `key` is the encoded
    /// address that the range scan rejected.
    NoMatch { key: NumericIp },
}

impl fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecisionReason::UnrecognizedDirection => f.write_str("unrecognized direction"),
            DecisionReason::UnrecognizedProtocol => f.write_str("unrecognized protocol"),
            DecisionReason::PortNotAllowed => f.write_str("port not allowed"),
            DecisionReason::InvalidAddress => f.write_str("invalid source address"),
            DecisionReason::MalformedQuery { message } => write!(f, "malformed query: {message}"),
            DecisionReason::AddressMatched => f.write_str("address rule matched"),
            DecisionReason::RangeMatched { low, high } => {
                write!(f, "range {low}-{high} matched")
            }
            DecisionReason::NoMatch { key } => {
                write!(f, "no address rule matched (key {})", key.value())
            }
        }
    }
}

/// Verdict for one query
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decision {
    pub accepted: bool,
    pub reason: DecisionReason,
}

impl Decision {
    pub fn accept(reason: DecisionReason) -> Self {
        Self {
            accepted: true,
            reason,
        }
    }

    pub fn reject(reason: DecisionReason) -> Self {
        Self {
            accepted: false,
            reason,
        }
    }
}
