//! Rule records and the rule-file line grammar
//!
//! One rule per line:
//!
//! ```text
//! <direction>,<protocol>,<port-spec>,<ip-spec>
//! <direction>,<protocol>:<port-spec>,<ip-spec>
//! ```
//!
//! - `port-spec` is `N` or `N-M` (inclusive)
//! - `ip-spec` is `a.b.c.d`, `a.b.c.d-e.f.g.h` (inclusive) or `a.b.c.d/len`
//!
//! Blank lines and lines starting with `#` carry no rule; see
//! [`is_ignorable`].

use super::error::{Error, Result};
use super::firewall::{Direction, Protocol};
use crate::validators::{parse_port, validate_port_range};
use ipnetwork::Ipv4Network;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;

/// How the direction and protocol fields of a rule line are interpreted
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
pub enum FieldMatching {
    /// `inbound`/`outbound` and `tcp`/`udp` only (ASCII case-insensitive).
    /// Anything else is an error and the line is skipped.
    #[default]
    #[strum(serialize = "strict")]
    Strict,
    /// A direction containing `inbound` is inbound, anything else outbound.
    /// A protocol containing `tcp` is tcp, anything else udp.
    #[strum(serialize = "lenient")]
    Lenient,
}

/// Port criterion of a rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortSpec {
    Single(u16),
    /// Inclusive on both ends
    Range { start: u16, end: u16 },
}

impl PortSpec {
    pub const fn single(port: u16) -> Self {
        PortSpec::Single(port)
    }

    /// Builds an inclusive port range.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPort`] if `start > end`.
    pub fn range(start: u16, end: u16) -> Result<Self> {
        validate_port_range(start, end)?;
        Ok(PortSpec::Range { start, end })
    }

    /// Parses `N` or `N-M`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPort`] for non-numeric or out-of-range ports
    /// and for inverted ranges.
    pub fn parse(spec: &str) -> Result<Self> {
        let spec = spec.trim();
        match spec.split_once('-') {
            None => Ok(PortSpec::Single(parse_port(spec)?)),
            Some((start, end)) => {
                let (start, end) = (parse_port(start)?, parse_port(end)?);
                Self::range(start, end).map_err(|_| Error::invalid_port(spec))
            }
        }
    }

    /// The ports covered, checked for an inverted range
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPort`] if this is a range with `start > end`.
    pub fn validate(self) -> Result<RangeInclusive<u16>> {
        match self {
            PortSpec::Single(port) => Ok(port..=port),
            PortSpec::Range { start, end } => {
                validate_port_range(start, end)?;
                Ok(start..=end)
            }
        }
    }
}

impl fmt::Display for PortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortSpec::Single(port) => write!(f, "{port}"),
            PortSpec::Range { start, end } => write!(f, "{start}-{end}"),
        }
    }
}

/// Source-address criterion of a rule
///
/// Single addresses and range endpoints are kept as text and only encoded
/// when the rule is inserted into the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressSpec {
    Single(String),
    Range { low: String, high: String },
    /// CIDR block, covering its network through broadcast address
    Network(Ipv4Network),
}

impl AddressSpec {
    /// Splits an ip-spec into its form.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] for an empty spec or a CIDR block
    /// that does not parse.
    pub fn parse(spec: &str) -> Result<Self> {
        let spec = spec.trim();
        if spec.is_empty() {
            return Err(Error::invalid_address(spec));
        }
        if spec.contains('/') {
            return spec
                .parse::<Ipv4Network>()
                .map(AddressSpec::Network)
                .map_err(|_| Error::invalid_address(spec));
        }
        Ok(match spec.split_once('-') {
            Some((low, high)) => AddressSpec::Range {
                low: low.trim().to_string(),
                high: high.trim().to_string(),
            },
            None => AddressSpec::Single(spec.to_string()),
        })
    }
}

impl fmt::Display for AddressSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressSpec::Single(addr) => f.write_str(addr),
            AddressSpec::Range { low, high } => write!(f, "{low}-{high}"),
            AddressSpec::Network(net) => write!(f, "{net}"),
        }
    }
}

/// One parsed rule line: port criterion AND address criterion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleRecord {
    pub direction: Direction,
    pub protocol: Protocol,
    pub ports: PortSpec,
    pub addresses: AddressSpec,
}

impl RuleRecord {
    /// Parses one rule line.
    ///
    /// # Errors
    ///
    /// - [`Error::MalformedLine`] when separators are missing or there are
    ///   extra fields
    /// - [`Error::UnrecognizedDirection`] / [`Error::UnrecognizedProtocol`]
    ///   in [`FieldMatching::Strict`] mode
    /// - [`Error::InvalidPort`] / [`Error::InvalidAddress`] from the specs
    pub fn parse(line: &str, matching: FieldMatching) -> Result<Self> {
        let line = line.trim();
        let (direction, rest) = line
            .split_once(',')
            .ok_or_else(|| Error::malformed("missing ',' after direction"))?;
        let sep = rest
            .find([':', ','])
            .ok_or_else(|| Error::malformed("missing ':' or ',' after protocol"))?;
        let (protocol, rest) = (&rest[..sep], &rest[sep + 1..]);
        let (ports, addresses) = rest
            .split_once(',')
            .ok_or_else(|| Error::malformed("missing ',' between port and address"))?;
        if addresses.contains(',') {
            return Err(Error::malformed("too many fields"));
        }

        Ok(Self {
            direction: parse_direction(direction, matching)?,
            protocol: parse_protocol(protocol, matching)?,
            ports: PortSpec::parse(ports)?,
            addresses: AddressSpec::parse(addresses)?,
        })
    }
}

impl fmt::Display for RuleRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{}",
            self.direction, self.protocol, self.ports, self.addresses
        )
    }
}

/// `true` for lines that carry no rule (blank or `#` comment)
pub fn is_ignorable(line: &str) -> bool {
    let line = line.trim();
    line.is_empty() || line.starts_with('#')
}

fn parse_direction(field: &str, matching: FieldMatching) -> Result<Direction> {
    let field = field.trim();
    match matching {
        FieldMatching::Strict => field
            .to_ascii_lowercase()
            .parse()
            .map_err(|_| Error::UnrecognizedDirection(field.to_string())),
        FieldMatching::Lenient if field.contains("inbound") => Ok(Direction::Inbound),
        FieldMatching::Lenient => Ok(Direction::Outbound),
    }
}

fn parse_protocol(field: &str, matching: FieldMatching) -> Result<Protocol> {
    let field = field.trim();
    match matching {
        FieldMatching::Strict => field
            .to_ascii_lowercase()
            .parse()
            .map_err(|_| Error::UnrecognizedProtocol(field.to_string())),
        FieldMatching::Lenient if field.contains("tcp") => Ok(Protocol::Tcp),
        FieldMatching::Lenient => Ok(Protocol::Udp),
    }
}
