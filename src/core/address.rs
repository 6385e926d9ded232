//! Order-preserving numeric keys for IPv4 addresses
//!
//! Range rules compare addresses numerically, so every dotted-quad address is
//! mapped to a [`NumericIp`]: the four octets read as digits of a base-1000
//! number,
//!
//! ```text
//! key = ((o1 * 1000 + o2) * 1000 + o3) * 1000 + o4
//! ```
//!
//! Each octet (0-255) fits in its own three-digit field, so `1.2.3.4`
//! (`1_002_003_004`) and `1.20.3.4` (`1_020_003_004`) never collide and the
//! key order is exactly the octet-by-octet address order.
//!
//! # Example
//!
//! ```
//! use portgate::core::address::{NumericIp, encode};
//!
//! let key = encode("192.168.1.5").unwrap();
//! assert_eq!(key, NumericIp::from_octets([192, 168, 1, 5]));
//! assert_eq!(key.value(), 192_168_001_005);
//! assert_eq!(key.to_string(), "192.168.1.5");
//! assert!(encode("1.2.3.4").unwrap() < encode("1.20.3.4").unwrap());
//! ```

use super::error::{Error, Result};
use serde::Serialize;
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

const FIELD: u64 = 1000;

/// Numeric encoding of an IPv4 address, ordered like the address itself.
///
/// Serialize-only: a key can only be built from four octets, so every
/// base-1000 field stays within 0..=255.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct NumericIp(u64);

impl NumericIp {
    /// Smallest key (`0.0.0.0`)
    pub const MIN: NumericIp = NumericIp(0);
    /// Largest key (`255.255.255.255`)
    pub const MAX: NumericIp = NumericIp::from_octets([255, 255, 255, 255]);

    pub const fn from_octets(octets: [u8; 4]) -> Self {
        let mut value = 0;
        let mut i = 0;
        while i < 4 {
            value = value * FIELD + octets[i] as u64;
            i += 1;
        }
        Self(value)
    }

    /// Recovers the four octets. Every key built by this module decodes
    /// losslessly.
    pub const fn octets(self) -> [u8; 4] {
        let mut out = [0u8; 4];
        let mut rest = self.0;
        let mut i = 4;
        while i > 0 {
            i -= 1;
            out[i] = (rest % FIELD) as u8;
            rest /= FIELD;
        }
        out
    }

    pub const fn value(self) -> u64 {
        self.0
    }

    /// The address immediately after this one, if any.
    pub fn next(self) -> Option<Self> {
        let addr = Ipv4Addr::from(self);
        u32::from(addr).checked_add(1).map(|n| Ipv4Addr::from(n).into())
    }

    /// The address immediately before this one, if any.
    pub fn prev(self) -> Option<Self> {
        let addr = Ipv4Addr::from(self);
        u32::from(addr).checked_sub(1).map(|n| Ipv4Addr::from(n).into())
    }
}

impl From<Ipv4Addr> for NumericIp {
    fn from(addr: Ipv4Addr) -> Self {
        Self::from_octets(addr.octets())
    }
}

impl From<NumericIp> for Ipv4Addr {
    fn from(key: NumericIp) -> Self {
        let [a, b, c, d] = key.octets();
        Ipv4Addr::new(a, b, c, d)
    }
}

impl fmt::Display for NumericIp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d] = self.octets();
        write!(f, "{a}.{b}.{c}.{d}")
    }
}

impl FromStr for NumericIp {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        encode(s)
    }
}

/// Encodes a dotted-quad address into its [`NumericIp`].
///
/// Surrounding whitespace is ignored. Each of the four octets must be 1-3
/// ASCII digits with a value of at most 255; leading zeros are accepted
/// (`010` is ten).
///
/// # Errors
///
/// Returns [`Error::InvalidAddress`] for a wrong field count, an empty or
/// non-numeric octet, or an octet above 255.
pub fn encode(address: &str) -> Result<NumericIp> {
    let trimmed = address.trim();
    let mut octets = [0u8; 4];
    let mut fields = trimmed.split('.');

    for slot in &mut octets {
        let field = fields
            .next()
            .ok_or_else(|| Error::invalid_address(trimmed))?;
        *slot = parse_octet(field).ok_or_else(|| Error::invalid_address(trimmed))?;
    }

    if fields.next().is_some() {
        return Err(Error::invalid_address(trimmed));
    }

    Ok(NumericIp::from_octets(octets))
}

/// Returns the canonical dotted-quad spelling of `address`.
///
/// Discrete address rules and queries are compared in this form, so
/// `" 010.0.0.1"` and `"10.0.0.1"` name the same address.
///
/// # Errors
///
/// Same conditions as [`encode`].
pub fn normalize(address: &str) -> Result<String> {
    encode(address).map(|key| key.to_string())
}

fn parse_octet(field: &str) -> Option<u8> {
    if field.is_empty() || field.len() > 3 || !field.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    field.parse::<u16>().ok().and_then(|v| u8::try_from(v).ok())
}
