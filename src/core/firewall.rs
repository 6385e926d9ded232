//! Rule index and packet matching
//!
//! A [`RuleIndex`] holds one [`Bucket`] per (direction, protocol) pair. Each
//! bucket stores:
//!
//! - the set of allowed ports,
//! - the set of allowed single source addresses (canonical dotted-quad text),
//! - a list of allowed source address ranges (closed intervals of
//!   [`NumericIp`]).
//!
//! A packet is accepted when its port is in the bucket's port set **and** its
//! source address is either a listed address or inside at least one range.
//! Ranges are never merged; overlapping and duplicate ranges are kept and each
//! is checked on its own.
//!
//! The index is filled once and then only read. It holds no interior
//! mutability, so a built index can be shared across threads by reference.
//!
//! # Example
//!
//! ```
//! use portgate::core::firewall::{Direction, Protocol, RuleIndex};
//! use portgate::core::rule::PortSpec;
//!
//! let mut index = RuleIndex::new();
//! index
//!     .insert_port_rule(Direction::Inbound, Protocol::Tcp, PortSpec::single(80))
//!     .unwrap();
//! index
//!     .insert_range_rule(Direction::Inbound, Protocol::Tcp, "192.168.1.1", "192.168.1.10")
//!     .unwrap();
//!
//! assert!(index.accept("inbound", "tcp", 80, "192.168.1.5"));
//! assert!(!index.accept("inbound", "tcp", 80, "192.168.1.11"));
//! assert!(!index.accept("inbound", "tcp", 81, "192.168.1.5"));
//! assert!(!index.accept("outbound", "tcp", 80, "192.168.1.5"));
//! ```

use super::address::{self, NumericIp};
use super::error::{Error, Result};
use super::query::{Decision, DecisionReason, QueryRecord};
use super::rule::{AddressSpec, PortSpec, RuleRecord};
use ipnetwork::Ipv4Network;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::HashSet;
use std::fmt;
use std::net::Ipv4Addr;
use strum::IntoEnumIterator;

/// Traffic direction of a packet
///
/// Parsing via `FromStr` is exact (`"inbound"`, `"outbound"`), matching the
/// query format. Rule files get a more forgiving parser in [`super::rule`].
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[strum(serialize = "inbound")]
    Inbound,
    #[strum(serialize = "outbound")]
    Outbound,
}

/// Transport protocol of a packet
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// Transmission Control Protocol
    #[strum(serialize = "tcp")]
    Tcp,
    /// User Datagram Protocol
    #[strum(serialize = "udp")]
    Udp,
}

/// Order in which a bucket's ranges are scanned
///
/// Scan order never changes a verdict, only how many ranges are compared
/// before a hit.
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
#[serde(rename_all = "snake_case")]
pub enum RangeOrder {
    /// Widest range first: a wide range is the likeliest to contain an
    /// arbitrary address.
    #[default]
    #[strum(serialize = "widest")]
    WidestFirst,
    /// Ranges are scanned in the order they were inserted
    #[strum(serialize = "insertion")]
    Insertion,
}

/// Identifies one bucket of the index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BucketKey {
    pub direction: Direction,
    pub protocol: Protocol,
}

impl BucketKey {
    pub const fn new(direction: Direction, protocol: Protocol) -> Self {
        Self {
            direction,
            protocol,
        }
    }

    const fn slot(self) -> usize {
        let d = match self.direction {
            Direction::Inbound => 0,
            Direction::Outbound => 1,
        };
        let p = match self.protocol {
            Protocol::Tcp => 0,
            Protocol::Udp => 1,
        };
        d * 2 + p
    }

    /// All four keys, inbound before outbound, tcp before udp
    pub fn all() -> impl Iterator<Item = BucketKey> {
        Direction::iter().flat_map(|d| Protocol::iter().map(move |p| BucketKey::new(d, p)))
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.direction, self.protocol)
    }
}

/// Closed interval of addresses, `low <= high`
///
/// The endpoints are private so that every range goes through one of the
/// constructors below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AddressRange {
    low: NumericIp,
    high: NumericIp,
}

impl AddressRange {
    /// Builds a range from two encoded endpoints.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if `low > high`; such a range could
    /// never match anything.
    pub fn new(low: NumericIp, high: NumericIp) -> Result<Self> {
        if low > high {
            return Err(Error::invalid_address(format!("{low}-{high}")));
        }
        Ok(Self { low, high })
    }

    /// Encodes both endpoints and builds the range.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if either endpoint is malformed or
    /// the endpoints are inverted.
    pub fn parse(low: &str, high: &str) -> Result<Self> {
        Self::new(address::encode(low)?, address::encode(high)?)
    }

    /// Network address through broadcast address of a CIDR block
    pub fn from_network(network: Ipv4Network) -> Self {
        Self {
            low: network.network().into(),
            high: network.broadcast().into(),
        }
    }

    pub fn low(&self) -> NumericIp {
        self.low
    }

    pub fn high(&self) -> NumericIp {
        self.high
    }

    pub fn contains(&self, key: NumericIp) -> bool {
        self.low <= key && key <= self.high
    }

    /// Number of addresses covered, minus one
    pub fn span(&self) -> u32 {
        u32::from(Ipv4Addr::from(self.high)) - u32::from(Ipv4Addr::from(self.low))
    }
}

impl fmt::Display for AddressRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.low, self.high)
    }
}

/// Rules for one (direction, protocol) pair
#[derive(Debug, Clone, Default)]
pub struct Bucket {
    ports: HashSet<u16>,
    addresses: HashSet<String>,
    ranges: Vec<AddressRange>,
}

impl Bucket {
    pub fn allows_port(&self, port: u16) -> bool {
        self.ports.contains(&port)
    }

    pub fn lists_address(&self, canonical: &str) -> bool {
        self.addresses.contains(canonical)
    }

    /// First range (in scan order) containing `key`
    pub fn find_range(&self, key: NumericIp) -> Option<&AddressRange> {
        self.ranges.iter().find(|r| r.contains(key))
    }

    /// Ranges in scan order
    pub fn ranges(&self) -> &[AddressRange] {
        &self.ranges
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty() && self.addresses.is_empty() && self.ranges.is_empty()
    }

    fn push_range(&mut self, range: AddressRange, order: RangeOrder) {
        match order {
            RangeOrder::WidestFirst => {
                // Equal spans keep insertion order
                let at = self.ranges.partition_point(|r| r.span() >= range.span());
                self.ranges.insert(at, range);
            }
            RangeOrder::Insertion => self.ranges.push(range),
        }
    }

    fn sort_ranges(&mut self, order: RangeOrder) {
        if order == RangeOrder::WidestFirst {
            // Stable, so equal spans keep insertion order
            self.ranges.sort_by_key(|r| Reverse(r.span()));
        }
    }
}

/// Per-bucket counts, as reported by `portgate inspect`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BucketStats {
    pub direction: Direction,
    pub protocol: Protocol,
    pub ports: usize,
    pub addresses: usize,
    pub ranges: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub range_order: RangeOrder,
    pub buckets: Vec<BucketStats>,
}

/// The allowed (direction, protocol, port, source address) combinations
#[derive(Debug, Clone, Default)]
pub struct RuleIndex {
    buckets: [Bucket; 4],
    order: RangeOrder,
}

impl RuleIndex {
    /// Empty index scanning ranges widest first
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_range_order(order: RangeOrder) -> Self {
        Self {
            buckets: Default::default(),
            order,
        }
    }

    pub fn range_order(&self) -> RangeOrder {
        self.order
    }

    pub fn bucket(&self, key: BucketKey) -> &Bucket {
        &self.buckets[key.slot()]
    }

    fn bucket_mut(&mut self, direction: Direction, protocol: Protocol) -> &mut Bucket {
        &mut self.buckets[BucketKey::new(direction, protocol).slot()]
    }

    /// Allows every port of `ports` in the bucket. Re-inserting a port is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPort`] for an inverted range.
    pub fn insert_port_rule(
        &mut self,
        direction: Direction,
        protocol: Protocol,
        ports: PortSpec,
    ) -> Result<()> {
        let range = ports.validate()?;
        self.bucket_mut(direction, protocol).ports.extend(range);
        Ok(())
    }

    /// Allows a single source address in the bucket.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if `address` is not a dotted quad.
    pub fn insert_address_rule(
        &mut self,
        direction: Direction,
        protocol: Protocol,
        address: &str,
    ) -> Result<()> {
        let canonical = address::normalize(address)?;
        self.bucket_mut(direction, protocol)
            .addresses
            .insert(canonical);
        Ok(())
    }

    /// Allows the closed address interval `[low, high]` in the bucket.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if either endpoint is malformed or
    /// `low` sorts after `high`. Nothing is inserted in that case.
    pub fn insert_range_rule(
        &mut self,
        direction: Direction,
        protocol: Protocol,
        low: &str,
        high: &str,
    ) -> Result<()> {
        let range = AddressRange::parse(low, high)?;
        let order = self.order;
        self.bucket_mut(direction, protocol).push_range(range, order);
        Ok(())
    }

    /// Allows every address of a CIDR block in the bucket.
    pub fn insert_network_rule(
        &mut self,
        direction: Direction,
        protocol: Protocol,
        network: Ipv4Network,
    ) {
        let order = self.order;
        self.bucket_mut(direction, protocol)
            .push_range(AddressRange::from_network(network), order);
    }

    /// Inserts both criteria of a parsed rule line.
    ///
    /// Both criteria are validated before anything is inserted, so a rejected
    /// rule never leaves its port allowed on its own.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPort`] or [`Error::InvalidAddress`].
    pub fn insert_rule(&mut self, rule: &RuleRecord) -> Result<()> {
        let order = self.order;
        self.insert_rule_with(rule, |bucket, range| bucket.push_range(range, order))
    }

    /// Bulk-load variant of [`insert_rule`](Self::insert_rule): ranges are
    /// appended unsorted. The caller must call
    /// [`order_ranges`](Self::order_ranges) before querying.
    pub(crate) fn insert_rule_unordered(&mut self, rule: &RuleRecord) -> Result<()> {
        self.insert_rule_with(rule, |bucket, range| bucket.ranges.push(range))
    }

    /// Puts every bucket's ranges into scan order, one sort per bucket.
    pub(crate) fn order_ranges(&mut self) {
        let order = self.order;
        for bucket in &mut self.buckets {
            bucket.sort_ranges(order);
        }
    }

    fn insert_rule_with(
        &mut self,
        rule: &RuleRecord,
        push_range: impl FnOnce(&mut Bucket, AddressRange),
    ) -> Result<()> {
        enum Resolved {
            Single(String),
            Range(AddressRange),
        }

        rule.ports.validate()?;
        let resolved = match &rule.addresses {
            AddressSpec::Single(addr) => Resolved::Single(address::normalize(addr)?),
            AddressSpec::Range { low, high } => Resolved::Range(AddressRange::parse(low, high)?),
            AddressSpec::Network(net) => Resolved::Range(AddressRange::from_network(*net)),
        };

        self.insert_port_rule(rule.direction, rule.protocol, rule.ports)?;
        let bucket = self.bucket_mut(rule.direction, rule.protocol);
        match resolved {
            Resolved::Single(canonical) => {
                bucket.addresses.insert(canonical);
            }
            Resolved::Range(range) => push_range(bucket, range),
        }
        Ok(())
    }

    /// Decides whether a packet is allowed.
    ///
    /// `direction` and `protocol` must be exactly `inbound`/`outbound` and
    /// `tcp`/`udp`. Anything unrecognized, including a malformed source
    /// address, is rejected.
    pub fn accept(&self, direction: &str, protocol: &str, port: u16, source_ip: &str) -> bool {
        self.decide(direction, protocol, port, source_ip).accepted
    }

    /// Like [`accept`](Self::accept), but also reports why.
    pub fn evaluate(&self, query: &QueryRecord) -> Decision {
        self.decide(
            &query.direction,
            &query.protocol,
            query.port,
            &query.source_ip,
        )
    }

    fn decide(&self, direction: &str, protocol: &str, port: u16, source_ip: &str) -> Decision {
        let Ok(direction) = direction.parse::<Direction>() else {
            return Decision::reject(DecisionReason::UnrecognizedDirection);
        };
        let Ok(protocol) = protocol.parse::<Protocol>() else {
            return Decision::reject(DecisionReason::UnrecognizedProtocol);
        };

        let bucket = self.bucket(BucketKey::new(direction, protocol));
        if !bucket.allows_port(port) {
            return Decision::reject(DecisionReason::PortNotAllowed);
        }

        let Ok(key) = address::encode(source_ip) else {
            return Decision::reject(DecisionReason::InvalidAddress);
        };
        if bucket.lists_address(&key.to_string()) {
            return Decision::accept(DecisionReason::AddressMatched);
        }

        match bucket.find_range(key) {
            Some(range) => Decision::accept(DecisionReason::RangeMatched {
                low: range.low(),
                high: range.high(),
            }),
            None => Decision::reject(DecisionReason::NoMatch { key }),
        }
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            range_order: self.order,
            buckets: BucketKey::all()
                .map(|key| {
                    let bucket = self.bucket(key);
                    BucketStats {
                        direction: key.direction,
                        protocol: key.protocol,
                        ports: bucket.ports.len(),
                        addresses: bucket.addresses.len(),
                        ranges: bucket.ranges.len(),
                    }
                })
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(Bucket::is_empty)
    }
}
