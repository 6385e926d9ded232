//! Core packet-filtering logic
//!
//! - [`address`]: order-preserving numeric encoding of IPv4 addresses
//! - [`firewall`]: the per-(direction, protocol) rule index and matching
//! - [`rule`]: rule records and the rule-file line grammar
//! - [`query`]: query records and verdicts
//! - [`loader`]: building an index from rule files, evaluating query files
//! - [`error`]: error types

pub mod address;
pub mod error;
pub mod firewall;
pub mod loader;
pub mod query;
pub mod rule;

#[cfg(test)]
pub mod test_helpers;

#[cfg(test)]
mod tests;
