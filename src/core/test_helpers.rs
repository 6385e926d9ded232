//! Shared test utilities for core module tests
//!
//! This module is only compiled in test mode.

use crate::core::firewall::{Direction, Protocol, RangeOrder, RuleIndex};
use crate::core::loader::{LoadOptions, load_rules_from_str};
use crate::core::query::QueryRecord;

/// Builds an index from rule text, asserting every line loaded.
pub fn index_from(rules: &str) -> RuleIndex {
    index_with_order(rules, RangeOrder::WidestFirst)
}

pub fn index_with_order(rules: &str, range_order: RangeOrder) -> RuleIndex {
    let outcome = load_rules_from_str(
        rules,
        LoadOptions {
            range_order,
            ..LoadOptions::default()
        },
    );
    assert!(
        outcome.diagnostics.is_empty(),
        "unexpected diagnostics: {:?}",
        outcome.diagnostics
    );
    outcome.index
}

pub fn query(direction: Direction, protocol: Protocol, port: u16, ip: &str) -> QueryRecord {
    QueryRecord {
        direction: direction.to_string(),
        protocol: protocol.to_string(),
        port,
        source_ip: ip.to_string(),
    }
}
