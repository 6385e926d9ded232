//! portgate - static packet-filter decision engine
//!
//! Loads a fixed set of allow rules (direction, protocol, port, source
//! address) and answers, for each packet descriptor, whether it is allowed.
//!
//! # Architecture
//!
//! - [`core`] - Address encoding, rule index, rule/query parsing and loading
//! - [`validators`] - Port validation shared by parsers and tools
//! - [`config`] - Configuration persistence
//! - [`utils`] - XDG directory helpers
//!
//! # Example
//!
//! ```
//! use portgate::core::loader::{LoadOptions, load_rules_from_str};
//!
//! let outcome = load_rules_from_str(
//!     "inbound,tcp,80,192.168.1.1-192.168.1.10\ninbound,udp,53,8.8.8.8",
//!     LoadOptions::default(),
//! );
//! assert!(outcome.diagnostics.is_empty());
//! assert!(outcome.index.accept("inbound", "udp", 53, "8.8.8.8"));
//! assert!(!outcome.index.accept("inbound", "udp", 53, "8.8.4.4"));
//! ```

// Allow pedantic clippy warnings that are not worth fixing for this codebase
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::missing_errors_doc)]

pub mod config;
pub mod core;
pub mod utils;
pub mod validators;

// Re-export commonly used types
pub use crate::core::error::{Error, Result};
pub use crate::core::firewall::{Direction, Protocol, RuleIndex};
