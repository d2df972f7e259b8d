//! Subnet membership evaluation.
//!
//! # Design Decisions
//! - Union of all matching rules, no first-match-wins
//! - A rule contributes its label once, however many of its subnets match
//! - Result order follows table order so the header value is stable

use std::fmt;
use std::net::Ipv4Addr;

use crate::mapping::table::MappingTable;

/// Labels whose subnets contain the client address, in rule order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchResult {
    labels: Vec<String>,
}

impl MatchResult {
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Comma-joined labels, as written into the request header.
    pub fn header_value(&self) -> String {
        self.labels.join(",")
    }
}

impl fmt::Display for MatchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.header_value())
    }
}

/// Evaluate every rule in `table` against `ip`.
pub fn match_labels(ip: Ipv4Addr, table: &MappingTable) -> MatchResult {
    let labels = table
        .iter()
        .filter(|rule| rule.subnets().iter().any(|subnet| subnet.contains(ip)))
        .map(|rule| rule.label().to_string())
        .collect();

    MatchResult { labels }
}
