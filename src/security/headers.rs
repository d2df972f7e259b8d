//! Label header policy.
//!
//! # Responsibilities
//! - Strip any client-supplied copy of the label header
//! - Write the computed label list
//!
//! # Design Decisions
//! - Never trust an incoming label header: every value is removed, not just
//!   the first
//! - No match leaves the header absent rather than writing a "denied" value

use axum::http::{HeaderMap, HeaderName, HeaderValue};

use crate::mapping::MatchResult;
use crate::observability::metrics;

/// Strips and injects one configurable request header.
#[derive(Debug, Clone)]
pub struct HeaderPolicy {
    name: HeaderName,
}

impl HeaderPolicy {
    pub fn new(name: HeaderName) -> Self {
        Self { name }
    }

    pub fn header_name(&self) -> &HeaderName {
        &self.name
    }

    /// Remove every value of the header. Returns true if anything was removed.
    pub fn strip(&self, headers: &mut HeaderMap) -> bool {
        if !headers.contains_key(&self.name) {
            return false;
        }

        let spoofed: Vec<&HeaderValue> = headers.get_all(&self.name).iter().collect();
        tracing::warn!(
            header = %self.name,
            values = ?spoofed,
            "Label header present before IP mapping, stripping"
        );
        metrics::record_spoofed_header();

        headers.remove(&self.name);
        true
    }

    /// Write the matched labels. An empty result leaves the header absent.
    pub fn inject(&self, headers: &mut HeaderMap, result: &MatchResult) -> bool {
        if result.is_empty() {
            return false;
        }

        match HeaderValue::from_str(&result.header_value()) {
            Ok(value) => {
                headers.insert(self.name.clone(), value);
                true
            }
            Err(e) => {
                // Labels are validated at load time, so this means a table was
                // built around the parser.
                tracing::error!(labels = %result, error = %e, "Matched labels are not a valid header value");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{match_labels, MappingTable};

    const NAME: &str = "x-network-labels";

    fn policy() -> HeaderPolicy {
        HeaderPolicy::new(HeaderName::from_static(NAME))
    }

    fn result_for(ip: &str) -> MatchResult {
        let table = MappingTable::parse("internal=10.0.0.0/8\nlab=10.1.0.0/16\n").unwrap();
        match_labels(ip.parse().unwrap(), &table)
    }

    #[test]
    fn strip_removes_every_value() {
        let mut headers = HeaderMap::new();
        headers.append(NAME, HeaderValue::from_static("attacker-label"));
        headers.append(NAME, HeaderValue::from_static("admin"));
        headers.insert("accept", HeaderValue::from_static("*/*"));

        assert!(policy().strip(&mut headers));
        assert!(!headers.contains_key(NAME));
        assert!(headers.contains_key("accept"));
    }

    #[test]
    fn strip_without_header_is_noop() {
        let mut headers = HeaderMap::new();
        assert!(!policy().strip(&mut headers));
        assert!(headers.is_empty());
    }

    #[test]
    fn strip_matches_case_insensitively() {
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_bytes(b"X-Network-Labels").unwrap(),
            HeaderValue::from_static("spoof"),
        );
        assert!(policy().strip(&mut headers));
        assert!(headers.is_empty());
    }

    #[test]
    fn inject_joins_labels_without_spaces() {
        let mut headers = HeaderMap::new();
        assert!(policy().inject(&mut headers, &result_for("10.1.2.3")));
        assert_eq!(headers.get(NAME).unwrap(), "internal,lab");
    }

    #[test]
    fn inject_empty_result_leaves_header_absent() {
        let mut headers = HeaderMap::new();
        assert!(!policy().inject(&mut headers, &result_for("8.8.8.8")));
        assert!(headers.get(NAME).is_none());
    }
}
