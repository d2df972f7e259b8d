//! Mapping table parsing.
//!
//! The mapping source is a properties-style text file:
//!
//! ```text
//! # label = comma-separated CIDR blocks
//! internal=10.0.0.0/8
//! vpn=172.16.0.0/12,192.168.0.0/16
//! ```
//!
//! Separators are `=`, `:` or whitespace. `#` and `!` start comments, and a
//! trailing backslash joins a line with the next one.

use std::slice;

use crate::mapping::cidr::CidrBlock;
use crate::mapping::ConfigError;

/// One label and the subnets it covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingRule {
    label: String,
    subnets: Vec<CidrBlock>,
}

impl MappingRule {
    /// Build a rule from a label and a comma-separated CIDR list.
    pub fn parse(label: &str, value: &str) -> Result<Self, ConfigError> {
        validate_label(label)?;

        let subnets = value
            .split(',')
            .map(|entry| entry.trim().parse::<CidrBlock>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|source| ConfigError::Subnet {
                label: label.to_string(),
                source,
            })?;

        Ok(Self {
            label: label.to_string(),
            subnets,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn subnets(&self) -> &[CidrBlock] {
        &self.subnets
    }
}

/// Ordered set of mapping rules, one per label.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingTable {
    rules: Vec<MappingRule>,
}

impl MappingTable {
    /// Parse the full text of a mapping source.
    ///
    /// Rules keep the order in which their label first appears. A repeated
    /// label replaces the earlier value in place.
    pub fn parse(source: &str) -> Result<Self, ConfigError> {
        let mut table = Self::default();

        for (line_no, line) in logical_lines(source) {
            let (key, value) = split_entry(&line);
            if key.is_empty() {
                return Err(ConfigError::Parse {
                    line: line_no,
                    reason: "entry has no label".to_string(),
                });
            }

            let rule = MappingRule::parse(key, value)?;
            match table.rules.iter_mut().find(|r| r.label == rule.label) {
                Some(existing) => {
                    tracing::debug!(label = %rule.label, line = line_no, "Duplicate label overrides earlier entry");
                    *existing = rule;
                }
                None => table.rules.push(rule),
            }
        }

        Ok(table)
    }

    pub fn from_rules(rules: Vec<MappingRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[MappingRule] {
        &self.rules
    }

    pub fn iter(&self) -> slice::Iter<'_, MappingRule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl<'a> IntoIterator for &'a MappingTable {
    type Item = &'a MappingRule;
    type IntoIter = slice::Iter<'a, MappingRule>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.iter()
    }
}

/// Labels end up verbatim in a comma-joined header value.
fn validate_label(label: &str) -> Result<(), ConfigError> {
    let invalid = |reason: &str| ConfigError::Label {
        label: label.to_string(),
        reason: reason.to_string(),
    };

    if label.is_empty() {
        return Err(invalid("label is empty"));
    }
    if label.contains(',') {
        return Err(invalid("label must not contain ','"));
    }
    if !label.bytes().all(|b| b.is_ascii_graphic()) {
        return Err(invalid("label must be visible ASCII"));
    }
    Ok(())
}

/// Yields `(first physical line number, joined logical line)` for every
/// non-blank, non-comment entry.
fn logical_lines(source: &str) -> Vec<(usize, String)> {
    let mut out = Vec::new();
    let mut pending: Option<(usize, String)> = None;

    for (idx, raw) in source.lines().enumerate() {
        let line = raw.trim_start();

        let (start, mut buf) = match pending.take() {
            Some(p) => p,
            None => {
                if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                    continue;
                }
                (idx + 1, String::new())
            }
        };

        if ends_with_continuation(line) {
            buf.push_str(&line[..line.len() - 1]);
            pending = Some((start, buf));
        } else {
            buf.push_str(line);
            out.push((start, buf));
        }
    }

    // A continuation on the last line just ends the entry.
    if let Some(p) = pending {
        out.push(p);
    }
    out
}

fn ends_with_continuation(line: &str) -> bool {
    line.bytes().rev().take_while(|&b| b == b'\\').count() % 2 == 1
}

fn split_entry(line: &str) -> (&str, &str) {
    let line = line.trim();
    match line.find(|c: char| c == '=' || c == ':' || c.is_whitespace()) {
        Some(pos) => {
            let key = &line[..pos];
            let mut rest = line[pos..].trim_start();
            let sep_was_space = line[pos..].starts_with(char::is_whitespace);
            // `key = value` and `key value` both parse.
            if sep_was_space {
                if let Some(stripped) = rest.strip_prefix(&['=', ':'][..]) {
                    rest = stripped;
                }
            } else {
                rest = &rest[1..];
            }
            (key, rest.trim())
        }
        None => (line, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(table: &MappingTable) -> Vec<&str> {
        table.iter().map(|r| r.label()).collect()
    }

    #[test]
    fn parses_rules_in_file_order() {
        let table = MappingTable::parse(
            "internal=10.0.0.0/8\nvpn=172.16.0.0/12,192.168.0.0/16\n",
        )
        .unwrap();

        assert_eq!(labels(&table), ["internal", "vpn"]);
        assert_eq!(table.rules()[1].subnets().len(), 2);
        assert_eq!(table.rules()[1].subnets()[1].to_string(), "192.168.0.0/16");
    }

    #[test]
    fn skips_comments_and_blank_lines() {
        let table = MappingTable::parse(
            "# campus ranges\n\n   ! legacy comment\ncampus = 129.2.0.0/16\n",
        )
        .unwrap();
        assert_eq!(labels(&table), ["campus"]);
    }

    #[test]
    fn accepts_all_separator_styles() {
        let table = MappingTable::parse(
            "a=10.0.0.0/8\nb:10.0.0.0/8\nc 10.0.0.0/8\nd = 10.0.0.0/8\ne : 10.0.0.0/8\n",
        )
        .unwrap();
        assert_eq!(labels(&table), ["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn trims_whitespace_around_entries() {
        let table = MappingTable::parse("vpn = 172.16.0.0/12 , 192.168.0.0/16 \n").unwrap();
        let subnets: Vec<String> = table.rules()[0].subnets().iter().map(|s| s.to_string()).collect();
        assert_eq!(subnets, ["172.16.0.0/12", "192.168.0.0/16"]);
    }

    #[test]
    fn joins_continuation_lines() {
        let table = MappingTable::parse(
            "library=10.1.0.0/16,\\\n    10.2.0.0/16,\\\n    10.3.0.0/16\nnext=8.8.8.0/24\n",
        )
        .unwrap();
        assert_eq!(labels(&table), ["library", "next"]);
        assert_eq!(table.rules()[0].subnets().len(), 3);
    }

    #[test]
    fn duplicate_label_replaces_value_in_place() {
        let table = MappingTable::parse("a=10.0.0.0/8\nb=11.0.0.0/8\na=12.0.0.0/8\n").unwrap();
        assert_eq!(labels(&table), ["a", "b"]);
        assert_eq!(table.rules()[0].subnets()[0].to_string(), "12.0.0.0/8");
    }

    #[test]
    fn malformed_subnet_fails_the_load() {
        let err = MappingTable::parse("good=10.0.0.0/8\nbad=10.0.0.0/8,not-a-cidr\n").unwrap_err();
        match err {
            ConfigError::Subnet { label, source } => {
                assert_eq!(label, "bad");
                assert_eq!(source.entry, "not-a-cidr");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn empty_value_and_empty_entries_are_malformed() {
        assert!(matches!(MappingTable::parse("a=\n"), Err(ConfigError::Subnet { .. })));
        assert!(matches!(MappingTable::parse("a=10.0.0.0/8,,11.0.0.0/8\n"), Err(ConfigError::Subnet { .. })));
        assert!(matches!(MappingTable::parse("a=10.0.0.0/8,\n"), Err(ConfigError::Subnet { .. })));
    }

    #[test]
    fn missing_label_reports_line() {
        let err = MappingTable::parse("a=10.0.0.0/8\n\n=11.0.0.0/8\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { line: 3, .. }));
    }

    #[test]
    fn rejects_labels_that_break_the_header() {
        assert!(matches!(MappingTable::parse("a,b=10.0.0.0/8\n"), Err(ConfigError::Label { .. })));
        assert!(matches!(MappingTable::parse("caf\u{e9}=10.0.0.0/8\n"), Err(ConfigError::Label { .. })));
    }

    #[test]
    fn empty_source_is_an_empty_table() {
        let table = MappingTable::parse("# nothing mapped yet\n").unwrap();
        assert!(table.is_empty());
    }
}
