//! Offline commands: look up an address, validate a deployment.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;

use serde::Serialize;
use thiserror::Error;

use crate::config::loader::{load_config, LoadError};
use crate::mapping::{match_labels, ConfigError, MappingFile};

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("{0} is IPv6; only IPv4 addresses are mapped")]
    Unsupported(IpAddr),

    #[error(transparent)]
    Config(#[from] LoadError),

    #[error(transparent)]
    Mapping(#[from] ConfigError),

    #[error("failed to render output: {0}")]
    Render(#[from] serde_json::Error),
}

/// Labels one address maps to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckReport {
    pub ip: Ipv4Addr,
    pub labels: Vec<String>,
}

impl CheckReport {
    /// The header value, `(no match)`, or pretty JSON.
    pub fn render(&self, json: bool) -> Result<String, CommandError> {
        if json {
            return Ok(serde_json::to_string_pretty(self)?);
        }
        if self.labels.is_empty() {
            Ok("(no match)".to_string())
        } else {
            Ok(self.labels.join(","))
        }
    }
}

pub fn check(mapping: &Path, ip: IpAddr) -> Result<CheckReport, CommandError> {
    let ip = match ip {
        IpAddr::V4(v4) => v4,
        IpAddr::V6(v6) => v6.to_ipv4_mapped().ok_or(CommandError::Unsupported(ip))?,
    };
    let table = MappingFile::new(mapping).load()?;
    let result = match_labels(ip, &table);
    Ok(CheckReport {
        ip,
        labels: result.labels().to_vec(),
    })
}

/// Summary of a config whose mapping file also loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidateReport {
    pub rules: usize,
    pub mapping_file: String,
    pub header_name: String,
}

impl fmt::Display for ValidateReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ok: {} rule(s) from {}, header {}",
            self.rules, self.mapping_file, self.header_name
        )
    }
}

pub fn validate(config_path: &Path) -> Result<ValidateReport, CommandError> {
    let config = load_config(config_path)?;
    let table = MappingFile::new(&config.mapper.mapping_file).load()?;
    Ok(ValidateReport {
        rules: table.len(),
        mapping_file: config.mapper.mapping_file,
        header_name: config.mapper.header_name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_temp(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn check_reports_matching_labels() {
        let mapping = write_temp("internal=10.0.0.0/8\nvpn=10.8.0.0/16\n");
        let report = check(mapping.path(), "10.8.1.1".parse().unwrap()).unwrap();
        assert_eq!(report.labels, ["internal", "vpn"]);
        assert_eq!(report.render(false).unwrap(), "internal,vpn");

        let json: serde_json::Value = serde_json::from_str(&report.render(true).unwrap()).unwrap();
        assert_eq!(json["ip"], "10.8.1.1");
        assert_eq!(json["labels"][1], "vpn");
    }

    #[test]
    fn check_without_match() {
        let mapping = write_temp("internal=10.0.0.0/8\n");
        let report = check(mapping.path(), "8.8.8.8".parse().unwrap()).unwrap();
        assert!(report.labels.is_empty());
        assert_eq!(report.render(false).unwrap(), "(no match)");
    }

    #[test]
    fn check_unwraps_mapped_ipv6_and_rejects_plain_ipv6() {
        let mapping = write_temp("internal=10.0.0.0/8\n");
        let report = check(mapping.path(), "::ffff:10.1.1.1".parse().unwrap()).unwrap();
        assert_eq!(report.ip, Ipv4Addr::new(10, 1, 1, 1));

        let err = check(mapping.path(), "2001:db8::1".parse().unwrap()).unwrap_err();
        assert!(matches!(err, CommandError::Unsupported(_)));
    }

    #[test]
    fn check_surfaces_bad_mapping() {
        let mapping = write_temp("broken=10.0.0.0/40\n");
        let err = check(mapping.path(), "10.0.0.1".parse().unwrap()).unwrap_err();
        assert!(matches!(err, CommandError::Mapping(ConfigError::Subnet { .. })));
    }

    #[test]
    fn validate_loads_config_and_mapping() {
        let mapping = write_temp("a=10.0.0.0/8\nb=192.168.0.0/16\n");
        let config = write_temp(&format!(
            "[mapper]\nmapping_file = {:?}\nheader_name = \"X-Zone\"\n",
            mapping.path().display().to_string()
        ));

        let report = validate(config.path()).unwrap();
        assert_eq!(report.rules, 2);
        assert_eq!(report.header_name, "X-Zone");
        assert!(report.to_string().starts_with("ok: 2 rule(s) from "));
    }

    #[test]
    fn validate_fails_on_missing_mapping() {
        let config = write_temp("[mapper]\nmapping_file = \"/nonexistent/ip-mapping.properties\"\n");
        let err = validate(config.path()).unwrap_err();
        assert!(matches!(err, CommandError::Mapping(ConfigError::Io { .. })));
    }

    #[test]
    fn validate_fails_on_invalid_config() {
        let config = write_temp("[timeouts]\nrequest_secs = 0\n");
        assert!(matches!(validate(config.path()).unwrap_err(), CommandError::Config(_)));
    }
}
