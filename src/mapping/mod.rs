//! Label → CIDR mapping subsystem.
//!
//! # Data Flow
//! ```text
//! mapping file (label=cidr,cidr,...)
//!     → store.rs (read whole file, per request or as a snapshot)
//!     → table.rs (parse into ordered MappingRules)
//!     → cidr.rs (validate every subnet entry)
//!     → matcher.rs (client IP → MatchResult)
//! ```
//!
//! # Design Decisions
//! - A table only ever holds valid CIDR blocks; bad entries fail the load
//! - Load failures are reported, never turned into "match all" or "match none"

pub mod cidr;
pub mod matcher;
pub mod store;
pub mod table;

use std::path::PathBuf;

use thiserror::Error;

pub use cidr::{CidrBlock, SubnetFormatError};
pub use matcher::{match_labels, MatchResult};
pub use store::{MappingFile, MappingSnapshot, MappingStore};
pub use table::{MappingRule, MappingTable};

/// Errors raised while obtaining a mapping table.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The mapping source could not be read.
    #[error("failed to read mapping file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A line could not be split into label and value.
    #[error("mapping line {line}: {reason}")]
    Parse { line: usize, reason: String },

    /// A label cannot be emitted in a header value.
    #[error("invalid label {label:?}: {reason}")]
    Label { label: String, reason: String },

    /// A subnet entry under `label` is not a valid CIDR block.
    #[error("rule {label:?}: {source}")]
    Subnet {
        label: String,
        #[source]
        source: SubnetFormatError,
    },

    /// No usable table is loaded (snapshot mode before the first good load).
    #[error("mapping unavailable: {0}")]
    Unavailable(String),
}

impl ConfigError {
    /// Short tag for metrics labels.
    pub fn kind(&self) -> &'static str {
        match self {
            ConfigError::Io { .. } => "io",
            ConfigError::Parse { .. } => "parse",
            ConfigError::Label { .. } => "label",
            ConfigError::Subnet { .. } => "subnet",
            ConfigError::Unavailable(_) => "unavailable",
        }
    }
}
