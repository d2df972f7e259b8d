//! IP address mapping filter and annotating proxy.
//!
//! Resolves each request's client IPv4 address, matches it against labeled
//! CIDR ranges from a mapping file and writes the matched labels into a
//! request header for downstream authorization.

pub mod cli;
pub mod config;
pub mod filter;
pub mod http;
pub mod lifecycle;
pub mod mapping;
pub mod observability;
pub mod security;

pub use config::schema::MapperConfig;
pub use filter::{FilterOutcome, IpMapper};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use mapping::{match_labels, MappingStore, MappingTable, MatchResult};
