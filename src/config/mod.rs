//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! service config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → MapperConfig (validated, immutable)
//!     → MapperSettings handed once to IpMapper
//!
//! Mapping file changes (snapshot mode):
//!     watcher.rs detects change
//!     → MappingSnapshot::reload
//!     → atomic swap of Arc<MappingTable>
//! ```
//!
//! # Design Decisions
//! - Service config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, LoadError};
pub use schema::{
    ClientIpConfig, ClientIpStrategy, ListenerConfig, MapperConfig, MapperSettings,
    ObservabilityConfig, ReloadConfig, ReloadMode, TimeoutConfig, UpstreamConfig,
};
pub use validation::{validate_config, ValidationError};
