//! Configuration schema definitions.
//!
//! This module defines the service configuration for the mapper proxy.
//! All types derive Serde traits for deserialization from a TOML file.

use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct MapperConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Where annotated requests are forwarded.
    pub upstream: UpstreamConfig,

    /// IP mapping filter settings.
    pub mapper: MapperSettings,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Upstream service configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Upstream authority (e.g., "127.0.0.1:3000").
    pub address: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:3000".to_string(),
        }
    }
}

/// Filter settings, injected once into `IpMapper`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MapperSettings {
    /// Path to the label → CIDR mapping file.
    pub mapping_file: String,

    /// Header stripped from and written to each request.
    pub header_name: String,

    /// Header carrying the proxy chain.
    pub forwarded_header: String,

    /// Also strip the label header when the filter fails open.
    pub strip_on_failure: bool,

    pub client_ip: ClientIpConfig,

    pub reload: ReloadConfig,
}

impl Default for MapperSettings {
    fn default() -> Self {
        Self {
            mapping_file: "ip-mapping.properties".to_string(),
            header_name: "X-Network-Labels".to_string(),
            forwarded_header: "X-Forwarded-For".to_string(),
            strip_on_failure: false,
            client_ip: ClientIpConfig::default(),
            reload: ReloadConfig::default(),
        }
    }
}

/// Client address extraction.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ClientIpConfig {
    pub strategy: ClientIpStrategy,

    /// Proxies whose forwarding entries are skipped (`trusted_proxies` only).
    pub trusted_proxies: Vec<Ipv4Net>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ClientIpStrategy {
    /// First entry of the forwarding header, else the peer address.
    #[default]
    FirstForwarded,
    /// Rightmost hop outside `trusted_proxies`.
    TrustedProxies,
    /// Peer address only.
    PeerOnly,
}

/// Mapping file reload behavior.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReloadConfig {
    pub mode: ReloadMode,

    /// Poll interval for snapshot mode, in seconds.
    pub refresh_secs: u64,

    /// Also refresh on file-system change events (snapshot mode).
    pub watch: bool,
}

impl Default for ReloadConfig {
    fn default() -> Self {
        Self {
            mode: ReloadMode::PerRequest,
            refresh_secs: 30,
            watch: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReloadMode {
    /// Read the mapping file on every request.
    #[default]
    PerRequest,
    /// Serve a shared snapshot refreshed in the background.
    Snapshot,
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
