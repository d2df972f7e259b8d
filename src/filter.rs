//! IP mapping filter.
//!
//! # Data Flow
//! ```text
//! request headers + peer address
//!     → MappingStore::current (rules for this request)
//!     → HeaderPolicy::strip (drop client-sent label header)
//!     → ClientIpResolver::resolve (one IPv4 candidate)
//!     → match_labels (union of matching rules)
//!     → HeaderPolicy::inject (only when something matched)
//! ```
//!
//! # Design Decisions
//! - Fail open: a missing table or unusable client address stops processing
//!   and the request continues unannotated
//! - Once a table is loaded the client-sent label header is always removed,
//!   even when the client address turns out to be unusable
//! - The filter never rejects a request; callers always continue the pipeline

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::HeaderMap;

use crate::config::schema::MapperSettings;
use crate::config::validation::{parse_header_name, validate_mapper, ValidationError};
use crate::http::client_ip::{ClientIpResolver, ResolveError};
use crate::mapping::{match_labels, ConfigError, MappingStore, MappingTable, MatchResult};
use crate::observability::metrics;
use crate::security::headers::HeaderPolicy;

/// What the filter did to one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterOutcome {
    /// The header was set to these labels.
    Annotated(MatchResult),
    /// No rule matched; the header is absent.
    NoMatch,
    /// The mapping could not be loaded; request passed through.
    ConfigUnavailable,
    /// The client address was malformed or missing; request passed through.
    InvalidClientIp,
    /// The client address is IPv6; request passed through.
    UnsupportedAddress,
}

impl FilterOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOutcome::Annotated(_) => "annotated",
            FilterOutcome::NoMatch => "no_match",
            FilterOutcome::ConfigUnavailable => "config_unavailable",
            FilterOutcome::InvalidClientIp => "invalid_client_ip",
            FilterOutcome::UnsupportedAddress => "unsupported_address",
        }
    }

    /// True when the filter gave up and passed the request through.
    pub fn failed_open(&self) -> bool {
        matches!(
            self,
            FilterOutcome::ConfigUnavailable
                | FilterOutcome::InvalidClientIp
                | FilterOutcome::UnsupportedAddress
        )
    }
}

/// Annotates requests with the labels of the networks their client is in.
#[derive(Debug, Clone)]
pub struct IpMapper {
    store: MappingStore,
    resolver: ClientIpResolver,
    policy: HeaderPolicy,
    strip_on_failure: bool,
}

impl IpMapper {
    pub fn new(store: MappingStore, resolver: ClientIpResolver, policy: HeaderPolicy) -> Self {
        Self {
            store,
            resolver,
            policy,
            strip_on_failure: false,
        }
    }

    /// Build from the `[mapper]` section.
    pub fn from_config(
        settings: &MapperSettings,
        store: MappingStore,
    ) -> Result<Self, Vec<ValidationError>> {
        validate_mapper(settings)?;
        let header = parse_header_name("mapper.header_name", &settings.header_name).map_err(|e| vec![e])?;
        let forwarded = parse_header_name("mapper.forwarded_header", &settings.forwarded_header)
            .map_err(|e| vec![e])?;

        let resolver = ClientIpResolver::from_config(forwarded, &settings.client_ip);
        Ok(Self::new(store, resolver, HeaderPolicy::new(header))
            .with_strip_on_failure(settings.strip_on_failure))
    }

    /// Also strip the label header when the mapping cannot be loaded.
    pub fn with_strip_on_failure(mut self, strip: bool) -> Self {
        self.strip_on_failure = strip;
        self
    }

    pub fn store(&self) -> &MappingStore {
        &self.store
    }

    pub fn policy(&self) -> &HeaderPolicy {
        &self.policy
    }

    /// Load the mapping and annotate `headers` in one synchronous call.
    pub fn annotate(&self, headers: &mut HeaderMap, peer: Option<SocketAddr>) -> FilterOutcome {
        self.apply(headers, peer, self.store.current())
    }

    /// Annotate `headers` using an already-obtained mapping.
    pub fn apply(
        &self,
        headers: &mut HeaderMap,
        peer: Option<SocketAddr>,
        table: Result<Arc<MappingTable>, ConfigError>,
    ) -> FilterOutcome {
        let outcome = self.evaluate(headers, peer, table);
        metrics::record_outcome(outcome.as_str());
        outcome
    }

    fn evaluate(
        &self,
        headers: &mut HeaderMap,
        peer: Option<SocketAddr>,
        table: Result<Arc<MappingTable>, ConfigError>,
    ) -> FilterOutcome {
        let table = match table {
            Ok(table) => table,
            Err(e) => {
                tracing::error!(
                    path = %self.store.path().display(),
                    error = %e,
                    "Mapping unavailable, passing request through"
                );
                return self.fail_open(headers, FilterOutcome::ConfigUnavailable);
            }
        };

        self.policy.strip(headers);

        let client_ip = match self.resolver.resolve(headers, peer) {
            Ok(ip) => ip,
            Err(e @ ResolveError::Unsupported { .. }) => {
                tracing::debug!(error = %e, "Client address not mappable, passing request through");
                return FilterOutcome::UnsupportedAddress;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Client address invalid, passing request through");
                return FilterOutcome::InvalidClientIp;
            }
        };

        let result = match_labels(client_ip, &table);
        if result.is_empty() {
            tracing::debug!(client_ip = %client_ip, "No mapping matched");
            return FilterOutcome::NoMatch;
        }

        tracing::debug!(client_ip = %client_ip, labels = %result, "Mapping matched");
        for label in result.labels() {
            metrics::record_label_match(label);
        }

        if self.policy.inject(headers, &result) {
            FilterOutcome::Annotated(result)
        } else {
            FilterOutcome::NoMatch
        }
    }

    fn fail_open(&self, headers: &mut HeaderMap, outcome: FilterOutcome) -> FilterOutcome {
        if self.strip_on_failure {
            self.policy.strip(headers);
        }
        outcome
    }
}
