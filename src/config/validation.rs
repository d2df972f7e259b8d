//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check header names and addresses parse
//! - Validate value ranges (timeouts > 0, refresh interval > 0)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: MapperConfig → Result<(), Vec<ValidationError>>
//! - The mapping file is not read here; an unreadable file fails open at
//!   request time

use std::net::SocketAddr;
use std::str::FromStr;

use axum::http::uri::Authority;
use axum::http::HeaderName;
use thiserror::Error;

use crate::config::schema::{ClientIpStrategy, MapperConfig, MapperSettings, ReloadMode};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: {value:?} is not a valid header name")]
    InvalidHeaderName { field: &'static str, value: String },

    #[error("{field}: {value:?} is not a valid socket address")]
    InvalidSocketAddress { field: &'static str, value: String },

    #[error("upstream.address: {0:?} is not a valid host:port authority")]
    InvalidUpstream(String),

    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("mapper.header_name and mapper.forwarded_header must differ")]
    HeaderConflict,

    #[error("mapper.client_ip.trusted_proxies must list at least one CIDR for the trusted_proxies strategy")]
    NoTrustedProxies,
}

/// Validate the full service configuration.
pub fn validate_config(config: &MapperConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_socket_addr(&mut errors, "listener.bind_address", &config.listener.bind_address);

    if Authority::from_str(&config.upstream.address).is_err() || config.upstream.address.is_empty() {
        errors.push(ValidationError::InvalidUpstream(config.upstream.address.clone()));
    }

    if let Err(mut mapper_errors) = validate_mapper(&config.mapper) {
        errors.append(&mut mapper_errors);
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::Zero("timeouts.request_secs"));
    }

    if config.observability.metrics_enabled {
        check_socket_addr(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate the filter section on its own.
pub fn validate_mapper(settings: &MapperSettings) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if settings.mapping_file.trim().is_empty() {
        errors.push(ValidationError::Empty("mapper.mapping_file"));
    }

    let header = check_header_name(&mut errors, "mapper.header_name", &settings.header_name);
    let forwarded = check_header_name(&mut errors, "mapper.forwarded_header", &settings.forwarded_header);
    if let (Some(header), Some(forwarded)) = (header, forwarded) {
        if header == forwarded {
            errors.push(ValidationError::HeaderConflict);
        }
    }

    if settings.client_ip.strategy == ClientIpStrategy::TrustedProxies
        && settings.client_ip.trusted_proxies.is_empty()
    {
        errors.push(ValidationError::NoTrustedProxies);
    }

    if settings.reload.mode == ReloadMode::Snapshot && settings.reload.refresh_secs == 0 {
        errors.push(ValidationError::Zero("mapper.reload.refresh_secs"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Parse a configured header name, as `IpMapper` construction does.
pub fn parse_header_name(field: &'static str, value: &str) -> Result<HeaderName, ValidationError> {
    HeaderName::from_str(value).map_err(|_| ValidationError::InvalidHeaderName {
        field,
        value: value.to_string(),
    })
}

fn check_header_name(
    errors: &mut Vec<ValidationError>,
    field: &'static str,
    value: &str,
) -> Option<HeaderName> {
    match parse_header_name(field, value) {
        Ok(name) => Some(name),
        Err(e) => {
            errors.push(e);
            None
        }
    }
}

fn check_socket_addr(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidSocketAddress {
            field,
            value: value.to_string(),
        });
    }
}
