//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (forwarding depth >= 1)
//! - Validate addresses, header names and the fixed origin
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use axum::http::HeaderName;
use thiserror::Error;
use url::Url;

use crate::config::schema::GatewayConfig;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("forwarding_depth must be a positive integer, got {0}")]
    ForwardingDepth(u32),

    #[error("{field} is not a valid header name: {value:?}")]
    HeaderName { field: &'static str, value: String },

    #[error("origin {0:?} must be an absolute http(s) URL without a path")]
    Origin(String),

    #[error("{field} is not a socket address: {value:?}")]
    Address { field: &'static str, value: String },
}

/// Validate a configuration, collecting every error.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let trust = &config.trust;

    if trust.forwarding_depth < 1 {
        errors.push(ValidationError::ForwardingDepth(trust.forwarding_depth));
    }

    let headers = [
        ("trust.address_header", trust.address_header.as_deref()),
        ("trust.protocol_header", trust.protocol_header.as_deref()),
        ("trust.host_header", Some(trust.host_header.as_str())),
        ("trust.port_header", trust.port_header.as_deref()),
    ];
    for (field, value) in headers {
        if let Some(value) = value {
            if HeaderName::from_bytes(value.as_bytes()).is_err() {
                errors.push(ValidationError::HeaderName {
                    field,
                    value: value.to_string(),
                });
            }
        }
    }

    if let Some(origin) = &trust.origin {
        if !is_bare_origin(origin) {
            errors.push(ValidationError::Origin(origin.clone()));
        }
    }

    let addresses = [
        ("listener.bind_address", &config.listener.bind_address),
        ("upstream.address", &config.upstream.address),
        ("observability.metrics_address", &config.observability.metrics_address),
    ];
    for (field, value) in addresses {
        if value.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::Address {
                field,
                value: value.clone(),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn is_bare_origin(origin: &str) -> bool {
    match Url::parse(origin) {
        Ok(url) => {
            matches!(url.scheme(), "http" | "https")
                && url.host().is_some()
                && url.path() == "/"
                && url.query().is_none()
                && url.fragment().is_none()
        }
        Err(_) => false,
    }
}
