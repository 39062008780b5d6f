//! Trust boundary subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request headers
//!     → origin.rs  (fixed origin, or protocol/host/port headers)
//!     → address.rs (address header, hop depth from the nearest proxy)
//!     → render context handed to the render server
//! ```
//!
//! # Design Decisions
//! - A request whose host header is the loopback sentinel arrived over the
//!   trusted internal path and reports the loopback address
//! - Misconfiguration surfaces per request as `TrustError`, never defaulted

pub mod address;
pub mod origin;

use axum::http::HeaderMap;
use thiserror::Error;

pub use crate::config::schema::TrustConfig;

/// Address reported for requests on the trusted internal path.
pub const LOOPBACK: &str = "127.0.0.1";

/// Conventional multi-hop client address header.
pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Protocol used when no protocol header is configured or present.
pub const DEFAULT_PROTOCOL: &str = "https";

/// Configuration-level failures detected while reading a request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrustError {
    #[error("address header was configured as {header} but is absent from request")]
    MissingAddressHeader { header: String },

    #[error("forwarding depth must be a positive integer, got {depth}")]
    InvalidDepth { depth: u32 },

    #[error("forwarding depth is {depth}, but only found {found} addresses")]
    DepthExceedsAddresses { depth: u32, found: usize },

    #[error("host header {header} is absent from request")]
    MissingHost { header: String },

    #[error("reconstructed origin {origin:?} is not a valid URL: {reason}")]
    InvalidOrigin { origin: String, reason: String },
}

/// Reads reverse-proxy headers according to one immutable `TrustConfig`.
#[derive(Debug, Clone)]
pub struct TrustBoundary {
    config: TrustConfig,
}

impl TrustBoundary {
    pub fn new(mut config: TrustConfig) -> Self {
        config.normalize_header_names();
        Self { config }
    }

    pub fn config(&self) -> &TrustConfig {
        &self.config
    }

    /// True if the request claims to come over the internal path.
    pub fn is_loopback(&self, headers: &HeaderMap) -> bool {
        header_str(headers, &self.config.host_header) == Some(LOOPBACK)
    }
}

pub(crate) fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}
