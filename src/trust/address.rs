//! Client address derivation.
//!
//! # Responsibilities
//! - Require the configured address header on untrusted requests
//! - Pick the client address out of a multi-hop forwarding header
//!
//! # Design Decisions
//! - Depth counts back from the nearest proxy: depth 1 is the last token
//! - Only `x-forwarded-for` is split; any other header is taken verbatim

use axum::http::HeaderMap;

use crate::trust::{header_str, TrustBoundary, TrustError, LOOPBACK, X_FORWARDED_FOR};

impl TrustBoundary {
    /// Fail if an address header is configured but missing on a request
    /// that did not come over the internal path.
    pub fn validate(&self, headers: &HeaderMap) -> Result<(), TrustError> {
        match &self.config().address_header {
            Some(header) if !self.is_loopback(headers) && !headers.contains_key(header.as_str()) => {
                Err(TrustError::MissingAddressHeader { header: header.clone() })
            }
            _ => Ok(()),
        }
    }

    /// The address of the client as far as the trusted proxies can vouch.
    pub fn client_address(&self, headers: &HeaderMap) -> Result<String, TrustError> {
        let header = match &self.config().address_header {
            Some(header) if !self.is_loopback(headers) => header,
            _ => return Ok(LOOPBACK.to_string()),
        };
        let value = header_str(headers, header).unwrap_or_default();

        if header != X_FORWARDED_FOR {
            return Ok(value.to_string());
        }

        let depth = self.config().forwarding_depth;
        if depth < 1 {
            return Err(TrustError::InvalidDepth { depth });
        }

        let addresses: Vec<&str> = value.split(',').collect();
        let index = addresses
            .len()
            .checked_sub(depth as usize)
            .ok_or(TrustError::DepthExceedsAddresses { depth, found: addresses.len() })?;

        Ok(addresses[index].trim().to_string())
    }
}
