//! Gateway error type and its HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::manifest::NodeLoadError;
use crate::render::RenderError;
use crate::trust::TrustError;

/// Anything that stops a request from being handled.
///
/// Guard denials are not errors; they are ordinary 403 responses.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Trust(#[from] TrustError),

    #[error(transparent)]
    NodeLoad(#[from] NodeLoadError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("route data response could not be decoded: {0}")]
    Probe(String),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::Render(RenderError::Upstream(_)) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            GatewayError::Trust(e) => {
                tracing::error!(status = %status.as_u16(), error = %e, "Trust configuration error");
            }
            other => {
                tracing::error!(status = %status.as_u16(), error = %other, "Request failed");
            }
        }
        (status, status.canonical_reason().unwrap_or("Error")).into_response()
    }
}
