//! Handler chain executor.
//!
//! # Responsibilities
//! - Run handlers in order until one responds
//! - Answer 404 when every handler declines
//! - Send protocol upgrades straight to the render server's socket support
//!
//! # Design Decisions
//! - Handlers unavailable at startup are left out of the chain, not skipped
//!   per request
//! - Iterative dispatch: declining hands the request back to the loop
//! - Sequential within a request; no shared mutable state across requests

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::http::error::GatewayError;
use crate::render::{RenderServer, SocketCapability};

/// Outcome of one handler.
pub enum Flow {
    /// Final response; later handlers do not run.
    Respond(Response),
    /// Declined; the request moves on to the next handler.
    Continue(Request<Body>),
}

/// One step of the chain.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    async fn handle(&self, request: Request<Body>) -> Result<Flow, GatewayError>;
}

/// Ordered handler list.
#[derive(Clone, Default)]
pub struct Chain {
    handlers: Vec<Arc<dyn Handler>>,
}

impl Chain {
    /// Build from optional handlers; `None` entries are dropped.
    pub fn new<I>(handlers: I) -> Self
    where
        I: IntoIterator<Item = Option<Arc<dyn Handler>>>,
    {
        Self {
            handlers: handlers.into_iter().flatten().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.handlers.iter().map(|h| h.name()).collect()
    }

    pub async fn run(&self, mut request: Request<Body>) -> Result<Response, GatewayError> {
        for handler in &self.handlers {
            match handler.handle(request).await? {
                Flow::Respond(response) => {
                    tracing::debug!(handler = handler.name(), status = %response.status(), "Handled");
                    return Ok(response);
                }
                Flow::Continue(next) => request = next,
            }
        }
        Ok((StatusCode::NOT_FOUND, "Not Found").into_response())
    }
}

/// Entry point for every inbound request.
pub struct Dispatcher {
    chain: Chain,
    sockets: Option<SocketCapability>,
}

impl Dispatcher {
    /// Query `render` for socket support once; a failing query leaves the
    /// dispatcher with the ordinary chain only.
    pub fn new(chain: Chain, render: &dyn RenderServer) -> Self {
        let sockets = match render.socket_capability() {
            Ok(sockets) => sockets,
            Err(e) => {
                tracing::warn!(error = %e, "Socket upgrade support unavailable, serving HTTP only");
                None
            }
        };

        tracing::info!(
            handlers = ?chain.names(),
            upgrades = sockets.is_some(),
            "Dispatcher ready"
        );

        Self { chain, sockets }
    }

    pub fn accepts_upgrades(&self) -> bool {
        self.sockets.is_some()
    }

    pub async fn dispatch(&self, request: Request<Body>) -> Result<Response, GatewayError> {
        if let Some(sockets) = &self.sockets {
            if is_upgrade_request(request.headers()) {
                tracing::debug!(path = %request.uri().path(), "Upgrading connection");
                return Ok(sockets.upgrade(request).await);
            }
        }
        self.chain.run(request).await
    }
}

/// `Connection: upgrade` plus `Upgrade: websocket`, case-insensitively.
pub fn is_upgrade_request(headers: &HeaderMap) -> bool {
    let connection = headers
        .get(header::CONNECTION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_ascii_lowercase().contains("upgrade"))
        .unwrap_or(false);
    let websocket = headers
        .get(header::UPGRADE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("websocket"))
        .unwrap_or(false);
    connection && websocket
}
