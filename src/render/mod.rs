//! Render server contract.
//!
//! # Data Flow
//! ```text
//! Handler chain (guard data request, SSR fallback)
//!     → RenderServer::respond(request, RenderContext)
//!     → upstream.rs (hyper client to the configured render server)
//!
//! Upgrade requests (bypass the chain):
//!     → SocketCapability::upgrade
//!     → custom upgrade operation, or accept_upgrade (axum WebSocket)
//!     → socket.rs (frame relay to the upstream)
//! ```

pub mod socket;
pub mod upstream;

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::ws::WebSocket;
use axum::extract::{FromRequestParts, WebSocketUpgrade};
use axum::http::{request, Request};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

pub use upstream::HttpRenderServer;

/// Errors talking to the render server.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("render server request failed: {0}")]
    Upstream(String),

    #[error("could not build render request: {0}")]
    InvalidRequest(String),

    #[error("socket upgrade unavailable: {0}")]
    Upgrade(String),
}

/// Runtime facts the render server may branch on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Platform {
    /// The request was issued by this gateway process.
    pub trusted_runtime: bool,
}

impl Platform {
    pub fn gateway() -> Self {
        Self { trusted_runtime: true }
    }
}

/// Caller context handed to the render server with every request.
#[derive(Debug, Clone)]
pub struct RenderContext {
    client_address: String,
    platform: Platform,
}

impl RenderContext {
    pub fn new(client_address: impl Into<String>, platform: Platform) -> Self {
        Self {
            client_address: client_address.into(),
            platform,
        }
    }

    pub fn client_address(&self) -> &str {
        &self.client_address
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }
}

/// The rendering engine as seen from the gateway.
#[async_trait]
pub trait RenderServer: Send + Sync {
    async fn respond(&self, request: Request<Body>, context: RenderContext) -> Result<Response, RenderError>;

    /// Native socket-upgrade support, if any.
    fn socket_capability(&self) -> Result<Option<SocketCapability>, RenderError> {
        Ok(None)
    }
}

/// Serves an accepted socket.
#[async_trait]
pub trait SocketHandler: Send + Sync + 'static {
    async fn serve(&self, socket: WebSocket, head: request::Parts);
}

/// Replaces the default accept-and-upgrade operation.
#[async_trait]
pub trait CustomUpgrade: Send + Sync {
    async fn upgrade(&self, request: Request<Body>, handler: Arc<dyn SocketHandler>) -> Response;
}

/// A render server's socket support.
#[derive(Clone)]
pub struct SocketCapability {
    handler: Arc<dyn SocketHandler>,
    custom_upgrade: Option<Arc<dyn CustomUpgrade>>,
}

impl SocketCapability {
    pub fn new(handler: Arc<dyn SocketHandler>) -> Self {
        Self {
            handler,
            custom_upgrade: None,
        }
    }

    pub fn with_custom_upgrade(mut self, upgrade: Arc<dyn CustomUpgrade>) -> Self {
        self.custom_upgrade = Some(upgrade);
        self
    }

    /// Upgrade `request` using the declared operation or the default one.
    pub async fn upgrade(&self, request: Request<Body>) -> Response {
        match &self.custom_upgrade {
            Some(op) => op.upgrade(request, self.handler.clone()).await,
            None => accept_upgrade(request, self.handler.clone()).await,
        }
    }
}

/// Default operation: complete the WebSocket handshake and hand the socket
/// to `handler`.
pub async fn accept_upgrade(request: Request<Body>, handler: Arc<dyn SocketHandler>) -> Response {
    let (mut parts, _body) = request.into_parts();
    match WebSocketUpgrade::from_request_parts(&mut parts, &()).await {
        Ok(ws) => ws.on_upgrade(move |socket| async move { handler.serve(socket, parts).await }),
        Err(rejection) => {
            tracing::debug!(error = %rejection, "WebSocket handshake rejected");
            rejection.into_response()
        }
    }
}
