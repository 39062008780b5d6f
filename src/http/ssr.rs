//! Render server fallback: the last handler in the chain.

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;

use crate::http::chain::{Flow, Handler};
use crate::http::error::GatewayError;
use crate::render::{Platform, RenderContext, RenderServer};
use crate::trust::TrustBoundary;

/// Rebases the request onto the client-visible origin and renders it.
pub struct SsrHandler {
    trust: Arc<TrustBoundary>,
    render: Arc<dyn RenderServer>,
}

impl SsrHandler {
    pub fn new(trust: Arc<TrustBoundary>, render: Arc<dyn RenderServer>) -> Self {
        Self { trust, render }
    }
}

#[async_trait]
impl Handler for SsrHandler {
    fn name(&self) -> &'static str {
        "ssr"
    }

    async fn handle(&self, request: Request<Body>) -> Result<Flow, GatewayError> {
        let request = self.trust.rebase(request)?;
        self.trust.validate(request.headers())?;
        let client_address = self.trust.client_address(request.headers())?;

        let context = RenderContext::new(client_address, Platform::gateway());
        let response = self.render.respond(request, context).await?;
        Ok(Flow::Respond(response))
    }
}
