//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Assemble the handler chain (guard, client assets, prerendered pages, SSR)
//! - Wire up middleware (tracing, request ID)
//! - Bind server to listener
//! - Hand every request to the dispatcher

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    response::{IntoResponse, Response},
    Router,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::GatewayConfig;
use crate::http::assets::StaticAssets;
use crate::http::chain::{Chain, Dispatcher, Handler};
use crate::http::guard::EntrypointGuard;
use crate::http::ssr::SsrHandler;
use crate::manifest::{FsNodeLoader, ManifestError, NodeLoader, RouteManifest};
use crate::observability::metrics;
use crate::render::{HttpRenderServer, RenderError, RenderServer};
use crate::trust::TrustBoundary;

/// Startup failures assembling the server.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Render(#[from] RenderError),
}

/// HTTP server for the render gateway.
pub struct HttpServer {
    router: Router,
    config: GatewayConfig,
}

impl HttpServer {
    /// Create a server from configuration: reads the manifest, sets up the
    /// node loader and the HTTP render server.
    pub fn new(config: GatewayConfig) -> Result<Self, StartupError> {
        let manifest = Arc::new(RouteManifest::load(Path::new(&config.manifest.path))?);
        tracing::info!(
            path = %config.manifest.path,
            routes = manifest.routes.len(),
            app_path = %manifest.app_path,
            "Manifest loaded"
        );

        let loader = Arc::new(FsNodeLoader::new(&config.manifest.nodes_dir, manifest.node_count()));
        let render = Arc::new(HttpRenderServer::new(&config.upstream)?);

        Ok(Self::with_parts(config, manifest, loader, render))
    }

    /// Create a server from already-built collaborators.
    pub fn with_parts(
        config: GatewayConfig,
        manifest: Arc<RouteManifest>,
        loader: Arc<dyn NodeLoader>,
        render: Arc<dyn RenderServer>,
    ) -> Self {
        let dispatcher = Arc::new(Self::build_dispatcher(&config, manifest, loader, render));
        let router = Self::build_router(dispatcher);
        Self { router, config }
    }

    fn build_dispatcher(
        config: &GatewayConfig,
        manifest: Arc<RouteManifest>,
        loader: Arc<dyn NodeLoader>,
        render: Arc<dyn RenderServer>,
    ) -> Dispatcher {
        let trust = Arc::new(TrustBoundary::new(config.trust.clone()));
        let root = Path::new(&config.assets.root);
        let assets = config.assets.enabled;

        let guard: Arc<dyn Handler> = Arc::new(EntrypointGuard::new(
            manifest.clone(),
            loader,
            render.clone(),
        ));
        let ssr: Arc<dyn Handler> = Arc::new(SsrHandler::new(trust, render.clone()));

        let chain = Chain::new([
            Some(guard),
            assets.then(|| StaticAssets::serve(root.join("client"), true, &manifest)).flatten(),
            assets.then(|| StaticAssets::serve(root.join("prerendered"), false, &manifest)).flatten(),
            Some(ssr),
        ]);

        Dispatcher::new(chain, render.as_ref())
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(dispatcher: Arc<Dispatcher>) -> Router {
        Router::new()
            .fallback(gateway_handler)
            .with_state(dispatcher)
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The router, for driving the gateway without a listener.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until `shutdown` resolves.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = %self.config.upstream.address,
            "HTTP server starting"
        );

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

/// Single entry point: every request goes through the dispatcher.
async fn gateway_handler(State(dispatcher): State<Arc<Dispatcher>>, request: Request<Body>) -> Response {
    let start_time = Instant::now();
    let method = request.method().clone();

    let response = match dispatcher.dispatch(request).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    };

    metrics::record_request(method.as_str(), response.status().as_u16(), start_time);
    response
}

/// Wait for Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    tracing::info!("Shutdown signal received");
}
