//! Static asset handler.
//!
//! # Responsibilities
//! - Serve files from a build output directory (client bundle, prerendered
//!   pages) with precompressed variants and conditional requests
//! - Decline when the file does not exist so the chain moves on
//! - Mark hashed client assets as immutable
//!
//! # Design Decisions
//! - Absent directories produce no handler at all
//! - Only GET and HEAD are served; anything else moves on untouched
//! - Extensionless paths also try `<path>.html` (prerendered pages)

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, Method, Request, StatusCode, Uri, Version};
use axum::response::Response;
use tower::ServiceExt;
use tower_http::services::ServeDir;

use crate::http::chain::{Flow, Handler};
use crate::http::error::GatewayError;
use crate::manifest::RouteManifest;

const IMMUTABLE: &str = "public,max-age=31536000,immutable";

/// Files under one directory.
pub struct StaticAssets {
    name: &'static str,
    dir: PathBuf,
    service: ServeDir,
    /// `(immutable prefix, nodes prefix)` for the client bundle.
    immutable: Option<(String, String)>,
}

impl StaticAssets {
    /// A handler for `dir`, or `None` if the directory does not exist.
    pub fn serve(
        dir: impl AsRef<Path>,
        client_bundle: bool,
        manifest: &RouteManifest,
    ) -> Option<Arc<dyn Handler>> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            tracing::info!(dir = %dir.display(), "Asset directory absent, not serving it");
            return None;
        }

        let service = ServeDir::new(dir)
            .precompressed_br()
            .precompressed_gzip()
            .append_index_html_on_directories(true);
        let immutable = client_bundle.then(|| {
            (
                format!("/{}/immutable/", manifest.app_dir),
                format!("/{}/immutable/nodes", manifest.app_dir),
            )
        });

        Some(Arc::new(Self {
            name: if client_bundle { "client_assets" } else { "prerendered" },
            dir: dir.to_path_buf(),
            service,
            immutable,
        }))
    }

    async fn fetch(&self, method: &Method, uri: Uri, version: Version, headers: HeaderMap) -> Response {
        let mut request = Request::builder()
            .method(method.clone())
            .uri(uri)
            .version(version)
            .body(Body::empty())
            .unwrap_or_default();
        *request.headers_mut() = headers;

        let response = match self.service.clone().oneshot(request).await {
            Ok(response) => response,
            Err(never) => match never {},
        };
        response.map(Body::new)
    }

    fn is_immutable(&self, path: &str) -> bool {
        match &self.immutable {
            Some((immutable, nodes)) => path.starts_with(immutable) && !path.starts_with(nodes),
            None => false,
        }
    }
}

#[async_trait]
impl Handler for StaticAssets {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn handle(&self, request: Request<Body>) -> Result<Flow, GatewayError> {
        let method = request.method().clone();
        if method != Method::GET && method != Method::HEAD {
            return Ok(Flow::Continue(request));
        }

        let uri = request.uri().clone();
        let variant = html_variant(&uri);
        let version = request.version();
        let headers = request.headers().clone();

        let mut response = self.fetch(&method, uri, version, headers.clone()).await;

        if response.status() == StatusCode::NOT_FOUND {
            if let Some(variant) = variant {
                response = self.fetch(&method, variant, version, headers).await;
            }
        }

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Flow::Continue(request));
        }

        if self.is_immutable(request.uri().path()) {
            response
                .headers_mut()
                .insert(header::CACHE_CONTROL, HeaderValue::from_static(IMMUTABLE));
        }

        tracing::debug!(
            dir = %self.dir.display(),
            path = %request.uri().path(),
            status = %response.status(),
            "Served static asset"
        );
        Ok(Flow::Respond(response))
    }
}

/// `/about` → `/about.html`; `None` when the last segment has an extension.
fn html_variant(uri: &Uri) -> Option<Uri> {
    let path = uri.path();
    let last = path.rsplit('/').next().unwrap_or_default();
    if last.is_empty() || last.contains('.') {
        return None;
    }
    let target = match uri.query() {
        Some(query) => format!("{path}.html?{query}"),
        None => format!("{path}.html"),
    };
    target.parse().ok()
}
