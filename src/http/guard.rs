//! Entrypoint guard.
//!
//! A client can fetch a page's leaf code chunk directly and, by watching
//! whether the page's server logic would redirect, learn things it is not
//! allowed to navigate to. For chunk requests whose page has server logic the
//! guard replays the page's data request against the render server as a
//! trusted local caller and answers 403 when that would redirect.
//!
//! # Data Flow
//! ```text
//! /<app_path>/immutable/nodes/<leaf>.<hash>.js
//!     → leaf index → route (first whose page leaf matches)
//!     → load page nodes (concurrently) → any server logic?
//!     → GET <route id>/__data.json to the render server
//!     → {"type":"redirect"} ? 403 : pass
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use serde_json::Value;
use url::Url;

use crate::http::chain::{Flow, Handler};
use crate::http::error::GatewayError;
use crate::manifest::{load_page_nodes, NodeId, NodeLoader, RouteManifest, RouteOption};
use crate::observability::metrics;
use crate::render::{Platform, RenderContext, RenderError, RenderServer};
use crate::trust::LOOPBACK;

/// Path segment the render server answers page data requests on.
pub const DATA_SUFFIX: &str = "__data.json";

/// Blocks node-chunk requests that would reveal a server-side redirect.
pub struct EntrypointGuard {
    manifest: Arc<RouteManifest>,
    loader: Arc<dyn NodeLoader>,
    render: Arc<dyn RenderServer>,
    prefix: String,
}

impl EntrypointGuard {
    pub fn new(
        manifest: Arc<RouteManifest>,
        loader: Arc<dyn NodeLoader>,
        render: Arc<dyn RenderServer>,
    ) -> Self {
        let prefix = manifest.node_chunk_prefix();
        Self {
            manifest,
            loader,
            render,
            prefix,
        }
    }
}

#[async_trait]
impl Handler for EntrypointGuard {
    fn name(&self) -> &'static str {
        "entrypoint_guard"
    }

    async fn handle(&self, request: Request<Body>) -> Result<Flow, GatewayError> {
        let path = normalize_path(request.uri().path());
        let Some(chunk) = path.strip_prefix(self.prefix.as_str()) else {
            return Ok(Flow::Continue(request));
        };
        let Some(leaf) = leaf_index(chunk) else {
            return Ok(Flow::Continue(request));
        };
        let Some(route) = self.manifest.route_for_leaf(leaf) else {
            tracing::debug!(path = %path, leaf = %leaf, "No route for node chunk");
            return Ok(Flow::Continue(request));
        };

        let nodes = load_page_nodes(&route.page, self.loader.as_ref()).await?;
        if !nodes.has_server() {
            tracing::debug!(route = %route.id, "No server logic on page, passing");
            metrics::record_guard("pass");
            return Ok(Flow::Continue(request));
        }

        tracing::debug!(
            route = %route.id,
            leaf = %leaf,
            ssr = ?nodes.option(RouteOption::Ssr),
            prerender = ?nodes.option(RouteOption::Prerender),
            "Probing route data for redirects"
        );
        metrics::record_guard("probe");

        let data = data_request(&request, &route.id)?;
        let response = self
            .render
            .respond(data, RenderContext::new(LOOPBACK, Platform::gateway()))
            .await?;

        if is_redirect(response).await? {
            tracing::warn!(route = %route.id, path = %path, "Blocked node chunk for redirecting route");
            metrics::record_guard("deny");
            return Ok(Flow::Respond((StatusCode::FORBIDDEN, "Forbidden").into_response()));
        }

        tracing::debug!(route = %route.id, "Route data does not redirect, passing");
        metrics::record_guard("pass");
        Ok(Flow::Continue(request))
    }
}

/// Percent-decode (keeping the raw path if that fails), then drop empty and
/// `.` segments so the path names the file the asset handlers would serve.
pub fn normalize_path(path: &str) -> String {
    let decoded = if path.contains('%') {
        match urlencoding::decode(path) {
            Ok(decoded) => decoded.into_owned(),
            Err(_) => path.to_string(),
        }
    } else {
        path.to_string()
    };

    let segments: Vec<&str> = decoded
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect();
    format!("/{}", segments.join("/"))
}

/// Leading digits of the last path component, before the first `.`.
pub fn leaf_index(chunk: &str) -> Option<NodeId> {
    let file = chunk.rsplit('/').next()?;
    let stem = file.split('.').next()?;
    let digits: &str = &stem[..stem.find(|c: char| !c.is_ascii_digit()).unwrap_or(stem.len())];
    digits.parse().ok().map(NodeId)
}

/// The page data request for `route_id`, carrying the original headers.
fn data_request(original: &Request<Body>, route_id: &str) -> Result<Request<Body>, GatewayError> {
    let path = data_path(route_id)?;
    let target = match original.uri().query() {
        Some(query) => format!("{path}?{query}"),
        None => path,
    };

    let mut parts = original.uri().clone().into_parts();
    parts.path_and_query = Some(
        target
            .parse()
            .map_err(|e: axum::http::uri::InvalidUri| RenderError::InvalidRequest(e.to_string()))?,
    );
    let uri = Uri::from_parts(parts).map_err(|e| RenderError::InvalidRequest(e.to_string()))?;

    let mut request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .map_err(|e| RenderError::InvalidRequest(e.to_string()))?;
    *request.headers_mut() = original.headers().clone();
    // The body is parsed here, not relayed, so it must arrive uncompressed.
    request.headers_mut().remove(header::ACCEPT_ENCODING);
    Ok(request)
}

/// `<route id>/__data.json`, encoded the way a URL path setter encodes it.
fn data_path(route_id: &str) -> Result<String, GatewayError> {
    let mut url = Url::parse("http://localhost/")
        .map_err(|e| RenderError::InvalidRequest(e.to_string()))?;
    url.set_path(&format!("{}/{}", route_id.trim_end_matches('/'), DATA_SUFFIX));
    Ok(url.path().to_string())
}

async fn is_redirect(response: Response) -> Result<bool, GatewayError> {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .map_err(|e| GatewayError::Probe(e.to_string()))?;
    let data: Value = serde_json::from_slice(&body).map_err(|e| GatewayError::Probe(e.to_string()))?;
    Ok(data.get("type").and_then(Value::as_str) == Some("redirect"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{Node, OptionsRecord, StaticNodeLoader};
    use axum::http::HeaderMap;
    use std::sync::Mutex;

    /// Render server that records data requests and answers with a fixed body.
    struct DataServer {
        body: &'static str,
        seen: Mutex<Vec<(String, HeaderMap, String, Platform)>>,
    }

    impl DataServer {
        fn new(body: &'static str) -> Arc<Self> {
            Arc::new(Self {
                body,
                seen: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.seen.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl RenderServer for DataServer {
        async fn respond(&self, request: Request<Body>, context: RenderContext) -> Result<Response, RenderError> {
            self.seen.lock().unwrap().push((
                request.uri().to_string(),
                request.headers().clone(),
                context.client_address().to_string(),
                context.platform(),
            ));
            Ok(self.body.into_response())
        }
    }

    fn manifest() -> Arc<RouteManifest> {
        Arc::new(
            RouteManifest::from_json(
                r#"{
                    "appPath": "_app",
                    "appDir": "_app",
                    "routes": [
                        { "id": "/", "page": { "layouts": [0], "leaf": 2 } },
                        { "id": "/admin", "page": { "layouts": [0, null], "leaf": 3 } },
                        { "id": "/blog/[slug]", "page": { "layouts": [1], "leaf": 4 } }
                    ]
                }"#,
            )
            .unwrap(),
        )
    }

    fn loader() -> Arc<dyn NodeLoader> {
        let server = Node {
            universal: None,
            server: Some(OptionsRecord::new()),
        };
        Arc::new(StaticNodeLoader::new(vec![
            Node::default(),
            server.clone(),
            Node::default(),
            server,
            Node::default(),
        ]))
    }

    fn guard(render: Arc<DataServer>) -> EntrypointGuard {
        EntrypointGuard::new(manifest(), loader(), render)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header("cookie", "session=abc")
            .header("accept-encoding", "gzip, deflate, br")
            .body(Body::empty())
            .unwrap()
    }

    async fn status(guard: &EntrypointGuard, uri: &str) -> Option<StatusCode> {
        match guard.handle(get(uri)).await.unwrap() {
            Flow::Respond(response) => Some(response.status()),
            Flow::Continue(_) => None,
        }
    }

    const REDIRECT: &str = r#"{"type":"redirect","location":"/login"}"#;
    const DATA: &str = r#"{"type":"data","nodes":[]}"#;

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("/_app/immutable/nodes/3.js/"), "/_app/immutable/nodes/3.js");
        assert_eq!(normalize_path("/_app/immutable/nodes//"), "/_app/immutable/nodes");
        assert_eq!(normalize_path("/_app/immutable/nodes/%33.js"), "/_app/immutable/nodes/3.js");
        assert_eq!(normalize_path("/%_app/%ff%fe"), "/%_app/%ff%fe");
        assert_eq!(normalize_path("//_app/./immutable//nodes/3.js//"), "/_app/immutable/nodes/3.js");
        assert_eq!(normalize_path("/_app/%2e/immutable/nodes/3.js"), "/_app/immutable/nodes/3.js");
        assert_eq!(normalize_path("/_app/../nodes/3.js"), "/_app/../nodes/3.js");
        assert_eq!(normalize_path("/"), "/");
    }

    #[test]
    fn test_leaf_index() {
        assert_eq!(leaf_index("4.4zf_eCIQ.js"), Some(NodeId(4)));
        assert_eq!(leaf_index("12.js"), Some(NodeId(12)));
        assert_eq!(leaf_index("7abc.js"), Some(NodeId(7)));
        assert_eq!(leaf_index("nested/5.js"), Some(NodeId(5)));
        assert_eq!(leaf_index("abc.js"), None);
        assert_eq!(leaf_index(""), None);
    }

    #[test]
    fn test_data_path() {
        assert_eq!(data_path("/").unwrap(), "/__data.json");
        assert_eq!(data_path("/admin").unwrap(), "/admin/__data.json");
        assert_eq!(data_path("/blog/[slug]").unwrap(), "/blog/[slug]/__data.json");
        assert_eq!(data_path("/(group)/@modal").unwrap(), "/(group)/@modal/__data.json");
        assert_eq!(data_path("/café/a b").unwrap(), "/caf%C3%A9/a%20b/__data.json");
    }

    #[tokio::test]
    async fn test_paths_outside_prefix_pass_untouched() {
        let render = DataServer::new(REDIRECT);
        let guard = guard(render.clone());

        assert_eq!(status(&guard, "/admin").await, None);
        assert_eq!(status(&guard, "/_app/immutable/chunks/3.js").await, None);
        assert_eq!(status(&guard, "/_app/immutable/nodes/99.js").await, None);
        assert_eq!(render.calls(), 0);
    }

    #[tokio::test]
    async fn test_routes_without_server_logic_send_no_data_request() {
        let render = DataServer::new(REDIRECT);
        let guard = guard(render.clone());

        assert_eq!(status(&guard, "/_app/immutable/nodes/2.abc.js").await, None);
        assert_eq!(render.calls(), 0);
    }

    #[tokio::test]
    async fn test_redirect_is_forbidden() {
        let render = DataServer::new(REDIRECT);
        let guard = guard(render.clone());

        let status = status(&guard, "/_app/immutable/nodes/3.4zf_eCIQ.js?v=1").await;
        assert_eq!(status, Some(StatusCode::FORBIDDEN));

        let seen = render.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        let (uri, headers, address, platform) = &seen[0];
        assert_eq!(uri, "/admin/__data.json?v=1");
        assert_eq!(headers["cookie"], "session=abc");
        assert!(headers.get("accept-encoding").is_none());
        assert_eq!(address, LOOPBACK);
        assert!(platform.trusted_runtime);
    }

    #[tokio::test]
    async fn test_layout_server_logic_counts() {
        let render = DataServer::new(REDIRECT);
        let guard = guard(render.clone());

        // Leaf 4 has no server logic; its layout does.
        let status = status(&guard, "/_app/immutable/nodes/4.js").await;
        assert_eq!(status, Some(StatusCode::FORBIDDEN));
        assert_eq!(render.seen.lock().unwrap()[0].0, "/blog/[slug]/__data.json");
    }

    #[tokio::test]
    async fn test_non_canonical_chunk_paths_are_guarded() {
        let render = DataServer::new(REDIRECT);
        let guard = guard(render.clone());

        for path in [
            "/_app/./immutable/nodes/3.abc.js",
            "//_app/immutable/nodes/3.abc.js",
            "/_app/immutable//nodes/3.abc.js",
            "/_app/immutable/nodes/3.abc.js//",
            "/_app/%2e/immutable/nodes/3.abc.js",
        ] {
            assert_eq!(status(&guard, path).await, Some(StatusCode::FORBIDDEN), "{path}");
        }
        assert_eq!(render.calls(), 5);
    }

    #[tokio::test]
    async fn test_other_data_passes() {
        let render = DataServer::new(DATA);
        let guard = guard(render.clone());

        assert_eq!(status(&guard, "/_app/immutable/nodes/%33.js/").await, None);
        assert_eq!(render.calls(), 1);
    }

    #[tokio::test]
    async fn test_undecodable_data_response_is_an_error() {
        let render = DataServer::new("<html>not json</html>");
        let guard = guard(render);

        let err = guard.handle(get("/_app/immutable/nodes/3.js")).await.err().unwrap();
        assert!(matches!(err, GatewayError::Probe(_)));
    }
}
