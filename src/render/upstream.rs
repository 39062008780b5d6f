//! HTTP render server.
//!
//! # Responsibilities
//! - Forward rendered requests to the configured upstream
//! - Strip hop-by-hop headers in both directions
//! - Carry the caller context as X-Forwarded-* headers
//!
//! # Design Decisions
//! - One well-known upstream; no balancing, no retries
//! - X-Forwarded-For is replaced, not appended: the gateway has already
//!   decided which hop to believe

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Request, Uri};
use axum::response::Response;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};

use crate::config::UpstreamConfig;
use crate::render::socket::UpstreamSocket;
use crate::render::{RenderContext, RenderError, RenderServer, SocketCapability};

/// Marks requests issued by a trusted runtime.
pub const X_RENDER_PLATFORM: &str = "x-render-platform";

const HOP_BY_HOP: [HeaderName; 7] = [
    header::CONNECTION,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Render server reached over HTTP.
#[derive(Clone)]
pub struct HttpRenderServer {
    upstream: SocketAddr,
    client: Client<HttpConnector, Body>,
    websocket: bool,
}

impl HttpRenderServer {
    pub fn new(config: &UpstreamConfig) -> Result<Self, RenderError> {
        let upstream = config
            .address
            .parse()
            .map_err(|_| RenderError::InvalidRequest(format!("bad upstream address {:?}", config.address)))?;
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        Ok(Self {
            upstream,
            client,
            websocket: config.websocket,
        })
    }

    pub fn upstream(&self) -> SocketAddr {
        self.upstream
    }
}

#[async_trait]
impl RenderServer for HttpRenderServer {
    async fn respond(&self, request: Request<Body>, context: RenderContext) -> Result<Response, RenderError> {
        let (parts, body) = request.into_parts();

        let path = parts.uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
        let uri: Uri = format!("http://{}{}", self.upstream, path)
            .parse()
            .map_err(|e: axum::http::uri::InvalidUri| RenderError::InvalidRequest(e.to_string()))?;

        let mut headers = parts.headers;
        strip_hop_by_hop(&mut headers);
        set_header(&mut headers, "x-forwarded-for", context.client_address())?;
        if let (Some(scheme), Some(authority)) = (parts.uri.scheme_str(), parts.uri.authority()) {
            set_header(&mut headers, "x-forwarded-proto", scheme)?;
            set_header(&mut headers, "x-forwarded-host", authority.as_str())?;
        }
        if context.platform().trusted_runtime {
            headers.insert(X_RENDER_PLATFORM, HeaderValue::from_static("trusted"));
        }

        let mut forwarded = Request::builder()
            .method(parts.method)
            .uri(uri)
            .body(body)
            .map_err(|e| RenderError::InvalidRequest(e.to_string()))?;
        *forwarded.headers_mut() = headers;

        tracing::debug!(
            upstream = %self.upstream,
            path = %path,
            client_address = %context.client_address(),
            "Forwarding to render server"
        );

        let response = self
            .client
            .request(forwarded)
            .await
            .map_err(|e| RenderError::Upstream(e.to_string()))?;

        let (mut parts, body) = response.into_parts();
        strip_hop_by_hop(&mut parts.headers);
        Ok(Response::from_parts(parts, Body::new(body)))
    }

    fn socket_capability(&self) -> Result<Option<SocketCapability>, RenderError> {
        if !self.websocket {
            return Ok(None);
        }
        Ok(Some(SocketCapability::new(Arc::new(UpstreamSocket::new(self.upstream)))))
    }
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    // Headers named by Connection are hop-by-hop too.
    let named: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();
    for name in named.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
    headers.remove("keep-alive");
}

fn set_header(headers: &mut HeaderMap, name: &'static str, value: &str) -> Result<(), RenderError> {
    let value = HeaderValue::from_str(value)
        .map_err(|_| RenderError::InvalidRequest(format!("{name} value {value:?} is not a header value")))?;
    headers.insert(name, value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_hop_by_hop() {
        let mut headers = HeaderMap::new();
        headers.insert("connection", "keep-alive, x-secret".parse().unwrap());
        headers.insert("keep-alive", "timeout=5".parse().unwrap());
        headers.insert("x-secret", "1".parse().unwrap());
        headers.insert("transfer-encoding", "chunked".parse().unwrap());
        headers.insert("cookie", "a=b".parse().unwrap());

        strip_hop_by_hop(&mut headers);

        assert_eq!(headers.len(), 1);
        assert_eq!(headers["cookie"], "a=b");
    }

    #[tokio::test]
    async fn test_socket_capability_follows_config() {
        let mut config = UpstreamConfig::default();
        let server = HttpRenderServer::new(&config).unwrap();
        assert!(server.socket_capability().unwrap().is_none());

        config.websocket = true;
        let server = HttpRenderServer::new(&config).unwrap();
        assert!(server.socket_capability().unwrap().is_some());
    }

    #[test]
    fn test_rejects_bad_upstream() {
        let config = UpstreamConfig {
            address: "render-server".into(),
            websocket: false,
        };
        assert!(matches!(HttpRenderServer::new(&config), Err(RenderError::InvalidRequest(_))));
    }
}
