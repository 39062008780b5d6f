//! Origin reconstruction.
//!
//! # Responsibilities
//! - Derive `protocol://host[:port]` from the configured headers
//! - Rebase a request onto that origin without touching anything else

use axum::body::Body;
use axum::http::{Request, Uri};

use crate::trust::{header_str, TrustBoundary, TrustError, DEFAULT_PROTOCOL};

impl TrustBoundary {
    /// The origin the client believes it is talking to.
    pub fn origin(&self, headers: &axum::http::HeaderMap) -> Result<String, TrustError> {
        let config = self.config();
        if let Some(origin) = &config.origin {
            return Ok(origin.trim_end_matches('/').to_string());
        }

        let protocol = config
            .protocol_header
            .as_deref()
            .and_then(|name| header_str(headers, name))
            .filter(|value| !value.is_empty())
            .unwrap_or(DEFAULT_PROTOCOL);
        let host = header_str(headers, &config.host_header).ok_or_else(|| TrustError::MissingHost {
            header: config.host_header.clone(),
        })?;
        let port = config
            .port_header
            .as_deref()
            .and_then(|name| header_str(headers, name))
            .filter(|value| !value.is_empty());

        Ok(match port {
            Some(port) => format!("{protocol}://{host}:{port}"),
            None => format!("{protocol}://{host}"),
        })
    }

    /// Replace the request's scheme and authority with the reconstructed
    /// origin. Method, headers, body, version and extensions are kept.
    pub fn rebase(&self, request: Request<Body>) -> Result<Request<Body>, TrustError> {
        let origin = self.origin(request.headers())?;
        let (mut parts, body) = request.into_parts();

        let path = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        let target = format!("{origin}{path}");
        parts.uri = target.parse::<Uri>().map_err(|e| TrustError::InvalidOrigin {
            origin,
            reason: e.to_string(),
        })?;

        Ok(Request::from_parts(parts, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trust::TrustConfig;
    use axum::http::{HeaderMap, Method};

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(*k, v.parse().unwrap());
        }
        map
    }

    fn boundary(configure: impl FnOnce(&mut TrustConfig)) -> TrustBoundary {
        let mut config = TrustConfig::default();
        configure(&mut config);
        TrustBoundary::new(config)
    }

    #[test]
    fn test_origin_defaults_to_https() {
        let trust = boundary(|_| {});
        let origin = trust.origin(&headers(&[("host", "example.com")])).unwrap();
        assert_eq!(origin, "https://example.com");
    }

    #[test]
    fn test_origin_with_port_header() {
        let trust = boundary(|c| c.port_header = Some("x-forwarded-port".into()));
        let origin = trust
            .origin(&headers(&[("host", "example.com"), ("x-forwarded-port", "8080")]))
            .unwrap();
        assert_eq!(origin, "https://example.com:8080");

        let origin = trust
            .origin(&headers(&[("host", "example.com"), ("x-forwarded-port", "")]))
            .unwrap();
        assert_eq!(origin, "https://example.com");
    }

    #[test]
    fn test_origin_protocol_and_host_headers() {
        let trust = boundary(|c| {
            c.protocol_header = Some("x-forwarded-proto".into());
            c.host_header = "x-forwarded-host".into();
        });
        let origin = trust
            .origin(&headers(&[
                ("host", "internal:3000"),
                ("x-forwarded-host", "shop.example"),
                ("x-forwarded-proto", "http"),
            ]))
            .unwrap();
        assert_eq!(origin, "http://shop.example");

        let err = trust.origin(&headers(&[("host", "internal:3000")])).unwrap_err();
        assert_eq!(err, TrustError::MissingHost { header: "x-forwarded-host".into() });
    }

    #[test]
    fn test_fixed_origin_wins() {
        let trust = boundary(|c| c.origin = Some("https://fixed.example".into()));
        let origin = trust.origin(&headers(&[("host", "other.example")])).unwrap();
        assert_eq!(origin, "https://fixed.example");
        assert_eq!(trust.origin(&HeaderMap::new()).unwrap(), "https://fixed.example");
    }

    #[test]
    fn test_rebase_preserves_request() {
        let trust = boundary(|_| {});
        let request = Request::builder()
            .method(Method::POST)
            .uri("/form?x=1")
            .header("host", "example.com")
            .header("cookie", "a=b")
            .body(Body::from("payload"))
            .unwrap();

        let rebased = trust.rebase(request).unwrap();
        assert_eq!(rebased.method(), Method::POST);
        assert_eq!(rebased.uri().to_string(), "https://example.com/form?x=1");
        assert_eq!(rebased.headers()["cookie"], "a=b");
    }
}
