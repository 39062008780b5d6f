//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the render gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Reverse-proxy trust settings.
    pub trust: TrustConfig,

    /// Static asset directories.
    pub assets: AssetsConfig,

    /// Route manifest location.
    pub manifest: ManifestConfig,

    /// Upstream render server.
    pub upstream: UpstreamConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
        }
    }
}

/// How much of the reverse-proxy headers to believe.
///
/// Header names are stored lowercased. `None` means the header is not
/// configured, which is different from configured-but-absent on a request.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TrustConfig {
    /// Header carrying the client address (e.g. `x-forwarded-for`).
    pub address_header: Option<String>,

    /// Header carrying the original protocol (e.g. `x-forwarded-proto`).
    pub protocol_header: Option<String>,

    /// Header carrying the original host.
    pub host_header: String,

    /// Header carrying the original port.
    pub port_header: Option<String>,

    /// Number of trusted proxy hops, counted from the nearest one.
    pub forwarding_depth: u32,

    /// Fixed origin; overrides every header-derived value.
    pub origin: Option<String>,
}

impl Default for TrustConfig {
    fn default() -> Self {
        Self {
            address_header: None,
            protocol_header: None,
            host_header: "host".to_string(),
            port_header: None,
            forwarding_depth: 1,
            origin: None,
        }
    }
}

impl TrustConfig {
    /// Lowercase every configured header name.
    pub fn normalize_header_names(&mut self) {
        for header in [&mut self.address_header, &mut self.protocol_header, &mut self.port_header]
            .into_iter()
            .flatten()
        {
            header.make_ascii_lowercase();
        }
        self.host_header.make_ascii_lowercase();
    }
}

/// Static asset configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AssetsConfig {
    /// Serve static assets at all.
    pub enabled: bool,

    /// Build output root holding `client/` and `prerendered/`.
    pub root: String,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            root: "build".to_string(),
        }
    }
}

/// Route manifest configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ManifestConfig {
    /// Path to the manifest JSON document.
    pub path: String,

    /// Directory of per-node JSON documents (`<index>.json`).
    pub nodes_dir: String,
}

impl Default for ManifestConfig {
    fn default() -> Self {
        Self {
            path: "build/manifest.json".to_string(),
            nodes_dir: "build/nodes".to_string(),
        }
    }
}

/// Upstream render server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Render server address (e.g., "127.0.0.1:5173").
    pub address: String,

    /// Whether the render server accepts socket upgrades.
    pub websocket: bool,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:5173".to_string(),
            websocket: false,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit logs as JSON lines.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
