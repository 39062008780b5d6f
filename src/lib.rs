//! Render gateway library.
//!
//! Request dispatch and trust boundary in front of a server-side rendering
//! engine: blocks leaf-chunk requests that would leak redirects, serves static
//! assets, and forwards everything else with reconstructed origin and client
//! address.

pub mod config;
pub mod http;
pub mod manifest;
pub mod observability;
pub mod render;
pub mod trust;

pub use config::schema::GatewayConfig;
pub use http::HttpServer;
