//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing)
//!     → chain.rs (upgrade? → render server socket support)
//!     → guard.rs (node chunk of a redirecting page? → 403)
//!     → assets.rs (client bundle, then prerendered pages)
//!     → ssr.rs (rebase origin, resolve client address, render)
//!     → 404 if nothing answered
//! ```

pub mod assets;
pub mod chain;
pub mod error;
pub mod guard;
pub mod server;
pub mod ssr;

pub use chain::{Chain, Dispatcher, Flow, Handler};
pub use error::GatewayError;
pub use server::HttpServer;
