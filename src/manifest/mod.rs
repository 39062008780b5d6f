//! Route manifest subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     manifest.json → RouteManifest (immutable, shared via Arc)
//!
//! Per request (only where options or server logic matter):
//!     Route.page → loader.rs (fan out one load per node, join)
//!     → LoadedNodeSet → cascade.rs (most specific option wins)
//! ```
//!
//! # Design Decisions
//! - Manifest is read once and never mutated
//! - Node modules load lazily; each loads at most once per process
//! - "No layout" slots are `None`, never a sentinel index

pub mod cascade;
pub mod loader;
pub mod node;

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

pub use cascade::resolve_option;
pub use loader::{load_page_nodes, FsNodeLoader, LoadedNodeSet, NodeLoadError, NodeLoader, StaticNodeLoader};
pub use node::{Node, NodeId, OptionValue, OptionsRecord, RouteOption};

/// Errors reading the manifest at startup.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read manifest {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse manifest: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Node indexes making up a page: layouts root-most first, then the leaf.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Page {
    #[serde(default)]
    pub layouts: Vec<Option<NodeId>>,
    pub leaf: NodeId,
}

impl Page {
    /// Every slot in cascade order, leaf last.
    pub fn slots(&self) -> impl Iterator<Item = Option<NodeId>> + '_ {
        self.layouts.iter().copied().chain(std::iter::once(Some(self.leaf)))
    }
}

/// A routable page.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Route {
    /// Path template, e.g. `/blog/[slug]`.
    pub id: String,
    pub page: Page,
}

/// The application's route table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteManifest {
    pub app_path: String,
    pub app_dir: String,
    #[serde(default)]
    pub routes: Vec<Route>,
}

impl RouteManifest {
    pub fn from_json(json: &str) -> Result<Self, ManifestError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let json = std::fs::read_to_string(path).map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// URL prefix under which node code chunks are served.
    pub fn node_chunk_prefix(&self) -> String {
        format!("/{}/immutable/nodes/", self.app_path)
    }

    /// First route whose page leaf is `leaf`.
    pub fn route_for_leaf(&self, leaf: NodeId) -> Option<&Route> {
        self.routes.iter().find(|route| route.page.leaf == leaf)
    }

    /// One past the highest node index any page references.
    pub fn node_count(&self) -> usize {
        self.routes
            .iter()
            .flat_map(|route| route.page.slots())
            .flatten()
            .map(|id| id.0 + 1)
            .max()
            .unwrap_or(0)
    }
}
