//! Node loading.
//!
//! # Responsibilities
//! - Resolve a node index to its loaded module
//! - Load a page's full node set concurrently (all-or-nothing)
//!
//! # Design Decisions
//! - `NodeLoader` is the seam; the filesystem loader caches each node in a
//!   write-once cell so concurrent first loads agree on one value
//! - A single failed load fails the whole set

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::try_join_all;
use thiserror::Error;
use tokio::sync::OnceCell;

use crate::manifest::cascade::resolve_option;
use crate::manifest::node::{Node, NodeId, OptionValue, RouteOption};
use crate::manifest::Page;

/// Errors loading a node module.
#[derive(Debug, Error)]
pub enum NodeLoadError {
    #[error("{0} is not in the node table")]
    UnknownNode(NodeId),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Resolves node indexes to loaded nodes.
#[async_trait]
pub trait NodeLoader: Send + Sync {
    async fn load(&self, id: NodeId) -> Result<Arc<Node>, NodeLoadError>;
}

/// Loads `<dir>/<index>.json` on first use and keeps it.
pub struct FsNodeLoader {
    dir: PathBuf,
    slots: Vec<OnceCell<Arc<Node>>>,
}

impl FsNodeLoader {
    /// `count` is the size of the node table (see `RouteManifest::node_count`).
    pub fn new(dir: impl Into<PathBuf>, count: usize) -> Self {
        Self {
            dir: dir.into(),
            slots: (0..count).map(|_| OnceCell::new()).collect(),
        }
    }
}

#[async_trait]
impl NodeLoader for FsNodeLoader {
    async fn load(&self, id: NodeId) -> Result<Arc<Node>, NodeLoadError> {
        let slot = self.slots.get(id.0).ok_or(NodeLoadError::UnknownNode(id))?;
        let node = slot
            .get_or_try_init(|| async {
                let path = self.dir.join(format!("{}.json", id.0));
                let bytes = tokio::fs::read(&path)
                    .await
                    .map_err(|source| NodeLoadError::Io { path: path.clone(), source })?;
                let node: Node = serde_json::from_slice(&bytes)
                    .map_err(|source| NodeLoadError::Parse { path: path.clone(), source })?;
                tracing::debug!(node = %id, path = %path.display(), "Loaded node");
                Ok::<_, NodeLoadError>(Arc::new(node))
            })
            .await?;
        Ok(node.clone())
    }
}

/// In-memory node table.
#[derive(Debug, Clone, Default)]
pub struct StaticNodeLoader {
    nodes: Vec<Arc<Node>>,
}

impl StaticNodeLoader {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self {
            nodes: nodes.into_iter().map(Arc::new).collect(),
        }
    }
}

#[async_trait]
impl NodeLoader for StaticNodeLoader {
    async fn load(&self, id: NodeId) -> Result<Arc<Node>, NodeLoadError> {
        self.nodes.get(id.0).cloned().ok_or(NodeLoadError::UnknownNode(id))
    }
}

/// A page's nodes in cascade order; `None` where a layout is absent.
#[derive(Debug, Clone, Default)]
pub struct LoadedNodeSet {
    nodes: Vec<Option<Arc<Node>>>,
}

impl LoadedNodeSet {
    pub fn new(nodes: Vec<Option<Arc<Node>>>) -> Self {
        Self { nodes }
    }

    pub fn nodes(&self) -> &[Option<Arc<Node>>] {
        &self.nodes
    }

    /// True if any node in the set runs server logic.
    pub fn has_server(&self) -> bool {
        self.nodes.iter().flatten().any(|node| node.has_server())
    }

    /// Cascaded value of `option` for this page.
    pub fn option(&self, option: RouteOption) -> Option<&OptionValue> {
        resolve_option(&self.nodes, option)
    }
}

/// Load every node of `page` concurrently.
pub async fn load_page_nodes(
    page: &Page,
    loader: &dyn NodeLoader,
) -> Result<LoadedNodeSet, NodeLoadError> {
    let nodes = try_join_all(page.slots().map(|slot| async move {
        match slot {
            Some(id) => loader.load(id).await.map(Some),
            None => Ok(None),
        }
    }))
    .await?;

    Ok(LoadedNodeSet::new(nodes))
}
