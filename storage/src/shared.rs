use crate::graph::{GraphStats, GraphStore};
use crate::snapshot::{self, SnapshotError};
use defectgraph_core::model::{Node, Relationship};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::info;

/// Cloneable handle to one store behind a single lock shared by readers and
/// writers. Holding a read guard pins a consistent view for whole-graph scans.
#[derive(Clone, Default)]
pub struct SharedGraph {
    inner: Arc<RwLock<GraphStore>>,
}

impl SharedGraph {
    pub fn new(store: GraphStore) -> Self {
        Self {
            inner: Arc::new(RwLock::new(store)),
        }
    }

    pub async fn read(&self) -> RwLockReadGuard<'_, GraphStore> {
        self.inner.read().await
    }

    pub async fn write(&self) -> RwLockWriteGuard<'_, GraphStore> {
        self.inner.write().await
    }

    pub async fn add_node(&self, node: Node) -> bool {
        self.inner.write().await.add_node(node)
    }

    pub async fn add_relationship(&self, relationship: Relationship) {
        self.inner.write().await.add_relationship(relationship);
    }

    pub async fn stats(&self) -> GraphStats {
        self.inner.read().await.stats()
    }

    /// Swaps the whole store, returning the previous contents.
    pub async fn replace(&self, store: GraphStore) -> GraphStore {
        let mut guard = self.inner.write().await;
        std::mem::replace(&mut *guard, store)
    }

    pub async fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), SnapshotError> {
        let guard = self.inner.read().await;
        snapshot::save_to_file(&guard, path).await
    }

    /// Replaces the in-memory graph with the snapshot at `path`. Returns
    /// false, leaving the current graph in place, when nothing could be loaded.
    pub async fn load_from_file(&self, path: impl AsRef<Path>) -> bool {
        match snapshot::load_from_file(path).await {
            Some(store) => {
                self.replace(store).await;
                true
            }
            None => false,
        }
    }

    /// Loads the cached graph if there is one, otherwise runs `rebuild`
    /// against an empty store and persists the result.
    pub async fn load_or_rebuild<F, Fut, E>(&self, path: impl AsRef<Path>, rebuild: F) -> Result<bool, E>
    where
        F: FnOnce(SharedGraph) -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: From<SnapshotError>,
    {
        let path = path.as_ref();
        if snapshot::cache_exists(path) && self.load_from_file(path).await {
            return Ok(true);
        }

        info!("Rebuilding knowledge graph from scratch");
        self.replace(GraphStore::new()).await;
        rebuild(self.clone()).await?;
        self.save_to_file(path).await?;
        Ok(false)
    }
}
