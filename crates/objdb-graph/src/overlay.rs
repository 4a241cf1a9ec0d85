use std::sync::Arc;

use objdb_resource::Resource;
use objdb_types::{EdgeRecord, Record};

use crate::astar::{self, ShortestPathOptions, ShortestPathResult};
use crate::edge::{ConnectOptions, Direction, EdgeStore};
use crate::error::GraphError;
use crate::traverse::{self, TraverseMode, TraverseOptions};

/// Vertex-side façade over [`EdgeStore`]: the graph overlay's public API,
/// combining a declared vertex resource with its edge partition index.
pub struct GraphOverlay {
    edges: EdgeStore,
}

impl GraphOverlay {
    pub fn new(vertices: Arc<Resource>, edges: Arc<Resource>) -> Self {
        GraphOverlay { edges: EdgeStore::new(vertices, edges) }
    }

    pub async fn connect(
        &self,
        from: &str,
        to: &str,
        undirected: bool,
        opts: ConnectOptions,
    ) -> Result<EdgeRecord, GraphError> {
        self.edges.connect(from, to, undirected, opts).await
    }

    pub async fn disconnect(&self, from: &str, to: &str, label: Option<&str>) -> Result<usize, GraphError> {
        self.edges.disconnect(from, to, label).await
    }

    pub async fn remove_edge(&self, edge_id: &str) -> Result<(), GraphError> {
        self.edges.remove(edge_id).await
    }

    pub async fn outgoing_edges(&self, vertex_id: &str) -> Result<Vec<Record>, GraphError> {
        self.edges.by_source(vertex_id).await
    }

    pub async fn incoming_edges(&self, vertex_id: &str) -> Result<Vec<Record>, GraphError> {
        self.edges.by_target(vertex_id).await
    }

    pub async fn edges_of(&self, vertex_id: &str) -> Result<Vec<Record>, GraphError> {
        let mut out = self.outgoing_edges(vertex_id).await?;
        out.extend(self.incoming_edges(vertex_id).await?);
        Ok(out)
    }

    pub async fn neighbors(&self, vertex_id: &str, direction: Direction) -> Result<Vec<String>, GraphError> {
        let pairs = self.edges.neighbors_with_edges(vertex_id, direction).await?;
        Ok(pairs.into_iter().map(|(id, _)| id).collect())
    }

    pub async fn degree(&self, vertex_id: &str, direction: Direction) -> Result<usize, GraphError> {
        Ok(self.neighbors(vertex_id, direction).await?.len())
    }

    pub async fn is_connected(&self, from: &str, to: &str, label: Option<&str>) -> Result<bool, GraphError> {
        Ok(!self.edges.between(from, to, label).await?.is_empty())
    }

    pub async fn shortest_path(
        &self,
        from: &str,
        to: &str,
        opts: ShortestPathOptions<'_>,
    ) -> Result<ShortestPathResult, GraphError> {
        astar::shortest_path(&self.edges, from, to, opts).await
    }

    pub async fn traverse(&self, start: &str, opts: TraverseOptions<'_>) -> Result<Vec<String>, GraphError> {
        traverse::traverse(&self.edges, start, opts).await
    }

    /// Reachability check via a depth-unbounded BFS, independent of edge
    /// weights (unlike [`GraphOverlay::shortest_path`], which always
    /// succeeds or fails on weighted cost, not mere connectivity).
    pub async fn path_exists(&self, from: &str, to: &str, direction: Direction) -> Result<bool, GraphError> {
        let visited = self
            .traverse(
                from,
                TraverseOptions { mode: TraverseMode::Bfs, max_depth: usize::MAX, direction, filter: None, visitor: None },
            )
            .await?;
        Ok(visited.iter().any(|id| id == to))
    }
}
