use std::collections::{HashSet, VecDeque};

use crate::edge::{Direction, EdgeStore};
use crate::error::GraphError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraverseMode {
    Bfs,
    Dfs,
}

pub struct TraverseOptions<'a> {
    pub mode: TraverseMode,
    pub max_depth: usize,
    pub direction: Direction,
    /// Gates inclusion in the result; a filtered-out node is still counted
    /// and its descendants are still explored.
    pub filter: Option<&'a (dyn Fn(&str) -> bool + Sync)>,
    /// Returning `false` prunes this node's descendants from further
    /// exploration, without affecting whether the node itself was included.
    pub visitor: Option<&'a (dyn Fn(&str) -> bool + Sync)>,
}

impl<'a> Default for TraverseOptions<'a> {
    fn default() -> Self {
        TraverseOptions { mode: TraverseMode::Bfs, max_depth: 64, direction: Direction::Outgoing, filter: None, visitor: None }
    }
}

/// BFS (queue, front-extract) or DFS (stack, back-extract) over the edge
/// partition index. `filter` gates result inclusion; `visitor` gates
/// further expansion — the node is always counted-or-filtered before its
/// descendants are pruned.
pub async fn traverse(edges: &EdgeStore, start: &str, opts: TraverseOptions<'_>) -> Result<Vec<String>, GraphError> {
    let mut frontier: VecDeque<(String, usize)> = VecDeque::new();
    frontier.push_back((start.to_string(), 0));
    let mut seen = HashSet::new();
    seen.insert(start.to_string());
    let mut result = Vec::new();

    loop {
        let next = match opts.mode {
            TraverseMode::Bfs => frontier.pop_front(),
            TraverseMode::Dfs => frontier.pop_back(),
        };
        let Some((node, depth)) = next else { break };

        if opts.filter.map_or(true, |f| f(&node)) {
            result.push(node.clone());
        }

        let expand = opts.visitor.map_or(true, |v| v(&node));
        if !expand || depth >= opts.max_depth {
            continue;
        }

        for (neighbor_id, _edge) in edges.neighbors_with_edges(&node, opts.direction).await? {
            if seen.insert(neighbor_id.clone()) {
                frontier.push_back((neighbor_id, depth + 1));
            }
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edge::ConnectOptions;
    use objdb_resource::Resource;
    use objdb_store::ObjectStoreBlob;
    use objdb_types::{AttributeDef, AttributeType, ResourceBehavior, ResourceName, ResourceSchema};
    use std::collections::HashMap as Map;
    use std::sync::Arc;

    async fn star_graph() -> EdgeStore {
        let store: Arc<dyn objdb_store::BlobStore> = Arc::new(ObjectStoreBlob::in_memory());
        let vertex_schema = ResourceSchema {
            name: ResourceName::new("nodes"),
            attributes: vec![AttributeDef { name: "id".into(), attr_type: AttributeType::String, required: true }],
            behavior: ResourceBehavior::BodyOnly,
            partitions: vec![],
            timestamps: false,
            async_partitions: false,
        };
        let vertices = Arc::new(Resource::new(vertex_schema, store.clone()));
        let edges = Arc::new(Resource::new(crate::schema::edge_resource_schema("links"), store));
        for id in ["root", "a", "b", "aa"] {
            let mut m = Map::new();
            m.insert("id".to_string(), serde_json::json!(id));
            vertices.insert(m).await.unwrap();
        }
        let edge_store = EdgeStore::new(vertices, edges);
        edge_store.connect("root", "a", false, ConnectOptions::default()).await.unwrap();
        edge_store.connect("root", "b", false, ConnectOptions::default()).await.unwrap();
        edge_store.connect("a", "aa", false, ConnectOptions::default()).await.unwrap();
        edge_store
    }

    #[tokio::test]
    async fn bfs_visits_all_reachable_nodes() {
        let edges = star_graph().await;
        let mut visited = traverse(&edges, "root", TraverseOptions::default()).await.unwrap();
        visited.sort();
        assert_eq!(visited, vec!["a".to_string(), "aa".to_string(), "b".to_string(), "root".to_string()]);
    }

    #[tokio::test]
    async fn max_depth_limits_exploration() {
        let edges = star_graph().await;
        let mut visited =
            traverse(&edges, "root", TraverseOptions { max_depth: 1, ..TraverseOptions::default() }).await.unwrap();
        visited.sort();
        assert_eq!(visited, vec!["a".to_string(), "b".to_string(), "root".to_string()]);
    }

    #[tokio::test]
    async fn filter_excludes_from_result_but_not_from_expansion() {
        let edges = star_graph().await;
        let filter = |id: &str| id != "a";
        let mut visited =
            traverse(&edges, "root", TraverseOptions { filter: Some(&filter), ..TraverseOptions::default() })
                .await
                .unwrap();
        visited.sort();
        // "a" is excluded by the filter but "aa" (a's child) is still reached.
        assert_eq!(visited, vec!["aa".to_string(), "b".to_string(), "root".to_string()]);
    }

    #[tokio::test]
    async fn visitor_prunes_descendants() {
        let edges = star_graph().await;
        let visitor = |id: &str| id != "a";
        let mut visited =
            traverse(&edges, "root", TraverseOptions { visitor: Some(&visitor), ..TraverseOptions::default() })
                .await
                .unwrap();
        visited.sort();
        // "a" is still included (visitor only prunes its descendants), "aa" is not explored.
        assert_eq!(visited, vec!["a".to_string(), "b".to_string(), "root".to_string()]);
    }

    #[tokio::test]
    async fn dfs_reaches_same_set_as_bfs() {
        let edges = star_graph().await;
        let mut visited =
            traverse(&edges, "root", TraverseOptions { mode: TraverseMode::Dfs, ..TraverseOptions::default() })
                .await
                .unwrap();
        visited.sort();
        assert_eq!(visited, vec!["a".to_string(), "aa".to_string(), "b".to_string(), "root".to_string()]);
    }
}
