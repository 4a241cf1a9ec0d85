use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

use petgraph::graph::{DiGraph, NodeIndex};

use crate::edge::{Direction, EdgeStore};
use crate::error::GraphError;

#[derive(Debug, Clone, Copy)]
struct ScoredNode {
    f: f64,
    g: f64,
}

impl ScoredNode {
    fn key(&self) -> (f64, f64) {
        (self.f, self.g)
    }
}

/// Reversed so `BinaryHeap` (a max-heap) pops the lowest `f` first, with `g`
/// as a tiebreaker favoring the cheaper-so-far path.
#[derive(Debug, Clone)]
struct HeapEntry {
    scored: ScoredNode,
    id: String,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.scored.key() == other.scored.key()
    }
}
impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .scored
            .key()
            .partial_cmp(&self.scored.key())
            .unwrap_or(Ordering::Equal)
    }
}

pub struct ShortestPathOptions<'a> {
    pub max_depth: usize,
    pub heuristic: Option<&'a (dyn Fn(&str) -> f64 + Sync)>,
    pub direction: Direction,
    pub return_path: bool,
    pub include_stats: bool,
}

impl<'a> Default for ShortestPathOptions<'a> {
    fn default() -> Self {
        ShortestPathOptions {
            max_depth: 64,
            heuristic: None,
            direction: Direction::Outgoing,
            return_path: false,
            include_stats: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PathStats {
    pub iterations: usize,
    pub visited: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShortestPathResult {
    pub distance: f64,
    pub path: Option<Vec<String>>,
    pub stats: Option<PathStats>,
}

/// Adjacency snapshot materialized lazily from edges actually visited
/// during a search. Held in a `petgraph::DiGraph`; the search itself does
/// not walk `petgraph`'s own algorithms since they don't expose
/// iteration/visit counts or a depth cutoff.
struct VisitedSnapshot {
    graph: DiGraph<String, f64>,
    index: HashMap<String, NodeIndex>,
}

impl VisitedSnapshot {
    fn new() -> Self {
        VisitedSnapshot { graph: DiGraph::new(), index: HashMap::new() }
    }

    fn node(&mut self, id: &str) -> NodeIndex {
        if let Some(&idx) = self.index.get(id) {
            return idx;
        }
        let idx = self.graph.add_node(id.to_string());
        self.index.insert(id.to_string(), idx);
        idx
    }

    fn record_edge(&mut self, from: &str, to: &str, weight: f64) {
        let a = self.node(from);
        let b = self.node(to);
        self.graph.update_edge(a, b, weight);
    }
}

fn reconstruct_path(came_from: &HashMap<String, String>, mut current: String, start: &str) -> Vec<String> {
    let mut path = vec![current.clone()];
    while current != start {
        match came_from.get(&current) {
            Some(prev) => {
                path.push(prev.clone());
                current = prev.clone();
            }
            None => break,
        }
    }
    path.reverse();
    path
}

/// A* over the edge-partition index, with a binary min-heap keyed by
/// `f = g + h`. `g` is accumulated edge weight (`defaultWeight` of `1.0`
/// when unweighted); `h` is the caller-supplied heuristic, `0.0` reducing
/// this to Dijkstra. Terminates on reaching `to`, exhausting the open set
/// (`PathNotFound`), or exceeding `maxDepth * 1000` iterations.
pub async fn shortest_path(
    edges: &EdgeStore,
    from: &str,
    to: &str,
    opts: ShortestPathOptions<'_>,
) -> Result<ShortestPathResult, GraphError> {
    if from == to {
        return Ok(ShortestPathResult {
            distance: 0.0,
            path: opts.return_path.then(|| vec![from.to_string()]),
            stats: opts.include_stats.then(|| PathStats { iterations: 0, visited: 1 }),
        });
    }

    let max_iterations = opts.max_depth.saturating_mul(1000);
    let mut open = BinaryHeap::new();
    let mut best_g: HashMap<String, f64> = HashMap::new();
    let mut came_from: HashMap<String, String> = HashMap::new();
    let mut depth: HashMap<String, usize> = HashMap::new();
    let mut visited: HashSet<String> = HashSet::new();
    let mut snapshot = VisitedSnapshot::new();

    let h0 = opts.heuristic.map_or(0.0, |h| h(from));
    open.push(HeapEntry { scored: ScoredNode { f: h0, g: 0.0 }, id: from.to_string() });
    best_g.insert(from.to_string(), 0.0);
    depth.insert(from.to_string(), 0);

    let mut iterations = 0usize;
    while let Some(entry) = open.pop() {
        iterations += 1;
        if visited.contains(&entry.id) {
            continue;
        }
        visited.insert(entry.id.clone());

        if entry.id == to {
            let path = opts.return_path.then(|| reconstruct_path(&came_from, entry.id.clone(), from));
            let stats = opts.include_stats.then(|| PathStats { iterations, visited: visited.len() });
            return Ok(ShortestPathResult { distance: entry.scored.g, path, stats });
        }

        // Depth cutoff is checked before the iteration-budget check: a node
        // at the cutoff is simply not expanded, it doesn't count against
        // `maxIterations`. With `max_depth == 0` the start node is never
        // expanded and the open set drains to the `PathNotFound` below,
        // rather than tripping `MaxIterationsExceeded` on the first pop.
        let current_depth = *depth.get(&entry.id).unwrap_or(&0);
        if current_depth >= opts.max_depth {
            continue;
        }

        if iterations > max_iterations {
            return Err(GraphError::MaxIterationsExceeded);
        }

        for (neighbor_id, edge) in edges.neighbors_with_edges(&entry.id, opts.direction).await? {
            let weight = edge.weight_field.unwrap_or(1.0);
            snapshot.record_edge(&entry.id, &neighbor_id, weight);
            let tentative_g = entry.scored.g + weight;
            if tentative_g < *best_g.get(&neighbor_id).unwrap_or(&f64::INFINITY) {
                best_g.insert(neighbor_id.clone(), tentative_g);
                came_from.insert(neighbor_id.clone(), entry.id.clone());
                depth.insert(neighbor_id.clone(), current_depth + 1);
                let h = opts.heuristic.map_or(0.0, |hf| hf(&neighbor_id));
                open.push(HeapEntry { scored: ScoredNode { f: tentative_g + h, g: tentative_g }, id: neighbor_id });
            }
        }
    }

    Err(GraphError::PathNotFound { from: from.to_string(), to: to.to_string() })
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

    async fn linear_chain() -> EdgeStore {
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
        let edges = Arc::new(Resource::new(crate::schema::edge_resource_schema("roads"), store));
        for id in ["a", "b", "c", "d"] {
            let mut m = Map::new();
            m.insert("id".to_string(), serde_json::json!(id));
            vertices.insert(m).await.unwrap();
        }
        let store = EdgeStore::new(vertices, edges);
        store.connect("a", "b", false, ConnectOptions { weight: Some(1.0), ..Default::default() }).await.unwrap();
        store.connect("b", "c", false, ConnectOptions { weight: Some(1.0), ..Default::default() }).await.unwrap();
        store.connect("c", "d", false, ConnectOptions { weight: Some(1.0), ..Default::default() }).await.unwrap();
        store
    }

    #[tokio::test]
    async fn finds_shortest_path_along_chain() {
        let edges = linear_chain().await;
        let result = shortest_path(
            &edges,
            "a",
            "d",
            ShortestPathOptions { return_path: true, ..Default::default() },
        )
        .await
        .unwrap();
        assert_eq!(result.distance, 3.0);
        assert_eq!(result.path, Some(vec!["a".to_string(), "b".to_string(), "c".to_string(), "d".to_string()]));
    }

    #[tokio::test]
    async fn reports_stats_when_requested() {
        let edges = linear_chain().await;
        let result = shortest_path(
            &edges,
            "a",
            "d",
            ShortestPathOptions { include_stats: true, ..Default::default() },
        )
        .await
        .unwrap();
        assert!(result.stats.is_some());
        assert!(result.stats.unwrap().visited >= 4);
    }

    #[tokio::test]
    async fn unreachable_target_is_path_not_found() {
        let edges = linear_chain().await;
        let err = shortest_path(&edges, "d", "a", ShortestPathOptions::default()).await.unwrap_err();
        assert!(matches!(err, GraphError::PathNotFound { .. }));
    }

    #[tokio::test]
    async fn max_depth_cutoff_prevents_reaching_far_target() {
        let edges = linear_chain().await;
        let err = shortest_path(&edges, "a", "d", ShortestPathOptions { max_depth: 1, ..Default::default() })
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::PathNotFound { .. }));
    }

    #[tokio::test]
    async fn zero_max_depth_with_distinct_endpoints_is_path_not_found() {
        let edges = linear_chain().await;
        let err = shortest_path(&edges, "a", "d", ShortestPathOptions { max_depth: 0, ..Default::default() })
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::PathNotFound { .. }));
    }

    #[tokio::test]
    async fn same_source_and_target_is_zero_distance() {
        let edges = linear_chain().await;
        let result = shortest_path(&edges, "a", "a", ShortestPathOptions::default()).await.unwrap();
        assert_eq!(result.distance, 0.0);
    }

    #[tokio::test]
    async fn heuristic_still_finds_optimal_path() {
        let edges = linear_chain().await;
        let heuristic = |_id: &str| 0.0;
        let result = shortest_path(
            &edges,
            "a",
            "d",
            ShortestPathOptions { heuristic: Some(&heuristic), return_path: true, ..Default::default() },
        )
        .await
        .unwrap();
        assert_eq!(result.distance, 3.0);
    }
}
