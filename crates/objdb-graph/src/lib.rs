//! Graph overlay: edges stored as a partitioned resource alongside a
//! declared vertex resource, with A* shortest-path and BFS/DFS traversal
//! over the resulting adjacency.

pub mod astar;
pub mod edge;
pub mod error;
pub mod overlay;
pub mod schema;
pub mod traverse;

pub use astar::{shortest_path, PathStats, ShortestPathOptions, ShortestPathResult};
pub use edge::{ConnectOptions, Direction, EdgeStore};
pub use error::GraphError;
pub use overlay::GraphOverlay;
pub use schema::{edge_resource_schema, edge_to_fields, fields_to_edge};
pub use traverse::{traverse, TraverseMode, TraverseOptions};
