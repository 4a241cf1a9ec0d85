use std::collections::HashMap;
use std::sync::Arc;

use objdb_resource::Resource;
use objdb_types::{EdgeRecord, Record};
use objdb_util::new_id;
use serde_json::Value;

use crate::error::GraphError;
use crate::schema::{edge_to_fields, fields_to_edge};

/// Direction of traversal relative to a vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Outgoing,
    Incoming,
    Both,
}

#[derive(Debug, Clone, Default)]
pub struct ConnectOptions {
    pub label: Option<String>,
    pub weight: Option<f64>,
    pub data: HashMap<String, Value>,
    /// Vertex fields to project onto the edge's `snapshot`, fetched from
    /// the target (and source, for undirected edges) at creation time.
    pub denormalize: Vec<String>,
}

/// Partition-indexed edge storage: `bySource`/`byTarget`/`byLabel` over a
/// declared edge resource, plus the undirected mirror-edge convention.
pub struct EdgeStore {
    vertices: Arc<Resource>,
    edges: Arc<Resource>,
}

impl EdgeStore {
    pub fn new(vertices: Arc<Resource>, edges: Arc<Resource>) -> Self {
        EdgeStore { vertices, edges }
    }

    async fn project_snapshot(&self, vertex_id: &str, fields: &[String]) -> Result<Value, GraphError> {
        let record = self
            .vertices
            .get(vertex_id)
            .await
            .map_err(|_| GraphError::VertexNotFound(vertex_id.to_string()))?;
        let mut projected = serde_json::Map::new();
        for field in fields {
            if let Some(value) = record.data.get(field) {
                projected.insert(field.clone(), value.clone());
            }
        }
        Ok(Value::Object(projected))
    }

    /// Writes one edge `from -> to`; for `undirected` graphs also writes a
    /// mirror record (`reverse=true, originalEdge=<id>`).
    pub async fn connect(
        &self,
        from: &str,
        to: &str,
        undirected: bool,
        opts: ConnectOptions,
    ) -> Result<EdgeRecord, GraphError> {
        let snapshot = if opts.denormalize.is_empty() {
            None
        } else {
            Some(self.project_snapshot(to, &opts.denormalize).await?)
        };

        let id = new_id();
        let edge = EdgeRecord {
            id: id.clone(),
            source_field: from.to_string(),
            target_field: to.to_string(),
            label_field: opts.label.clone(),
            weight_field: opts.weight,
            snapshot,
            reverse: false,
            original_edge: None,
        };
        let mut fields = edge_to_fields(&edge)?;
        fields.extend(opts.data.clone());
        self.edges.insert(fields).await?;

        if undirected {
            let reverse_snapshot = if opts.denormalize.is_empty() {
                None
            } else {
                Some(self.project_snapshot(from, &opts.denormalize).await?)
            };
            let reverse = EdgeRecord {
                id: new_id(),
                source_field: to.to_string(),
                target_field: from.to_string(),
                label_field: opts.label.clone(),
                weight_field: opts.weight,
                snapshot: reverse_snapshot,
                reverse: true,
                original_edge: Some(id.clone()),
            };
            let mut reverse_fields = edge_to_fields(&reverse)?;
            reverse_fields.extend(opts.data);
            self.edges.insert(reverse_fields).await?;
        }

        Ok(edge)
    }

    /// Deletes a single edge record by id. Does not remove its undirected
    /// mirror — use [`EdgeStore::disconnect`] to remove a pair by endpoints.
    pub async fn remove(&self, edge_id: &str) -> Result<(), GraphError> {
        self.edges.delete(edge_id).await?;
        Ok(())
    }

    /// Removes every edge `from -> to` (and, when present, its mirror
    /// `to -> from`) matching `label`. Returns the count removed.
    pub async fn disconnect(&self, from: &str, to: &str, label: Option<&str>) -> Result<usize, GraphError> {
        let mut removed = 0;
        for record in self.between(from, to, label).await? {
            self.edges.delete(&record.id).await?;
            removed += 1;
        }
        for record in self.between(to, from, label).await? {
            let edge = fields_to_edge(&record.data)?;
            if edge.reverse {
                self.edges.delete(&record.id).await?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn records_for_partition(&self, partition: &str, value: &str) -> Result<Vec<Record>, GraphError> {
        let ids = self.edges.list_partition(partition, Some(value), None).await?;
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(record) = self.edges.get_or_null(&id).await? {
                out.push(record);
            }
        }
        Ok(out)
    }

    pub async fn by_source(&self, vertex_id: &str) -> Result<Vec<Record>, GraphError> {
        self.records_for_partition("bySource", vertex_id).await
    }

    pub async fn by_target(&self, vertex_id: &str) -> Result<Vec<Record>, GraphError> {
        self.records_for_partition("byTarget", vertex_id).await
    }

    pub async fn labels(&self, label: &str) -> Result<Vec<Record>, GraphError> {
        self.records_for_partition("byLabel", label).await
    }

    pub async fn between(&self, source: &str, target: &str, label: Option<&str>) -> Result<Vec<Record>, GraphError> {
        let mut out = Vec::new();
        for record in self.by_source(source).await? {
            let edge = fields_to_edge(&record.data)?;
            if edge.target_field == target && label.map_or(true, |l| edge.label_field.as_deref() == Some(l)) {
                out.push(record);
            }
        }
        Ok(out)
    }

    pub(crate) async fn neighbors_with_edges(
        &self,
        vertex_id: &str,
        direction: Direction,
    ) -> Result<Vec<(String, EdgeRecord)>, GraphError> {
        let mut out = Vec::new();
        if matches!(direction, Direction::Outgoing | Direction::Both) {
            for record in self.by_source(vertex_id).await? {
                let edge = fields_to_edge(&record.data)?;
                out.push((edge.target_field.clone(), edge));
            }
        }
        if matches!(direction, Direction::Incoming | Direction::Both) {
            for record in self.by_target(vertex_id).await? {
                let edge = fields_to_edge(&record.data)?;
                out.push((edge.source_field.clone(), edge));
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use objdb_store::ObjectStoreBlob;
    use objdb_types::{AttributeDef, AttributeType, ResourceName};
    use std::collections::HashMap as Map;

    fn vertices(store: Arc<dyn objdb_store::BlobStore>) -> Arc<Resource> {
        let schema = objdb_types::ResourceSchema {
            name: ResourceName::new("people"),
            attributes: vec![AttributeDef { name: "id".into(), attr_type: AttributeType::String, required: true }],
            behavior: objdb_types::ResourceBehavior::BodyOnly,
            partitions: vec![],
            timestamps: false,
            async_partitions: false,
        };
        Arc::new(Resource::new(schema, store))
    }

    fn edges(store: Arc<dyn objdb_store::BlobStore>) -> Arc<Resource> {
        Arc::new(Resource::new(crate::schema::edge_resource_schema("knows"), store))
    }

    async fn setup() -> (EdgeStore, Arc<Resource>) {
        let store: Arc<dyn objdb_store::BlobStore> = Arc::new(ObjectStoreBlob::in_memory());
        let vertices = vertices(store.clone());
        let e = edges(store);
        let mut m = Map::new();
        for id in ["a", "b", "c"] {
            m.insert("id".to_string(), serde_json::json!(id));
            vertices.insert(m.clone()).await.unwrap();
        }
        (EdgeStore::new(vertices.clone(), e.clone()), vertices)
    }

    #[tokio::test]
    async fn connect_directed_writes_one_edge() {
        let (edges, _v) = setup().await;
        edges.connect("a", "b", false, ConnectOptions::default()).await.unwrap();
        assert_eq!(edges.by_source("a").await.unwrap().len(), 1);
        assert_eq!(edges.by_target("a").await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn connect_undirected_writes_mirror_edge() {
        let (edges, _v) = setup().await;
        edges.connect("a", "b", true, ConnectOptions::default()).await.unwrap();
        assert_eq!(edges.by_source("a").await.unwrap().len(), 1);
        assert_eq!(edges.by_source("b").await.unwrap().len(), 1);
        let mirror = &edges.by_source("b").await.unwrap()[0];
        let edge = fields_to_edge(&mirror.data).unwrap();
        assert!(edge.reverse);
    }

    #[tokio::test]
    async fn disconnect_removes_both_directions() {
        let (edges, _v) = setup().await;
        edges.connect("a", "b", true, ConnectOptions::default()).await.unwrap();
        let removed = edges.disconnect("a", "b", None).await.unwrap();
        assert_eq!(removed, 2);
        assert_eq!(edges.by_source("a").await.unwrap().len(), 0);
        assert_eq!(edges.by_source("b").await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn denormalize_projects_target_fields_onto_snapshot() {
        let (edges, vertices) = setup().await;
        let mut extra = Map::new();
        extra.insert("id".to_string(), serde_json::json!("d"));
        extra.insert("name".to_string(), serde_json::json!("Dana"));
        vertices.insert(extra).await.unwrap();

        let edge = edges
            .connect("a", "d", false, ConnectOptions { denormalize: vec!["name".into()], ..Default::default() })
            .await
            .unwrap();
        assert_eq!(edge.snapshot, Some(serde_json::json!({"name": "Dana"})));
    }

    #[tokio::test]
    async fn labels_finds_edges_by_label_partition() {
        let (edges, _v) = setup().await;
        edges
            .connect("a", "b", false, ConnectOptions { label: Some("knows".into()), ..Default::default() })
            .await
            .unwrap();
        edges.connect("a", "c", false, ConnectOptions::default()).await.unwrap();
        assert_eq!(edges.labels("knows").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn between_filters_by_label() {
        let (edges, _v) = setup().await;
        edges
            .connect("a", "b", false, ConnectOptions { label: Some("knows".into()), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(edges.between("a", "b", Some("knows")).await.unwrap().len(), 1);
        assert_eq!(edges.between("a", "b", Some("other")).await.unwrap().len(), 0);
    }
}
