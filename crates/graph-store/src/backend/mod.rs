//! Remote persistence abstraction
//!
//! The store talks to the portal's REST backend through the
//! [`GraphBackend`] trait. [`HttpGraphBackend`] is the real client;
//! [`InMemoryBackend`] keeps everything in process, for offline use and for
//! tests.

pub mod http;
pub mod memory;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::layout::{Layout, LayoutMap};
use crate::types::{EdgeId, GraphEdge, GraphNode, NodeId};

pub use http::HttpGraphBackend;
pub use memory::{BackendCall, InMemoryBackend};

/// Error types for backend operations
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Request to {path} failed with status {status}: {body}")]
    Status {
        path: String,
        status: u16,
        body: String,
    },

    #[error("Unexpected response: {0}")]
    Decode(String),

    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

/// Graph state as returned by the bootstrap fetch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    #[serde(default)]
    pub nodes: Vec<GraphNode>,
    #[serde(default)]
    pub edges: Vec<GraphEdge>,
    #[serde(default)]
    pub layouts: LayoutMap,
}

impl GraphSnapshot {
    /// Parse a bootstrap response
    ///
    /// Accepts either `{nodes, edges, layouts}` or a bare array of nodes.
    pub fn from_response(value: Value) -> Result<Self, BackendError> {
        let parsed = match value {
            Value::Array(_) => serde_json::from_value::<Vec<GraphNode>>(value).map(|nodes| Self {
                nodes,
                ..Self::default()
            }),
            Value::Object(_) => serde_json::from_value::<Self>(value),
            other => {
                return Err(BackendError::Decode(format!(
                    "expected graph object or node array, got {}",
                    other
                )))
            }
        };
        parsed.map_err(|e| BackendError::Decode(e.to_string()))
    }
}

/// A package or flow saved as a project
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDraft {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Manifest or flow metadata
    pub manifest: Value,
    /// Path -> text content
    #[serde(default)]
    pub files: BTreeMap<String, String>,
}

/// Interface to the graph REST backend
///
/// Create calls return the id the server assigned, which may differ from
/// the id sent.
#[async_trait]
pub trait GraphBackend: Send + Sync {
    /// `GET graph`
    async fn fetch_graph(&self) -> Result<GraphSnapshot, BackendError>;

    /// `POST node`
    async fn create_node(&self, node: &GraphNode, layout: Option<&Layout>) -> Result<NodeId, BackendError>;

    /// `PUT node/{id}`
    async fn update_node(&self, node: &GraphNode) -> Result<(), BackendError>;

    /// `DELETE node/{id}`
    async fn delete_node(&self, id: &str) -> Result<(), BackendError>;

    /// `POST edge`
    async fn create_edge(&self, edge: &GraphEdge) -> Result<EdgeId, BackendError>;

    /// `PUT edge/{id}`
    async fn update_edge(&self, edge: &GraphEdge) -> Result<(), BackendError>;

    /// `DELETE edge/{id}`
    async fn delete_edge(&self, id: &str) -> Result<(), BackendError>;

    /// `PUT layouts/{id}`
    async fn save_layout(&self, node_id: &str, layout: &Layout) -> Result<(), BackendError>;

    /// `PUT layouts`
    async fn save_layouts(&self, layouts: &LayoutMap) -> Result<(), BackendError>;

    /// `PUT edges`
    async fn save_edges(&self, edges: &[GraphEdge]) -> Result<(), BackendError>;

    /// `POST project`, returns the project id
    async fn create_project(&self, project: &ProjectDraft) -> Result<String, BackendError>;
}

/// Pull an id out of a create response (`{"id": ..}` or `{"data": {"id": ..}}`)
pub(crate) fn extract_id(value: &Value) -> Option<String> {
    let id = value
        .get("id")
        .or_else(|| value.get("data").and_then(|d| d.get("id")))?;
    match id {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_snapshot_from_object() {
        let snapshot = GraphSnapshot::from_response(json!({
            "nodes": [{"id": "a", "type": "input"}],
            "edges": [],
            "layouts": {"a": {"x": 1.0, "y": 2.0}}
        }))
        .unwrap();
        assert_eq!(snapshot.nodes.len(), 1);
        assert_eq!(snapshot.layouts["a"], Layout::new(1.0, 2.0));
    }

    #[test]
    fn test_snapshot_from_bare_array() {
        let snapshot =
            GraphSnapshot::from_response(json!([{"id": "a", "type": "input"}, {"id": "b", "type": "tool"}]))
                .unwrap();
        assert_eq!(snapshot.nodes.len(), 2);
        assert!(snapshot.edges.is_empty());
    }

    #[test]
    fn test_snapshot_rejects_scalars() {
        assert!(GraphSnapshot::from_response(json!("nope")).is_err());
    }

    #[test]
    fn test_extract_id() {
        assert_eq!(extract_id(&json!({"id": "n1"})).as_deref(), Some("n1"));
        assert_eq!(extract_id(&json!({"data": {"id": 42}})).as_deref(), Some("42"));
        assert_eq!(extract_id(&json!({"ok": true})), None);
    }
}
