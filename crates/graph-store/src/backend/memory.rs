//! In-process graph backend
//!
//! Keeps the "server" copy of the graph in memory and records every call it
//! receives. Used for offline sessions and by the store tests, which can
//! make it reassign ids on create or fail every request.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{BackendError, GraphBackend, GraphSnapshot, ProjectDraft};
use crate::layout::{Layout, LayoutMap};
use crate::types::{EdgeId, GraphEdge, GraphNode, NodeId};

/// A request received by [`InMemoryBackend`]
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    FetchGraph,
    CreateNode(NodeId),
    UpdateNode(NodeId),
    DeleteNode(NodeId),
    CreateEdge(EdgeId),
    UpdateEdge(EdgeId),
    DeleteEdge(EdgeId),
    SaveLayout(NodeId, Layout),
    SaveLayouts(LayoutMap),
    SaveEdges(Vec<EdgeId>),
    CreateProject(String),
}

#[derive(Default)]
struct ServerState {
    graph: GraphSnapshot,
    projects: Vec<ProjectDraft>,
    calls: Vec<BackendCall>,
}

/// Graph backend that never leaves the process
#[derive(Default)]
pub struct InMemoryBackend {
    state: Mutex<ServerState>,
    /// Assign `srv-{n}` ids on create instead of keeping the client id
    reassign_ids: bool,
    /// Fail every request with `Unavailable`
    offline: AtomicBool,
    next_id: AtomicU64,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend that answers creates with its own ids
    pub fn with_server_ids() -> Self {
        Self {
            reassign_ids: true,
            ..Self::default()
        }
    }

    /// Backend seeded with an existing graph
    pub fn with_graph(graph: GraphSnapshot) -> Self {
        let backend = Self::default();
        backend.state.lock().graph = graph;
        backend
    }

    /// Make every following request fail (or succeed again)
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// All calls received so far
    pub fn calls(&self) -> Vec<BackendCall> {
        self.state.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    /// The server-side copy of the graph
    pub fn graph(&self) -> GraphSnapshot {
        self.state.lock().graph.clone()
    }

    pub fn projects(&self) -> Vec<ProjectDraft> {
        self.state.lock().projects.clone()
    }

    /// Record a call, then fail if offline
    fn record(&self, call: BackendCall) -> Result<(), BackendError> {
        self.state.lock().calls.push(call);
        if self.offline.load(Ordering::SeqCst) {
            return Err(BackendError::Unavailable("in-memory backend is offline".to_string()));
        }
        Ok(())
    }

    fn assign_id(&self, client_id: &str) -> String {
        if self.reassign_ids {
            format!("srv-{}", self.next_id.fetch_add(1, Ordering::Relaxed) + 1)
        } else {
            client_id.to_string()
        }
    }
}

#[async_trait]
impl GraphBackend for InMemoryBackend {
    async fn fetch_graph(&self) -> Result<GraphSnapshot, BackendError> {
        self.record(BackendCall::FetchGraph)?;
        Ok(self.graph())
    }

    async fn create_node(&self, node: &GraphNode, layout: Option<&Layout>) -> Result<NodeId, BackendError> {
        self.record(BackendCall::CreateNode(node.id.clone()))?;
        let id = self.assign_id(&node.id);
        let mut state = self.state.lock();
        let mut stored = node.clone();
        stored.id = id.clone();
        state.graph.nodes.push(stored);
        if let Some(layout) = layout {
            state.graph.layouts.insert(id.clone(), *layout);
        }
        Ok(id)
    }

    async fn update_node(&self, node: &GraphNode) -> Result<(), BackendError> {
        self.record(BackendCall::UpdateNode(node.id.clone()))?;
        let mut state = self.state.lock();
        match state.graph.nodes.iter_mut().find(|n| n.id == node.id) {
            Some(stored) => {
                *stored = node.clone();
                Ok(())
            }
            None => Err(BackendError::Status {
                path: format!("graph/nodes/{}", node.id),
                status: 404,
                body: "node not found".to_string(),
            }),
        }
    }

    async fn delete_node(&self, id: &str) -> Result<(), BackendError> {
        self.record(BackendCall::DeleteNode(id.to_string()))?;
        let mut state = self.state.lock();
        state.graph.nodes.retain(|n| n.id != id);
        state.graph.layouts.remove(id);
        Ok(())
    }

    async fn create_edge(&self, edge: &GraphEdge) -> Result<EdgeId, BackendError> {
        self.record(BackendCall::CreateEdge(edge.id.clone()))?;
        let mut state = self.state.lock();
        if !state.graph.edges.iter().any(|e| e.id == edge.id) {
            state.graph.edges.push(edge.clone());
        }
        Ok(edge.id.clone())
    }

    async fn update_edge(&self, edge: &GraphEdge) -> Result<(), BackendError> {
        self.record(BackendCall::UpdateEdge(edge.id.clone()))?;
        let mut state = self.state.lock();
        if let Some(stored) = state.graph.edges.iter_mut().find(|e| e.id == edge.id) {
            *stored = edge.clone();
        }
        Ok(())
    }

    async fn delete_edge(&self, id: &str) -> Result<(), BackendError> {
        self.record(BackendCall::DeleteEdge(id.to_string()))?;
        self.state.lock().graph.edges.retain(|e| e.id != id);
        Ok(())
    }

    async fn save_layout(&self, node_id: &str, layout: &Layout) -> Result<(), BackendError> {
        self.record(BackendCall::SaveLayout(node_id.to_string(), *layout))?;
        self.state
            .lock()
            .graph
            .layouts
            .insert(node_id.to_string(), *layout);
        Ok(())
    }

    async fn save_layouts(&self, layouts: &LayoutMap) -> Result<(), BackendError> {
        self.record(BackendCall::SaveLayouts(layouts.clone()))?;
        self.state.lock().graph.layouts = layouts.clone();
        Ok(())
    }

    async fn save_edges(&self, edges: &[GraphEdge]) -> Result<(), BackendError> {
        self.record(BackendCall::SaveEdges(
            edges.iter().map(|e| e.id.clone()).collect(),
        ))?;
        self.state.lock().graph.edges = edges.to_vec();
        Ok(())
    }

    async fn create_project(&self, project: &ProjectDraft) -> Result<String, BackendError> {
        self.record(BackendCall::CreateProject(project.name.clone()))?;
        let mut state = self.state.lock();
        state.projects.push(project.clone());
        Ok(format!("project-{}", state.projects.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{NodeStatus, NodeType};

    fn node(id: &str) -> GraphNode {
        GraphNode {
            id: id.to_string(),
            name: id.to_string(),
            node_type: NodeType::Input,
            description: String::new(),
            status: NodeStatus::Ready,
            settings: vec![],
            inputs: vec![],
            outputs: vec![],
        }
    }

    #[tokio::test]
    async fn test_server_ids() {
        let backend = InMemoryBackend::with_server_ids();
        let first = backend.create_node(&node("a"), None).await.unwrap();
        let second = backend.create_node(&node("b"), None).await.unwrap();
        assert_eq!(first, "srv-1");
        assert_eq!(second, "srv-2");
        assert_eq!(backend.graph().nodes[0].id, "srv-1");
    }

    #[tokio::test]
    async fn test_offline_records_and_fails() {
        let backend = InMemoryBackend::new();
        backend.set_offline(true);
        let result = backend.delete_edge("e1").await;
        assert!(matches!(result, Err(BackendError::Unavailable(_))));
        assert_eq!(backend.calls(), vec![BackendCall::DeleteEdge("e1".to_string())]);
    }

    #[tokio::test]
    async fn test_update_unknown_node_is_404() {
        let backend = InMemoryBackend::new();
        let result = backend.update_node(&node("ghost")).await;
        assert!(matches!(result, Err(BackendError::Status { status: 404, .. })));
    }
}
