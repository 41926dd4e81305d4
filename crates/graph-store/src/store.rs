//! Node, edge and layout store with optimistic updates
//!
//! Every mutation is applied to the in-memory copy first and returned to the
//! caller immediately. Remote writes run afterwards on spawned tasks:
//! single-entity creates/updates/deletes go out right away, layout and
//! bulk edge writes go through the [`PersistScheduler`] so a burst of
//! changes settles into one request carrying the latest state.
//!
//! Failed writes are logged and published as [`GraphEvent::PersistFailed`];
//! the local copy is never rolled back and never re-fetched. The only
//! server value ever adopted is the id returned for a created node.

use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::backend::{BackendError, GraphBackend, GraphSnapshot};
use crate::config::PersistenceConfig;
use crate::constants::{keys, storage_keys};
use crate::error::Result;
use crate::events::{EventBus, GraphEvent};
use crate::layout::{grid_position, Layout, LayoutMap, LayoutPatch};
use crate::scheduler::PersistScheduler;
use crate::storage::{load_json, save_json, LocalStorage};
use crate::types::{
    EdgeDraft, EdgeUpdate, GraphEdge, GraphNode, NodeDraft, NodeId, NodeType, NodeUpdate,
};

#[derive(Debug, Default)]
struct GraphState {
    nodes: Vec<GraphNode>,
    edges: Vec<GraphEdge>,
    layouts: LayoutMap,
}

impl GraphState {
    fn node_index(&self, id: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.id == id)
    }

    fn contains_node(&self, id: &str) -> bool {
        self.node_index(id).is_some()
    }

    /// Current layout of a node, or its grid fallback
    fn layout_or_default(&self, id: &str) -> Option<Layout> {
        let index = self.node_index(id)?;
        Some(
            self.layouts
                .get(id)
                .copied()
                .unwrap_or_else(|| grid_position(index)),
        )
    }
}

struct StoreInner {
    state: Mutex<GraphState>,
    backend: Arc<dyn GraphBackend>,
    storage: Arc<dyn LocalStorage>,
    scheduler: Arc<PersistScheduler>,
    bus: Arc<EventBus>,
    persistence: PersistenceConfig,
}

/// Handle to the graph of the current flow
///
/// Cheap to clone; all clones share the same state. Mutating methods spawn
/// tokio tasks and must be called from within a runtime.
#[derive(Clone)]
pub struct GraphStore {
    inner: Arc<StoreInner>,
}

impl GraphStore {
    pub fn new(
        backend: Arc<dyn GraphBackend>,
        storage: Arc<dyn LocalStorage>,
        bus: Arc<EventBus>,
        persistence: PersistenceConfig,
    ) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                state: Mutex::new(GraphState::default()),
                backend,
                storage,
                scheduler: PersistScheduler::new(),
                bus,
                persistence,
            }),
        }
    }

    // =========================================================================
    // Read access
    // =========================================================================

    pub fn nodes(&self) -> Vec<GraphNode> {
        self.inner.state.lock().nodes.clone()
    }

    pub fn edges(&self) -> Vec<GraphEdge> {
        self.inner.state.lock().edges.clone()
    }

    pub fn layouts(&self) -> LayoutMap {
        self.inner.state.lock().layouts.clone()
    }

    pub fn node(&self, id: &str) -> Option<GraphNode> {
        let state = self.inner.state.lock();
        state.node_index(id).map(|i| state.nodes[i].clone())
    }

    pub fn edge(&self, id: &str) -> Option<GraphEdge> {
        self.inner
            .state
            .lock()
            .edges
            .iter()
            .find(|e| e.id == id)
            .cloned()
    }

    pub fn layout(&self, id: &str) -> Option<Layout> {
        self.inner.state.lock().layouts.get(id).copied()
    }

    pub fn node_count(&self) -> usize {
        self.inner.state.lock().nodes.len()
    }

    /// Nodes, edges and layouts in one consistent copy
    pub fn snapshot(&self) -> GraphSnapshot {
        let state = self.inner.state.lock();
        GraphSnapshot {
            nodes: state.nodes.clone(),
            edges: state.edges.clone(),
            layouts: state.layouts.clone(),
        }
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.inner.bus
    }

    pub fn scheduler(&self) -> &Arc<PersistScheduler> {
        &self.inner.scheduler
    }

    pub fn backend(&self) -> &Arc<dyn GraphBackend> {
        &self.inner.backend
    }

    // =========================================================================
    // Nodes
    // =========================================================================

    /// Add a node, filling in defaults, and return the optimistic copy
    ///
    /// The returned id is the client id. If the backend assigns another one
    /// the node is migrated afterwards and `NodeIdReassigned` is published.
    pub fn add_node(&self, draft: NodeDraft) -> GraphNode {
        let node_type = draft.node_type.unwrap_or(NodeType::Transform);
        let (node, layout) = {
            let mut state = self.inner.state.lock();
            let index = state.nodes.len();
            let requested = draft
                .id
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| default_node_id(node_type));
            let id = unique_node_id(&state, requested);
            let name = draft
                .name
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| format!("{} {}", node_type.display_name(), index + 1));
            let node = GraphNode {
                id,
                name,
                node_type,
                description: draft.description.unwrap_or_default(),
                status: draft.status.unwrap_or_default(),
                settings: draft.settings,
                inputs: draft.inputs,
                outputs: draft.outputs,
            };
            let layout = draft
                .layout
                .map(Layout::normalized)
                .unwrap_or_else(|| grid_position(index));

            state.nodes.push(node.clone());
            state.layouts.insert(node.id.clone(), layout);
            (node, layout)
        };

        log::debug!("Added node '{}' ({})", node.id, node.node_type);
        self.cache_layouts();
        self.inner.bus.publish(GraphEvent::NodeAdded {
            node_id: node.id.clone(),
        });
        self.inner.bus.publish(GraphEvent::LayoutChanged {
            node_ids: vec![node.id.clone()],
        });

        let backend = self.inner.backend.clone();
        let weak = Arc::downgrade(&self.inner);
        let created = node.clone();
        let bus = self.inner.bus.clone();
        tokio::spawn(async move {
            match backend.create_node(&created, Some(&layout)).await {
                Ok(server_id) if server_id != created.id => {
                    if let Some(inner) = weak.upgrade() {
                        GraphStore { inner }.migrate_node_id(&created.id, &server_id);
                    }
                }
                Ok(_) => {}
                Err(e) => report_failure(&bus, "create_node", e),
            }
        });

        node
    }

    /// Merge updates into a node; list fields are replaced wholesale
    pub fn update_node(&self, id: &str, updates: NodeUpdate) {
        let updated = {
            let mut state = self.inner.state.lock();
            let Some(index) = state.node_index(id) else {
                log::warn!("update_node: unknown node '{}'", id);
                return;
            };
            let node = &mut state.nodes[index];
            updates.apply_to(node);
            node.clone()
        };

        self.inner.bus.publish(GraphEvent::NodeUpdated {
            node_id: updated.id.clone(),
        });

        let backend = self.inner.backend.clone();
        self.spawn_persist("update_node", async move { backend.update_node(&updated).await });
    }

    /// Remove a node together with its layout and every edge touching it
    pub fn remove_node(&self, id: &str) -> Option<GraphNode> {
        let (removed, dropped_edges) = {
            let mut state = self.inner.state.lock();
            let index = state.node_index(id)?;
            let removed = state.nodes.remove(index);
            state.layouts.remove(id);
            let (dropped, kept): (Vec<GraphEdge>, Vec<GraphEdge>) = std::mem::take(&mut state.edges)
                .into_iter()
                .partition(|e| e.touches(id));
            state.edges = kept;
            (removed, dropped)
        };

        self.inner
            .scheduler
            .cancel(&format!("{}{}", keys::LAYOUT_PREFIX, id));
        self.cache_layouts();

        self.inner.bus.publish(GraphEvent::NodeRemoved {
            node_id: id.to_string(),
        });
        for edge in &dropped_edges {
            self.inner.bus.publish(GraphEvent::EdgeRemoved {
                edge_id: edge.id.clone(),
            });
        }

        let backend = self.inner.backend.clone();
        let node_id = id.to_string();
        self.spawn_persist("delete_node", async move { backend.delete_node(&node_id).await });
        if !dropped_edges.is_empty() {
            self.schedule_edges_persist();
        }

        Some(removed)
    }

    /// Move a created node to the id the server assigned
    fn migrate_node_id(&self, old_id: &str, new_id: &str) {
        let edges_changed = {
            let mut state = self.inner.state.lock();
            if state.contains_node(new_id) {
                log::warn!(
                    "Server id '{}' for node '{}' is already in use, keeping the client id",
                    new_id,
                    old_id
                );
                return;
            }
            let Some(index) = state.node_index(old_id) else {
                log::debug!("Node '{}' was removed before its server id arrived", old_id);
                return;
            };
            state.nodes[index].id = new_id.to_string();
            if let Some(layout) = state.layouts.remove(old_id) {
                state.layouts.insert(new_id.to_string(), layout);
            }
            let mut changed = false;
            for edge in state.edges.iter_mut() {
                if edge.source == old_id {
                    edge.source = new_id.to_string();
                    changed = true;
                }
                if edge.target == old_id {
                    edge.target = new_id.to_string();
                    changed = true;
                }
            }
            changed
        };

        log::info!("Node '{}' now has server id '{}'", old_id, new_id);

        if self
            .inner
            .scheduler
            .cancel(&format!("{}{}", keys::LAYOUT_PREFIX, old_id))
        {
            self.schedule_layout_persist(new_id);
        }
        if edges_changed {
            self.schedule_edges_persist();
        }
        self.cache_layouts();
        self.inner.bus.publish(GraphEvent::NodeIdReassigned {
            old_id: old_id.to_string(),
            new_id: new_id.to_string(),
        });
    }

    // =========================================================================
    // Edges
    // =========================================================================

    /// Connect two nodes
    ///
    /// Returns `None` for a missing endpoint or a self-loop. Returns the
    /// existing edge when the id or the exact
    /// `(source, target, sourceHandle, targetHandle)` tuple is already present.
    pub fn add_edge(&self, draft: EdgeDraft) -> Option<GraphEdge> {
        if draft.source.is_empty() || draft.target.is_empty() {
            log::debug!("add_edge: missing source or target");
            return None;
        }
        if draft.source == draft.target {
            log::debug!("add_edge: refusing self-loop on '{}'", draft.source);
            return None;
        }

        let edge = {
            let mut state = self.inner.state.lock();
            let existing = state.edges.iter().find(|e| {
                draft.id.as_deref() == Some(e.id.as_str())
                    || e.connects(
                        &draft.source,
                        &draft.target,
                        draft.source_handle.as_deref(),
                        draft.target_handle.as_deref(),
                    )
            });
            if let Some(existing) = existing {
                return Some(existing.clone());
            }

            let edge = GraphEdge {
                id: draft
                    .id
                    .filter(|id| !id.is_empty())
                    .unwrap_or_else(|| format!("edge-{}", uuid::Uuid::new_v4())),
                source: draft.source,
                target: draft.target,
                source_handle: draft.source_handle,
                target_handle: draft.target_handle,
                label: draft.label,
            };
            state.edges.push(edge.clone());
            edge
        };

        self.inner.bus.publish(GraphEvent::EdgeAdded {
            edge_id: edge.id.clone(),
        });

        let backend = self.inner.backend.clone();
        let created = edge.clone();
        self.spawn_persist("create_edge", async move {
            backend.create_edge(&created).await.map(|_| ())
        });
        self.schedule_edges_persist();

        Some(edge)
    }

    /// Change handles or label of an edge
    ///
    /// Returns `None` if the edge is unknown or the change would duplicate
    /// another edge's tuple.
    pub fn update_edge(&self, id: &str, updates: EdgeUpdate) -> Option<GraphEdge> {
        let updated = {
            let mut state = self.inner.state.lock();
            let index = state.edges.iter().position(|e| e.id == id)?;
            let mut candidate = state.edges[index].clone();
            updates.apply_to(&mut candidate);
            let duplicate = state.edges.iter().any(|e| {
                e.id != id
                    && e.connects(
                        &candidate.source,
                        &candidate.target,
                        candidate.source_handle.as_deref(),
                        candidate.target_handle.as_deref(),
                    )
            });
            if duplicate {
                log::warn!("update_edge: '{}' would duplicate an existing connection", id);
                return None;
            }
            state.edges[index] = candidate.clone();
            candidate
        };

        self.inner.bus.publish(GraphEvent::EdgeUpdated {
            edge_id: updated.id.clone(),
        });

        let backend = self.inner.backend.clone();
        let sent = updated.clone();
        self.spawn_persist("update_edge", async move { backend.update_edge(&sent).await });
        self.schedule_edges_persist();

        Some(updated)
    }

    /// Remove an edge. Returns false if it did not exist.
    pub fn remove_edge(&self, id: &str) -> bool {
        let removed = {
            let mut state = self.inner.state.lock();
            let before = state.edges.len();
            state.edges.retain(|e| e.id != id);
            state.edges.len() != before
        };
        if !removed {
            return false;
        }

        self.inner.bus.publish(GraphEvent::EdgeRemoved {
            edge_id: id.to_string(),
        });

        let backend = self.inner.backend.clone();
        let edge_id = id.to_string();
        self.spawn_persist("delete_edge", async move { backend.delete_edge(&edge_id).await });
        self.schedule_edges_persist();
        true
    }

    // =========================================================================
    // Layouts
    // =========================================================================

    /// Move a node; coordinates are clamped to `>= 0` and rounded to 2 decimals
    pub fn update_node_layout(&self, id: &str, patch: LayoutPatch) {
        let layout = {
            let mut state = self.inner.state.lock();
            let Some(current) = state.layout_or_default(id) else {
                log::warn!("update_node_layout: unknown node '{}'", id);
                return;
            };
            let layout = current.merge(patch).normalized();
            state.layouts.insert(id.to_string(), layout);
            layout
        };

        log::trace!("Node '{}' moved to ({}, {})", id, layout.x, layout.y);
        self.cache_layouts();
        self.inner.bus.publish(GraphEvent::LayoutChanged {
            node_ids: vec![id.to_string()],
        });
        self.schedule_layout_persist(id);
    }

    /// Re-grid every node in insertion order
    pub fn auto_layout_nodes(&self) {
        let node_ids: Vec<NodeId> = {
            let mut state = self.inner.state.lock();
            let layouts: LayoutMap = state
                .nodes
                .iter()
                .enumerate()
                .map(|(i, n)| (n.id.clone(), grid_position(i)))
                .collect();
            state.layouts = layouts;
            state.nodes.iter().map(|n| n.id.clone()).collect()
        };

        self.cache_layouts();
        self.inner
            .bus
            .publish(GraphEvent::LayoutChanged { node_ids });
        self.schedule_layouts_persist();
    }

    // =========================================================================
    // Whole-graph operations
    // =========================================================================

    /// Load the graph from the backend
    ///
    /// Layouts come from the response, then the local cache, then the grid.
    /// Nothing is written back.
    pub async fn bootstrap(&self) -> Result<usize> {
        let snapshot = self.inner.backend.fetch_graph().await?;
        let cached: LayoutMap =
            load_json(self.inner.storage.as_ref(), storage_keys::LAYOUTS).unwrap_or_default();

        let mut layouts = cached;
        layouts.extend(snapshot.layouts);
        let count = self.replace_state(snapshot.nodes, snapshot.edges, layouts);

        log::info!("Bootstrapped graph with {} nodes", count);
        let (node_count, edge_count) = self.counts();
        self.inner.bus.publish(GraphEvent::FlowReplaced {
            flow_id: None,
            node_count,
            edge_count,
        });
        Ok(count)
    }

    /// Replace nodes, edges and layouts wholesale and persist the result
    ///
    /// Invalid pieces are dropped with a warning: nodes with duplicate ids,
    /// self-loops, duplicate edge tuples, layouts of unknown nodes. Missing
    /// layouts are synthesized from the grid.
    pub fn replace_graph(&self, nodes: Vec<GraphNode>, edges: Vec<GraphEdge>, layouts: LayoutMap) {
        self.replace_state(nodes, edges, layouts);
        self.schedule_layouts_persist();
        self.schedule_edges_persist();
    }

    /// Drop the local graph without touching the backend
    ///
    /// Pending bulk writes are cancelled so the empty graph is never sent.
    pub fn clear(&self) {
        self.inner.scheduler.cancel(keys::LAYOUTS);
        self.inner.scheduler.cancel(keys::EDGES);
        self.replace_state(Vec::new(), Vec::new(), LayoutMap::new());
        self.inner.bus.publish(GraphEvent::FlowReplaced {
            flow_id: None,
            node_count: 0,
            edge_count: 0,
        });
    }

    fn replace_state(&self, nodes: Vec<GraphNode>, edges: Vec<GraphEdge>, layouts: LayoutMap) -> usize {
        let mut clean_nodes: Vec<GraphNode> = Vec::with_capacity(nodes.len());
        for mut node in nodes {
            if clean_nodes.iter().any(|n| n.id == node.id) {
                log::warn!("Dropping node with duplicate id '{}'", node.id);
                continue;
            }
            if node.name.is_empty() {
                node.name = format!("{} {}", node.node_type.display_name(), clean_nodes.len() + 1);
            }
            clean_nodes.push(node);
        }

        let mut clean_edges: Vec<GraphEdge> = Vec::with_capacity(edges.len());
        for edge in edges {
            if edge.source.is_empty() || edge.target.is_empty() || edge.source == edge.target {
                log::warn!("Dropping invalid edge '{}'", edge.id);
                continue;
            }
            let duplicate = clean_edges.iter().any(|e| {
                e.id == edge.id
                    || e.connects(
                        &edge.source,
                        &edge.target,
                        edge.source_handle.as_deref(),
                        edge.target_handle.as_deref(),
                    )
            });
            if duplicate {
                log::warn!("Dropping duplicate edge '{}'", edge.id);
                continue;
            }
            clean_edges.push(edge);
        }

        let clean_layouts: LayoutMap = clean_nodes
            .iter()
            .enumerate()
            .map(|(i, n)| {
                let layout = layouts
                    .get(&n.id)
                    .map(|l| l.normalized())
                    .unwrap_or_else(|| grid_position(i));
                (n.id.clone(), layout)
            })
            .collect();

        self.inner.scheduler.cancel_prefix(keys::LAYOUT_PREFIX);

        let count = clean_nodes.len();
        {
            let mut state = self.inner.state.lock();
            state.nodes = clean_nodes;
            state.edges = clean_edges;
            state.layouts = clean_layouts;
        }
        self.cache_layouts();
        count
    }

    fn counts(&self) -> (usize, usize) {
        let state = self.inner.state.lock();
        (state.nodes.len(), state.edges.len())
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Spawn a best-effort write; failures are reported, never returned
    fn spawn_persist<F>(&self, operation: &'static str, write: F)
    where
        F: Future<Output = std::result::Result<(), BackendError>> + Send + 'static,
    {
        let bus = self.inner.bus.clone();
        tokio::spawn(async move {
            if let Err(e) = write.await {
                report_failure(&bus, operation, e);
            }
        });
    }

    fn schedule_layout_persist(&self, node_id: &str) {
        let weak = Arc::downgrade(&self.inner);
        let node_id = node_id.to_string();
        let delay = self.inner.persistence.layout_delay();
        self.inner.scheduler.schedule(
            format!("{}{}", keys::LAYOUT_PREFIX, node_id),
            delay,
            async move {
                let Some(inner) = weak.upgrade() else { return };
                let layout = inner.state.lock().layouts.get(&node_id).copied();
                if let Some(layout) = layout {
                    if let Err(e) = inner.backend.save_layout(&node_id, &layout).await {
                        report_failure(&inner.bus, "save_layout", e);
                    }
                }
            },
        );
    }

    fn schedule_layouts_persist(&self) {
        let weak = Arc::downgrade(&self.inner);
        let delay = self.inner.persistence.bulk_delay();
        self.inner.scheduler.schedule(keys::LAYOUTS, delay, async move {
            let Some(inner) = weak.upgrade() else { return };
            let layouts = inner.state.lock().layouts.clone();
            if let Err(e) = inner.backend.save_layouts(&layouts).await {
                report_failure(&inner.bus, "save_layouts", e);
            }
        });
    }

    fn schedule_edges_persist(&self) {
        let weak = Arc::downgrade(&self.inner);
        let delay = self.inner.persistence.bulk_delay();
        self.inner.scheduler.schedule(keys::EDGES, delay, async move {
            let Some(inner) = weak.upgrade() else { return };
            let edges = inner.state.lock().edges.clone();
            if let Err(e) = inner.backend.save_edges(&edges).await {
                report_failure(&inner.bus, "save_edges", e);
            }
        });
    }

    /// Mirror layouts into local storage
    fn cache_layouts(&self) {
        let layouts = self.inner.state.lock().layouts.clone();
        if let Err(e) = save_json(self.inner.storage.as_ref(), storage_keys::LAYOUTS, &layouts) {
            log::warn!("Failed to cache layouts locally: {}", e);
        }
    }
}

fn report_failure(bus: &EventBus, operation: &str, error: BackendError) {
    log::warn!("{} failed, keeping local state: {}", operation, error);
    bus.publish(GraphEvent::persist_failed(operation, error));
}

fn default_node_id(node_type: NodeType) -> String {
    format!("{}-{}", node_type, chrono::Utc::now().timestamp_millis())
}

/// Suffix `-{n}` until the id is free
fn unique_node_id(state: &GraphState, requested: String) -> String {
    if !state.contains_node(&requested) {
        return requested;
    }
    (2..)
        .map(|n| format!("{}-{}", requested, n))
        .find(|candidate| !state.contains_node(candidate))
        .unwrap_or(requested)
}
