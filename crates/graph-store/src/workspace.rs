//! The editor session: graph store, simulation and flow identity together
//!
//! [`Workspace`] is what a portal front end holds on to. It wires the
//! stores to one [`EventBus`], owns the current flow's attribution and
//! implements flow import/export on top of [`GraphStore::replace_graph`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use crate::backend::{GraphBackend, GraphSnapshot, HttpGraphBackend};
use crate::config::PortalConfig;
use crate::error::{FlowError, Result};
use crate::events::{EventBus, GraphEvent};
use crate::flow::{parse_flow_definition, ExportMetadata, FlowDocument, FlowObject, RemixAttribution};
use crate::simulation::SimulationRunner;
use crate::storage::{AppMode, FileStorage, LocalStorage};
use crate::store::GraphStore;

/// Identity of the flow currently loaded
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlowInfo {
    pub id: Option<String>,
    pub name: Option<String>,
    pub remixed_from: Option<RemixAttribution>,
}

pub struct Workspace {
    config: PortalConfig,
    bus: Arc<EventBus>,
    storage: Arc<dyn LocalStorage>,
    store: GraphStore,
    simulation: SimulationRunner,
    flow: Mutex<FlowInfo>,
}

impl Workspace {
    pub fn new(config: PortalConfig, backend: Arc<dyn GraphBackend>, storage: Arc<dyn LocalStorage>) -> Self {
        let bus = Arc::new(EventBus::new());
        let store = GraphStore::new(
            backend,
            storage.clone(),
            bus.clone(),
            config.persistence.clone(),
        );
        let simulation = SimulationRunner::new(bus.clone(), config.simulation.clone());
        Self {
            config,
            bus,
            storage,
            store,
            simulation,
            flow: Mutex::new(FlowInfo::default()),
        }
    }

    /// Workspace backed by the HTTP API and file storage from `config`
    pub fn connect(config: PortalConfig) -> Result<Self> {
        let backend = HttpGraphBackend::new(&config.api)?;
        let storage = FileStorage::new(config.resolved_storage_dir());
        log::info!(
            "Connecting to {} with storage in {:?}",
            config.api.base_url,
            storage.dir()
        );
        Ok(Self::new(config, Arc::new(backend), Arc::new(storage)))
    }

    pub fn store(&self) -> &GraphStore {
        &self.store
    }

    pub fn simulation(&self) -> &SimulationRunner {
        &self.simulation
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn storage(&self) -> &Arc<dyn LocalStorage> {
        &self.storage
    }

    pub fn config(&self) -> &PortalConfig {
        &self.config
    }

    pub fn flow_info(&self) -> FlowInfo {
        self.flow.lock().clone()
    }

    pub fn app_mode(&self) -> AppMode {
        AppMode::load(self.storage.as_ref())
    }

    pub fn set_app_mode(&self, mode: AppMode) -> Result<()> {
        mode.save(self.storage.as_ref())?;
        Ok(())
    }

    // =========================================================================
    // Export
    // =========================================================================

    /// Snapshot the current flow with export metadata
    pub fn export_flow(&self) -> FlowDocument {
        let info = self.flow_info();
        let mut metadata =
            ExportMetadata::now(self.config.user_id.clone(), self.config.active_cortex.clone());
        metadata.flow_id = info.id;
        metadata.flow_name = info.name;
        metadata.remixed_from = info.remixed_from;
        FlowDocument::new(self.store.snapshot(), metadata)
    }

    /// Export the current flow as a shareable [`FlowObject`]
    pub fn export_flow_object(&self) -> FlowObject {
        let info = self.flow_info();
        let id = info
            .id
            .unwrap_or_else(|| format!("flow-{}", uuid::Uuid::new_v4()));
        let name = info.name.unwrap_or_else(|| "Untitled flow".to_string());
        let mut flow = FlowObject::from_snapshot(id, name, &self.store.snapshot());
        flow.remixed_from = info.remixed_from;
        flow
    }

    /// Write the export to `{dir}/flow-{millis}.json`
    pub async fn export_flow_to_file(&self, dir: &Path) -> std::result::Result<PathBuf, FlowError> {
        let document = self.export_flow();
        let contents = serde_json::to_string_pretty(&document)?;

        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(document.file_name());
        tokio::fs::write(&path, contents).await?;

        log::info!("Exported flow with {} nodes to {:?}", document.nodes.len(), path);
        Ok(path)
    }

    // =========================================================================
    // Import
    // =========================================================================

    /// Replace the current flow with a raw definition
    ///
    /// The graph may sit at the top level or under `graph`. Flow
    /// attribution comes from the export metadata and is cleared when
    /// there is none.
    pub fn import_flow(&self, definition: Value) -> std::result::Result<(), FlowError> {
        let parsed = parse_flow_definition(definition)?;
        let info = parsed
            .metadata
            .map(|metadata| FlowInfo {
                id: metadata.flow_id,
                name: metadata.flow_name,
                remixed_from: metadata.remixed_from,
            })
            .unwrap_or_default();
        self.replace_flow(parsed.graph, info);
        Ok(())
    }

    /// Replace the current flow with a remix-attributed flow object
    pub fn import_flow_object(&self, flow: FlowObject) -> std::result::Result<(), FlowError> {
        flow.validate()?;
        let snapshot = flow.to_snapshot();
        self.replace_flow(
            snapshot,
            FlowInfo {
                id: Some(flow.id),
                name: Some(flow.name),
                remixed_from: flow.remixed_from,
            },
        );
        Ok(())
    }

    /// Import JSON text dropped onto the canvas or picked from a file
    ///
    /// Objects with top-level `id` and `name` are treated as flow objects,
    /// anything else as a raw definition. Failures are handed to
    /// `on_error` instead of being returned.
    pub fn import_dropped_payload(&self, text: &str, on_error: impl FnOnce(String)) -> bool {
        let result = serde_json::from_str::<Value>(text)
            .map_err(|e| FlowError::Parse(e.to_string()))
            .and_then(|value| {
                if is_flow_object(&value) {
                    let flow: FlowObject = serde_json::from_value(value)?;
                    self.import_flow_object(flow)
                } else {
                    self.import_flow(value)
                }
            });

        match result {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Rejected dropped flow: {}", e);
                on_error(e.to_string());
                false
            }
        }
    }

    fn replace_flow(&self, snapshot: GraphSnapshot, info: FlowInfo) {
        self.simulation.reset();
        self.store
            .replace_graph(snapshot.nodes, snapshot.edges, snapshot.layouts);

        let flow_id = info.id.clone();
        *self.flow.lock() = info;

        let snapshot = self.store.snapshot();
        log::info!(
            "Imported flow {:?} with {} nodes and {} edges",
            flow_id,
            snapshot.nodes.len(),
            snapshot.edges.len()
        );
        self.bus.publish(GraphEvent::FlowReplaced {
            flow_id,
            node_count: snapshot.nodes.len(),
            edge_count: snapshot.edges.len(),
        });
    }
}

fn is_flow_object(value: &Value) -> bool {
    value.get("id").is_some_and(Value::is_string) && value.get("name").is_some_and(Value::is_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use serde_json::json;

    use crate::backend::{BackendCall, InMemoryBackend};
    use crate::events::{Topic, VecEventSink};
    use crate::layout::{grid_position, Layout};
    use crate::simulation::SimulationStatus;
    use crate::storage::MemoryStorage;
    use crate::types::{NodeDraft, NodeType};

    fn workspace() -> (Workspace, Arc<InMemoryBackend>) {
        let _ = env_logger::builder().is_test(true).try_init();
        let backend = Arc::new(InMemoryBackend::new());
        let config = PortalConfig {
            user_id: Some("dev-1".to_string()),
            active_cortex: Some("support".to_string()),
            ..PortalConfig::default()
        };
        let workspace = Workspace::new(config, backend.clone(), Arc::new(MemoryStorage::new()));
        (workspace, backend)
    }

    #[tokio::test(start_paused = true)]
    async fn test_import_flow_rejects_missing_nodes() {
        let (ws, _) = workspace();
        ws.store().add_node(NodeDraft::new(NodeType::Input));

        assert!(matches!(ws.import_flow(json!({})), Err(FlowError::MissingNodes)));
        assert!(matches!(
            ws.import_flow(json!({"nodes": []})),
            Err(FlowError::MissingNodes)
        ));
        assert_eq!(ws.store().node_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_import_flow_replaces_and_resets() {
        let (ws, backend) = workspace();
        let sink = Arc::new(VecEventSink::new());
        ws.bus().subscribe(&[Topic::Flow], sink.clone());

        ws.store().add_node(NodeDraft::new(NodeType::Input).with_id("old"));
        ws.simulation().run("old");
        tokio::time::sleep(Duration::from_millis(350)).await;

        ws.import_flow(json!({
            "graph": {
                "nodes": [
                    {"id": "a", "type": "input", "name": "Question"},
                    {"id": "b", "type": "model"}
                ],
                "edges": [{"id": "e1", "source": "a", "target": "b"}],
                "layouts": {"a": {"x": 12.0, "y": 34.0}}
            }
        }))
        .unwrap();

        let ids: Vec<String> = ws.store().nodes().into_iter().map(|n| n.id).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(ws.store().layout("b"), Some(grid_position(1)));
        assert_eq!(ws.simulation().state().status, SimulationStatus::Idle);
        assert_eq!(ws.flow_info(), FlowInfo::default());
        assert_eq!(sink.events().len(), 1);

        tokio::time::sleep(Duration::from_millis(900)).await;
        let calls = backend.calls();
        assert!(calls.contains(&BackendCall::SaveEdges(vec!["e1".to_string()])));
        assert!(calls
            .iter()
            .any(|c| matches!(c, BackendCall::SaveLayouts(l) if l.len() == 2)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_import_flow_object_records_attribution() {
        let (ws, _) = workspace();
        let flow: FlowObject = serde_json::from_value(json!({
            "id": "flow-9",
            "name": "Lead scoring",
            "nodes": [{"id": "n1", "type": "data", "position": {"x": 5.0, "y": 5.0}}],
            "remixedFrom": {"id": "flow-1", "name": "Scoring"}
        }))
        .unwrap();
        ws.import_flow_object(flow).unwrap();

        let info = ws.flow_info();
        assert_eq!(info.id.as_deref(), Some("flow-9"));
        assert_eq!(info.remixed_from.unwrap().name, "Scoring");
        assert_eq!(ws.store().layout("n1"), Some(Layout::new(5.0, 5.0)));
        assert_eq!(ws.store().node("n1").unwrap().name, "Data 1");

        let exported = ws.export_flow();
        assert_eq!(exported.metadata.flow_id.as_deref(), Some("flow-9"));
        assert_eq!(exported.metadata.version, "1.0");
        assert_eq!(exported.metadata.user_id.as_deref(), Some("dev-1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_export_import_round_trip() {
        let (ws, _) = workspace();
        let a = ws.store().add_node(NodeDraft::new(NodeType::Input).at(10.0, 10.0));
        let b = ws.store().add_node(NodeDraft::new(NodeType::Output));
        ws.store()
            .add_edge(crate::types::EdgeDraft::new(&a.id, &b.id))
            .unwrap();
        let exported = serde_json::to_value(ws.export_flow()).unwrap();

        let (other, _) = workspace();
        other.import_flow(exported).unwrap();
        assert_eq!(other.store().nodes(), ws.store().nodes());
        assert_eq!(other.store().edges(), ws.store().edges());
        assert_eq!(other.store().layouts(), ws.store().layouts());
    }

    #[tokio::test(start_paused = true)]
    async fn test_export_import_keeps_attribution() {
        let (ws, _) = workspace();
        let flow: FlowObject = serde_json::from_value(json!({
            "id": "flow-9",
            "name": "Scoring v2",
            "nodes": [{"id": "in", "type": "input"}],
            "edges": [],
            "remixedFrom": {"id": "flow-1", "name": "Scoring"}
        }))
        .unwrap();
        ws.import_flow_object(flow).unwrap();
        let exported = serde_json::to_value(ws.export_flow()).unwrap();

        let (other, _) = workspace();
        other.import_flow(exported).unwrap();
        assert_eq!(other.flow_info(), ws.flow_info());
        let info = other.flow_info();
        assert_eq!(info.id.as_deref(), Some("flow-9"));
        assert_eq!(info.name.as_deref(), Some("Scoring v2"));
        assert_eq!(info.remixed_from.map(|r| r.id).as_deref(), Some("flow-1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_export_flow_to_file() {
        let (ws, _) = workspace();
        ws.store().add_node(NodeDraft::new(NodeType::Tool));
        let dir = tempfile::tempdir().unwrap();

        let path = ws.export_flow_to_file(dir.path()).await.unwrap();
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("flow-") && name.ends_with(".json"));

        let contents = std::fs::read_to_string(&path).unwrap();
        let document: FlowDocument = serde_json::from_str(&contents).unwrap();
        assert_eq!(document.nodes.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_payload() {
        let (ws, _) = workspace();
        let mut errors = Vec::new();

        assert!(!ws.import_dropped_payload("not json", |e| errors.push(e)));
        assert!(!ws.import_dropped_payload(r#"{"nodes": []}"#, |e| errors.push(e)));
        assert_eq!(errors.len(), 2);
        assert!(errors[0].contains("parse"));

        assert!(ws.import_dropped_payload(
            r#"{"id": "f", "name": "Dropped", "nodes": [{"id": "x", "type": "agent"}]}"#,
            |e| errors.push(e)
        ));
        assert_eq!(ws.flow_info().name.as_deref(), Some("Dropped"));
        assert_eq!(errors.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_app_mode() {
        let (ws, _) = workspace();
        assert_eq!(ws.app_mode(), AppMode::Normal);
        ws.set_app_mode(AppMode::Remix).unwrap();
        assert_eq!(ws.app_mode(), AppMode::Remix);
    }
}
