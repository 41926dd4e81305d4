//! JSON flow interchange
//!
//! Two shapes are understood:
//!
//! - [`FlowDocument`]: the editor's own export, `{nodes, edges, layouts,
//!   metadata}`. On import the graph may also be nested under `graph`.
//! - [`FlowObject`]: the richer shape used for shared and remixed flows,
//!   with per-node `data.config` and optional remix attribution.
//!
//! Both convert into a [`GraphSnapshot`] that the store can take wholesale.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::backend::GraphSnapshot;
use crate::constants::flow::FORMAT_VERSION;
use crate::error::FlowError;
use crate::layout::{grid_position, Layout, LayoutMap};
use crate::settings::{NodeSetting, SettingValue};
use crate::types::{GraphEdge, GraphNode, NodeStatus, NodeType, Port};

/// Provenance of a remixed flow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemixAttribution {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remixed_at: Option<DateTime<Utc>>,
}

/// Metadata written with every export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportMetadata {
    pub exported_at: DateTime<Utc>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub active_cortex: Option<String>,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remixed_from: Option<RemixAttribution>,
}

impl ExportMetadata {
    /// Metadata stamped with the current time and format version
    pub fn now(user_id: Option<String>, active_cortex: Option<String>) -> Self {
        Self {
            exported_at: Utc::now(),
            user_id,
            active_cortex,
            version: FORMAT_VERSION.to_string(),
            flow_id: None,
            flow_name: None,
            remixed_from: None,
        }
    }
}

/// Exported flow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowDocument {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub layouts: LayoutMap,
    pub metadata: ExportMetadata,
}

impl FlowDocument {
    pub fn new(snapshot: GraphSnapshot, metadata: ExportMetadata) -> Self {
        Self {
            nodes: snapshot.nodes,
            edges: snapshot.edges,
            layouts: snapshot.layouts,
            metadata,
        }
    }

    /// File name used when saving an export
    pub fn file_name(&self) -> String {
        format!("flow-{}.json", self.metadata.exported_at.timestamp_millis())
    }
}

/// Graph and export metadata read from a flow definition
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedFlow {
    pub graph: GraphSnapshot,
    pub metadata: Option<ExportMetadata>,
}

/// Parse a flow definition as accepted by `import_flow`
///
/// Accepts `{nodes, edges?, layouts?, metadata?}` either at the top level
/// or with the graph nested under `graph`. Metadata that does not match
/// [`ExportMetadata`] is dropped with a warning.
pub fn parse_flow_definition(value: Value) -> Result<ParsedFlow, FlowError> {
    let mut value = value;
    let mut metadata = value.get_mut("metadata").map(Value::take);
    if let Some(graph) = value.get_mut("graph").filter(|g| g.is_object()) {
        value = graph.take();
    }

    let Value::Object(mut fields) = value else {
        return Err(FlowError::invalid("flow definition must be a JSON object"));
    };
    if metadata.is_none() {
        metadata = fields.remove("metadata");
    }

    let nodes = match fields.remove("nodes") {
        Some(Value::Array(nodes)) if !nodes.is_empty() => nodes,
        Some(Value::Array(_)) | Some(Value::Null) | None => return Err(FlowError::MissingNodes),
        Some(_) => return Err(FlowError::invalid("`nodes` must be an array")),
    };
    let nodes: Vec<GraphNode> = serde_json::from_value(Value::Array(nodes))?;

    let edges: Vec<GraphEdge> = match fields.remove("edges") {
        Some(Value::Null) | None => Vec::new(),
        Some(edges) => serde_json::from_value(edges)?,
    };
    let layouts: LayoutMap = match fields.remove("layouts") {
        Some(Value::Null) | None => LayoutMap::new(),
        Some(layouts) => serde_json::from_value(layouts)?,
    };

    let metadata = match metadata {
        Some(Value::Null) | None => None,
        Some(raw) => match serde_json::from_value::<ExportMetadata>(raw) {
            Ok(metadata) => Some(metadata),
            Err(e) => {
                log::warn!("Ignoring unreadable flow metadata: {}", e);
                None
            }
        },
    };

    Ok(ParsedFlow {
        graph: GraphSnapshot {
            nodes,
            edges,
            layouts,
        },
        metadata,
    })
}

/// Per-node payload of a [`FlowObject`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowNodeData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<NodeStatus>,
    #[serde(default)]
    pub config: Map<String, Value>,
    #[serde(default)]
    pub inputs: Vec<Port>,
    #[serde(default)]
    pub outputs: Vec<Port>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowObjectNode {
    pub id: String,
    /// Free-form type tag; unknown tags import as `transform`
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Layout>,
    #[serde(default)]
    pub data: FlowNodeData,
}

impl FlowObjectNode {
    fn to_graph_node(&self) -> GraphNode {
        let node_type = self.node_type.parse::<NodeType>().unwrap_or_else(|_| {
            log::warn!(
                "Node '{}' has unknown type '{}', importing as transform",
                self.id,
                self.node_type
            );
            NodeType::Transform
        });

        GraphNode {
            id: self.id.clone(),
            name: self.data.label.clone().unwrap_or_default(),
            node_type,
            description: self.data.description.clone().unwrap_or_default(),
            status: self.data.status.unwrap_or_default(),
            settings: self
                .data
                .config
                .iter()
                .map(|(key, value)| NodeSetting::from_config_entry(key, value))
                .collect(),
            inputs: self.data.inputs.clone(),
            outputs: self.data.outputs.clone(),
        }
    }

    fn from_graph_node(node: &GraphNode, position: Option<Layout>) -> Self {
        let config = node
            .settings
            .iter()
            .map(|s| (s.key.clone(), config_value(&s.value)))
            .collect();
        Self {
            id: node.id.clone(),
            node_type: node.node_type.to_string(),
            position,
            data: FlowNodeData {
                label: Some(node.name.clone()),
                description: (!node.description.is_empty()).then(|| node.description.clone()),
                status: Some(node.status),
                config,
                inputs: node.inputs.clone(),
                outputs: node.outputs.clone(),
            },
        }
    }
}

fn config_value(value: &SettingValue) -> Value {
    match value {
        SettingValue::Text(s) => Value::String(s.clone()),
        SettingValue::Number(n) => serde_json::Number::from_f64(*n)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        SettingValue::Boolean(b) => Value::Bool(*b),
        SettingValue::Select { value, .. } => Value::String(value.clone()),
    }
}

/// Shareable flow with remix attribution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowObject {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub nodes: Vec<FlowObjectNode>,
    #[serde(default)]
    pub edges: Vec<GraphEdge>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layouts: Option<LayoutMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remixed_from: Option<RemixAttribution>,
}

impl FlowObject {
    /// Check the fields an import cannot do without
    pub fn validate(&self) -> Result<(), FlowError> {
        if self.id.trim().is_empty() {
            return Err(FlowError::invalid("flow id is required"));
        }
        if self.name.trim().is_empty() {
            return Err(FlowError::invalid("flow name is required"));
        }
        if self.nodes.is_empty() {
            return Err(FlowError::MissingNodes);
        }
        Ok(())
    }

    /// Convert into store shape
    ///
    /// Layouts come from `layouts`, then each node's `position`, then the grid.
    pub fn to_snapshot(&self) -> GraphSnapshot {
        let nodes: Vec<GraphNode> = self.nodes.iter().map(FlowObjectNode::to_graph_node).collect();
        let explicit = self.layouts.as_ref();
        let layouts = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, node)| {
                let layout = explicit
                    .and_then(|l| l.get(&node.id).copied())
                    .or(node.position)
                    .unwrap_or_else(|| grid_position(i));
                (node.id.clone(), layout)
            })
            .collect();

        GraphSnapshot {
            nodes,
            edges: self.edges.clone(),
            layouts,
        }
    }

    /// Build a flow object from the current graph
    pub fn from_snapshot(id: impl Into<String>, name: impl Into<String>, snapshot: &GraphSnapshot) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            nodes: snapshot
                .nodes
                .iter()
                .map(|n| FlowObjectNode::from_graph_node(n, snapshot.layouts.get(&n.id).copied()))
                .collect(),
            edges: snapshot.edges.clone(),
            layouts: Some(snapshot.layouts.clone()),
            remixed_from: None,
        }
    }
}
