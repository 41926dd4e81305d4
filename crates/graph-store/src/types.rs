//! Core types for flow graphs
//!
//! These types define the nodes and edges the editor manipulates, plus the
//! partial "draft" and "update" shapes callers hand to the store.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::layout::Layout;
use crate::settings::NodeSetting;

/// Unique identifier for a node
pub type NodeId = String;

/// Unique identifier for an edge
pub type EdgeId = String;

/// Category of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    /// Entry points (user input, file input, webhooks)
    Input,
    /// Sinks (display, export)
    Output,
    /// Model invocation
    Model,
    /// Data transformation
    Transform,
    /// Data sources and stores
    Data,
    /// Autonomous agents
    Agent,
    /// Tool/function calls
    Tool,
}

impl NodeType {
    pub const ALL: [NodeType; 7] = [
        NodeType::Input,
        NodeType::Output,
        NodeType::Model,
        NodeType::Transform,
        NodeType::Data,
        NodeType::Agent,
        NodeType::Tool,
    ];

    /// Wire tag (`"input"`, `"model"`, ...)
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Input => "input",
            NodeType::Output => "output",
            NodeType::Model => "model",
            NodeType::Transform => "transform",
            NodeType::Data => "data",
            NodeType::Agent => "agent",
            NodeType::Tool => "tool",
        }
    }

    /// Label used for default node names (`"Model"`)
    pub fn display_name(&self) -> &'static str {
        match self {
            NodeType::Input => "Input",
            NodeType::Output => "Output",
            NodeType::Model => "Model",
            NodeType::Transform => "Transform",
            NodeType::Data => "Data",
            NodeType::Agent => "Agent",
            NodeType::Tool => "Tool",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = s.trim().to_ascii_lowercase();
        NodeType::ALL
            .into_iter()
            .find(|t| t.as_str() == tag)
            .ok_or_else(|| format!("unknown node type '{}'", s))
    }
}

/// Lifecycle status shown on a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    #[default]
    Ready,
    Processing,
    Error,
    Disabled,
}

/// An input or output port on a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Port {
    /// Data type carried by the port
    #[serde(rename = "type")]
    pub port_type: String,
    /// Human-readable label, also used as the edge handle
    pub label: String,
    /// Whether a connection is required
    #[serde(default)]
    pub required: bool,
}

impl Port {
    /// Create a required port
    pub fn required(port_type: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            port_type: port_type.into(),
            label: label.into(),
            required: true,
        }
    }

    /// Create an optional port
    pub fn optional(port_type: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            port_type: port_type.into(),
            label: label.into(),
            required: false,
        }
    }
}

/// A node instance in a flow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    /// Unique identifier within the flow
    pub id: NodeId,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Category tag
    #[serde(rename = "type")]
    pub node_type: NodeType,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: NodeStatus,
    #[serde(default)]
    pub settings: Vec<NodeSetting>,
    #[serde(default)]
    pub inputs: Vec<Port>,
    #[serde(default)]
    pub outputs: Vec<Port>,
}

impl GraphNode {
    /// Find a setting by key
    pub fn setting(&self, key: &str) -> Option<&NodeSetting> {
        self.settings.iter().find(|s| s.key == key)
    }
}

/// An edge connecting two nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphEdge {
    /// Unique identifier for this edge
    pub id: EdgeId,
    /// Source node ID
    pub source: NodeId,
    /// Target node ID
    pub target: NodeId,
    /// Output port label on the source node
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    /// Input port label on the target node
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
    /// Display label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl GraphEdge {
    /// Whether this edge connects exactly the given endpoints and handles
    ///
    /// Exact tuple match: a reversed pair is a different edge.
    pub fn connects(
        &self,
        source: &str,
        target: &str,
        source_handle: Option<&str>,
        target_handle: Option<&str>,
    ) -> bool {
        self.source == source
            && self.target == target
            && self.source_handle.as_deref() == source_handle
            && self.target_handle.as_deref() == target_handle
    }

    /// Whether either end of this edge is the given node
    pub fn touches(&self, node_id: &str) -> bool {
        self.source == node_id || self.target == node_id
    }
}

/// Partial node handed to [`GraphStore::add_node`](crate::GraphStore::add_node)
///
/// Missing fields are filled with defaults by the store.
#[derive(Debug, Clone, Default)]
pub struct NodeDraft {
    pub id: Option<NodeId>,
    pub name: Option<String>,
    pub node_type: Option<NodeType>,
    pub description: Option<String>,
    pub status: Option<NodeStatus>,
    pub settings: Vec<NodeSetting>,
    pub inputs: Vec<Port>,
    pub outputs: Vec<Port>,
    /// Explicit position; the grid is used when absent
    pub layout: Option<Layout>,
}

impl NodeDraft {
    /// Start a draft for the given node type
    pub fn new(node_type: NodeType) -> Self {
        Self {
            node_type: Some(node_type),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_setting(mut self, setting: NodeSetting) -> Self {
        self.settings.push(setting);
        self
    }

    pub fn with_input(mut self, port: Port) -> Self {
        self.inputs.push(port);
        self
    }

    pub fn with_output(mut self, port: Port) -> Self {
        self.outputs.push(port);
        self
    }

    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.layout = Some(Layout::new(x, y));
        self
    }
}

/// Changes applied by [`GraphStore::update_node`](crate::GraphStore::update_node)
///
/// List fields replace the node's list wholesale.
#[derive(Debug, Clone, Default)]
pub struct NodeUpdate {
    pub name: Option<String>,
    pub node_type: Option<NodeType>,
    pub description: Option<String>,
    pub status: Option<NodeStatus>,
    pub settings: Option<Vec<NodeSetting>>,
    pub inputs: Option<Vec<Port>>,
    pub outputs: Option<Vec<Port>>,
}

impl NodeUpdate {
    /// Apply these updates to a node in place
    pub fn apply_to(self, node: &mut GraphNode) {
        if let Some(name) = self.name {
            node.name = name;
        }
        if let Some(node_type) = self.node_type {
            node.node_type = node_type;
        }
        if let Some(description) = self.description {
            node.description = description;
        }
        if let Some(status) = self.status {
            node.status = status;
        }
        if let Some(settings) = self.settings {
            node.settings = settings;
        }
        if let Some(inputs) = self.inputs {
            node.inputs = inputs;
        }
        if let Some(outputs) = self.outputs {
            node.outputs = outputs;
        }
    }
}

/// Partial edge handed to [`GraphStore::add_edge`](crate::GraphStore::add_edge)
#[derive(Debug, Clone, Default)]
pub struct EdgeDraft {
    pub id: Option<EdgeId>,
    pub source: String,
    pub target: String,
    pub source_handle: Option<String>,
    pub target_handle: Option<String>,
    pub label: Option<String>,
}

impl EdgeDraft {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            ..Self::default()
        }
    }

    pub fn with_handles(mut self, source_handle: impl Into<String>, target_handle: impl Into<String>) -> Self {
        self.source_handle = Some(source_handle.into());
        self.target_handle = Some(target_handle.into());
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Changes applied by [`GraphStore::update_edge`](crate::GraphStore::update_edge)
#[derive(Debug, Clone, Default)]
pub struct EdgeUpdate {
    pub source_handle: Option<Option<String>>,
    pub target_handle: Option<Option<String>>,
    pub label: Option<Option<String>>,
}

impl EdgeUpdate {
    pub fn apply_to(self, edge: &mut GraphEdge) {
        if let Some(source_handle) = self.source_handle {
            edge.source_handle = source_handle;
        }
        if let Some(target_handle) = self.target_handle {
            edge.target_handle = target_handle;
        }
        if let Some(label) = self.label {
            edge.label = label;
        }
    }
}
