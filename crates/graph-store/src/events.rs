//! Typed change events and the bus that routes them
//!
//! Stores publish [`GraphEvent`]s on an [`EventBus`]; consumers subscribe to
//! the [`Topic`]s they care about through an [`EventSink`]. Flow is one
//! directional: a consumer reacting to an event must not republish it, and
//! nothing in this crate subscribes to its own topics.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::simulation::SimulationState;

/// Trait for receiving graph events
///
/// This abstracts over the transport mechanism (UI channel, mpsc, test
/// collector, ...).
pub trait EventSink: Send + Sync {
    /// Deliver an event
    ///
    /// Returns an error if the event could not be delivered (e.g., channel closed)
    fn send(&self, event: GraphEvent) -> Result<(), EventError>;
}

/// Error when delivering events fails
#[derive(Debug, Clone, thiserror::Error)]
#[error("Event error: {message}")]
pub struct EventError {
    pub message: String,
}

impl EventError {
    pub fn channel_closed() -> Self {
        Self {
            message: "Channel closed".to_string(),
        }
    }
}

/// Routing key for subscriptions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    /// Node and edge changes
    Graph,
    /// Position changes
    Layout,
    /// Simulation state transitions
    Simulation,
    /// Whole-flow replacement
    Flow,
    /// Swallowed persistence failures
    Persistence,
}

/// Events published by the stores
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum GraphEvent {
    #[serde(rename_all = "camelCase")]
    NodeAdded { node_id: String },

    #[serde(rename_all = "camelCase")]
    NodeUpdated { node_id: String },

    #[serde(rename_all = "camelCase")]
    NodeRemoved { node_id: String },

    /// The backend assigned a different id to an optimistically created node
    #[serde(rename_all = "camelCase")]
    NodeIdReassigned { old_id: String, new_id: String },

    #[serde(rename_all = "camelCase")]
    EdgeAdded { edge_id: String },

    #[serde(rename_all = "camelCase")]
    EdgeUpdated { edge_id: String },

    #[serde(rename_all = "camelCase")]
    EdgeRemoved { edge_id: String },

    #[serde(rename_all = "camelCase")]
    LayoutChanged { node_ids: Vec<String> },

    #[serde(rename_all = "camelCase")]
    SimulationChanged { state: SimulationState },

    /// Nodes, edges and layouts were replaced wholesale
    #[serde(rename_all = "camelCase")]
    FlowReplaced {
        flow_id: Option<String>,
        node_count: usize,
        edge_count: usize,
    },

    /// A best-effort write failed; local state was kept
    #[serde(rename_all = "camelCase")]
    PersistFailed { operation: String, error: String },
}

impl GraphEvent {
    /// The topic this event is routed on
    pub fn topic(&self) -> Topic {
        match self {
            GraphEvent::NodeAdded { .. }
            | GraphEvent::NodeUpdated { .. }
            | GraphEvent::NodeRemoved { .. }
            | GraphEvent::NodeIdReassigned { .. }
            | GraphEvent::EdgeAdded { .. }
            | GraphEvent::EdgeUpdated { .. }
            | GraphEvent::EdgeRemoved { .. } => Topic::Graph,
            GraphEvent::LayoutChanged { .. } => Topic::Layout,
            GraphEvent::SimulationChanged { .. } => Topic::Simulation,
            GraphEvent::FlowReplaced { .. } => Topic::Flow,
            GraphEvent::PersistFailed { .. } => Topic::Persistence,
        }
    }

    pub fn persist_failed(operation: impl Into<String>, error: impl ToString) -> Self {
        Self::PersistFailed {
            operation: operation.into(),
            error: error.to_string(),
        }
    }
}

/// Handle returned by [`EventBus::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscription {
    id: SubscriptionId,
    topics: Vec<Topic>,
    sink: Arc<dyn EventSink>,
}

/// Fan-out of events to topic subscribers
#[derive(Default)]
pub struct EventBus {
    subscriptions: RwLock<Vec<Subscription>>,
    next_id: std::sync::atomic::AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe a sink to a set of topics
    ///
    /// An empty topic list subscribes to everything.
    pub fn subscribe(&self, topics: &[Topic], sink: Arc<dyn EventSink>) -> SubscriptionId {
        let id = SubscriptionId(
            self.next_id
                .fetch_add(1, std::sync::atomic::Ordering::Relaxed),
        );
        self.subscriptions.write().push(Subscription {
            id,
            topics: topics.to_vec(),
            sink,
        });
        id
    }

    /// Remove a subscription. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subs = self.subscriptions.write();
        let before = subs.len();
        subs.retain(|s| s.id != id);
        subs.len() != before
    }

    /// Deliver an event to every interested subscriber
    ///
    /// Delivery failures are logged; they never reach the publisher.
    pub fn publish(&self, event: GraphEvent) {
        let topic = event.topic();
        let targets: Vec<Arc<dyn EventSink>> = self
            .subscriptions
            .read()
            .iter()
            .filter(|s| s.topics.is_empty() || s.topics.contains(&topic))
            .map(|s| s.sink.clone())
            .collect();

        for sink in targets {
            if let Err(e) = sink.send(event.clone()) {
                log::warn!("Dropping {:?} event for a subscriber: {}", topic, e);
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscriptions.read().len()
    }
}

/// A no-op event sink that discards all events
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn send(&self, _event: GraphEvent) -> Result<(), EventError> {
        Ok(())
    }
}

/// A vector-based event sink that collects events
///
/// Useful for testing to verify events were emitted correctly.
#[derive(Default)]
pub struct VecEventSink {
    events: parking_lot::Mutex<Vec<GraphEvent>>,
}

impl VecEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all collected events
    pub fn events(&self) -> Vec<GraphEvent> {
        self.events.lock().clone()
    }

    /// Clear all collected events
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl EventSink for VecEventSink {
    fn send(&self, event: GraphEvent) -> Result<(), EventError> {
        self.events.lock().push(event);
        Ok(())
    }
}

/// Forwards events into a tokio unbounded channel
pub struct ChannelEventSink {
    tx: tokio::sync::mpsc::UnboundedSender<GraphEvent>,
}

impl ChannelEventSink {
    pub fn new(tx: tokio::sync::mpsc::UnboundedSender<GraphEvent>) -> Self {
        Self { tx }
    }
}

impl EventSink for ChannelEventSink {
    fn send(&self, event: GraphEvent) -> Result<(), EventError> {
        self.tx.send(event).map_err(|_| EventError::channel_closed())
    }
}
