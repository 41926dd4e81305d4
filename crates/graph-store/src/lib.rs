//! Graph Store - Optimistic node-graph state for the Developer Portal
//!
//! This crate holds the in-memory model behind the node-graph editor and
//! keeps it mirrored to the portal's REST backend. It provides:
//!
//! - Node, edge and layout collections with optimistic mutation
//! - Keyed, replace-on-reschedule debounced persistence
//! - A typed event bus so independent consumers can follow changes
//! - A timer-driven mock simulation runner
//! - JSON flow import/export, including remix-attributed flows
//!
//! # Architecture
//!
//! ```text
//! caller ──► Workspace ──► GraphStore ──► PersistScheduler ──► GraphBackend
//!               │              │                                  (HTTP)
//!               │              └──► LocalStorage (layout cache)
//!               └──► SimulationRunner
//!                        all publish on ──► EventBus
//! ```
//!
//! Network failures never reach the caller: they are logged, published as
//! [`GraphEvent::PersistFailed`] and the optimistic copy stays authoritative.

pub mod backend;
pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod flow;
pub mod layout;
pub mod scheduler;
pub mod settings;
pub mod simulation;
pub mod storage;
pub mod store;
pub mod types;
pub mod workspace;

// Re-export key types
pub use backend::{BackendError, GraphBackend, GraphSnapshot, HttpGraphBackend, InMemoryBackend};
pub use config::PortalConfig;
pub use error::{FlowError, GraphStoreError, Result};
pub use events::{EventBus, EventSink, GraphEvent, Topic, VecEventSink};
pub use flow::{FlowDocument, FlowObject, ParsedFlow};
pub use layout::{grid_position, Layout, LayoutMap, LayoutPatch};
pub use scheduler::PersistScheduler;
pub use settings::{NodeSetting, SettingValue};
pub use simulation::{SimulationRunner, SimulationState, SimulationStatus};
pub use storage::{AppMode, FileStorage, LocalStorage, MemoryStorage};
pub use store::GraphStore;
pub use types::{EdgeDraft, EdgeUpdate, GraphEdge, GraphNode, NodeDraft, NodeStatus, NodeType, NodeUpdate, Port};
pub use workspace::{FlowInfo, Workspace};
