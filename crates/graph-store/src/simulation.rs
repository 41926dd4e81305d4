//! Timer-driven mock simulation of a single node
//!
//! The runner does not execute anything. It walks a progress counter from
//! 0 to 100 on a fixed tick and then reports a canned result, which is
//! enough for the editor to exercise its run/status UI.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::task::JoinHandle;

use crate::config::SimulationConfig;
use crate::events::{EventBus, GraphEvent};
use crate::types::NodeId;

/// Lifecycle of a simulation run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimulationStatus {
    #[default]
    Idle,
    Running,
    Completed,
    /// Reserved for real executors; the mock runner never fails
    Error,
    Paused,
}

/// Snapshot of the simulation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationState {
    pub status: SimulationStatus,
    /// Percent complete, 0..=100
    pub progress: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SimulationState {
    pub fn is_running(&self) -> bool {
        self.status == SimulationStatus::Running
    }
}

struct RunnerInner {
    state: Mutex<SimulationState>,
    ticker: Mutex<Option<JoinHandle<()>>>,
    bus: Arc<EventBus>,
    config: SimulationConfig,
}

impl RunnerInner {
    fn stop_ticker(&self) {
        if let Some(handle) = self.ticker.lock().take() {
            handle.abort();
        }
    }

    fn publish(&self, state: SimulationState) {
        self.bus.publish(GraphEvent::SimulationChanged { state });
    }
}

/// Mock runner for one node at a time
#[derive(Clone)]
pub struct SimulationRunner {
    inner: Arc<RunnerInner>,
}

impl SimulationRunner {
    pub fn new(bus: Arc<EventBus>, config: SimulationConfig) -> Self {
        Self {
            inner: Arc::new(RunnerInner {
                state: Mutex::new(SimulationState::default()),
                ticker: Mutex::new(None),
                bus,
                config,
            }),
        }
    }

    pub fn state(&self) -> SimulationState {
        self.inner.state.lock().clone()
    }

    /// Start a run for `node_id`
    ///
    /// Any previous run is discarded, including one for the same node.
    /// Must be called from within a tokio runtime.
    pub fn run(&self, node_id: &str) -> SimulationState {
        let tracked = self.inner.state.lock().node_id.clone();
        if tracked.as_deref().is_some_and(|id| id != node_id) {
            self.reset();
        }
        self.inner.stop_ticker();

        let run_id = uuid::Uuid::new_v4().to_string();
        let state = SimulationState {
            status: SimulationStatus::Running,
            progress: 0,
            node_id: Some(node_id.to_string()),
            run_id: Some(run_id.clone()),
            result: None,
            error: None,
        };
        *self.inner.state.lock() = state.clone();

        log::debug!("Simulation {} started for node '{}'", run_id, node_id);
        self.inner.publish(state.clone());
        self.start_ticker(run_id);
        state
    }

    /// Stop any run and return to idle
    pub fn reset(&self) {
        self.inner.stop_ticker();
        let state = SimulationState::default();
        *self.inner.state.lock() = state.clone();
        self.inner.publish(state);
    }

    /// Freeze a running simulation. Returns false if nothing was running.
    pub fn pause(&self) -> bool {
        let state = {
            let mut state = self.inner.state.lock();
            if state.status != SimulationStatus::Running {
                return false;
            }
            state.status = SimulationStatus::Paused;
            state.clone()
        };
        self.inner.stop_ticker();
        self.inner.publish(state);
        true
    }

    /// Continue a paused simulation from its current progress
    pub fn resume(&self) -> bool {
        let (state, run_id) = {
            let mut state = self.inner.state.lock();
            if state.status != SimulationStatus::Paused {
                return false;
            }
            let Some(run_id) = state.run_id.clone() else {
                return false;
            };
            state.status = SimulationStatus::Running;
            (state.clone(), run_id)
        };
        self.inner.publish(state);
        self.start_ticker(run_id);
        true
    }

    fn start_ticker(&self, run_id: String) {
        let weak = Arc::downgrade(&self.inner);
        let tick = Duration::from_millis(self.inner.config.tick_ms);
        let step = self.inner.config.step.max(1);

        let handle = tokio::spawn(async move {
            loop {
                tokio::time::sleep(tick).await;
                let Some(inner) = weak.upgrade() else { return };

                let state = {
                    let mut state = inner.state.lock();
                    if state.run_id.as_deref() != Some(run_id.as_str()) || !state.is_running() {
                        return;
                    }
                    state.progress = state.progress.saturating_add(step).min(100);
                    if state.progress == 100 {
                        state.status = SimulationStatus::Completed;
                        state.result = Some(mock_result(state.node_id.as_deref(), &run_id));
                    }
                    state.clone()
                };

                let done = state.status == SimulationStatus::Completed;
                inner.publish(state);
                if done {
                    log::debug!("Simulation {} completed", run_id);
                    return;
                }
            }
        });

        *self.inner.ticker.lock() = Some(handle);
    }
}

impl Drop for RunnerInner {
    fn drop(&mut self) {
        if let Some(handle) = self.ticker.get_mut().take() {
            handle.abort();
        }
    }
}

fn mock_result(node_id: Option<&str>, run_id: &str) -> Value {
    serde_json::json!({
        "nodeId": node_id,
        "runId": run_id,
        "output": "Simulation completed successfully",
        "metrics": {
            "tokens": 128,
            "latencyMs": 42
        },
        "completedAt": chrono::Utc::now().to_rfc3339(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{Topic, VecEventSink};

    fn runner() -> (SimulationRunner, Arc<VecEventSink>) {
        let bus = Arc::new(EventBus::new());
        let sink = Arc::new(VecEventSink::new());
        bus.subscribe(&[Topic::Simulation], sink.clone());
        (SimulationRunner::new(bus, SimulationConfig::default()), sink)
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_completes() {
        let (runner, sink) = runner();
        runner.run("model-1");
        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(runner.state().progress, 10);

        tokio::time::sleep(Duration::from_secs(3)).await;
        let state = runner.state();
        assert_eq!(state.status, SimulationStatus::Completed);
        assert_eq!(state.progress, 100);
        assert_eq!(state.result.as_ref().unwrap()["nodeId"], "model-1");
        assert!(state.error.is_none());

        // start + 10 ticks
        assert_eq!(sink.events().len(), 11);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_other_node_discards_previous() {
        let (runner, _) = runner();
        let first = runner.run("A");
        tokio::time::sleep(Duration::from_millis(700)).await;
        assert_eq!(runner.state().progress, 20);

        runner.run("B");
        let state = runner.state();
        assert_eq!(state.status, SimulationStatus::Running);
        assert_eq!(state.node_id.as_deref(), Some("B"));
        assert_eq!(state.progress, 0);
        assert_ne!(state.run_id, first.run_id);

        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(runner.state().progress, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_same_node_restarts() {
        let (runner, _) = runner();
        runner.run("A");
        tokio::time::sleep(Duration::from_millis(950)).await;
        runner.run("A");
        assert_eq!(runner.state().progress, 0);
        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(runner.state().progress, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_and_resume() {
        let (runner, _) = runner();
        runner.run("A");
        tokio::time::sleep(Duration::from_millis(650)).await;
        assert!(runner.pause());
        assert!(!runner.pause());

        tokio::time::sleep(Duration::from_secs(2)).await;
        let paused = runner.state();
        assert_eq!(paused.status, SimulationStatus::Paused);
        assert_eq!(paused.progress, 20);

        assert!(runner.resume());
        assert!(!runner.resume());
        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(runner.state().progress, 30);
        assert!(runner.state().is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_stops_ticker() {
        let (runner, sink) = runner();
        runner.run("A");
        runner.reset();
        assert_eq!(runner.state(), SimulationState::default());

        sink.clear();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_state_wire_format() {
        let state = SimulationState {
            status: SimulationStatus::Running,
            progress: 40,
            node_id: Some("n1".to_string()),
            ..SimulationState::default()
        };
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"status": "running", "progress": 40, "nodeId": "n1"})
        );
    }
}
