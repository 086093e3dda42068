use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Structured record produced when a run reaches a terminal state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,
    pub initial_state: String,
    pub final_state: String,
    /// Every state entered, starting with the initial one.
    pub states: Vec<String>,
    /// Events fed to the state machine, in order.
    pub events: Vec<String>,
    pub tasks_executed: u32,
    pub failures: u32,
    pub retries: u32,
    /// Shared store contents at the end of the run.
    pub artifacts: BTreeMap<String, Value>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: i64,
}

impl RunRecord {
    pub fn begin(initial_state: &str, started_at: DateTime<Utc>) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            initial_state: initial_state.to_string(),
            final_state: initial_state.to_string(),
            states: vec![initial_state.to_string()],
            events: Vec::new(),
            tasks_executed: 0,
            failures: 0,
            retries: 0,
            artifacts: BTreeMap::new(),
            started_at,
            completed_at: started_at,
            duration_ms: 0,
        }
    }

    pub fn record_transition(&mut self, event: &str, next: &str) {
        self.events.push(event.to_string());
        self.states.push(next.to_string());
        self.final_state = next.to_string();
    }

    pub fn finish(&mut self, artifacts: BTreeMap<String, Value>, completed_at: DateTime<Utc>) {
        self.artifacts = artifacts;
        self.completed_at = completed_at;
        self.duration_ms = (completed_at - self.started_at).num_milliseconds();
    }
}
