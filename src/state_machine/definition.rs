use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};

use super::condition::GuardSpec;
use crate::error::RuntimeError;

/// Marks a state as terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateKind {
    Final,
}

/// One state of the pipeline graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateDefinition {
    /// Event name → next state.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub on: BTreeMap<String, String>,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<StateKind>,

    /// Optional guard per event, consulted only by context-aware transitions.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub guards: BTreeMap<String, GuardSpec>,
}

impl StateDefinition {
    pub fn is_terminal(&self) -> bool {
        self.kind == Some(StateKind::Final)
    }

    pub fn target(&self, event: &str) -> Option<&str> {
        self.on.get(event).map(String::as_str)
    }
}

/// The immutable state graph, loaded once per runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateMachineDefinition {
    pub initial: String,
    pub states: BTreeMap<String, StateDefinition>,
}

impl StateMachineDefinition {
    pub fn new(initial: impl Into<String>) -> Self {
        Self {
            initial: initial.into(),
            states: BTreeMap::new(),
        }
    }

    /// Adds a non-terminal state with the given `(event, target)` pairs.
    pub fn with_state(mut self, name: &str, transitions: &[(&str, &str)]) -> Self {
        let on = transitions
            .iter()
            .map(|(event, target)| (event.to_string(), target.to_string()))
            .collect();
        self.states.insert(
            name.to_string(),
            StateDefinition {
                on,
                ..Default::default()
            },
        );
        self
    }

    /// Adds a terminal state.
    pub fn with_final(mut self, name: &str) -> Self {
        self.states.insert(
            name.to_string(),
            StateDefinition {
                kind: Some(StateKind::Final),
                ..Default::default()
            },
        );
        self
    }

    pub fn get(&self, name: &str) -> Option<&StateDefinition> {
        self.states.get(name)
    }

    /// States reachable from `initial` by following declared transitions.
    pub fn reachable_states(&self) -> BTreeSet<&str> {
        let mut seen = BTreeSet::new();
        let mut queue = VecDeque::from([self.initial.as_str()]);
        while let Some(name) = queue.pop_front() {
            if !seen.insert(name) {
                continue;
            }
            if let Some(state) = self.states.get(name) {
                queue.extend(state.on.values().map(String::as_str));
            }
        }
        seen
    }

    /// Checks the graph for wiring mistakes, reporting all of them at once.
    pub fn validate(&self) -> Result<(), RuntimeError> {
        let mut problems = Vec::new();

        if !self.states.contains_key(&self.initial) {
            problems.push(format!("initial state `{}` is not defined", self.initial));
        }

        for (name, state) in &self.states {
            if state.is_terminal() && !state.on.is_empty() {
                problems.push(format!("final state `{name}` declares transitions"));
            }
            for (event, target) in &state.on {
                if !self.states.contains_key(target) {
                    problems.push(format!(
                        "state `{name}` maps {event} to undefined state `{target}`"
                    ));
                }
            }
            for event in state.guards.keys() {
                if !state.on.contains_key(event) {
                    problems.push(format!(
                        "state `{name}` guards {event} which has no transition"
                    ));
                }
            }
        }

        for name in self.reachable_states() {
            if let Some(state) = self.states.get(name)
                && !state.is_terminal()
                && state.on.is_empty()
            {
                problems.push(format!("state `{name}` is neither final nor has transitions"));
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(RuntimeError::Config(format!(
                "invalid state machine: {}",
                problems.join("; ")
            )))
        }
    }
}
