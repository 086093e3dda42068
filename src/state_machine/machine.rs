use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use super::condition::Condition;
use super::definition::StateMachineDefinition;
use crate::error::RuntimeError;

/// Event names produced by the built-in pipeline stages.
pub mod events {
    pub const START: &str = "START";
    pub const SUCCESS: &str = "SUCCESS";
    pub const FAILURE: &str = "FAILURE";
    pub const PASS: &str = "PASS";
    pub const RETRY: &str = "RETRY";
    pub const FAIL: &str = "FAIL";
    pub const HALT: &str = "HALT";
}

/// A cursor over a [`StateMachineDefinition`].
///
/// Transitions are keyed purely by event name. Guards attached to a
/// `(state, event)` pair are only consulted by
/// [`transition_with_context`](Self::transition_with_context).
pub struct StateMachine {
    definition: StateMachineDefinition,
    current: String,
    guards: HashMap<(String, String), Arc<dyn Condition>>,
}

impl StateMachine {
    /// Build a machine positioned at the definition's initial state.
    ///
    /// The definition is not validated here; see
    /// [`StateMachineDefinition::validate`].
    pub fn new(definition: StateMachineDefinition) -> Self {
        let guards = definition
            .states
            .iter()
            .flat_map(|(state, def)| {
                def.guards
                    .iter()
                    .map(move |(event, spec)| ((state.clone(), event.clone()), spec.build()))
            })
            .collect();
        let current = definition.initial.clone();
        Self {
            definition,
            current,
            guards,
        }
    }

    /// Attach (or replace) the guard for `event` out of `state`.
    pub fn with_guard(
        mut self,
        state: impl Into<String>,
        event: impl Into<String>,
        condition: Arc<dyn Condition>,
    ) -> Self {
        self.guards.insert((state.into(), event.into()), condition);
        self
    }

    pub fn definition(&self) -> &StateMachineDefinition {
        &self.definition
    }

    pub fn current_state(&self) -> &str {
        &self.current
    }

    /// Move the cursor along `event`, returning the new state.
    pub fn transition(&mut self, event: &str) -> Result<&str, RuntimeError> {
        let next = self.resolve(event)?.to_string();
        self.current = next;
        Ok(self.current.as_str())
    }

    /// Like [`transition`](Self::transition), but a guard registered for the
    /// pair must also accept `context`. A rejected guard leaves the cursor
    /// where it was.
    pub fn transition_with_context(
        &mut self,
        event: &str,
        context: &Value,
    ) -> Result<&str, RuntimeError> {
        let next = self.resolve(event)?.to_string();
        if let Some(guard) = self.guards.get(&(self.current.clone(), event.to_string()))
            && !guard.evaluate(context)
        {
            return Err(RuntimeError::GuardRejected {
                state: self.current.clone(),
                event: event.to_string(),
            });
        }
        self.current = next;
        Ok(self.current.as_str())
    }

    /// Whether the cursor names a terminal state. An unknown state is not
    /// final.
    pub fn is_final(&self) -> bool {
        self.definition
            .get(&self.current)
            .is_some_and(|state| state.is_terminal())
    }

    pub fn reset(&mut self) {
        self.current = self.definition.initial.clone();
    }

    fn resolve(&self, event: &str) -> Result<&str, RuntimeError> {
        let state = self
            .definition
            .get(&self.current)
            .ok_or_else(|| RuntimeError::InvalidState(self.current.clone()))?;

        if state.is_terminal() {
            return Err(RuntimeError::TerminalTransition(self.current.clone()));
        }

        state
            .target(event)
            .ok_or_else(|| RuntimeError::UndefinedTransition {
                state: self.current.clone(),
                event: event.to_string(),
            })
    }
}

impl std::fmt::Debug for StateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateMachine")
            .field("current", &self.current)
            .field("initial", &self.definition.initial)
            .field("guards", &self.guards.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::condition::{Comparison, ThresholdCondition};
    use serde_json::json;

    fn make_machine() -> StateMachine {
        StateMachine::new(
            StateMachineDefinition::new("generating")
                .with_state(
                    "generating",
                    &[("SUCCESS", "evaluating"), ("FAILURE", "halt")],
                )
                .with_state(
                    "evaluating",
                    &[("PASS", "halt"), ("RETRY", "generating"), ("FAIL", "halt")],
                )
                .with_final("halt"),
        )
    }

    #[test]
    fn happy_path_walks_to_final() {
        let mut sm = make_machine();
        assert_eq!(sm.current_state(), "generating");
        assert!(!sm.is_final());

        assert_eq!(sm.transition("SUCCESS").unwrap(), "evaluating");
        assert_eq!(sm.transition("PASS").unwrap(), "halt");
        assert!(sm.is_final());
    }

    #[test]
    fn every_event_from_final_state_fails() {
        let mut sm = make_machine();
        sm.transition("FAILURE").unwrap();
        assert!(sm.is_final());

        for event in ["SUCCESS", "FAILURE", "HALT", "START", "whatever"] {
            let err = sm.transition(event).unwrap_err();
            assert!(
                matches!(err, RuntimeError::TerminalTransition(ref s) if s == "halt"),
                "{err}"
            );
        }
        assert_eq!(sm.current_state(), "halt");
    }

    #[test]
    fn undefined_event_fails_and_keeps_cursor() {
        let mut sm = make_machine();
        let err = sm.transition("PASS").unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::UndefinedTransition { ref state, ref event }
                if state == "generating" && event == "PASS"
        ));
        assert_eq!(sm.current_state(), "generating");
    }

    #[test]
    fn unknown_current_state_is_invalid() {
        let mut sm = StateMachine::new(
            StateMachineDefinition::new("ghost").with_final("halt"),
        );
        assert!(!sm.is_final());
        let err = sm.transition("SUCCESS").unwrap_err();
        assert!(matches!(err, RuntimeError::InvalidState(ref s) if s == "ghost"));
    }

    #[test]
    fn reset_returns_to_initial_from_anywhere() {
        let mut sm = make_machine();
        sm.reset();
        assert_eq!(sm.current_state(), "generating");

        sm.transition("SUCCESS").unwrap();
        sm.transition("RETRY").unwrap();
        sm.transition("SUCCESS").unwrap();
        sm.reset();
        assert_eq!(sm.current_state(), "generating");

        sm.transition("FAILURE").unwrap();
        assert!(sm.is_final());
        sm.reset();
        assert_eq!(sm.current_state(), "generating");
        assert!(!sm.is_final());
    }

    #[test]
    fn plain_transition_ignores_guards() {
        let mut sm = make_machine().with_guard(
            "generating",
            "SUCCESS",
            Arc::new(ThresholdCondition::new("score", Comparison::Ge, 0.8)),
        );
        assert_eq!(sm.transition("SUCCESS").unwrap(), "evaluating");
    }

    #[test]
    fn guard_gates_context_transition() {
        let mut sm = make_machine().with_guard(
            "generating",
            "SUCCESS",
            Arc::new(ThresholdCondition::new("score", Comparison::Ge, 0.8)),
        );

        let err = sm
            .transition_with_context("SUCCESS", &json!({"score": 0.3}))
            .unwrap_err();
        assert!(matches!(err, RuntimeError::GuardRejected { .. }));
        assert_eq!(sm.current_state(), "generating");

        let next = sm
            .transition_with_context("SUCCESS", &json!({"score": 0.9}))
            .unwrap();
        assert_eq!(next, "evaluating");
    }

    #[test]
    fn unguarded_context_transition_behaves_like_plain() {
        let mut sm = make_machine();
        assert_eq!(
            sm.transition_with_context("SUCCESS", &Value::Null).unwrap(),
            "evaluating"
        );
        assert!(matches!(
            sm.transition_with_context("SUCCESS", &Value::Null),
            Err(RuntimeError::UndefinedTransition { .. })
        ));
    }

    #[test]
    fn guards_from_definition_are_compiled() {
        let def: StateMachineDefinition = serde_json::from_value(json!({
            "initial": "evaluating",
            "states": {
                "evaluating": {
                    "on": { "PASS": "done" },
                    "guards": {
                        "PASS": { "kind": "property", "property": "result", "equals": "pass" }
                    }
                },
                "done": { "type": "final" }
            }
        }))
        .unwrap();
        let mut sm = StateMachine::new(def);
        assert!(
            sm.transition_with_context("PASS", &json!({"result": "retry"}))
                .is_err()
        );
        assert_eq!(
            sm.transition_with_context("PASS", &json!({"result": "pass"}))
                .unwrap(),
            "done"
        );
    }
}
