use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};

use super::record::RunRecord;
use super::stage::{PipelineSettings, StageContext, StageTable};
use crate::config::RuntimeConfig;
use crate::error::RuntimeError;
use crate::infra::{
    Clock, FixedProbe, InMemoryStore, Logger, ResourceProbe, Store, SystemClock, TracingLogger,
};
use crate::state_machine::{StateMachine, events};
use crate::task::handlers::builtin_handlers;
use crate::task::{TaskHandler, TaskRouter, TaskValidator};
use crate::threshold::ThresholdEvaluator;

/// Drives a [`StateMachine`] to a terminal state, running the stage bound to
/// each state it visits.
pub struct Runtime {
    machine: StateMachine,
    router: TaskRouter,
    evaluator: ThresholdEvaluator,
    stages: StageTable,
    settings: PipelineSettings,
    logger: Arc<dyn Logger>,
    clock: Arc<dyn Clock>,
    probe: Arc<dyn ResourceProbe>,
    store: InMemoryStore<Value>,
    retry_count: u32,
    consecutive_failures: u32,
}

/// Collaborators and overrides for a [`Runtime`].
///
/// Defaults: tracing logger, system clock, a resource reading of 0 MB, the
/// built-in pipeline stages and the built-in stub handlers.
pub struct RuntimeBuilder {
    config: RuntimeConfig,
    logger: Arc<dyn Logger>,
    clock: Arc<dyn Clock>,
    probe: Arc<dyn ResourceProbe>,
    stages: StageTable,
    settings: PipelineSettings,
    score: f64,
    builtins: bool,
    handlers: Vec<(String, Arc<dyn TaskHandler>)>,
}

impl RuntimeBuilder {
    pub fn logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn probe(mut self, probe: Arc<dyn ResourceProbe>) -> Self {
        self.probe = probe;
        self
    }

    /// Replace the whole stage table.
    pub fn stages(mut self, stages: StageTable) -> Self {
        self.stages = stages;
        self
    }

    /// Add or replace a single stage.
    pub fn stage(mut self, state: impl Into<String>, stage: super::StageDescriptor) -> Self {
        self.stages.register(state, stage);
        self
    }

    pub fn settings(mut self, settings: PipelineSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Score reported by the built-in `evaluate` handler.
    pub fn score(mut self, score: f64) -> Self {
        self.score = score;
        self
    }

    /// Register `handler` for `task`, replacing any built-in.
    pub fn handler(mut self, task: impl Into<String>, handler: Arc<dyn TaskHandler>) -> Self {
        self.handlers.push((task.into(), handler));
        self
    }

    pub fn without_builtin_handlers(mut self) -> Self {
        self.builtins = false;
        self
    }

    /// Validate the configuration and wire everything together.
    ///
    /// Every stage bound to a non-terminal state of the definition must name
    /// a task that the grammar declares and that has a handler.
    pub fn build(self) -> Result<Runtime, RuntimeError> {
        self.config.validate()?;
        let RuntimeConfig {
            state_machine,
            grammar,
            thresholds,
        } = self.config;

        let evaluator = ThresholdEvaluator::new(thresholds);
        let validator = TaskValidator::new(Arc::new(grammar));
        let mut router = TaskRouter::new(validator, self.logger.clone())
            .with_timeout(evaluator.task_timeout());

        if self.builtins {
            for (name, handler) in builtin_handlers(self.clock.clone(), evaluator.clone(), self.score) {
                router.register(name, handler);
            }
        }
        for (name, handler) in self.handlers {
            router.register(name, handler);
        }

        let mut bound: Vec<_> = self
            .stages
            .iter()
            .filter(|(state, _)| {
                state_machine
                    .get(state)
                    .is_some_and(|def| !def.is_terminal())
            })
            .collect();
        bound.sort_by_key(|(state, _)| *state);
        for (_, stage) in bound {
            if !router.validator().grammar().has_task(&stage.task) {
                return Err(RuntimeError::UnknownTask(stage.task.clone()));
            }
            if !router.is_registered(&stage.task) {
                return Err(RuntimeError::HandlerNotFound(stage.task.clone()));
            }
        }

        Ok(Runtime {
            machine: StateMachine::new(state_machine),
            router,
            evaluator,
            stages: self.stages,
            settings: self.settings,
            logger: self.logger,
            clock: self.clock,
            probe: self.probe,
            store: InMemoryStore::new(),
            retry_count: 0,
            consecutive_failures: 0,
        })
    }
}

impl Runtime {
    /// A runtime with default collaborators.
    pub fn new(config: RuntimeConfig) -> Result<Self, RuntimeError> {
        Self::builder(config).build()
    }

    pub fn builder(config: RuntimeConfig) -> RuntimeBuilder {
        RuntimeBuilder {
            config,
            logger: Arc::new(TracingLogger),
            clock: Arc::new(SystemClock),
            probe: Arc::new(FixedProbe(0)),
            stages: StageTable::pipeline(),
            settings: PipelineSettings::default(),
            score: 1.0,
            builtins: true,
            handlers: Vec::new(),
        }
    }

    pub fn current_state(&self) -> &str {
        self.machine.current_state()
    }

    pub fn evaluator(&self) -> &ThresholdEvaluator {
        &self.evaluator
    }

    /// Run from the initial state until a terminal state is reached.
    ///
    /// Every run starts from a clean slate: the cursor, the shared store and
    /// the retry counters are reset. The store is emptied again on return;
    /// its contents at that point end up in the record.
    pub async fn run(&mut self) -> Result<RunRecord, RuntimeError> {
        self.machine.reset();
        self.store.clear();
        self.retry_count = 0;
        self.consecutive_failures = 0;

        let mut record = RunRecord::begin(self.machine.current_state(), self.clock.now());
        self.logger.info("Runtime started");

        let outcome = self.drive(&mut record).await;

        let artifacts: BTreeMap<String, Value> = self
            .store
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        self.store.clear();

        match outcome {
            Ok(()) => {
                record.finish(artifacts, self.clock.now());
                self.logger
                    .info(&format!("Runtime halted in state: {}", record.final_state));
                Ok(record)
            }
            Err(err) => {
                self.logger.error("Runtime aborted", &err);
                Err(err)
            }
        }
    }

    async fn drive(&mut self, record: &mut RunRecord) -> Result<(), RuntimeError> {
        let initial = self.machine.current_state().to_string();
        let fires_start = !self.stages.contains(&initial)
            && self
                .machine
                .definition()
                .get(&initial)
                .is_some_and(|def| def.target(events::START).is_some());
        if fires_start {
            self.advance(events::START, record)?;
        }

        while !self.machine.is_final() {
            let state = self.machine.current_state().to_string();
            self.logger.info(&format!("Current state: {state}"));

            let (event, delay) = match self.execute_state(&state).await {
                Ok(event) => {
                    record.tasks_executed += 1;
                    self.consecutive_failures = 0;
                    let delay = self.apply_retry_policy(&event, record);
                    (event, delay)
                }
                Err(err) if err.is_recoverable() => {
                    record.failures += 1;
                    self.consecutive_failures += 1;
                    self.logger
                        .error(&format!("Stage failed in state: {state}"), &err);
                    (events::FAILURE.to_string(), self.failure_backoff())
                }
                Err(err) => return Err(err),
            };

            self.advance(&event, record)?;

            if let Some(delay) = delay
                && !self.machine.is_final()
            {
                self.logger
                    .info(&format!("Backing off for {}ms", delay.as_millis()));
                self.clock.sleep(delay).await;
            }
        }
        Ok(())
    }

    /// Guards declared in the definition see the event, the retry and
    /// failure counters and the retries left. The counters already include
    /// the event being applied, so a spent budget shows as a negative
    /// `retries_remaining`.
    fn advance(&mut self, event: &str, record: &mut RunRecord) -> Result<(), RuntimeError> {
        let from = self.machine.current_state().to_string();
        let context = self.transition_context(event);
        let next = self
            .machine
            .transition_with_context(event, &context)?
            .to_string();
        self.logger
            .info(&format!("Transition: {from} --{event}--> {next}"));
        record.record_transition(event, &next);
        Ok(())
    }

    fn transition_context(&self, event: &str) -> Value {
        let max_retries = i64::from(self.evaluator.model().evaluation.max_retries);
        json!({
            "event": event,
            "retry_count": self.retry_count,
            "retries_remaining": max_retries - i64::from(self.retry_count),
            "consecutive_failures": self.consecutive_failures,
        })
    }

    /// Every `RETRY` is counted and only `PASS`/`FAIL` reset the count. The
    /// wait happens while the budget allows it; past the budget the event is
    /// passed on unchanged and the graph decides what follows.
    fn apply_retry_policy(&mut self, event: &str, record: &mut RunRecord) -> Option<Duration> {
        match event {
            events::RETRY => {
                let attempt = self.retry_count;
                self.retry_count += 1;
                record.retries += 1;
                if self.evaluator.should_retry(attempt) {
                    Some(self.evaluator.backoff_delay(attempt))
                } else {
                    self.logger.info(&format!(
                        "Retry budget of {} exhausted",
                        self.evaluator.model().evaluation.max_retries
                    ));
                    None
                }
            }
            events::PASS | events::FAIL => {
                self.retry_count = 0;
                None
            }
            _ => None,
        }
    }

    fn failure_backoff(&self) -> Option<Duration> {
        if !self.evaluator.should_backoff(self.consecutive_failures) {
            return None;
        }
        let max = self.evaluator.model().error.max_consecutive_failures;
        Some(
            self.evaluator
                .backoff_delay(self.consecutive_failures - max),
        )
    }

    async fn execute_state(&mut self, state: &str) -> Result<String, RuntimeError> {
        let stage = self
            .stages
            .get(state)
            .cloned()
            .ok_or_else(|| RuntimeError::UnknownStage(state.to_string()))?;

        let input = {
            let ctx = StageContext {
                state,
                store: &self.store,
                settings: &self.settings,
            };
            (stage.build_input)(&ctx)?
        };

        // The task about to start is the only one in flight.
        let memory_mb = self.probe.memory_mb();
        if !self.evaluator.is_within_resource_limits(1, memory_mb) {
            return Err(RuntimeError::AdmissionRefused {
                task: stage.task.clone(),
                current_tasks: 1,
                memory_mb,
            });
        }

        let output = self.router.execute(&stage.task, input).await?;
        let event = (stage.interpret)(&output, &self.evaluator)?;
        if let Some(key) = &stage.store_key {
            self.store.set(key, output);
        }
        Ok(event)
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("machine", &self.machine)
            .field("router", &self.router)
            .field("retry_count", &self.retry_count)
            .field("consecutive_failures", &self.consecutive_failures)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::{LogEntry, ManualClock, MemoryLogger};
    use crate::orchestrator::StageDescriptor;
    use crate::state_machine::StateMachineDefinition;
    use crate::task::{PropertySchema, Schema, SchemaType, TaskGrammar};
    use crate::threshold::ThresholdModel;
    use async_trait::async_trait;

    struct Fixed(Value);

    #[async_trait]
    impl TaskHandler for Fixed {
        async fn execute(&self, _input: &Value) -> anyhow::Result<Value> {
            Ok(self.0.clone())
        }
    }

    struct Failing;

    #[async_trait]
    impl TaskHandler for Failing {
        async fn execute(&self, _input: &Value) -> anyhow::Result<Value> {
            anyhow::bail!("backend unavailable")
        }
    }

    struct Slow;

    #[async_trait]
    impl TaskHandler for Slow {
        async fn execute(&self, _input: &Value) -> anyhow::Result<Value> {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(json!({"content": "late"}))
        }
    }

    fn string() -> PropertySchema {
        PropertySchema::typed(SchemaType::String)
    }

    fn small_grammar() -> TaskGrammar {
        TaskGrammar::default()
            .with_task(
                "generate",
                Schema::object().require("prompt", string()),
                Schema::object().require("content", string()),
            )
            .with_task(
                "render",
                Schema::object()
                    .require("content", string())
                    .require("template", string()),
                Schema::object().require("rendered", string()),
            )
    }

    fn short_pipeline() -> RuntimeConfig {
        RuntimeConfig {
            state_machine: StateMachineDefinition::new("generating")
                .with_state("generating", &[("SUCCESS", "rendering"), ("FAILURE", "failed")])
                .with_state("rendering", &[("SUCCESS", "halt"), ("FAILURE", "failed")])
                .with_final("halt")
                .with_final("failed"),
            grammar: small_grammar(),
            thresholds: ThresholdModel::default(),
        }
    }

    fn bundled() -> RuntimeConfig {
        RuntimeConfig {
            state_machine: serde_json::from_str(include_str!(
                "../../config/runtime/state_machine.json"
            ))
            .unwrap(),
            grammar: serde_json::from_str(include_str!("../../config/runtime/task_grammar.json"))
                .unwrap(),
            thresholds: ThresholdModel::default(),
        }
    }

    fn quiet(config: RuntimeConfig) -> (RuntimeBuilder, Arc<MemoryLogger>, Arc<ManualClock>) {
        let logger = Arc::new(MemoryLogger::new());
        let clock = Arc::new(ManualClock::default());
        let builder = Runtime::builder(config)
            .logger(logger.clone())
            .clock(clock.clone());
        (builder, logger, clock)
    }

    #[tokio::test]
    async fn short_pipeline_reaches_halt() {
        let (builder, logger, _) = quiet(short_pipeline());
        let mut runtime = builder
            .handler(
                "generate",
                Arc::new(Fixed(json!({"content": "X", "metadata": {"n": 1}}))),
            )
            .build()
            .unwrap();

        let record = runtime.run().await.unwrap();

        assert_eq!(record.final_state, "halt");
        assert_eq!(record.states, vec!["generating", "rendering", "halt"]);
        assert_eq!(record.events, vec!["SUCCESS", "SUCCESS"]);
        assert_eq!(record.tasks_executed, 2);
        assert_eq!(record.artifacts["generated"]["content"], "X");
        assert_eq!(record.artifacts["rendered"]["rendered"], "default: X");
        assert_eq!(runtime.current_state(), "halt");
        assert!(logger.contains_info("Transition: generating --SUCCESS--> rendering"));
        assert!(logger.errors().is_empty());
    }

    #[tokio::test]
    async fn retry_without_transition_aborts() {
        let config = RuntimeConfig {
            state_machine: StateMachineDefinition::new("evaluating")
                .with_state("evaluating", &[("PASS", "done"), ("FAIL", "done")])
                .with_final("done"),
            grammar: serde_json::from_str(include_str!("../../config/runtime/task_grammar.json"))
                .unwrap(),
            thresholds: ThresholdModel::default(),
        };
        let (builder, logger, _) = quiet(config);
        let mut runtime = builder
            .stage(
                "evaluating",
                StageDescriptor::new("evaluate", |_| Ok(json!({"target": "https://example.com/1"})))
                    .interpret_with(crate::orchestrator::interpret_evaluation),
            )
            .handler(
                "evaluate",
                Arc::new(Fixed(json!({"result": "retry", "score": 0.6}))),
            )
            .build()
            .unwrap();

        let err = runtime.run().await.unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::UndefinedTransition { ref state, ref event }
                if state == "evaluating" && event == "RETRY"
        ));
        assert!(
            logger
                .errors()
                .iter()
                .any(|(message, _)| message == "Runtime aborted")
        );
    }

    #[tokio::test]
    async fn bundled_pipeline_passes_through_every_stage() {
        let (builder, _, clock) = quiet(bundled());
        let mut runtime = builder.build().unwrap();

        let record = runtime.run().await.unwrap();

        assert_eq!(record.initial_state, "idle");
        assert_eq!(record.final_state, "done");
        assert_eq!(
            record.states,
            vec!["idle", "generating", "rendering", "uploading", "evaluating", "halt", "done"]
        );
        assert_eq!(record.events[0], "START");
        assert_eq!(record.events[4], "PASS");
        assert_eq!(
            record.artifacts["generated"]["content"],
            "Generated content for: test prompt"
        );
        assert_eq!(record.artifacts["uploaded"]["url"], "https://example.com/0");
        assert_eq!(record.artifacts["evaluated"]["result"], "pass");
        assert!(!record.artifacts.contains_key("mutated"));
        assert_eq!(record.retries, 0);
        assert!(clock.sleeps().is_empty());
    }

    fn evaluating_only(
        transitions: &[(&str, &str)],
        max_retries: u32,
    ) -> RuntimeConfig {
        let mut thresholds = ThresholdModel::default();
        thresholds.evaluation.max_retries = max_retries;
        RuntimeConfig {
            state_machine: StateMachineDefinition::new("evaluating")
                .with_state("evaluating", transitions)
                .with_final("done"),
            grammar: serde_json::from_str(include_str!("../../config/runtime/task_grammar.json"))
                .unwrap(),
            thresholds,
        }
    }

    fn evaluating_stage() -> StageDescriptor {
        StageDescriptor::new("evaluate", |_| Ok(json!({"target": "https://example.com/1"})))
            .interpret_with(crate::orchestrator::interpret_evaluation)
    }

    /// Answers `retry` for the first `retries` calls, then `pass`.
    struct RetryThenPass {
        retries: u32,
        calls: std::sync::atomic::AtomicU32,
    }

    #[async_trait]
    impl TaskHandler for RetryThenPass {
        async fn execute(&self, _input: &Value) -> anyhow::Result<Value> {
            let call = self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            if call < self.retries {
                Ok(json!({"result": "retry", "score": 0.6}))
            } else {
                Ok(json!({"result": "pass", "score": 0.9}))
            }
        }
    }

    #[tokio::test]
    async fn spent_budget_still_emits_retry() {
        let config = evaluating_only(&[("PASS", "done"), ("FAIL", "done")], 0);
        let (builder, _, clock) = quiet(config);
        let mut runtime = builder
            .stage("evaluating", evaluating_stage())
            .handler(
                "evaluate",
                Arc::new(Fixed(json!({"result": "retry", "score": 0.6}))),
            )
            .build()
            .unwrap();

        let err = runtime.run().await.unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::UndefinedTransition { ref state, ref event }
                if state == "evaluating" && event == "RETRY"
        ));
        assert!(clock.sleeps().is_empty());
    }

    #[tokio::test]
    async fn retry_past_budget_follows_the_graph_without_waiting() {
        let config = evaluating_only(&[("RETRY", "evaluating"), ("PASS", "done")], 1);
        let (builder, _, clock) = quiet(config);
        let mut runtime = builder
            .stage("evaluating", evaluating_stage())
            .handler(
                "evaluate",
                Arc::new(RetryThenPass {
                    retries: 3,
                    calls: Default::default(),
                }),
            )
            .build()
            .unwrap();

        let record = runtime.run().await.unwrap();

        assert_eq!(record.events, vec!["RETRY", "RETRY", "RETRY", "PASS"]);
        assert_eq!(record.retries, 3);
        assert_eq!(record.final_state, "done");
        // Only the first retry is within a budget of one.
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(1)]);
    }

    #[tokio::test]
    async fn bundled_guard_stops_retries_once_budget_is_spent() {
        let mut config = bundled();
        config.thresholds.evaluation.max_retries = 2;
        let (builder, logger, clock) = quiet(config);
        let mut runtime = builder.score(0.6).build().unwrap();

        let err = runtime.run().await.unwrap_err();

        assert!(matches!(
            err,
            RuntimeError::GuardRejected { ref state, ref event }
                if state == "evaluating" && event == "RETRY"
        ));
        assert_eq!(
            clock.sleeps(),
            vec![Duration::from_secs(1), Duration::from_secs(2)]
        );
        assert!(logger.contains_info("Transition: mutating --SUCCESS--> generating"));
        assert!(logger.contains_info("Retry budget of 2 exhausted"));
    }

    #[tokio::test]
    async fn pass_resets_retry_count() {
        let config = evaluating_only(&[("RETRY", "evaluating"), ("PASS", "done")], 3);
        let (builder, _, _) = quiet(config);
        let mut runtime = builder
            .stage("evaluating", evaluating_stage())
            .handler(
                "evaluate",
                Arc::new(RetryThenPass {
                    retries: 2,
                    calls: Default::default(),
                }),
            )
            .build()
            .unwrap();

        runtime.run().await.unwrap();
        assert_eq!(runtime.retry_count, 0);
    }

    #[tokio::test]
    async fn handler_failure_becomes_failure_event() {
        let (builder, logger, _) = quiet(short_pipeline());
        let mut runtime = builder
            .handler("render", Arc::new(Failing))
            .build()
            .unwrap();

        let record = runtime.run().await.unwrap();

        assert_eq!(record.final_state, "failed");
        assert_eq!(record.events, vec!["SUCCESS", "FAILURE"]);
        assert_eq!(record.failures, 1);
        assert!(!record.artifacts.contains_key("rendered"));
        let errors = logger.errors();
        assert!(errors.iter().any(|(m, cause)| m == "Stage failed in state: rendering"
            && cause == "Task render failed: backend unavailable"));
    }

    #[tokio::test]
    async fn contract_violation_stores_nothing() {
        let (builder, _, _) = quiet(short_pipeline());
        let mut runtime = builder
            .handler("generate", Arc::new(Fixed(json!({"content": 42}))))
            .build()
            .unwrap();

        let record = runtime.run().await.unwrap();

        assert_eq!(record.final_state, "failed");
        assert!(record.artifacts.is_empty());
    }

    #[tokio::test]
    async fn repeated_failures_back_off() {
        let config = RuntimeConfig {
            state_machine: StateMachineDefinition::new("generating")
                .with_state("generating", &[("SUCCESS", "done"), ("FAILURE", "generating")])
                .with_final("done"),
            grammar: small_grammar(),
            thresholds: ThresholdModel::default(),
        };

        struct Flaky(std::sync::atomic::AtomicU32);

        #[async_trait]
        impl TaskHandler for Flaky {
            async fn execute(&self, _input: &Value) -> anyhow::Result<Value> {
                let call = self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                if call < 4 {
                    anyhow::bail!("attempt {call} failed");
                }
                Ok(json!({"content": "finally"}))
            }
        }

        let (builder, _, clock) = quiet(config);
        let mut runtime = builder
            .handler("generate", Arc::new(Flaky(Default::default())))
            .build()
            .unwrap();

        let record = runtime.run().await.unwrap();

        assert_eq!(record.final_state, "done");
        assert_eq!(record.failures, 4);
        // Failures 3 and 4 are past the limit of 3 consecutive failures.
        assert_eq!(
            clock.sleeps(),
            vec![Duration::from_secs(1), Duration::from_secs(2)]
        );
    }

    #[tokio::test]
    async fn missing_artifact_is_fatal() {
        let mut config = short_pipeline();
        config.state_machine.initial = "rendering".to_string();
        let (builder, _, _) = quiet(config);
        let mut runtime = builder.build().unwrap();

        let err = runtime.run().await.unwrap_err();
        assert!(matches!(err, RuntimeError::MissingArtifact { ref key, .. } if key == "generated"));
    }

    #[tokio::test]
    async fn state_without_stage_is_fatal() {
        let config = RuntimeConfig {
            state_machine: StateMachineDefinition::new("limbo")
                .with_state("limbo", &[("SUCCESS", "done")])
                .with_final("done"),
            grammar: small_grammar(),
            thresholds: ThresholdModel::default(),
        };
        let (builder, _, _) = quiet(config);
        let mut runtime = builder.build().unwrap();

        let err = runtime.run().await.unwrap_err();
        assert!(matches!(err, RuntimeError::UnknownStage(ref s) if s == "limbo"));
    }

    #[tokio::test]
    async fn admission_refusal_is_a_failure() {
        let (builder, logger, _) = quiet(short_pipeline());
        let mut runtime = builder
            .probe(Arc::new(FixedProbe(4096)))
            .build()
            .unwrap();

        let record = runtime.run().await.unwrap();

        assert_eq!(record.final_state, "failed");
        assert_eq!(record.tasks_executed, 0);
        assert!(
            !logger
                .entries()
                .contains(&LogEntry::Info("Executing task: generate".to_string()))
        );
    }

    #[tokio::test]
    async fn task_timeout_comes_from_thresholds() {
        let mut config = short_pipeline();
        config.thresholds.timing.task_timeout_ms = 20;
        let (builder, logger, _) = quiet(config);
        let mut runtime = builder.handler("generate", Arc::new(Slow)).build().unwrap();

        let record = runtime.run().await.unwrap();

        assert_eq!(record.final_state, "failed");
        assert!(
            logger
                .errors()
                .iter()
                .any(|(_, cause)| cause == "Task generate timed out after 20ms")
        );
    }

    #[test]
    fn build_requires_grammar_entry_for_each_stage() {
        let mut config = bundled();
        config.grammar = small_grammar();
        let err = Runtime::builder(config).build().unwrap_err();
        assert!(matches!(err, RuntimeError::UnknownTask(ref t) if t == "evaluate"));
    }

    #[test]
    fn build_requires_handler_for_each_stage() {
        let err = Runtime::builder(short_pipeline())
            .without_builtin_handlers()
            .handler("render", Arc::new(Failing))
            .build()
            .unwrap_err();
        assert!(matches!(err, RuntimeError::HandlerNotFound(ref t) if t == "generate"));
    }

    #[test]
    fn build_rejects_invalid_thresholds() {
        let mut config = short_pipeline();
        config.thresholds.evaluation.retry_score = 0.9;
        assert!(matches!(
            Runtime::new(config),
            Err(RuntimeError::Config(_))
        ));
    }

    #[tokio::test]
    async fn each_run_starts_clean() {
        let (builder, _, _) = quiet(bundled());
        let mut runtime = builder.build().unwrap();

        let first = runtime.run().await.unwrap();
        let second = runtime.run().await.unwrap();

        assert_ne!(first.run_id, second.run_id);
        assert_eq!(first.states, second.states);
        assert_eq!(second.initial_state, "idle");
    }
}
