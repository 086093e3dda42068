use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::model::ThresholdModel;
use crate::state_machine::events;

/// Discrete grade of a continuous score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Pass,
    Retry,
    Fail,
}

impl Verdict {
    /// The state machine event this verdict produces.
    pub fn event(self) -> &'static str {
        match self {
            Verdict::Pass => events::PASS,
            Verdict::Retry => events::RETRY,
            Verdict::Fail => events::FAIL,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Pass => write!(f, "PASS"),
            Verdict::Retry => write!(f, "RETRY"),
            Verdict::Fail => write!(f, "FAIL"),
        }
    }
}

/// Stateless policy functions over a [`ThresholdModel`].
///
/// Counters (retries, consecutive failures, tasks in flight) are owned by
/// the caller and passed in.
#[derive(Debug, Clone)]
pub struct ThresholdEvaluator {
    model: Arc<ThresholdModel>,
}

impl ThresholdEvaluator {
    pub fn new(model: ThresholdModel) -> Self {
        Self {
            model: Arc::new(model),
        }
    }

    pub fn model(&self) -> &ThresholdModel {
        &self.model
    }

    /// Cutoffs are inclusive: a score equal to `pass_score` passes.
    pub fn evaluate_score(&self, score: f64) -> Verdict {
        let eval = &self.model.evaluation;
        if score >= eval.pass_score {
            Verdict::Pass
        } else if score >= eval.retry_score {
            Verdict::Retry
        } else {
            Verdict::Fail
        }
    }

    pub fn should_retry(&self, retry_count: u32) -> bool {
        retry_count < self.model.evaluation.max_retries
    }

    pub fn should_backoff(&self, consecutive_failures: u32) -> bool {
        consecutive_failures >= self.model.error.max_consecutive_failures
    }

    /// `backoff_multiplier ^ attempt` seconds; attempt 0 is the first retry.
    /// Saturates at [`Duration::MAX`].
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let seconds = self.model.error.backoff_multiplier.powi(exponent);
        Duration::try_from_secs_f64(seconds).unwrap_or(Duration::MAX)
    }

    /// Admission predicate for starting another task.
    pub fn is_within_resource_limits(&self, current_tasks: u32, memory_mb: u64) -> bool {
        let resource = &self.model.resource;
        current_tasks <= resource.max_concurrent_tasks && memory_mb <= resource.max_memory_mb
    }

    /// The configured task timeout, if enabled.
    pub fn task_timeout(&self) -> Option<Duration> {
        match self.model.timing.task_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }
}
