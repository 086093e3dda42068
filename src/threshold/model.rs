use serde::{Deserialize, Serialize};

use crate::error::RuntimeError;

/// Score cutoffs and the retry budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationThreshold {
    pub pass_score: f64,
    pub retry_score: f64,
    pub max_retries: u32,
}

/// Declared time limits. Only `task_timeout_ms` is enforced (0 disables it).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingThreshold {
    pub task_timeout_ms: u64,
    pub idle_timeout_ms: u64,
}

/// Admission-control limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceThreshold {
    pub max_memory_mb: u64,
    pub max_concurrent_tasks: u32,
}

/// Failure tolerance and exponential backoff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorThreshold {
    pub max_consecutive_failures: u32,
    pub backoff_multiplier: f64,
}

/// All policy constants of a runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdModel {
    pub evaluation: EvaluationThreshold,
    pub timing: TimingThreshold,
    pub resource: ResourceThreshold,
    pub error: ErrorThreshold,
}

impl Default for ThresholdModel {
    fn default() -> Self {
        Self {
            evaluation: EvaluationThreshold {
                pass_score: 0.8,
                retry_score: 0.5,
                max_retries: 3,
            },
            timing: TimingThreshold {
                task_timeout_ms: 30_000,
                idle_timeout_ms: 300_000,
            },
            resource: ResourceThreshold {
                max_memory_mb: 1024,
                max_concurrent_tasks: 1,
            },
            error: ErrorThreshold {
                max_consecutive_failures: 3,
                backoff_multiplier: 2.0,
            },
        }
    }
}

impl ThresholdModel {
    pub fn validate(&self) -> Result<(), RuntimeError> {
        let eval = &self.evaluation;
        let mut problems = Vec::new();

        if !eval.pass_score.is_finite() || !eval.retry_score.is_finite() {
            problems.push("scores must be finite numbers".to_string());
        } else if eval.pass_score < eval.retry_score {
            problems.push(format!(
                "pass_score ({}) must not be below retry_score ({})",
                eval.pass_score, eval.retry_score
            ));
        }

        let multiplier = self.error.backoff_multiplier;
        if !(multiplier.is_finite() && multiplier > 1.0) {
            problems.push(format!(
                "backoff_multiplier must be greater than 1, got {multiplier}"
            ));
        }

        if self.resource.max_concurrent_tasks == 0 {
            problems.push("max_concurrent_tasks must be at least 1".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(RuntimeError::Config(format!(
                "invalid thresholds: {}",
                problems.join("; ")
            )))
        }
    }
}
