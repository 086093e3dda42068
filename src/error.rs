use thiserror::Error;

/// Errors raised while loading, validating and running a pipeline.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Task grammar not found: {0}")]
    UnknownTask(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Cannot transition from final state: {0}")]
    TerminalTransition(String),

    #[error("Invalid transition: {event} from {state}")]
    UndefinedTransition { state: String, event: String },

    #[error("Guard rejected transition: {event} from {state}")]
    GuardRejected { state: String, event: String },

    #[error("Task handler not found: {0}")]
    HandlerNotFound(String),

    #[error("Task {task} failed: {source}")]
    Handler {
        task: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Task {task} timed out after {timeout_ms}ms")]
    TaskTimeout { task: String, timeout_ms: u64 },

    #[error("Admission refused for {task}: {current_tasks} tasks, {memory_mb}MB")]
    AdmissionRefused {
        task: String,
        current_tasks: u32,
        memory_mb: u64,
    },

    #[error("Task {task} returned an unusable output: {message}")]
    MalformedOutput { task: String, message: String },

    #[error("State {state} requires artifact `{key}` which has not been produced")]
    MissingArtifact { state: String, key: String },

    #[error("No stage registered for state: {0}")]
    UnknownStage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Contract violations found by the task validator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{context} must be an object")]
    NotAnObject { context: String },

    #[error("{context} missing required field: {field}")]
    MissingField { context: String, field: String },

    #[error("{context} must be {expected}, got {actual}")]
    TypeMismatch {
        context: String,
        expected: String,
        actual: String,
    },

    #[error("{context} must be one of {allowed}, got {actual}")]
    EnumViolation {
        context: String,
        allowed: String,
        actual: String,
    },
}

/// Classifies a runtime error for the run loop's recovery decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ErrorCategory {
    /// Bad documents, unknown tasks or stages, broken pipeline wiring.
    Configuration,
    /// Task input or output did not match its grammar.
    Contract,
    /// The state graph and the observed events disagree.
    Transition,
    /// The handler itself failed, timed out or was not admitted.
    Handler,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Configuration => write!(f, "Configuration"),
            ErrorCategory::Contract => write!(f, "Contract"),
            ErrorCategory::Transition => write!(f, "Transition"),
            ErrorCategory::Handler => write!(f, "Handler"),
        }
    }
}

impl RuntimeError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            RuntimeError::Config(_)
            | RuntimeError::UnknownTask(_)
            | RuntimeError::HandlerNotFound(_)
            | RuntimeError::MissingArtifact { .. }
            | RuntimeError::UnknownStage(_)
            | RuntimeError::Io(_)
            | RuntimeError::Json(_)
            | RuntimeError::Toml(_) => ErrorCategory::Configuration,
            RuntimeError::Validation(_) | RuntimeError::MalformedOutput { .. } => {
                ErrorCategory::Contract
            }
            RuntimeError::InvalidState(_)
            | RuntimeError::TerminalTransition(_)
            | RuntimeError::UndefinedTransition { .. }
            | RuntimeError::GuardRejected { .. } => ErrorCategory::Transition,
            RuntimeError::Handler { .. }
            | RuntimeError::TaskTimeout { .. }
            | RuntimeError::AdmissionRefused { .. } => ErrorCategory::Handler,
        }
    }

    /// Whether the run loop may turn this error into a `FAILURE` event.
    ///
    /// Contract violations and handler failures are task failures; the rest
    /// end the run.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Contract | ErrorCategory::Handler
        )
    }
}
