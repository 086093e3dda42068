use std::error::Error;
use std::sync::Mutex;

/// Side-channel logging capability. Implementations must never fail or
/// influence control flow.
pub trait Logger: Send + Sync {
    fn info(&self, message: &str);

    fn error(&self, message: &str, cause: &(dyn Error + 'static));
}

/// Forwards to `tracing` under the `stagerun` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn info(&self, message: &str) {
        tracing::info!(target: "stagerun", "{message}");
    }

    fn error(&self, message: &str, cause: &(dyn Error + 'static)) {
        tracing::error!(target: "stagerun", error = %cause, "{message}");
    }
}

/// One captured log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEntry {
    Info(String),
    Error { message: String, cause: String },
}

/// Keeps every line in memory; useful for asserting on what was logged.
#[derive(Debug, Default)]
pub struct MemoryLogger {
    entries: Mutex<Vec<LogEntry>>,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn errors(&self) -> Vec<(String, String)> {
        self.entries()
            .into_iter()
            .filter_map(|entry| match entry {
                LogEntry::Error { message, cause } => Some((message, cause)),
                LogEntry::Info(_) => None,
            })
            .collect()
    }

    pub fn contains_info(&self, needle: &str) -> bool {
        self.entries()
            .iter()
            .any(|e| matches!(e, LogEntry::Info(m) if m.contains(needle)))
    }

    fn push(&self, entry: LogEntry) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(entry);
        }
    }
}

impl Logger for MemoryLogger {
    fn info(&self, message: &str) {
        self.push(LogEntry::Info(message.to_string()));
    }

    fn error(&self, message: &str, cause: &(dyn Error + 'static)) {
        self.push(LogEntry::Error {
            message: message.to_string(),
            cause: cause.to_string(),
        });
    }
}
