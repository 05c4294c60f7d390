//! Execution event system for observable debugging operations.

use std::sync::Arc;
use std::time::Duration;

/// Types of execution events emitted during debugging operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionEventType {
    /// A code fragment is about to run.
    CodeStart,
    /// A code fragment finished running.
    CodeEnd,
    /// A self-healing attempt is starting.
    HealStart,
    /// A self-healing attempt finished.
    HealEnd,
    /// A REPL agent iteration is starting.
    ReplStep,
    /// The model produced a response worth surfacing.
    LlmResponse,
    /// A primitive was answered from the cache.
    CacheHit,
    /// A sub-query was issued from inside running code.
    LlmSubQuery,
}

/// Lightweight event emitted around code execution and healing operations.
#[derive(Debug, Clone)]
pub struct ExecutionEvent {
    /// What happened.
    pub event_type: ExecutionEventType,
    /// The code fragment involved, when applicable.
    pub code: String,
    /// Captured stdout (end events).
    pub stdout: String,
    /// Captured stderr (end events).
    pub stderr: String,
    /// Whether execution succeeded (end events).
    pub succeeded: Option<bool>,
    /// Elapsed time (end events).
    pub duration: Duration,
    /// Event-specific extras (step counters, attempt numbers, content).
    pub metadata: serde_json::Value,
}

impl ExecutionEvent {
    /// An event of `event_type` with empty fields.
    pub fn new(event_type: ExecutionEventType) -> Self {
        Self {
            event_type,
            code: String::new(),
            stdout: String::new(),
            stderr: String::new(),
            succeeded: None,
            duration: Duration::ZERO,
            metadata: serde_json::Value::Null,
        }
    }

    /// Attach a code fragment.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = code.into();
        self
    }

    /// Attach metadata.
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Callback receiving execution events.
pub type ExecutionCallback = Arc<dyn Fn(&ExecutionEvent) + Send + Sync>;
