//! Session-level error type.

use thiserror::Error;

/// Errors that reach callers of the user-facing primitives.
///
/// Everything below the primitives converts failures into data (result
/// objects, stderr feedback) so the model can adapt; what remains here is
/// configuration, debugger lifecycle, and structured-parse failures that
/// survived the fallbacks.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum SessionError {
    /// A primitive was called before `start`/`attach`.
    #[error("no process. call start() or attach() first")]
    NoProcess,

    /// Debugger façade failure.
    #[error(transparent)]
    Bridge(#[from] wyrm_bridge::BridgeError),

    /// Model-provider failure.
    #[error(transparent)]
    Llm(#[from] wyrm_llm::LlmError),

    /// Script-engine management failure (tool injection).
    #[error(transparent)]
    Script(#[from] wyrm_script::ScriptError),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// A background execution task failed to complete.
    #[error("execution task failed: {0}")]
    Task(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_process_message_tells_the_fix() {
        assert!(SessionError::NoProcess.to_string().contains("start()"));
    }

    #[test]
    fn bridge_errors_pass_through() {
        let err = SessionError::from(wyrm_bridge::BridgeError::Destroyed);
        assert_eq!(err.to_string(), "debugger has been destroyed");
    }
}
