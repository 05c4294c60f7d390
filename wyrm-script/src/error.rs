//! Script engine error type.

use thiserror::Error;

/// Errors from script-engine management operations.
///
/// Script *execution* failures never surface here — they are formatted into
/// the captured stderr so the model can react to them.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ScriptError {
    /// A tool name collides with a reserved or scaffold name.
    #[error("tool name '{0}' conflicts with a reserved name")]
    ReservedName(String),

    /// A fragment's final value could not be serialized.
    #[error("value of '{name}' is not serializable: {message}")]
    Unserializable {
        /// The variable name.
        name: String,
        /// Serialization failure detail.
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_name_display() {
        assert_eq!(
            ScriptError::ReservedName("process".into()).to_string(),
            "tool name 'process' conflicts with a reserved name"
        );
    }
}
