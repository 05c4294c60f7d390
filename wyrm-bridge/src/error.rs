//! Bridge error type.

use thiserror::Error;

/// Errors surfaced by the debugger façade.
///
/// Debugger-operation failures carry the backend's human-readable cause so
/// callers (and ultimately the model) can see why an operation failed.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Target creation failed (bad path, unsupported binary).
    #[error("failed to create target: {0}")]
    TargetCreation(String),

    /// Attach to a process failed.
    #[error("failed to attach: {0}")]
    Attach(String),

    /// Launch of the target failed.
    #[error("failed to launch target: {0}")]
    Launch(String),

    /// Breakpoint creation or mutation failed.
    #[error("breakpoint error: {0}")]
    Breakpoint(String),

    /// A memory read failed.
    #[error("failed to read {size} bytes at {address:#x}: {reason}")]
    MemoryRead {
        /// Start address of the attempted read.
        address: u64,
        /// Number of bytes requested.
        size: usize,
        /// Backend-provided cause.
        reason: String,
    },

    /// A memory write failed.
    #[error("failed to write {size} bytes at {address:#x}: {reason}")]
    MemoryWrite {
        /// Start address of the attempted write.
        address: u64,
        /// Number of bytes in the payload.
        size: usize,
        /// Backend-provided cause.
        reason: String,
    },

    /// Process control (continue/stop/kill/detach) failed.
    #[error("process error: {0}")]
    Process(String),

    /// An operation required a live process but none is present.
    #[error("no process is associated with this target")]
    NoProcess,

    /// The debugger has been destroyed.
    #[error("debugger has been destroyed")]
    Destroyed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_errors_render_addresses_in_hex() {
        let err = BridgeError::MemoryRead {
            address: 0x1000,
            size: 8,
            reason: "unmapped".into(),
        };
        assert_eq!(err.to_string(), "failed to read 8 bytes at 0x1000: unmapped");
    }

    #[test]
    fn destroyed_error_display() {
        assert_eq!(
            BridgeError::Destroyed.to_string(),
            "debugger has been destroyed"
        );
    }
}
