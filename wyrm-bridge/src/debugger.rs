//! The [`Debugger`] — owns the backend connection and session lifecycle.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::backend::DebugBackend;
use crate::error::BridgeError;
use crate::process::Process;
use crate::target::Target;
use crate::types::CommandResult;

/// High-level handle over the underlying debugger.
///
/// Cheap to clone; all clones share the same backend and destroyed flag.
/// Operations on a destroyed debugger are no-ops: commands report failure
/// instead of reaching the backend, and `destroy` is idempotent.
#[derive(Clone)]
pub struct Debugger {
    inner: Arc<DebuggerInner>,
}

struct DebuggerInner {
    backend: Arc<dyn DebugBackend>,
    destroyed: AtomicBool,
}

impl Debugger {
    /// Wrap a backend.
    pub fn new(backend: Arc<dyn DebugBackend>) -> Self {
        Self {
            inner: Arc::new(DebuggerInner {
                backend,
                destroyed: AtomicBool::new(false),
            }),
        }
    }

    /// The shared backend handle.
    pub(crate) fn backend(&self) -> Arc<dyn DebugBackend> {
        Arc::clone(&self.inner.backend)
    }

    fn ensure_live(&self) -> Result<(), BridgeError> {
        if self.is_destroyed() {
            Err(BridgeError::Destroyed)
        } else {
            Ok(())
        }
    }

    /// Create a target from an executable path.
    pub fn create_target(&self, path: &str) -> Result<Target, BridgeError> {
        self.ensure_live()?;
        self.inner.backend.create_target(path)?;
        tracing::info!(path, "created target");
        Ok(Target::new(self.backend()))
    }

    /// Attach to a running process by pid.
    pub fn attach(&self, pid: u64) -> Result<(Target, Process), BridgeError> {
        self.ensure_live()?;
        self.inner.backend.attach(pid)?;
        tracing::info!(pid, "attached to process");
        Ok((Target::new(self.backend()), Process::new(self.backend())))
    }

    /// Attach to a running process by name.
    pub fn attach_by_name(&self, name: &str) -> Result<(Target, Process), BridgeError> {
        self.ensure_live()?;
        let pid = self.inner.backend.attach_by_name(name)?;
        tracing::info!(name, pid, "attached to process by name");
        Ok((Target::new(self.backend()), Process::new(self.backend())))
    }

    /// Execute a raw debugger CLI command.
    ///
    /// After `destroy` this returns an unsuccessful [`CommandResult`] rather
    /// than reaching the backend.
    pub fn execute_command(&self, command: &str) -> Result<CommandResult, BridgeError> {
        if self.is_destroyed() {
            return Ok(CommandResult {
                output: String::new(),
                error: "debugger has been destroyed".into(),
                succeeded: false,
            });
        }
        self.inner.backend.execute_command(command)
    }

    /// Tear down the debugger. Idempotent.
    pub fn destroy(&self) {
        if !self.inner.destroyed.swap(true, Ordering::SeqCst) {
            self.inner.backend.shutdown();
            tracing::info!("debugger destroyed");
        }
    }

    /// Whether `destroy` has been called.
    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for Debugger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Debugger")
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripted::{ScriptedBackend, ScriptedState};

    fn debugger() -> Debugger {
        Debugger::new(Arc::new(ScriptedBackend::new(ScriptedState::sample())))
    }

    #[test]
    fn create_target_returns_handle() {
        let dbg = debugger();
        let target = dbg.create_target("/bin/demo").unwrap();
        assert_eq!(target.path(), "/bin/demo");
    }

    #[test]
    fn destroy_is_idempotent() {
        let dbg = debugger();
        dbg.destroy();
        dbg.destroy();
        assert!(dbg.is_destroyed());
    }

    #[test]
    fn commands_after_destroy_are_noops() {
        let dbg = debugger();
        dbg.destroy();
        let result = dbg.execute_command("bt").unwrap();
        assert!(!result.succeeded);
        assert!(result.error.contains("destroyed"));
    }

    #[test]
    fn create_target_after_destroy_errors() {
        let dbg = debugger();
        dbg.destroy();
        assert!(matches!(
            dbg.create_target("/bin/demo"),
            Err(BridgeError::Destroyed)
        ));
    }
}
