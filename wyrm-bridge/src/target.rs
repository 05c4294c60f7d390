//! The [`Target`] view — executable metadata, symbols, breakpoints, launch.

use std::sync::Arc;

use crate::backend::{BreakpointSpec, DebugBackend, LaunchSpec};
use crate::breakpoint::Breakpoint;
use crate::error::BridgeError;
use crate::process::Process;
use crate::types::{ByteOrder, ModuleInfo, ResolvedAddress, SymbolHit};

/// View onto the session's target executable.
///
/// Cheap to clone; reads go straight to the backend.
#[derive(Clone)]
pub struct Target {
    backend: Arc<dyn DebugBackend>,
}

impl Target {
    pub(crate) fn new(backend: Arc<dyn DebugBackend>) -> Self {
        Self { backend }
    }

    /// File path of the target executable.
    pub fn path(&self) -> String {
        self.backend.target_path()
    }

    /// Target triple (e.g. `x86_64-apple-macosx`).
    pub fn triple(&self) -> String {
        self.backend.triple()
    }

    /// Byte order of the target.
    pub fn byte_order(&self) -> ByteOrder {
        self.backend.byte_order()
    }

    /// Metadata for every loaded module.
    pub fn modules(&self) -> Vec<ModuleInfo> {
        self.backend.modules()
    }

    /// Launch the target and return a [`Process`] view.
    pub fn launch(&self, spec: LaunchSpec) -> Result<Process, BridgeError> {
        let pid = self.backend.launch(&spec)?;
        tracing::info!(pid, "launched target");
        Ok(Process::new(Arc::clone(&self.backend)))
    }

    /// Create a breakpoint on a symbol name, optionally restricted to a module.
    pub fn breakpoint_create_by_name(
        &self,
        name: &str,
        module: Option<&str>,
    ) -> Result<Breakpoint, BridgeError> {
        let id = self.backend.create_breakpoint(&BreakpointSpec::Name {
            name: name.to_string(),
            module: module.map(str::to_string),
        })?;
        Ok(Breakpoint::new(Arc::clone(&self.backend), id))
    }

    /// Create a breakpoint at an absolute address.
    pub fn breakpoint_create_by_address(&self, address: u64) -> Result<Breakpoint, BridgeError> {
        let id = self
            .backend
            .create_breakpoint(&BreakpointSpec::Address(address))?;
        Ok(Breakpoint::new(Arc::clone(&self.backend), id))
    }

    /// Create breakpoints on all symbols matching a regex pattern.
    pub fn breakpoint_create_by_regex(&self, pattern: &str) -> Result<Breakpoint, BridgeError> {
        let id = self
            .backend
            .create_breakpoint(&BreakpointSpec::Regex(pattern.to_string()))?;
        Ok(Breakpoint::new(Arc::clone(&self.backend), id))
    }

    /// Search for functions by name (exact and substring matches).
    pub fn find_functions(&self, name: &str) -> Vec<SymbolHit> {
        self.backend.find_functions(name)
    }

    /// Search for symbols by name (exact and substring matches).
    pub fn find_symbols(&self, name: &str) -> Vec<SymbolHit> {
        self.backend.find_symbols(name)
    }

    /// Resolve a load address to symbol and module information.
    pub fn resolve_address(&self, address: u64) -> ResolvedAddress {
        self.backend.resolve_address(address)
    }

    /// Read memory through the target's process.
    pub fn read_memory(&self, address: u64, size: usize) -> Result<Vec<u8>, BridgeError> {
        self.backend.read_memory(address, size)
    }
}

impl std::fmt::Debug for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Target").field("path", &self.path()).finish()
    }
}
