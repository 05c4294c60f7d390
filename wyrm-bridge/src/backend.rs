//! The [`DebugBackend`] trait — the seam to the underlying debugger.
//!
//! A session owns exactly one target and one process, so the trait is scoped
//! to that pair: threads are addressed by id and frames by index, which keeps
//! the façade views cycle-free (values plus indices, no back references).

use crate::error::BridgeError;
use crate::types::{
    ByteOrder, CommandResult, LineEntry, MemoryRegion, ModuleInfo, ProcessState, RawValue,
    RegisterSet, ResolvedAddress, StopReason, SymbolHit,
};

/// How to create a breakpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BreakpointSpec {
    /// Break on a symbol name, optionally restricted to a module.
    Name {
        /// Function / symbol name.
        name: String,
        /// Optional module restriction.
        module: Option<String>,
    },
    /// Break at an absolute load address.
    Address(u64),
    /// Break on all symbols matching a regex pattern.
    Regex(String),
}

/// A resolved breakpoint location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakpointLocation {
    /// Load address of the location.
    pub address: u64,
    /// Module containing the location, when known.
    pub module: Option<String>,
}

/// Stepping granularity for [`DebugBackend::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepMode {
    /// Step over the current source line.
    Over,
    /// Step into calls on the current source line.
    Into,
    /// Step out of the current function.
    Out,
    /// Step a single machine instruction.
    Instruction,
}

/// Process launch parameters.
#[derive(Debug, Clone, Default)]
pub struct LaunchSpec {
    /// Command-line arguments for the inferior.
    pub args: Vec<String>,
    /// Environment variables in `KEY=VALUE` form.
    pub env: Vec<String>,
    /// Optional stdin redirect path.
    pub stdin: Option<String>,
    /// Optional stdout redirect path.
    pub stdout: Option<String>,
    /// Optional stderr redirect path.
    pub stderr: Option<String>,
    /// Working directory for the launched process.
    pub working_dir: Option<String>,
}

/// Raw debugger operations consumed by the façade.
///
/// Implementations adapt a concrete debugger (LLDB, GDB/MI, a remote stub).
/// All reads are snapshot-oriented: the façade never caches what a backend
/// returns. Implementations must be safe to call from multiple threads; the
/// façade serializes mutations at the session level.
pub trait DebugBackend: Send + Sync {
    // ── lifecycle ───────────────────────────────────────────────────────

    /// Load an executable as the session target.
    fn create_target(&self, path: &str) -> Result<(), BridgeError>;
    /// Attach to a running process by pid.
    fn attach(&self, pid: u64) -> Result<(), BridgeError>;
    /// Attach to a running process by name; returns the pid attached to.
    fn attach_by_name(&self, name: &str) -> Result<u64, BridgeError>;
    /// Launch the loaded target; returns the new pid.
    fn launch(&self, spec: &LaunchSpec) -> Result<u64, BridgeError>;
    /// Execute a raw debugger CLI command.
    fn execute_command(&self, command: &str) -> Result<CommandResult, BridgeError>;
    /// Tear down the backend. Idempotent.
    fn shutdown(&self);

    // ── target ──────────────────────────────────────────────────────────

    /// File path of the target executable.
    fn target_path(&self) -> String;
    /// Target triple (e.g. `arm64-apple-macosx15.0.0`).
    fn triple(&self) -> String;
    /// Target byte order.
    fn byte_order(&self) -> ByteOrder;
    /// Pointer width in bytes (4 or 8).
    fn address_byte_size(&self) -> u32;
    /// Metadata for every loaded module.
    fn modules(&self) -> Vec<ModuleInfo>;
    /// Find functions by exact or substring name match.
    fn find_functions(&self, name: &str) -> Vec<SymbolHit>;
    /// Find symbols by exact or substring name match.
    fn find_symbols(&self, name: &str) -> Vec<SymbolHit>;
    /// Resolve a load address to symbol/module information.
    fn resolve_address(&self, address: u64) -> ResolvedAddress;

    // ── breakpoints ─────────────────────────────────────────────────────

    /// Create a breakpoint; returns its id.
    fn create_breakpoint(&self, spec: &BreakpointSpec) -> Result<u32, BridgeError>;
    /// Whether the breakpoint is enabled.
    fn breakpoint_enabled(&self, id: u32) -> bool;
    /// Enable or disable a breakpoint.
    fn set_breakpoint_enabled(&self, id: u32, enabled: bool);
    /// Number of times the breakpoint has been hit.
    fn breakpoint_hit_count(&self, id: u32) -> u64;
    /// Current condition expression, if any.
    fn breakpoint_condition(&self, id: u32) -> Option<String>;
    /// Set the condition expression.
    fn set_breakpoint_condition(&self, id: u32, condition: &str);
    /// Resolved locations for the breakpoint.
    fn breakpoint_locations(&self, id: u32) -> Vec<BreakpointLocation>;
    /// Delete the breakpoint.
    fn delete_breakpoint(&self, id: u32);

    // ── process ─────────────────────────────────────────────────────────

    /// Current process state.
    fn process_state(&self) -> ProcessState;
    /// Process id.
    fn pid(&self) -> u64;
    /// Exit status, once the process has exited.
    fn exit_status(&self) -> Option<i32>;
    /// Textual description of the exit reason.
    fn exit_description(&self) -> String;
    /// Ids of all threads, in backend order.
    fn thread_ids(&self) -> Vec<u64>;
    /// Id of the selected thread, when one is selected.
    fn selected_thread_id(&self) -> Option<u64>;
    /// Resume execution.
    fn continue_process(&self) -> Result<(), BridgeError>;
    /// Halt the process.
    fn stop_process(&self) -> Result<(), BridgeError>;
    /// Kill the process.
    fn kill_process(&self) -> Result<(), BridgeError>;
    /// Detach from the process.
    fn detach_process(&self) -> Result<(), BridgeError>;
    /// Read bytes from the process address space.
    fn read_memory(&self, address: u64, size: usize) -> Result<Vec<u8>, BridgeError>;
    /// Write bytes into the process address space; returns bytes written.
    fn write_memory(&self, address: u64, data: &[u8]) -> Result<usize, BridgeError>;
    /// Enumerate mapped memory regions.
    fn memory_regions(&self) -> Vec<MemoryRegion>;

    // ── threads ─────────────────────────────────────────────────────────

    /// Thread name, if any.
    fn thread_name(&self, tid: u64) -> Option<String>;
    /// Why the thread is stopped.
    fn stop_reason(&self, tid: u64) -> StopReason;
    /// Number of stack frames.
    fn frame_count(&self, tid: u64) -> usize;
    /// Index of the selected frame.
    fn selected_frame_index(&self, tid: u64) -> usize;
    /// Step the thread.
    fn step(&self, tid: u64, mode: StepMode) -> Result<(), BridgeError>;
    /// Resume the thread until it reaches an address.
    fn run_to_address(&self, tid: u64, address: u64) -> Result<(), BridgeError>;

    // ── frames ──────────────────────────────────────────────────────────

    /// Program counter of a frame.
    fn frame_pc(&self, tid: u64, frame: usize) -> u64;
    /// Stack pointer of a frame.
    fn frame_sp(&self, tid: u64, frame: usize) -> u64;
    /// Frame pointer of a frame.
    fn frame_fp(&self, tid: u64, frame: usize) -> u64;
    /// Function name, when symbolicated.
    fn frame_function_name(&self, tid: u64, frame: usize) -> Option<String>;
    /// Module name for the frame's pc.
    fn frame_module_name(&self, tid: u64, frame: usize) -> Option<String>;
    /// Source location, when debug info is available.
    fn frame_line_entry(&self, tid: u64, frame: usize) -> Option<LineEntry>;
    /// Register sets for the frame.
    fn frame_register_sets(&self, tid: u64, frame: usize) -> Vec<RegisterSet>;
    /// Raw variables visible in the frame.
    fn frame_raw_variables(
        &self,
        tid: u64,
        frame: usize,
        arguments: bool,
        locals: bool,
    ) -> Vec<RawValue>;
    /// Evaluate an expression in the frame context.
    ///
    /// The returned text is opaque; errors render as `error: ...` strings.
    fn evaluate_expression(&self, tid: u64, frame: usize, expression: &str) -> String;
    /// Disassemble instructions starting at the frame's pc.
    fn disassemble(&self, tid: u64, frame: usize, count: usize) -> String;
}
