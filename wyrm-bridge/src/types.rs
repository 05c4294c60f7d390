//! Bridge-level types mapping debugger concepts to clean Rust values.

use serde::{Deserialize, Serialize};

/// Execution state of the debugged process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessState {
    /// State could not be determined.
    Invalid,
    /// Target exists but nothing is loaded.
    Unloaded,
    /// Connected to a remote debug server.
    Connected,
    /// Attach in progress.
    Attaching,
    /// Launch in progress.
    Launching,
    /// Stopped at a debugger stop.
    Stopped,
    /// Running freely.
    Running,
    /// Single-step in progress.
    Stepping,
    /// Stopped due to a crash.
    Crashed,
    /// Debugger detached.
    Detached,
    /// Process has exited.
    Exited,
    /// Suspended by the OS.
    Suspended,
}

impl ProcessState {
    /// Human-readable label, used in snapshots and prompts.
    pub fn label(&self) -> &'static str {
        match self {
            ProcessState::Invalid => "invalid",
            ProcessState::Unloaded => "unloaded",
            ProcessState::Connected => "connected",
            ProcessState::Attaching => "attaching",
            ProcessState::Launching => "launching",
            ProcessState::Stopped => "stopped",
            ProcessState::Running => "running",
            ProcessState::Stepping => "stepping",
            ProcessState::Crashed => "crashed",
            ProcessState::Detached => "detached",
            ProcessState::Exited => "exited",
            ProcessState::Suspended => "suspended",
        }
    }
}

/// Why a thread is stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Reason could not be determined.
    Invalid,
    /// Thread is not stopped for any particular reason.
    None,
    /// Stopped by a trace/single-step event.
    Trace,
    /// Stopped at a breakpoint.
    Breakpoint,
    /// Stopped at a watchpoint.
    Watchpoint,
    /// Stopped by a signal.
    Signal,
    /// Stopped by a hardware or language exception.
    Exception,
    /// Stopped across an exec.
    Exec,
    /// A thread plan (step) completed.
    PlanComplete,
    /// Thread is exiting.
    ThreadExiting,
    /// Stopped by instrumentation (sanitizers).
    Instrumentation,
}

impl StopReason {
    /// Human-readable label, used in snapshots and prompts.
    pub fn label(&self) -> &'static str {
        match self {
            StopReason::Invalid => "invalid",
            StopReason::None => "none",
            StopReason::Trace => "trace",
            StopReason::Breakpoint => "breakpoint",
            StopReason::Watchpoint => "watchpoint",
            StopReason::Signal => "signal",
            StopReason::Exception => "exception",
            StopReason::Exec => "exec",
            StopReason::PlanComplete => "plan_complete",
            StopReason::ThreadExiting => "thread_exiting",
            StopReason::Instrumentation => "instrumentation",
        }
    }
}

/// Byte order of the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ByteOrder {
    /// Little-endian.
    Little,
    /// Big-endian.
    Big,
}

/// A single register name/value pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterValue {
    /// Register name (e.g. `x0`, `rip`).
    pub name: String,
    /// Raw unsigned value.
    pub value: u64,
    /// Register width in bytes.
    pub size: u32,
}

/// A named group of registers as reported by the backend.
///
/// [`crate::Frame::registers`] flattens these into a single ordered list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterSet {
    /// Set name (e.g. "General Purpose Registers").
    pub name: String,
    /// Registers in the set, in backend order.
    pub registers: Vec<RegisterValue>,
}

/// Raw variable value as reported by the backend, before expansion.
///
/// The façade walks this tree applying the depth / child-count bounds and the
/// pointer-dereference rule to produce [`VariableNode`]s.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawValue {
    /// Variable or field name.
    pub name: String,
    /// Type name as printed by the debugger.
    pub type_name: String,
    /// Printed value (may be empty for aggregates).
    pub value: String,
    /// Load address, when the value lives in memory.
    pub address: Option<u64>,
    /// Size in bytes, when known.
    pub size: Option<u64>,
    /// Whether this value has pointer type class.
    pub is_pointer: bool,
    /// Direct children (struct fields, array elements, synthetic pointees).
    pub children: Vec<RawValue>,
    /// Result of dereferencing a pointer one step, when it succeeded.
    pub pointee: Option<Box<RawValue>>,
}

/// A variable expanded for model consumption.
///
/// Children are expanded depth-first to a bounded depth so the model sees
/// struct fields rather than opaque pointer addresses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableNode {
    /// Variable or field name.
    pub name: String,
    /// Type name as printed by the debugger.
    pub type_name: String,
    /// Printed value.
    pub value: String,
    /// Load address, when the value lives in memory.
    pub address: Option<u64>,
    /// Size in bytes, when known.
    pub size: Option<u64>,
    /// Expanded children.
    pub children: Vec<VariableNode>,
}

/// Describes a contiguous region of process memory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryRegion {
    /// First address of the region.
    pub start: u64,
    /// One past the last address of the region.
    pub end: u64,
    /// Region is readable.
    pub readable: bool,
    /// Region is writable.
    pub writable: bool,
    /// Region is executable.
    pub executable: bool,
    /// Region name (mapped file, `[heap]`, ...), when known.
    pub name: Option<String>,
}

/// Metadata about a loaded shared library or executable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleInfo {
    /// File name of the module.
    pub name: String,
    /// Full path on disk.
    pub path: String,
    /// Build UUID, when available.
    pub uuid: Option<String>,
    /// Load base address.
    pub base_address: u64,
}

/// Source location for a frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineEntry {
    /// Source file path.
    pub file: String,
    /// 1-based line number.
    pub line: u32,
    /// 1-based column, when known.
    pub column: Option<u32>,
}

/// A function or symbol lookup hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolHit {
    /// Symbol name.
    pub name: String,
    /// Load address of the symbol start.
    pub address: u64,
    /// Module the symbol belongs to.
    pub module: String,
}

/// Result of resolving a load address to symbol information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedAddress {
    /// The queried address.
    pub address: u64,
    /// Enclosing symbol name, when resolved.
    pub symbol: Option<String>,
    /// Module containing the address, when resolved.
    pub module: Option<String>,
    /// Offset from the symbol start.
    pub offset: u64,
}

/// The result of executing a raw debugger CLI command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    /// Captured command output.
    pub output: String,
    /// Captured error text.
    pub error: String,
    /// Whether the command succeeded.
    pub succeeded: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn process_state_labels_are_lowercase() {
        assert_eq!(ProcessState::Stopped.label(), "stopped");
        assert_eq!(ProcessState::Crashed.label(), "crashed");
    }

    #[test]
    fn stop_reason_serde_roundtrip() {
        for reason in [
            StopReason::Breakpoint,
            StopReason::Signal,
            StopReason::PlanComplete,
        ] {
            let json = serde_json::to_string(&reason).unwrap();
            let back: StopReason = serde_json::from_str(&json).unwrap();
            assert_eq!(reason, back);
        }
    }

    #[test]
    fn variable_node_serializes_children() {
        let node = VariableNode {
            name: "ctx".into(),
            type_name: "ImageCtx *".into(),
            value: "0x1000".into(),
            address: Some(0x7fff_0000),
            size: Some(8),
            children: vec![VariableNode {
                name: "palette_size".into(),
                type_name: "int".into(),
                value: "256".into(),
                address: None,
                size: Some(4),
                children: vec![],
            }],
        };
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["children"][0]["name"], "palette_size");
    }
}
