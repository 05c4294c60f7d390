//! Process-state snapshots for model consumption.

pub mod builder;
pub mod snapshot;

use serde::{Deserialize, Serialize};

use wyrm_bridge::{MemoryRegion, ModuleInfo, VariableNode};

/// A single CPU register in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterInfo {
    /// Register name.
    pub name: String,
    /// Raw unsigned value.
    pub value: u64,
    /// Width in bytes.
    pub size: u32,
}

/// A single stack frame in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameInfo {
    /// Frame index, innermost first.
    pub index: usize,
    /// Function name, when symbolicated.
    pub function_name: Option<String>,
    /// Module name.
    pub module_name: Option<String>,
    /// Program counter.
    pub pc: u64,
    /// Source file, when debug info is available.
    pub file: Option<String>,
    /// Source line.
    pub line: Option<u32>,
}

/// Stack trace for the selected thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackTrace {
    /// Ordered frames.
    pub frames: Vec<FrameInfo>,
    /// Thread id.
    pub thread_id: u64,
    /// Thread name, if any.
    pub thread_name: Option<String>,
}

/// Immutable rendering of process state captured at one debugger stop.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessSnapshot {
    /// Registers of the current frame.
    pub registers: Vec<RegisterInfo>,
    /// Stack trace of the selected thread.
    pub stack_trace: Option<StackTrace>,
    /// Mapped memory regions, when requested.
    #[serde(default)]
    pub memory_regions: Vec<MemoryRegion>,
    /// Loaded modules.
    #[serde(default)]
    pub modules: Vec<ModuleInfo>,
    /// Disassembly text around the current pc.
    #[serde(default)]
    pub disassembly: String,
    /// Variables with recursive expansion.
    #[serde(default)]
    pub variables: Vec<VariableNode>,
    /// Process state label.
    #[serde(default)]
    pub process_state: String,
    /// Stop reason label.
    #[serde(default)]
    pub stop_reason: String,
    /// Current program counter.
    pub pc: Option<u64>,
    /// Target triple.
    #[serde(default)]
    pub target_triple: String,
}
