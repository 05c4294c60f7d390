#![deny(missing_docs)]
//! Typed debugger façade for wyrm.
//!
//! The façade presents snapshot-oriented reads over a live debugged process:
//! [`Debugger`] owns the connection, [`Target`] / [`Process`] / [`Thread`] /
//! [`Frame`] are cheap views refreshed from the backend on every access, and
//! [`Breakpoint`] wraps mutation of stop points. All state flows through the
//! [`DebugBackend`] trait — the seam where a real LLDB/GDB adapter plugs in.
//! The backend implementation itself is out of scope here; tests use the
//! scripted in-memory backend behind the `test-utils` feature.

pub mod backend;
pub mod breakpoint;
pub mod debugger;
pub mod error;
pub mod frame;
pub mod memory;
pub mod process;
pub mod resolver;
pub mod target;
pub mod thread;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod scripted;

pub use backend::{DebugBackend, LaunchSpec, StepMode};
pub use breakpoint::{Breakpoint, BreakpointHit};
pub use debugger::Debugger;
pub use error::BridgeError;
pub use frame::Frame;
pub use process::Process;
pub use resolver::{SymbolMatch, SymbolResolver};
pub use target::Target;
pub use thread::Thread;
pub use types::{
    ByteOrder, CommandResult, LineEntry, MemoryRegion, ModuleInfo, ProcessState, RawValue,
    RegisterSet, RegisterValue, ResolvedAddress, StopReason, SymbolHit, VariableNode,
};

#[cfg(any(test, feature = "test-utils"))]
pub use scripted::{ScriptedBackend, ScriptedFrame, ScriptedState, ScriptedThread};
