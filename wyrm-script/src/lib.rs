//! Sandboxed script engine for wyrm.
//!
//! The model writes short Rhai fragments against the debugger façade. The
//! engine keeps a persistent namespace across fragments, captures output,
//! restores the protected scaffold after every execution, and supports
//! reentrant sub-queries back to the model from inside running code.
//!
//! The sandbox enforces state invariants, not security — fragments are
//! trusted-author, model-written.

pub mod bindings;
pub mod engine;
pub mod error;
pub mod events;
pub mod subquery;

pub use engine::{MAX_OUTPUT_CHARS, ExecOutcome, ReplSignal, ScriptEngine, ScriptTool};
pub use error::ScriptError;
pub use events::{ExecutionCallback, ExecutionEvent, ExecutionEventType};
pub use subquery::{SubQueryHub, SubQueryOptions};
