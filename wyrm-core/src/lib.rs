//! Core orchestration for wyrm.
//!
//! Binds the debugger façade, script engine, provider layer, and cache into
//! the four user-facing primitives — act, observe, extract, agent — plus the
//! REPL agent. A [`session::Session`] owns one debugger, one target, one
//! process, and one cache; callers serialize primitive calls.

pub mod agent;
pub mod config;
pub mod context;
pub mod error;
pub mod primitives;
pub mod session;
pub mod translate;
pub mod types;

/// Execution events are defined next to the script engine that emits most of
/// them; re-exported here for handler callers.
pub mod events {
    pub use wyrm_script::events::{ExecutionCallback, ExecutionEvent, ExecutionEventType};
}

pub use agent::handler::AgentHandler;
pub use agent::repl::{ReplAgent, ReplOptions};
pub use agent::strategies::AgentStrategy;
pub use config::{WyrmConfig, load_config};
pub use context::builder::ContextBuilder;
pub use context::snapshot::capture_snapshot;
pub use context::{FrameInfo, ProcessSnapshot, RegisterInfo, StackTrace};
pub use error::SessionError;
pub use session::Session;
pub use types::{
    Action, ActResult, AgentStep, ObserveResult, ReplCodeBlock, ReplIteration, ReplResult,
    TranslateResponse,
};
