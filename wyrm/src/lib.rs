#![deny(missing_docs)]
//! # wyrm — AI-driven debugger automation
//!
//! An operator issues natural-language instructions against a live process
//! under a debugger; a language model translates them into concrete debugger
//! operations, wyrm executes them, observes the resulting state, and feeds
//! the observations back to the model.
//!
//! Single import surface: construct a [`Wyrm`] over a debugger backend and
//! drive the four primitives.
//!
//! ```no_run
//! # use std::sync::Arc;
//! # async fn demo(backend: Arc<dyn wyrm::DebugBackend>) -> Result<(), wyrm::SessionError> {
//! let mut wyrm = wyrm::Wyrm::new(wyrm::WyrmConfig::default(), backend)?;
//! wyrm.start("/bin/demo", vec![])?;
//! let result = wyrm.act("set a breakpoint on main and continue").await?;
//! println!("{}", result.output);
//! wyrm.end();
//! # Ok(())
//! # }
//! ```

pub use wyrm_bridge;
pub use wyrm_cache;
pub use wyrm_core;
pub use wyrm_llm;
pub use wyrm_script;

pub use wyrm_bridge::{DebugBackend, Debugger};
pub use wyrm_core::{
    ActResult, AgentStep, ObserveResult, ReplResult, Session, SessionError, WyrmConfig,
    load_config,
};
pub use wyrm_llm::{LlmEvent, LlmEventCallback};
pub use wyrm_script::events::{ExecutionCallback, ExecutionEvent, ExecutionEventType};
pub use wyrm_script::ScriptTool;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use schemars::JsonSchema;
use serde::de::DeserializeOwned;

/// Top-level orchestrator: a [`Session`] plus configuration loading.
pub struct Wyrm {
    session: Session,
}

impl Wyrm {
    /// Create an orchestrator from a config and a debugger backend.
    pub fn new(config: WyrmConfig, backend: Arc<dyn DebugBackend>) -> Result<Self, SessionError> {
        Ok(Self {
            session: Session::new(config, backend, None, None)?,
        })
    }

    /// Create an orchestrator, loading configuration from `wyrm.toml` (or
    /// the given path).
    pub fn from_config_path(
        path: Option<&Path>,
        backend: Arc<dyn DebugBackend>,
    ) -> Result<Self, SessionError> {
        Self::new(load_config(path)?, backend)
    }

    /// Create an orchestrator with event callbacks for UI/telemetry.
    pub fn with_callbacks(
        config: WyrmConfig,
        backend: Arc<dyn DebugBackend>,
        llm_event_callback: Option<LlmEventCallback>,
        execution_callback: Option<ExecutionCallback>,
    ) -> Result<Self, SessionError> {
        Ok(Self {
            session: Session::new(config, backend, llm_event_callback, execution_callback)?,
        })
    }

    /// Create a target and launch it.
    pub fn start(&mut self, target_path: &str, args: Vec<String>) -> Result<(), SessionError> {
        self.session.start(target_path, args)
    }

    /// Attach to a running process by pid.
    pub fn attach(&mut self, pid: u64) -> Result<(), SessionError> {
        self.session.attach(pid)
    }

    /// Attach to a running process by name.
    pub fn attach_by_name(&mut self, name: &str) -> Result<(), SessionError> {
        self.session.attach_by_name(name)
    }

    /// Execute a natural language debugging instruction.
    pub async fn act(&mut self, instruction: &str) -> Result<ActResult, SessionError> {
        self.session.act(instruction).await
    }

    /// Observe the current state and suggest actions.
    pub async fn observe(
        &mut self,
        instruction: Option<&str>,
    ) -> Result<ObserveResult, SessionError> {
        self.session.observe(instruction).await
    }

    /// Extract structured data from the current process state.
    pub async fn extract<T>(&mut self, instruction: &str) -> Result<T, SessionError>
    where
        T: DeserializeOwned + JsonSchema,
    {
        self.session.extract(instruction).await
    }

    /// Run the autonomous agent on a task.
    pub async fn agent(
        &mut self,
        task: &str,
        strategy: Option<&str>,
        max_steps: Option<u32>,
        timeout: Option<Duration>,
    ) -> Result<Vec<AgentStep>, SessionError> {
        self.session.agent(task, strategy, max_steps, timeout).await
    }

    /// Run the REPL agent on a task.
    pub async fn repl_agent(
        &mut self,
        task: &str,
        max_iterations: Option<u32>,
        tools: Vec<ScriptTool>,
        persistent: bool,
    ) -> Result<ReplResult, SessionError> {
        self.session
            .repl_agent(task, max_iterations, tools, persistent)
            .await
    }

    /// End the session and clean up.
    pub fn end(&mut self) {
        self.session.end();
    }
}
