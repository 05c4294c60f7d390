//! Result and response types for the primitives and agents.

use std::collections::BTreeMap;
use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A single debugging action to execute.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Action {
    /// Legacy raw debugger CLI command (kept for backward compatibility).
    #[serde(default)]
    pub command: String,
    /// Script code to execute via the bridge API.
    #[serde(default)]
    pub code: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
}

/// Result of executing one or more actions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActResult {
    /// Whether execution succeeded.
    pub success: bool,
    /// Model reasoning or failure explanation.
    pub message: String,
    /// Actions that were translated.
    pub actions: Vec<Action>,
    /// Combined captured output.
    #[serde(default)]
    pub output: String,
}

/// Result of an observe operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ObserveResult {
    /// Ranked list of suggested actions.
    #[serde(default)]
    pub actions: Vec<Action>,
    /// Overall description of the observed state.
    #[serde(default)]
    pub description: String,
}

/// Structured response from the translate engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TranslateResponse {
    /// Individual actions (multi-step responses).
    #[serde(default)]
    pub actions: Vec<Action>,
    /// Single code block (alternative to the actions list).
    #[serde(default)]
    pub code: String,
    /// Brief explanation of the approach.
    #[serde(default)]
    pub reasoning: String,
}

/// A single step in an agent reasoning loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentStep {
    /// 1-based step number.
    pub step_number: u32,
    /// Action label (tool call rendering, or "think").
    pub action: String,
    /// Observed result.
    pub observation: String,
    /// Model reasoning text, when present.
    #[serde(default)]
    pub reasoning: String,
}

/// One executed code block inside a REPL iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplCodeBlock {
    /// The code fragment.
    pub code: String,
    /// Captured stdout.
    pub stdout: String,
    /// Captured stderr.
    pub stderr: String,
    /// Whether the fragment ran without error.
    pub succeeded: bool,
    /// Execution time.
    pub duration: Duration,
    /// Sub-queries issued by this block.
    pub llm_sub_queries: u32,
}

/// One REPL agent iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplIteration {
    /// 1-based iteration number.
    pub step_number: u32,
    /// The model's raw response text.
    pub llm_response: String,
    /// Code blocks executed this iteration, in order.
    pub code_blocks: Vec<ReplCodeBlock>,
    /// Iteration wall-clock time.
    pub duration: Duration,
}

/// Result of a REPL agent run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplResult {
    /// The `done(...)` message or final output.
    pub result: String,
    /// Number of iterations the agent ran.
    pub steps: u32,
    /// Total code blocks executed.
    pub code_blocks_executed: u32,
    /// User-defined namespace variables, stringified.
    pub variables: BTreeMap<String, String>,
    /// Per-iteration telemetry.
    #[serde(default)]
    pub iterations: Vec<ReplIteration>,
    /// Structured value returned via `final_value(...)`, when used.
    #[serde(default)]
    pub final_value: Option<serde_json::Value>,
}
