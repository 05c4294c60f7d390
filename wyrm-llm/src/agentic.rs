//! Agentic delegation — hand the whole reason/act loop to an external
//! SDK-managed agent while tool execution stays in-process.
//!
//! The CLI backend speaks a line-delimited JSON protocol on stdio: the task
//! and tool catalogue go in as the first line, the agent emits `tool_call` /
//! `text` / `done` events, and each tool call is executed locally through the
//! supplied [`ToolExecutor`] with the result written back.

use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;

use crate::error::LlmError;
use crate::types::ToolDefinition;

/// One executed tool call from an agentic run.
#[derive(Debug, Clone, PartialEq)]
pub struct AgenticToolCall {
    /// Tool name.
    pub name: String,
    /// Arguments the agent supplied.
    pub arguments: Value,
    /// Stringified execution result.
    pub result: String,
}

/// Final result from an agentic run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgenticResult {
    /// The agent's final message.
    pub result: String,
    /// Number of tool calls executed.
    pub steps: u32,
    /// Ordered log of executed tool calls.
    pub tool_calls: Vec<AgenticToolCall>,
}

/// Executes one tool call on behalf of the external agent.
pub type ToolExecutor = Arc<dyn Fn(String, Value) -> BoxFuture<'static, String> + Send + Sync>;

/// An SDK-managed agentic backend.
#[async_trait]
pub trait AgenticClient: Send + Sync {
    /// Run an autonomous agent loop, returning the final result and the
    /// ordered tool-call log.
    async fn run_agent(
        &self,
        task: &str,
        tools: &[ToolDefinition],
        executor: ToolExecutor,
        max_iterations: u32,
    ) -> Result<AgenticResult, LlmError>;
}

/// Factory returning the agentic client for `provider`.
pub fn create_agentic_client(
    provider: &str,
    model: Option<String>,
    api_key: Option<String>,
    cli_path: Option<String>,
) -> Result<Arc<dyn AgenticClient>, LlmError> {
    match provider {
        "claude-code" => Ok(Arc::new(CliAgent::new(
            cli_path.unwrap_or_else(|| "claude".into()),
            model,
            api_key,
        ))),
        "codex" => Ok(Arc::new(CliAgent::new(
            cli_path.unwrap_or_else(|| "codex".into()),
            model,
            api_key,
        ))),
        other => Err(LlmError::UnsupportedProvider(other.to_string())),
    }
}

/// Events the external agent writes to stdout, one JSON object per line.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AgentEvent {
    ToolCall {
        #[serde(default)]
        id: Option<String>,
        name: String,
        #[serde(default)]
        arguments: Value,
    },
    Text {
        text: String,
    },
    Done {
        result: String,
    },
}

/// Agentic backend driving an external agent binary over stdio.
pub struct CliAgent {
    binary: String,
    extra_args: Vec<String>,
    model: Option<String>,
    api_key: Option<String>,
}

impl CliAgent {
    /// Create a backend for `binary`.
    pub fn new(binary: impl Into<String>, model: Option<String>, api_key: Option<String>) -> Self {
        Self {
            binary: binary.into(),
            extra_args: Vec::new(),
            model,
            api_key,
        }
    }

    /// Extra arguments passed to the binary (used by tests to stub the
    /// agent with a shell script).
    #[must_use]
    pub fn args(mut self, args: Vec<String>) -> Self {
        self.extra_args = args;
        self
    }

    fn parse_event(line: &str) -> Option<AgentEvent> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        match serde_json::from_str(line) {
            Ok(event) => Some(event),
            Err(err) => {
                tracing::debug!(%err, "ignoring non-event agent output line");
                None
            }
        }
    }
}

#[async_trait]
impl AgenticClient for CliAgent {
    async fn run_agent(
        &self,
        task: &str,
        tools: &[ToolDefinition],
        executor: ToolExecutor,
        max_iterations: u32,
    ) -> Result<AgenticResult, LlmError> {
        let mut command = Command::new(&self.binary);
        command
            .args(&self.extra_args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        if let Some(model) = &self.model {
            command.env("WYRM_AGENT_MODEL", model);
        }
        if let Some(api_key) = &self.api_key {
            command.env("ANTHROPIC_API_KEY", api_key);
        }

        let mut child = command
            .spawn()
            .map_err(|e| LlmError::Agentic(format!("failed to spawn '{}': {e}", self.binary)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| LlmError::Agentic("agent stdin unavailable".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| LlmError::Agentic("agent stdout unavailable".into()))?;

        let intro = json!({
            "type": "task",
            "task": task,
            "tools": tools,
            "max_iterations": max_iterations,
        });
        stdin
            .write_all(format!("{intro}\n").as_bytes())
            .await
            .map_err(|e| LlmError::Agentic(format!("failed to send task: {e}")))?;

        let mut lines = BufReader::new(stdout).lines();
        let mut log: Vec<AgenticToolCall> = Vec::new();
        let mut last_text = String::new();
        let mut final_result: Option<String> = None;

        while let Ok(Some(line)) = lines.next_line().await {
            let Some(event) = Self::parse_event(&line) else {
                continue;
            };
            match event {
                AgentEvent::Text { text } => last_text = text,
                AgentEvent::Done { result } => {
                    final_result = Some(result);
                    break;
                }
                AgentEvent::ToolCall { id, name, arguments } => {
                    let result = executor(name.clone(), arguments.clone()).await;
                    log.push(AgenticToolCall {
                        name,
                        arguments,
                        result: result.clone(),
                    });
                    let reply = json!({
                        "type": "tool_result",
                        "id": id,
                        "content": result,
                    });
                    if stdin
                        .write_all(format!("{reply}\n").as_bytes())
                        .await
                        .is_err()
                    {
                        break;
                    }
                    if log.len() as u32 >= max_iterations {
                        tracing::warn!(max_iterations, "agentic run hit iteration limit");
                        break;
                    }
                }
            }
        }

        let _ = child.kill().await;

        let result = final_result.unwrap_or_else(|| {
            if last_text.is_empty() {
                "Agent completed without explicit result.".into()
            } else {
                last_text
            }
        });
        Ok(AgenticResult {
            result,
            steps: log.len() as u32,
            tool_calls: log,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn executor_returning(text: &'static str) -> ToolExecutor {
        Arc::new(move |_name, _args| Box::pin(async move { text.to_string() }))
    }

    #[test]
    fn parse_event_variants() {
        let call = CliAgent::parse_event(
            r#"{"type":"tool_call","name":"act","arguments":{"instruction":"bt"}}"#,
        )
        .unwrap();
        assert!(matches!(call, AgentEvent::ToolCall { name, .. } if name == "act"));

        let done = CliAgent::parse_event(r#"{"type":"done","result":"ok"}"#).unwrap();
        assert_eq!(
            done,
            AgentEvent::Done {
                result: "ok".into()
            }
        );

        assert!(CliAgent::parse_event("not json").is_none());
        assert!(CliAgent::parse_event("").is_none());
    }

    #[tokio::test]
    async fn run_agent_executes_tool_calls_and_returns_done() {
        let script = r#"
            read task
            echo '{"type":"tool_call","name":"act","arguments":{"instruction":"bt"}}'
            read result
            echo '{"type":"done","result":"finished"}'
        "#;
        let agent =
            CliAgent::new("sh", None, None).args(vec!["-c".into(), script.into()]);
        let result = agent
            .run_agent("triage", &[], executor_returning("frame #0: main"), 10)
            .await
            .unwrap();

        assert_eq!(result.result, "finished");
        assert_eq!(result.steps, 1);
        assert_eq!(result.tool_calls[0].name, "act");
        assert_eq!(result.tool_calls[0].result, "frame #0: main");
    }

    #[tokio::test]
    async fn run_agent_without_done_falls_back_to_text() {
        let script = r#"
            read task
            echo '{"type":"text","text":"partial findings"}'
        "#;
        let agent =
            CliAgent::new("sh", None, None).args(vec!["-c".into(), script.into()]);
        let result = agent
            .run_agent("triage", &[], executor_returning(""), 10)
            .await
            .unwrap();
        assert_eq!(result.result, "partial findings");
        assert_eq!(result.steps, 0);
    }

    #[test]
    fn factory_rejects_unknown_provider() {
        assert!(matches!(
            create_agentic_client("mystery", None, None, None),
            Err(LlmError::UnsupportedProvider(_))
        ));
    }
}
