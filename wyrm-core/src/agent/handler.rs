//! The tool-loop agent — autonomous debugging via tool calls.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;

use wyrm_bridge::{Debugger, Process, Target};
use wyrm_llm::{ChatMessage, LlmClient};

use crate::agent::strategies::AgentStrategy;
use crate::agent::tools::agent_tools;
use crate::context::builder::ContextBuilder;
use crate::error::SessionError;
use crate::translate::prompts::agent_system_prompt;
use crate::types::AgentStep;

/// Autonomous debugging agent iterating observe -> act -> reason cycles via
/// tool calls.
///
/// For every assistant response carrying N tool calls, exactly N tool-result
/// messages are appended — one per call id, in order — before the next
/// model call.
pub struct AgentHandler {
    client: Arc<dyn LlmClient>,
    debugger: Debugger,
    target: Target,
    process: Process,
    strategy: AgentStrategy,
    max_steps: u32,
    timeout: Duration,
    builder: ContextBuilder,
}

impl AgentHandler {
    /// Create a handler bound to a live target/process.
    pub fn new(
        client: Arc<dyn LlmClient>,
        debugger: Debugger,
        target: Target,
        process: Process,
        strategy: AgentStrategy,
        max_steps: u32,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            debugger,
            target,
            process,
            strategy,
            max_steps,
            timeout,
            builder: ContextBuilder::default(),
        }
    }

    /// Run the agent loop until `done`, the step limit, or the timeout.
    pub async fn run(&self, task: &str) -> Result<Vec<AgentStep>, SessionError> {
        let system_prompt = agent_system_prompt(
            self.strategy.label(),
            self.strategy.description(),
            task,
            self.max_steps,
        );
        let mut messages = vec![ChatMessage::system(system_prompt)];

        let snapshot = self.builder.build(&self.process, &self.target, None, false, 20);
        let context_text = self.builder.format_for_prompt(&snapshot);
        messages.push(ChatMessage::user(format!(
            "Current process state:\n{context_text}\n\nBegin working on the task."
        )));

        let tools = agent_tools();
        let mut steps: Vec<AgentStep> = Vec::new();
        let started = Instant::now();

        for step_number in 1..=self.max_steps {
            if started.elapsed() > self.timeout {
                tracing::warn!(elapsed = ?started.elapsed(), "agent timeout");
                break;
            }

            let response = self.client.chat(&messages, Some(&tools)).await?;

            let Some(tool_calls) = response.tool_calls.clone().filter(|c| !c.is_empty()) else {
                // Text-only turn: record it as thinking and nudge.
                steps.push(AgentStep {
                    step_number,
                    action: "think".into(),
                    observation: response.content.clone(),
                    reasoning: response.content.clone(),
                });
                messages.push(ChatMessage::assistant(response.content));
                messages.push(ChatMessage::user(
                    "Continue with the task. Use tools to make progress.",
                ));
                continue;
            };

            let mut done = false;
            let mut results: Vec<(String, String)> = Vec::new();
            for call in &tool_calls {
                let result = self.execute_tool(&call.name, &call.arguments).await;
                steps.push(AgentStep {
                    step_number,
                    action: format!("{}({})", call.name, call.arguments),
                    observation: result.clone(),
                    reasoning: response.content.clone(),
                });
                results.push((call.id.clone(), result));
                if call.name == "done" {
                    done = true;
                }
            }

            if done {
                return Ok(steps);
            }

            // One assistant message with all calls, then one tool result per
            // call id, in matching order.
            messages.push(ChatMessage::assistant_with_tools(
                response.content,
                tool_calls,
            ));
            for (call_id, result) in results {
                messages.push(ChatMessage::tool(result, call_id));
            }

            let snapshot = self.builder.build(&self.process, &self.target, None, false, 20);
            let context_text = self.builder.format_for_prompt(&snapshot);
            messages.push(ChatMessage::user(format!(
                "Updated process state:\n{context_text}"
            )));
        }

        Ok(steps)
    }

    /// Execute one catalogue tool, stringifying every outcome so the model
    /// can react to failures.
    pub async fn execute_tool(&self, name: &str, args: &Value) -> String {
        match self.dispatch_tool(name, args).await {
            Ok(result) => result,
            Err(err) => format!("Error executing {name}: {err}"),
        }
    }

    async fn dispatch_tool(&self, name: &str, args: &Value) -> Result<String, SessionError> {
        match name {
            "act" => {
                let instruction = args["instruction"].as_str().unwrap_or_default();
                let result = self.debugger.execute_command(instruction)?;
                if result.succeeded {
                    Ok(result.output)
                } else {
                    Ok(format!("Error: {}", result.error))
                }
            }
            "set_breakpoint" => {
                let location = args["location"].as_str().unwrap_or_default();
                let breakpoint = if let Some(hex) = location.strip_prefix("0x") {
                    let address = u64::from_str_radix(hex, 16)
                        .map_err(|e| SessionError::Task(format!("bad address: {e}")))?;
                    self.target.breakpoint_create_by_address(address)?
                } else {
                    self.target.breakpoint_create_by_name(location, None)?
                };
                Ok(format!("Breakpoint {} set at {location}", breakpoint.id()))
            }
            "read_memory" => {
                let address_text = args["address"].as_str().unwrap_or_default();
                let address =
                    u64::from_str_radix(address_text.trim_start_matches("0x"), 16)
                        .map_err(|e| SessionError::Task(format!("bad address: {e}")))?;
                let size = args["size"].as_u64().unwrap_or(64) as usize;
                let data = self.process.read_memory(address, size)?;
                let formatted = data
                    .iter()
                    .map(|byte| format!("{byte:02x}"))
                    .collect::<Vec<_>>()
                    .join(" ");
                Ok(format!("Memory at {address_text} ({size} bytes):\n{formatted}"))
            }
            "step" => {
                let mode = args["mode"].as_str().unwrap_or("over");
                let Some(thread) = self.process.selected_thread() else {
                    return Ok("Error: no selected thread".into());
                };
                match mode {
                    "into" => thread.step_into()?,
                    "out" => thread.step_out()?,
                    "instruction" => thread.step_instruction()?,
                    _ => thread.step_over()?,
                }
                Ok(format!("Stepped {mode}"))
            }
            "continue_execution" => {
                self.process.continue_()?;
                Ok(format!(
                    "Process continued, state: {}",
                    self.process.state().label()
                ))
            }
            "evaluate" => {
                let expression = args["expression"].as_str().unwrap_or_default();
                let Some(thread) = self.process.selected_thread() else {
                    return Ok("Error: no selected thread".into());
                };
                let result = thread.selected_frame().evaluate_expression(expression);
                Ok(format!("Result: {result}"))
            }
            "done" => Ok(args["result"]
                .as_str()
                .unwrap_or("Task completed")
                .to_string()),
            other => Ok(format!("Unknown tool: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wyrm_bridge::{ScriptedBackend, ScriptedState};
    use wyrm_llm::{LlmResponse, MockClient, Role, ToolCall};

    fn tool_call(id: &str, name: &str, args: Value) -> ToolCall {
        ToolCall {
            id: id.into(),
            name: name.into(),
            arguments: args,
        }
    }

    fn tool_use_response(calls: Vec<ToolCall>) -> LlmResponse {
        LlmResponse {
            content: "working".into(),
            tool_calls: Some(calls),
            usage: None,
        }
    }

    fn handler(client: Arc<MockClient>) -> AgentHandler {
        let backend = Arc::new(ScriptedBackend::new(ScriptedState::sample()));
        let debugger = Debugger::new(backend);
        let (target, process) = debugger.attach(4242).unwrap();
        AgentHandler::new(
            client,
            debugger,
            target,
            process,
            AgentStrategy::DepthFirst,
            10,
            Duration::from_secs(60),
        )
    }

    #[tokio::test]
    async fn multi_call_turn_appends_matching_tool_results() {
        let client = Arc::new(MockClient::with_responses(vec![
            tool_use_response(vec![
                tool_call("tc_1", "act", json!({"instruction": "bt"})),
                tool_call("tc_2", "step", json!({"mode": "instruction"})),
                tool_call("tc_3", "act", json!({"instruction": "reg read"})),
            ]),
            tool_use_response(vec![tool_call("tc_4", "done", json!({"result": "all clear"}))]),
        ]));
        let agent = handler(client.clone());

        let steps = agent.run("inspect the stop").await.unwrap();
        assert_eq!(steps.len(), 4);
        assert_eq!(steps[3].observation, "all clear");

        // The second request must contain one tool message per call id, in
        // order, directly after the assistant message that carried them.
        let requests = client.requests.lock().unwrap();
        let second = &requests[1];
        let assistant_index = second
            .iter()
            .position(|m| m.role == Role::Assistant && m.tool_calls.is_some())
            .unwrap();
        let ids: Vec<Option<&str>> = second[assistant_index + 1..assistant_index + 4]
            .iter()
            .map(|m| {
                assert_eq!(m.role, Role::Tool);
                m.tool_call_id.as_deref()
            })
            .collect();
        assert_eq!(ids, vec![Some("tc_1"), Some("tc_2"), Some("tc_3")]);
    }

    #[tokio::test]
    async fn text_only_turn_yields_think_step_and_nudge() {
        let client = Arc::new(MockClient::with_responses(vec![
            LlmResponse {
                content: "Let me reason about this first.".into(),
                tool_calls: None,
                usage: None,
            },
            tool_use_response(vec![tool_call("tc_1", "done", json!({"result": "ok"}))]),
        ]));
        let agent = handler(client.clone());

        let steps = agent.run("think then stop").await.unwrap();
        assert_eq!(steps[0].action, "think");

        let requests = client.requests.lock().unwrap();
        let second = &requests[1];
        assert!(second
            .iter()
            .any(|m| m.content.contains("Use tools to make progress")));
    }

    #[tokio::test]
    async fn snapshot_refresh_follows_tool_results() {
        let client = Arc::new(MockClient::with_responses(vec![
            tool_use_response(vec![tool_call("tc_1", "step", json!({}))]),
            tool_use_response(vec![tool_call("tc_2", "done", json!({"result": "ok"}))]),
        ]));
        let agent = handler(client.clone());
        agent.run("step once").await.unwrap();

        let requests = client.requests.lock().unwrap();
        let second = &requests[1];
        assert!(second
            .iter()
            .any(|m| m.content.starts_with("Updated process state:")));
    }

    #[tokio::test]
    async fn step_limit_bounds_the_loop() {
        // Model never calls done; it always asks for a step.
        let responses: Vec<LlmResponse> = (0..10)
            .map(|i| tool_use_response(vec![tool_call(&format!("tc_{i}"), "step", json!({}))]))
            .collect();
        let client = Arc::new(MockClient::with_responses(responses));
        let backend = Arc::new(ScriptedBackend::new(ScriptedState::sample()));
        let debugger = Debugger::new(backend);
        let (target, process) = debugger.attach(4242).unwrap();
        let agent = AgentHandler::new(
            client,
            debugger,
            target,
            process,
            AgentStrategy::BreadthFirst,
            3,
            Duration::from_secs(60),
        );

        let steps = agent.run("loop forever").await.unwrap();
        assert_eq!(steps.len(), 3);
    }

    #[tokio::test]
    async fn tools_execute_against_the_facade() {
        let client = Arc::new(MockClient::with_texts(vec![]));
        let agent = handler(client);

        let bp = agent
            .execute_tool("set_breakpoint", &json!({"location": "main"}))
            .await;
        assert!(bp.contains("Breakpoint"));
        assert!(bp.contains("main"));

        let bad = agent
            .execute_tool("set_breakpoint", &json!({"location": "no_such_symbol"}))
            .await;
        assert!(bad.starts_with("Error executing set_breakpoint"));

        let memory = agent
            .execute_tool("read_memory", &json!({"address": "0x20000000", "size": 4}))
            .await;
        assert!(memory.contains("00 00 00 00"));

        let unknown = agent.execute_tool("teleport", &json!({})).await;
        assert_eq!(unknown, "Unknown tool: teleport");
    }
}
