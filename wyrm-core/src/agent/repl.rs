//! The REPL agent — a stateful multi-turn code-writing agent.
//!
//! Each iteration: call the model, extract fenced ```rhai blocks, execute
//! them in the persistent script namespace, feed stdout/stderr back, repeat
//! until `done`/`final_value` or the iteration budget runs out. History is
//! compacted near the context window and optionally carried across runs.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use regex::Regex;

use wyrm_bridge::{Debugger, Process, Target};
use wyrm_llm::{ChatMessage, LlmClient, Role};
use wyrm_script::events::{ExecutionCallback, ExecutionEvent, ExecutionEventType};
use wyrm_script::{ReplSignal, ScriptEngine, ScriptTool, SubQueryHub, SubQueryOptions};

use crate::agent::logger::ReplLogger;
use crate::agent::prompts::{
    COMPACTION_PROMPT, REPL_NUDGE, REPL_WRAP_UP, format_tools_section, repl_system_prompt,
};
use crate::error::SessionError;
use crate::primitives::run_code;
use crate::types::ReplResult;

/// Messages preserved verbatim at the end of history during compaction.
const COMPACTION_TAIL: usize = 4;

/// Options for constructing a [`ReplAgent`].
pub struct ReplOptions {
    /// Iteration budget.
    pub max_iterations: u32,
    /// Custom tools injected into the namespace.
    pub tools: Vec<ScriptTool>,
    /// Carry chat history across runs.
    pub persistent: bool,
    /// Per-iteration sub-query budget.
    pub sub_query_budget: u32,
    /// Per-call sub-query timeout.
    pub sub_query_timeout: Duration,
    /// Context window size, in tokens.
    pub context_window_tokens: usize,
    /// Compaction triggers past this fraction of the window.
    pub compact_threshold: f64,
    /// Optional JSONL telemetry path.
    pub log_path: Option<PathBuf>,
}

impl Default for ReplOptions {
    fn default() -> Self {
        Self {
            max_iterations: 30,
            tools: Vec::new(),
            persistent: false,
            sub_query_budget: wyrm_script::subquery::DEFAULT_BUDGET,
            sub_query_timeout: wyrm_script::subquery::DEFAULT_TIMEOUT,
            context_window_tokens: 128_000,
            compact_threshold: 0.75,
            log_path: None,
        }
    }
}

/// Multi-turn code-writing agent with live debugger access.
pub struct ReplAgent {
    client: Arc<dyn LlmClient>,
    engine: Arc<Mutex<ScriptEngine>>,
    max_iterations: u32,
    context_window_tokens: usize,
    compact_threshold: f64,
    persistent: bool,
    sub_query_budget: u32,
    history: Vec<ChatMessage>,
    tool_docs: Vec<(String, String)>,
    code_blocks_executed: u32,
    logger: ReplLogger,
    callback: Option<ExecutionCallback>,
}

impl ReplAgent {
    /// Build an agent over live façade handles.
    ///
    /// Must be called from within the session's tokio runtime: script
    /// execution is offloaded to a worker thread and sub-queries marshal
    /// back onto this runtime.
    pub fn new(
        client: Arc<dyn LlmClient>,
        debugger: Debugger,
        target: Target,
        process: Process,
        options: ReplOptions,
        callback: Option<ExecutionCallback>,
    ) -> Result<Self, SessionError> {
        let mut engine = ScriptEngine::new(debugger, target, process, callback.clone());

        let mut sub_query_options =
            SubQueryOptions::new(Arc::clone(&client), tokio::runtime::Handle::current());
        sub_query_options.budget = options.sub_query_budget;
        sub_query_options.timeout = options.sub_query_timeout;
        sub_query_options.callback = callback.clone();
        engine.install_repl_scaffold(Some(Arc::new(SubQueryHub::new(sub_query_options))));

        let tool_docs = engine.inject_tools(options.tools)?;

        Ok(Self {
            client,
            engine: Arc::new(Mutex::new(engine)),
            max_iterations: options.max_iterations,
            context_window_tokens: options.context_window_tokens,
            compact_threshold: options.compact_threshold,
            persistent: options.persistent,
            sub_query_budget: options.sub_query_budget,
            history: Vec::new(),
            tool_docs,
            code_blocks_executed: 0,
            logger: ReplLogger::new(options.log_path),
            callback,
        })
    }

    fn emit(&self, event: ExecutionEvent) {
        if let Some(callback) = &self.callback {
            callback(&event);
        }
    }

    fn with_engine<R>(
        &self,
        f: impl FnOnce(&mut ScriptEngine) -> R,
    ) -> Result<R, SessionError> {
        let mut engine = self
            .engine
            .lock()
            .map_err(|_| SessionError::Task("script engine lock poisoned".into()))?;
        Ok(f(&mut engine))
    }

    /// Main loop: prompt, extract code, execute, feed back, repeat.
    pub async fn run(&mut self, task: &str) -> Result<ReplResult, SessionError> {
        self.code_blocks_executed = 0;
        let tools_section = format_tools_section(&self.tool_docs);
        let system_prompt = repl_system_prompt(task, self.sub_query_budget, &tools_section);

        let mut messages: Vec<ChatMessage> = if self.persistent && !self.history.is_empty() {
            let mut carried = self.history.clone();
            carried.push(ChatMessage::user(format!(
                "Begin working on the new task:\n{task}"
            )));
            carried
        } else {
            vec![
                ChatMessage::system(system_prompt),
                ChatMessage::user(format!("Begin working on the task:\n{task}")),
            ]
        };

        for step in 1..=self.max_iterations {
            let budget = (self.context_window_tokens as f64 * self.compact_threshold) as usize;
            if estimate_history_tokens(&messages) > budget {
                self.compact(&mut messages).await?;
            }

            self.with_engine(|engine| engine.reset_sub_queries())?;
            self.emit(
                ExecutionEvent::new(ExecutionEventType::ReplStep).with_metadata(
                    serde_json::json!({"step": step, "max_iterations": self.max_iterations}),
                ),
            );

            let response = self.client.chat(&messages, None).await?;
            let content = response.content;
            self.emit(
                ExecutionEvent::new(ExecutionEventType::LlmResponse)
                    .with_metadata(serde_json::json!({"content": content, "step": step})),
            );
            messages.push(ChatMessage::assistant(content.clone()));

            let blocks = extract_code_blocks(&content);
            if blocks.is_empty() {
                // Thinking without code — nudge and move on.
                messages.push(ChatMessage::user(REPL_NUDGE));
                continue;
            }

            self.logger.begin_iteration(step, &content);
            let mut signal: Option<ReplSignal> = None;
            let mut result_parts: Vec<String> = Vec::new();
            let mut sub_queries_before = 0;

            for code in &blocks {
                self.logger.begin_code_block();
                let outcome = run_code(Arc::clone(&self.engine), code.clone()).await?;
                let sub_queries_now = self.with_engine(|engine| engine.sub_query_count())?;
                let delta = sub_queries_now.saturating_sub(sub_queries_before);
                sub_queries_before = sub_queries_now;
                self.logger.end_code_block(
                    code,
                    &outcome.stdout,
                    &outcome.stderr,
                    outcome.success,
                    delta,
                );
                self.code_blocks_executed += 1;

                let mut part = format!("```rhai\n{code}```\n");
                let stdout = outcome.stdout.trim();
                let stderr = outcome.stderr.trim();
                if !stdout.is_empty() {
                    part.push_str(&format!("stdout:\n```\n{stdout}\n```\n"));
                }
                if !stderr.is_empty() {
                    part.push_str(&format!("stderr:\n```\n{stderr}\n```\n"));
                }
                if stdout.is_empty() && stderr.is_empty() {
                    part.push_str("(no output)\n");
                }
                result_parts.push(part);

                signal = self.with_engine(|engine| engine.take_signal())?;
                if signal.is_some() {
                    break;
                }
            }

            self.logger.end_iteration();

            let mut feedback = format!("Execution results:\n\n{}", result_parts.join("\n"));
            let remaining = self.max_iterations - step;
            if remaining <= 2 && signal.is_none() {
                feedback.push_str(&format!("\n\n{REPL_WRAP_UP}"));
            }
            messages.push(ChatMessage::user(feedback));

            if let Some(signal) = signal {
                let (result_text, final_value) = match signal {
                    ReplSignal::Done(text) => (text, None),
                    ReplSignal::FinalValue { value, .. } => (value.to_string(), Some(value)),
                };
                if self.persistent {
                    self.history = messages;
                }
                return Ok(ReplResult {
                    result: result_text,
                    steps: step,
                    code_blocks_executed: self.code_blocks_executed,
                    variables: self.with_engine(|engine| engine.user_variables())?,
                    iterations: self.logger.iterations(),
                    final_value,
                });
            }
        }

        if self.persistent {
            self.history = messages;
        }
        Ok(ReplResult {
            result: "Max iterations reached without done() being called.".into(),
            steps: self.max_iterations,
            code_blocks_executed: self.code_blocks_executed,
            variables: self.with_engine(|engine| engine.user_variables())?,
            iterations: self.logger.iterations(),
            final_value: None,
        })
    }

    /// Replace everything between the system prompt and the last few
    /// messages with a model-produced summary of the removed span.
    async fn compact(&self, messages: &mut Vec<ChatMessage>) -> Result<(), SessionError> {
        if messages.len() <= COMPACTION_TAIL + 1 {
            return Ok(());
        }
        let tail_start = messages.len() - COMPACTION_TAIL;
        let transcript = messages[1..tail_start]
            .iter()
            .map(|message| format!("[{}] {}", role_label(message.role), message.content))
            .collect::<Vec<_>>()
            .join("\n");

        let summary_request = vec![
            ChatMessage::system(COMPACTION_PROMPT),
            ChatMessage::user(transcript),
        ];
        let summary = self.client.chat(&summary_request, None).await?;
        tracing::debug!(
            removed = tail_start - 1,
            "compacted REPL history into summary"
        );

        let mut compacted = vec![messages[0].clone()];
        compacted.push(ChatMessage::user(format!(
            "Summary of earlier debugging work:\n{}",
            summary.content
        )));
        compacted.extend_from_slice(&messages[tail_start..]);
        *messages = compacted;
        Ok(())
    }
}

fn role_label(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    }
}

/// Character-based token estimate over a message list.
fn estimate_history_tokens(messages: &[ChatMessage]) -> usize {
    messages.iter().map(|m| m.content.len()).sum::<usize>() / 4
}

/// Extract fenced ```rhai code blocks from a model response.
pub fn extract_code_blocks(text: &str) -> Vec<String> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN
        .get_or_init(|| Regex::new(r"(?s)```rhai\s*\n(.*?)```").expect("valid code-block regex"));
    pattern
        .captures_iter(text)
        .map(|captures| captures[1].to_string())
        .collect()
}
