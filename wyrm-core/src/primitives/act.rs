//! The act handler — natural language in, executed code out, with
//! self-healing on failure.

use std::sync::{Arc, Mutex};

use wyrm_bridge::{Debugger, Process, Target};
use wyrm_cache::{ContentCache, key_from_parts};
use wyrm_llm::LlmClient;
use wyrm_script::events::{ExecutionCallback, ExecutionEvent, ExecutionEventType};
use wyrm_script::ScriptEngine;

use crate::context::builder::ContextBuilder;
use crate::error::SessionError;
use crate::primitives::{combine_output, run_code};
use crate::translate::TranslateEngine;
use crate::types::{ActResult, TranslateResponse};

/// Translates natural-language instructions into script code and executes
/// them against the live process.
///
/// Pipeline: snapshot -> cache probe -> translate -> execute -> (heal) ->
/// cache on success.
pub struct ActHandler {
    translate: TranslateEngine,
    builder: ContextBuilder,
    engine: Arc<Mutex<ScriptEngine>>,
    target: Target,
    process: Process,
    self_heal: bool,
    max_retries: u32,
    callback: Option<ExecutionCallback>,
    cache: Option<Arc<ContentCache>>,
}

impl ActHandler {
    /// Create a handler bound to a live target/process.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        client: Arc<dyn LlmClient>,
        debugger: Debugger,
        target: Target,
        process: Process,
        self_heal: bool,
        max_retries: u32,
        callback: Option<ExecutionCallback>,
        cache: Option<Arc<ContentCache>>,
    ) -> Self {
        let engine = ScriptEngine::new(
            debugger,
            target.clone(),
            process.clone(),
            callback.clone(),
        );
        Self {
            translate: TranslateEngine::new(client, None, callback.clone()),
            builder: ContextBuilder::default(),
            engine: Arc::new(Mutex::new(engine)),
            target,
            process,
            self_heal,
            max_retries,
            callback,
            cache,
        }
    }

    fn emit(&self, event: ExecutionEvent) {
        if let Some(callback) = &self.callback {
            callback(&event);
        }
    }

    /// Resolve executable code from a translate response.
    ///
    /// Prefers the top-level `code` field, falls back to joining action code
    /// fields, and wraps legacy CLI commands through the raw-command entry
    /// point.
    fn resolve_code(response: &TranslateResponse) -> String {
        if !response.code.is_empty() {
            return response.code.clone();
        }
        let parts: Vec<String> = response
            .actions
            .iter()
            .filter_map(|action| {
                if !action.code.is_empty() {
                    Some(action.code.clone())
                } else if !action.command.is_empty() {
                    Some(format!(
                        "print(debugger.execute_command({:?}).output)",
                        action.command
                    ))
                } else {
                    None
                }
            })
            .collect();
        parts.join("\n")
    }

    /// Execute a natural language debugging instruction.
    pub async fn act(&self, instruction: &str) -> Result<ActResult, SessionError> {
        let snapshot = self.builder.build(&self.process, &self.target, None, false, 20);
        let context_text = self.builder.format_for_prompt(&snapshot);

        let key = key_from_parts(&[instruction, &context_text, "act"]);
        if let Some(cache) = &self.cache {
            if let Some(cached) = cache.get_by_key(&key) {
                match serde_json::from_value::<ActResult>(cached) {
                    Ok(result) => {
                        tracing::info!(key, "act cache hit");
                        self.emit(
                            ExecutionEvent::new(ExecutionEventType::CacheHit)
                                .with_metadata(serde_json::json!({"key": key})),
                        );
                        return Ok(result);
                    }
                    Err(err) => {
                        tracing::warn!(key, %err, "ignoring malformed act cache entry");
                    }
                }
            }
        }

        let response = self.translate.translate(instruction, &context_text).await?;

        if !response.reasoning.is_empty() {
            self.emit(
                ExecutionEvent::new(ExecutionEventType::LlmResponse)
                    .with_metadata(serde_json::json!({"content": response.reasoning})),
            );
        }

        let code = Self::resolve_code(&response);
        if code.is_empty() {
            return Ok(ActResult {
                success: false,
                message: "No code generated from instruction".into(),
                actions: response.actions,
                output: String::new(),
            });
        }

        let outcome = run_code(Arc::clone(&self.engine), code.clone()).await?;

        if !outcome.success && self.self_heal {
            if let Some(healed) = self
                .try_heal(instruction, &code, &outcome.stderr)
                .await?
            {
                if let Some(cache) = &self.cache {
                    if let Ok(value) = serde_json::to_value(&healed) {
                        cache.set_by_key(&key, &value);
                    }
                }
                return Ok(healed);
            }
        }

        let result = ActResult {
            success: outcome.success,
            message: response.reasoning,
            actions: response.actions,
            output: combine_output(&outcome.stdout, &outcome.stderr),
        };

        if result.success {
            if let Some(cache) = &self.cache {
                if let Ok(value) = serde_json::to_value(&result) {
                    cache.set_by_key(&key, &value);
                }
            }
        }

        Ok(result)
    }

    /// Bounded re-prompt loop after a failed execution.
    ///
    /// Each attempt re-captures the snapshot, embeds the failed code and its
    /// stderr into the instruction, and asks for a different approach.
    async fn try_heal(
        &self,
        original_instruction: &str,
        failed_code: &str,
        error: &str,
    ) -> Result<Option<ActResult>, SessionError> {
        let mut failed_code = failed_code.to_string();
        let mut error = error.to_string();

        for attempt in 1..=self.max_retries {
            tracing::info!(attempt, max = self.max_retries, "self-heal attempt");
            let mut start = ExecutionEvent::new(ExecutionEventType::HealStart)
                .with_code(failed_code.clone())
                .with_metadata(
                    serde_json::json!({"attempt": attempt, "max_retries": self.max_retries}),
                );
            start.stderr = error.clone();
            self.emit(start);

            // Debugger state may have changed since the failed run.
            let snapshot = self.builder.build(&self.process, &self.target, None, false, 20);
            let context_text = self.builder.format_for_prompt(&snapshot);

            let heal_instruction = format!(
                "{original_instruction}\n\n\
                 Previous attempt failed:\n  Code:\n{failed_code}\n  Error:\n{error}\n\
                 Please try an alternative approach."
            );

            let response = self
                .translate
                .translate(&heal_instruction, &context_text)
                .await?;
            let code = Self::resolve_code(&response);
            if code.is_empty() {
                continue;
            }

            let outcome = run_code(Arc::clone(&self.engine), code.clone()).await?;

            let mut end = ExecutionEvent::new(ExecutionEventType::HealEnd).with_code(code.clone());
            end.stdout = outcome.stdout.clone();
            end.stderr = outcome.stderr.clone();
            end.succeeded = Some(outcome.success);
            end.metadata = serde_json::json!({"attempt": attempt});
            self.emit(end);

            if outcome.success {
                return Ok(Some(ActResult {
                    success: true,
                    message: format!("Healed on attempt {attempt}: {}", response.reasoning),
                    actions: response.actions,
                    output: combine_output(&outcome.stdout, &outcome.stderr),
                }));
            }
            failed_code = code;
            error = outcome.stderr;
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Action;
    use serde_json::json;
    use std::sync::Mutex as StdMutex;
    use wyrm_bridge::{ScriptedBackend, ScriptedState};
    use wyrm_cache::FileStorage;
    use wyrm_llm::MockClient;

    fn handler_with(
        client: Arc<MockClient>,
        cache: Option<Arc<ContentCache>>,
        self_heal: bool,
    ) -> ActHandler {
        let backend = Arc::new(ScriptedBackend::new(ScriptedState::sample()));
        let debugger = Debugger::new(backend);
        let (target, process) = debugger.attach(4242).unwrap();
        ActHandler::new(
            client, debugger, target, process, self_heal, 3, None, cache,
        )
    }

    #[tokio::test]
    async fn act_executes_translated_code() {
        let client = Arc::new(MockClient::with_values(vec![json!({
            "code": "print(hex(frame.pc))",
            "reasoning": "read the pc register",
        })]));
        let handler = handler_with(client, None, false);

        let result = handler.act("show the current pc").await.unwrap();
        assert!(result.success);
        assert!(result.output.contains("0x100003f00"));
        assert_eq!(result.message, "read the pc register");
    }

    #[tokio::test]
    async fn act_and_cache_skips_the_model_on_repeat() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(ContentCache::new(FileStorage::new(dir.path())));
        let client = Arc::new(MockClient::with_values(vec![json!({
            "code": "print(hex(frame.pc))",
            "reasoning": "read the pc",
        })]));
        let handler = handler_with(client.clone(), Some(cache), false);

        let first = handler.act("show the current pc").await.unwrap();
        assert!(first.success);
        assert_eq!(client.total_calls(), 1);

        let second = handler.act("show the current pc").await.unwrap();
        assert_eq!(first, second);
        // Cache hit: zero additional model calls.
        assert_eq!(client.total_calls(), 1);
    }

    #[tokio::test]
    async fn self_heal_retries_with_error_context() {
        let client = Arc::new(MockClient::with_values(vec![
            json!({"code": "this is not ((( valid", "reasoning": "first try"}),
            json!({"code": "print(\"success\")", "reasoning": "simpler approach"}),
        ]));
        let handler = handler_with(client.clone(), None, true);

        let result = handler.act("do the thing").await.unwrap();
        assert!(result.success);
        assert!(result.message.starts_with("Healed on attempt 1"));
        assert!(result.output.contains("success"));

        // The heal prompt embedded the failed code and its error.
        let requests = client.requests.lock().unwrap();
        let heal_prompt = &requests.last().unwrap()[0].content;
        assert!(heal_prompt.contains("Previous attempt failed"));
        assert!(heal_prompt.contains("this is not ((( valid"));
    }

    #[tokio::test]
    async fn healed_result_is_cached() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(ContentCache::new(FileStorage::new(dir.path())));
        let client = Arc::new(MockClient::with_values(vec![
            json!({"code": "definitely not rhai (((", "reasoning": "broken"}),
            json!({"code": "print(\"healed\")", "reasoning": "fixed"}),
        ]));
        let handler = handler_with(client.clone(), Some(cache), true);

        let first = handler.act("poke the process").await.unwrap();
        assert!(first.success);
        let calls_after_heal = client.total_calls();
        assert_eq!(calls_after_heal, 2);

        let second = handler.act("poke the process").await.unwrap();
        assert_eq!(second.message, first.message);
        assert_eq!(client.total_calls(), calls_after_heal);
    }

    #[tokio::test]
    async fn exhausted_healing_returns_original_failure_uncached() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(ContentCache::new(FileStorage::new(dir.path())));
        let client = Arc::new(MockClient::with_values(vec![
            json!({"code": "broken (((", "reasoning": "a"}),
            json!({"code": "still broken (((", "reasoning": "b"}),
            json!({"code": "more broken (((", "reasoning": "c"}),
            json!({"code": "worse (((", "reasoning": "d"}),
        ]));
        let handler = handler_with(client, Some(cache.clone()), true);

        let result = handler.act("impossible").await.unwrap();
        assert!(!result.success);
        assert!(cache.keys().is_empty());
    }

    #[tokio::test]
    async fn missing_code_is_a_failure_result() {
        let client = Arc::new(MockClient::with_values(vec![json!({
            "reasoning": "I cannot produce code for this",
        })]));
        let handler = handler_with(client, None, true);

        let result = handler.act("???").await.unwrap();
        assert!(!result.success);
        assert_eq!(result.message, "No code generated from instruction");
    }

    #[tokio::test]
    async fn legacy_commands_route_through_execute_command() {
        let client = Arc::new(MockClient::with_values(vec![json!({
            "actions": [{"command": "bt", "description": "backtrace"}],
            "reasoning": "legacy response",
        })]));
        let handler = handler_with(client, None, false);

        let result = handler.act("backtrace").await.unwrap();
        assert!(result.success, "output: {}", result.output);
        assert!(result.output.contains("(scripted) bt"));
    }

    #[tokio::test]
    async fn heal_events_are_emitted_in_order() {
        let events: Arc<StdMutex<Vec<ExecutionEventType>>> = Arc::new(StdMutex::new(Vec::new()));
        let events_clone = Arc::clone(&events);
        let callback: ExecutionCallback = Arc::new(move |event: &ExecutionEvent| {
            events_clone.lock().unwrap().push(event.event_type);
        });

        let backend = Arc::new(ScriptedBackend::new(ScriptedState::sample()));
        let debugger = Debugger::new(backend);
        let (target, process) = debugger.attach(4242).unwrap();
        let client = Arc::new(MockClient::with_values(vec![
            json!({"code": "broken (((", "reasoning": "a"}),
            json!({"code": "print(\"ok\")", "reasoning": "b"}),
        ]));
        let handler = ActHandler::new(
            client,
            debugger,
            target,
            process,
            true,
            3,
            Some(callback),
            None,
        );

        handler.act("fix it").await.unwrap();
        let seen = events.lock().unwrap();
        let heal_start = seen
            .iter()
            .position(|t| *t == ExecutionEventType::HealStart)
            .unwrap();
        let heal_end = seen
            .iter()
            .position(|t| *t == ExecutionEventType::HealEnd)
            .unwrap();
        assert!(heal_start < heal_end);
    }

    #[test]
    fn resolve_code_prefers_top_level_code() {
        let response = TranslateResponse {
            code: "print(1)".into(),
            actions: vec![Action {
                code: "print(2)".into(),
                ..Default::default()
            }],
            reasoning: String::new(),
        };
        assert_eq!(ActHandler::resolve_code(&response), "print(1)");
    }

    #[test]
    fn resolve_code_joins_action_fragments() {
        let response = TranslateResponse {
            actions: vec![
                Action {
                    code: "let x = 1;".into(),
                    ..Default::default()
                },
                Action {
                    command: "bt".into(),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        let code = ActHandler::resolve_code(&response);
        assert!(code.starts_with("let x = 1;"));
        assert!(code.contains(r#"execute_command("bt")"#));
    }
}
