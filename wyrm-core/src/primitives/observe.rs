//! The observe handler — survey process state, suggest actions.

use std::sync::Arc;

use wyrm_bridge::{Process, Target};
use wyrm_cache::ContentCache;
use wyrm_llm::LlmClient;
use wyrm_script::events::ExecutionCallback;

use crate::context::builder::ContextBuilder;
use crate::error::SessionError;
use crate::translate::TranslateEngine;
use crate::types::ObserveResult;

/// Surveys the current process state and suggests debugging actions.
///
/// Observe produces data, never side effects: suggestions are returned, not
/// executed.
pub struct ObserveHandler {
    translate: TranslateEngine,
    builder: ContextBuilder,
}

impl ObserveHandler {
    /// Create a handler over a provider client.
    pub fn new(
        client: Arc<dyn LlmClient>,
        cache: Option<Arc<ContentCache>>,
        callback: Option<ExecutionCallback>,
    ) -> Self {
        Self {
            translate: TranslateEngine::new(client, cache, callback),
            builder: ContextBuilder::default(),
        }
    }

    /// Observe the current state, optionally focused by an instruction.
    pub async fn observe(
        &self,
        process: &Process,
        target: &Target,
        instruction: Option<&str>,
    ) -> Result<ObserveResult, SessionError> {
        let snapshot = self.builder.build(process, target, None, false, 20);
        let context_text = self.builder.format_for_prompt(&snapshot);
        self.translate
            .translate_observe(&context_text, instruction)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wyrm_bridge::{Debugger, ScriptedBackend, ScriptedState};
    use wyrm_cache::FileStorage;
    use wyrm_llm::MockClient;

    fn live_pair() -> (Target, Process) {
        let debugger = Debugger::new(Arc::new(ScriptedBackend::new(ScriptedState::sample())));
        debugger.attach(4242).unwrap()
    }

    #[tokio::test]
    async fn observe_returns_suggestions() {
        let client = Arc::new(MockClient::with_values(vec![json!({
            "actions": [
                {"code": "print(frame.registers())", "description": "inspect registers"},
                {"code": "thread.step_over()", "description": "step the current line"},
            ],
            "description": "stopped at a breakpoint in main",
        })]));
        let handler = ObserveHandler::new(client, None, None);
        let (target, process) = live_pair();

        let result = handler.observe(&process, &target, None).await.unwrap();
        assert_eq!(result.actions.len(), 2);
        assert!(result.description.contains("breakpoint"));
    }

    #[tokio::test]
    async fn identical_observes_hit_the_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(ContentCache::new(FileStorage::new(dir.path())));
        let client = Arc::new(MockClient::with_values(vec![json!({
            "actions": [{"code": "print(1)", "description": "x"}],
            "description": "state",
        })]));
        let handler = ObserveHandler::new(client.clone(), Some(cache), None);
        let (target, process) = live_pair();

        let first = handler.observe(&process, &target, Some("heap")).await.unwrap();
        let second = handler.observe(&process, &target, Some("heap")).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(client.total_calls(), 1);
    }
}
