//! The extract handler — pull typed structured data from process state.

use std::sync::Arc;

use schemars::JsonSchema;
use serde::de::DeserializeOwned;

use wyrm_bridge::{Process, Target};
use wyrm_cache::ContentCache;
use wyrm_llm::{LlmClient, LlmError, SchemaSpec};
use wyrm_script::events::ExecutionCallback;

use crate::context::builder::ContextBuilder;
use crate::error::SessionError;
use crate::translate::TranslateEngine;

/// Extracts schema-validated structured data from the current process state.
///
/// Extract produces data, never side effects.
pub struct ExtractHandler {
    translate: TranslateEngine,
    builder: ContextBuilder,
}

impl ExtractHandler {
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

    /// Extract a raw JSON value matching `spec`.
    pub async fn extract_value(
        &self,
        process: &Process,
        target: &Target,
        instruction: &str,
        spec: &SchemaSpec,
    ) -> Result<serde_json::Value, SessionError> {
        let snapshot = self.builder.build(process, target, None, false, 20);
        let context_text = self.builder.format_for_prompt(&snapshot);
        self.translate
            .translate_extract(instruction, &context_text, spec)
            .await
    }

    /// Extract a typed value; deserialization is the schema validation.
    pub async fn extract<T>(
        &self,
        process: &Process,
        target: &Target,
        instruction: &str,
    ) -> Result<T, SessionError>
    where
        T: DeserializeOwned + JsonSchema,
    {
        let spec = SchemaSpec::of::<T>();
        let value = self
            .extract_value(process, target, instruction, &spec)
            .await?;
        serde_json::from_value(value).map_err(|err| {
            SessionError::Llm(LlmError::StructuredParse {
                schema: spec.name.clone(),
                message: err.to_string(),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;
    use wyrm_bridge::{Debugger, ScriptedBackend, ScriptedState};
    use wyrm_cache::FileStorage;
    use wyrm_llm::MockClient;

    #[derive(Debug, Deserialize, JsonSchema, PartialEq)]
    struct CrashInfo {
        faulting_function: String,
        pc: String,
    }

    fn live_pair() -> (Target, Process) {
        let debugger = Debugger::new(Arc::new(ScriptedBackend::new(ScriptedState::sample())));
        debugger.attach(4242).unwrap()
    }

    #[tokio::test]
    async fn extract_returns_typed_value() {
        let client = Arc::new(MockClient::with_values(vec![json!({
            "faulting_function": "main",
            "pc": "0x100003f00",
        })]));
        let handler = ExtractHandler::new(client, None, None);
        let (target, process) = live_pair();

        let info: CrashInfo = handler
            .extract(&process, &target, "describe the crash site")
            .await
            .unwrap();
        assert_eq!(info.faulting_function, "main");
        assert_eq!(info.pc, "0x100003f00");
    }

    #[tokio::test]
    async fn schema_mismatch_surfaces_as_structured_error() {
        let client = Arc::new(MockClient::with_values(vec![json!({"nope": true})]));
        let handler = ExtractHandler::new(client, None, None);
        let (target, process) = live_pair();

        let err = handler
            .extract::<CrashInfo>(&process, &target, "describe the crash site")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SessionError::Llm(LlmError::StructuredParse { schema, .. }) if schema == "CrashInfo"
        ));
    }

    #[tokio::test]
    async fn identical_extracts_issue_one_model_call() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(ContentCache::new(FileStorage::new(dir.path())));
        let client = Arc::new(MockClient::with_values(vec![json!({
            "faulting_function": "main",
            "pc": "0x100003f00",
        })]));
        let handler = ExtractHandler::new(client.clone(), Some(cache), None);
        let (target, process) = live_pair();

        let first: CrashInfo = handler
            .extract(&process, &target, "crash site")
            .await
            .unwrap();
        let second: CrashInfo = handler
            .extract(&process, &target, "crash site")
            .await
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(client.total_calls(), 1);
    }
}
