//! The translate engine — composes prompts, parses structured responses,
//! falls back on failure.

use std::sync::Arc;

use wyrm_cache::{ContentCache, key_from_parts};
use wyrm_llm::{ChatMessage, LlmClient, LlmClientExt, SchemaSpec};
use wyrm_script::events::{ExecutionCallback, ExecutionEvent, ExecutionEventType};

use crate::error::SessionError;
use crate::translate::prompts::{act_prompt, extract_prompt, observe_prompt};
use crate::types::{Action, ObserveResult, TranslateResponse};

/// Translates natural-language instructions into script code or structured
/// data.
///
/// `translate` is uncached — caching for act happens at the handler after
/// execution succeeds, since generated code may fail and need healing.
/// `translate_extract` and `translate_observe` cache their results directly:
/// neither executes anything.
pub struct TranslateEngine {
    client: Arc<dyn LlmClient>,
    cache: Option<Arc<ContentCache>>,
    callback: Option<ExecutionCallback>,
}

impl TranslateEngine {
    /// Create an engine over a provider client.
    pub fn new(
        client: Arc<dyn LlmClient>,
        cache: Option<Arc<ContentCache>>,
        callback: Option<ExecutionCallback>,
    ) -> Self {
        Self {
            client,
            cache,
            callback,
        }
    }

    fn emit_cache_hit(&self, key: &str) {
        tracing::info!(key, "cache hit");
        if let Some(callback) = &self.callback {
            callback(
                &ExecutionEvent::new(ExecutionEventType::CacheHit)
                    .with_metadata(serde_json::json!({"key": key})),
            );
        }
    }

    /// Translate an instruction into code.
    ///
    /// On a structured-call failure this falls back to a raw chat and a
    /// permissive parse; a translate call never raises for model formatting
    /// problems.
    pub async fn translate(
        &self,
        instruction: &str,
        context_text: &str,
    ) -> Result<TranslateResponse, SessionError> {
        let prompt = act_prompt(context_text, instruction);
        let messages = vec![ChatMessage::user(prompt)];

        match self.client.chat_structured::<TranslateResponse>(&messages).await {
            Ok(response) => Ok(response),
            Err(err) => {
                tracing::warn!(%err, "structured translation failed, attempting raw chat");
                let raw = self.client.chat(&messages, None).await?;
                Ok(parse_raw_response(&raw.content))
            }
        }
    }

    /// Translate an extraction instruction into a structured value.
    pub async fn translate_extract(
        &self,
        instruction: &str,
        context_text: &str,
        spec: &SchemaSpec,
    ) -> Result<serde_json::Value, SessionError> {
        let key = key_from_parts(&[instruction, context_text, &spec.name, "extract"]);
        if let Some(cache) = &self.cache {
            if let Some(cached) = cache.get_by_key(&key) {
                self.emit_cache_hit(&key);
                return Ok(cached);
            }
        }

        let schema_text =
            serde_json::to_string_pretty(&spec.schema).unwrap_or_else(|_| "{}".into());
        let prompt = extract_prompt(context_text, instruction, &schema_text);
        let messages = vec![ChatMessage::user(prompt)];
        let value = self.client.chat_value(&messages, spec).await?;

        if let Some(cache) = &self.cache {
            cache.set_by_key(&key, &value);
        }
        Ok(value)
    }

    /// Generate observation-based action suggestions.
    pub async fn translate_observe(
        &self,
        context_text: &str,
        instruction: Option<&str>,
    ) -> Result<ObserveResult, SessionError> {
        let key = key_from_parts(&[context_text, instruction.unwrap_or(""), "observe"]);
        if let Some(cache) = &self.cache {
            if let Some(cached) = cache.get_by_key(&key) {
                self.emit_cache_hit(&key);
                if let Ok(result) = serde_json::from_value(cached) {
                    return Ok(result);
                }
            }
        }

        let prompt = observe_prompt(context_text, instruction);
        let messages = vec![ChatMessage::user(prompt)];

        let result = match self.client.chat_structured::<ObserveResult>(&messages).await {
            Ok(result) => result,
            Err(err) => {
                tracing::warn!(%err, "structured observe failed, attempting raw chat");
                let raw = self.client.chat(&messages, None).await?;
                parse_observe_response(&raw.content)
            }
        };

        if let Some(cache) = &self.cache {
            if let Ok(value) = serde_json::to_value(&result) {
                cache.set_by_key(&key, &value);
            }
        }
        Ok(result)
    }
}

/// Extract the outermost JSON object embedded in free-form text.
fn embedded_json(content: &str) -> Option<serde_json::Value> {
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&content[start..=end]).ok()
}

/// Parse a raw model response into a [`TranslateResponse`].
///
/// Accepts the `{code, reasoning}` shape, the legacy `{actions: [...],
/// reasoning}` shape, and as a last resort wraps the whole content as code
/// with a failure note.
pub fn parse_raw_response(content: &str) -> TranslateResponse {
    if let Some(data) = embedded_json(content) {
        if let Some(code) = data.get("code").and_then(|v| v.as_str()) {
            return TranslateResponse {
                code: code.to_string(),
                reasoning: data
                    .get("reasoning")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string(),
                actions: Vec::new(),
            };
        }
        if let Some(actions) = data.get("actions").and_then(|v| v.as_array()) {
            return TranslateResponse {
                actions: actions.iter().map(parse_action).collect(),
                reasoning: data
                    .get("reasoning")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string(),
                code: String::new(),
            };
        }
    }

    TranslateResponse {
        code: content.trim().to_string(),
        reasoning: "Failed to parse structured response".into(),
        actions: Vec::new(),
    }
}

/// Parse a raw model response into an [`ObserveResult`].
pub fn parse_observe_response(content: &str) -> ObserveResult {
    if let Some(data) = embedded_json(content) {
        if let Some(actions) = data.get("actions").and_then(|v| v.as_array()) {
            return ObserveResult {
                actions: actions.iter().map(parse_action).collect(),
                description: data
                    .get("description")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string(),
            };
        }
    }
    ObserveResult {
        actions: Vec::new(),
        description: "Failed to parse observation".into(),
    }
}

fn parse_action(value: &serde_json::Value) -> Action {
    Action {
        command: value
            .get("command")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
        code: value
            .get("code")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
        description: value
            .get("description")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wyrm_cache::FileStorage;
    use wyrm_llm::MockClient;

    #[test]
    fn parse_raw_accepts_code_shape() {
        let response =
            parse_raw_response(r#"Here you go: {"code": "print(hex(frame.pc))", "reasoning": "pc"}"#);
        assert_eq!(response.code, "print(hex(frame.pc))");
        assert_eq!(response.reasoning, "pc");
    }

    #[test]
    fn parse_raw_accepts_actions_shape() {
        let response = parse_raw_response(
            r#"{"actions": [{"command": "bt", "description": "backtrace"}], "reasoning": "legacy"}"#,
        );
        assert_eq!(response.actions.len(), 1);
        assert_eq!(response.actions[0].command, "bt");
        assert!(response.code.is_empty());
    }

    #[test]
    fn parse_raw_wraps_unparseable_content_as_code() {
        let response = parse_raw_response("print(1)");
        assert_eq!(response.code, "print(1)");
        assert_eq!(response.reasoning, "Failed to parse structured response");
    }

    #[test]
    fn parse_observe_defaults_on_garbage() {
        let result = parse_observe_response("no json here");
        assert!(result.actions.is_empty());
        assert_eq!(result.description, "Failed to parse observation");
    }

    #[tokio::test]
    async fn translate_uses_structured_path() {
        let client = Arc::new(MockClient::with_values(vec![json!({
            "code": "print(hex(frame.pc))",
            "reasoning": "read the pc",
        })]));
        let engine = TranslateEngine::new(client.clone(), None, None);
        let response = engine.translate("show the pc", "PC: 0x1000").await.unwrap();
        assert_eq!(response.code, "print(hex(frame.pc))");
        assert_eq!(client.value_count(), 1);
        assert_eq!(client.chat_count(), 0);
    }

    #[tokio::test]
    async fn translate_falls_back_to_raw_chat() {
        // Empty value queue makes chat_value fail; raw chat then answers.
        let client = Arc::new(MockClient::with_texts(vec![
            r#"{"code": "print(2)", "reasoning": "fallback"}"#,
        ]));
        let engine = TranslateEngine::new(client.clone(), None, None);
        let response = engine.translate("x", "ctx").await.unwrap();
        assert_eq!(response.code, "print(2)");
        assert_eq!(client.chat_count(), 1);
    }

    #[tokio::test]
    async fn extract_caches_by_instruction_context_schema() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(ContentCache::new(FileStorage::new(dir.path())));
        let client = Arc::new(MockClient::with_values(vec![json!({"size": 956})]));
        let engine = TranslateEngine::new(client.clone(), Some(cache), None);
        let spec = SchemaSpec::new("LeakReport", json!({"type": "object"}));

        let first = engine
            .translate_extract("find the leak", "ctx", &spec)
            .await
            .unwrap();
        let second = engine
            .translate_extract("find the leak", "ctx", &spec)
            .await
            .unwrap();

        assert_eq!(first, second);
        // Second call was served from the cache: exactly one model call.
        assert_eq!(client.total_calls(), 1);
    }

    #[tokio::test]
    async fn observe_caches_and_replays() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(ContentCache::new(FileStorage::new(dir.path())));
        let client = Arc::new(MockClient::with_values(vec![json!({
            "actions": [{"code": "print(frame.registers())", "description": "registers"}],
            "description": "stopped at breakpoint",
        })]));
        let engine = TranslateEngine::new(client.clone(), Some(cache), None);

        let first = engine.translate_observe("ctx", None).await.unwrap();
        let second = engine.translate_observe("ctx", None).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.actions.len(), 1);
        assert_eq!(client.total_calls(), 1);
    }
}
