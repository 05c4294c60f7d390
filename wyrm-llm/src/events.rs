//! LLM call observability — start/end event hooks around each call.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::client::LlmClient;
use crate::error::LlmError;
use crate::structured::SchemaSpec;
use crate::types::{ChatMessage, LlmResponse, ToolDefinition, Usage};

/// Which client method an event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmMethod {
    /// Free-form chat.
    Chat,
    /// Structured chat.
    ChatStructured,
}

impl LlmMethod {
    /// Stable label for telemetry.
    pub fn label(&self) -> &'static str {
        match self {
            LlmMethod::Chat => "chat",
            LlmMethod::ChatStructured => "chat_structured",
        }
    }
}

/// Lightweight event emitted around LLM calls.
#[derive(Debug, Clone)]
pub struct LlmEvent {
    /// Method being called.
    pub method: LlmMethod,
    /// Elapsed time (zero on the start event).
    pub duration: Duration,
    /// Token usage, when the response reported it.
    pub usage: Option<Usage>,
    /// Schema name (structured calls only).
    pub schema_name: Option<String>,
    /// Error message, when the call failed.
    pub error: Option<String>,
}

impl LlmEvent {
    fn start(method: LlmMethod, schema_name: Option<String>) -> Self {
        Self {
            method,
            duration: Duration::ZERO,
            usage: None,
            schema_name,
            error: None,
        }
    }
}

/// Callback invoked with `(event, is_start)`: once before the request is
/// sent and once after the response (or error) arrives.
pub type LlmEventCallback = Arc<dyn Fn(&LlmEvent, bool) + Send + Sync>;

/// Wraps any [`LlmClient`] and fires callbacks on each call.
pub struct InstrumentedClient {
    inner: Arc<dyn LlmClient>,
    callback: LlmEventCallback,
}

impl InstrumentedClient {
    /// Wrap `inner`, reporting calls to `callback`.
    pub fn new(inner: Arc<dyn LlmClient>, callback: LlmEventCallback) -> Self {
        Self { inner, callback }
    }
}

#[async_trait]
impl LlmClient for InstrumentedClient {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: Option<&[ToolDefinition]>,
    ) -> Result<LlmResponse, LlmError> {
        let mut event = LlmEvent::start(LlmMethod::Chat, None);
        (self.callback)(&event, true);
        let start = Instant::now();

        match self.inner.chat(messages, tools).await {
            Ok(response) => {
                event.duration = start.elapsed();
                event.usage = response.usage;
                (self.callback)(&event, false);
                Ok(response)
            }
            Err(err) => {
                event.duration = start.elapsed();
                event.error = Some(err.to_string());
                (self.callback)(&event, false);
                Err(err)
            }
        }
    }

    async fn chat_value(
        &self,
        messages: &[ChatMessage],
        schema: &SchemaSpec,
    ) -> Result<serde_json::Value, LlmError> {
        let mut event = LlmEvent::start(LlmMethod::ChatStructured, Some(schema.name.clone()));
        (self.callback)(&event, true);
        let start = Instant::now();

        match self.inner.chat_value(messages, schema).await {
            Ok(value) => {
                event.duration = start.elapsed();
                (self.callback)(&event, false);
                Ok(value)
            }
            Err(err) => {
                event.duration = start.elapsed();
                event.error = Some(err.to_string());
                (self.callback)(&event, false);
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockClient;
    use serde_json::json;
    use std::sync::Mutex;

    fn recording_callback() -> (LlmEventCallback, Arc<Mutex<Vec<(String, bool)>>>) {
        let log: Arc<Mutex<Vec<(String, bool)>>> = Arc::new(Mutex::new(Vec::new()));
        let log_clone = Arc::clone(&log);
        let callback: LlmEventCallback = Arc::new(move |event, is_start| {
            log_clone
                .lock()
                .unwrap()
                .push((event.method.label().to_string(), is_start));
        });
        (callback, log)
    }

    #[tokio::test]
    async fn chat_fires_start_and_end() {
        let (callback, log) = recording_callback();
        let inner = Arc::new(MockClient::with_texts(vec!["hi"]));
        let client = InstrumentedClient::new(inner, callback);

        client.chat(&[ChatMessage::user("hello")], None).await.unwrap();

        let events = log.lock().unwrap().clone();
        assert_eq!(
            events,
            vec![("chat".to_string(), true), ("chat".to_string(), false)]
        );
    }

    #[tokio::test]
    async fn structured_event_carries_schema_name() {
        let names: Arc<Mutex<Vec<Option<String>>>> = Arc::new(Mutex::new(Vec::new()));
        let names_clone = Arc::clone(&names);
        let callback: LlmEventCallback = Arc::new(move |event, _| {
            names_clone.lock().unwrap().push(event.schema_name.clone());
        });

        let inner = Arc::new(MockClient::with_values(vec![json!({})]));
        let client = InstrumentedClient::new(inner, callback);
        let spec = SchemaSpec::new("Finding", json!({"type": "object"}));
        client
            .chat_value(&[ChatMessage::user("extract")], &spec)
            .await
            .unwrap();

        let names = names.lock().unwrap();
        assert_eq!(names.len(), 2);
        assert_eq!(names[0].as_deref(), Some("Finding"));
    }

    #[tokio::test]
    async fn error_is_reported_on_end_event() {
        let errors: Arc<Mutex<Vec<Option<String>>>> = Arc::new(Mutex::new(Vec::new()));
        let errors_clone = Arc::clone(&errors);
        let callback: LlmEventCallback = Arc::new(move |event, is_start| {
            if !is_start {
                errors_clone.lock().unwrap().push(event.error.clone());
            }
        });

        let inner = Arc::new(MockClient::failing());
        let client = InstrumentedClient::new(inner, callback);
        let result = client.chat(&[ChatMessage::user("hello")], None).await;

        assert!(result.is_err());
        let errors = errors.lock().unwrap();
        assert!(errors[0].as_deref().unwrap().contains("rate limited"));
    }
}
