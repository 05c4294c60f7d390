//! Mock client for tests — queued responses, recorded requests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::client::LlmClient;
use crate::error::LlmError;
use crate::structured::SchemaSpec;
use crate::types::{ChatMessage, LlmResponse, ToolDefinition, Usage};

/// An [`LlmClient`] that replays queued responses.
///
/// `chat` pops from the response queue (falling back to `default_text` when
/// the queue is empty); `chat_value` pops from the value queue. Every request
/// is recorded for assertions.
pub struct MockClient {
    responses: Mutex<VecDeque<LlmResponse>>,
    values: Mutex<VecDeque<serde_json::Value>>,
    default_text: Option<String>,
    fail: bool,
    chat_calls: AtomicUsize,
    value_calls: AtomicUsize,
    /// Message lists received by `chat`, in call order.
    pub requests: Mutex<Vec<Vec<ChatMessage>>>,
}

impl MockClient {
    fn empty() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            values: Mutex::new(VecDeque::new()),
            default_text: None,
            fail: false,
            chat_calls: AtomicUsize::new(0),
            value_calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue plain-text chat responses.
    pub fn with_texts(texts: Vec<&str>) -> Self {
        Self::with_responses(
            texts
                .into_iter()
                .map(|text| LlmResponse {
                    content: text.to_string(),
                    tool_calls: None,
                    usage: Some(Usage {
                        input_tokens: 10,
                        output_tokens: 5,
                    }),
                })
                .collect(),
        )
    }

    /// Queue full chat responses.
    pub fn with_responses(responses: Vec<LlmResponse>) -> Self {
        let client = Self::empty();
        *client.responses.lock().unwrap() = responses.into();
        client
    }

    /// Queue structured values returned by `chat_value`.
    pub fn with_values(values: Vec<serde_json::Value>) -> Self {
        let client = Self::empty();
        *client.values.lock().unwrap() = values.into();
        client
    }

    /// A client that answers every chat with the same text.
    pub fn with_default_text(text: impl Into<String>) -> Self {
        let mut client = Self::empty();
        client.default_text = Some(text.into());
        client
    }

    /// A client whose every call fails with a retryable error.
    pub fn failing() -> Self {
        let mut client = Self::empty();
        client.fail = true;
        client
    }

    /// Queue more chat responses onto an existing client.
    pub fn push_response(&self, response: LlmResponse) {
        self.responses.lock().unwrap().push_back(response);
    }

    /// Queue another structured value.
    pub fn push_value(&self, value: serde_json::Value) {
        self.values.lock().unwrap().push_back(value);
    }

    /// Number of `chat` calls made.
    pub fn chat_count(&self) -> usize {
        self.chat_calls.load(Ordering::SeqCst)
    }

    /// Number of `chat_value` calls made.
    pub fn value_count(&self) -> usize {
        self.value_calls.load(Ordering::SeqCst)
    }

    /// Total model calls of either kind.
    pub fn total_calls(&self) -> usize {
        self.chat_count() + self.value_count()
    }
}

#[async_trait]
impl LlmClient for MockClient {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        _tools: Option<&[ToolDefinition]>,
    ) -> Result<LlmResponse, LlmError> {
        self.chat_calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(messages.to_vec());
        if self.fail {
            return Err(LlmError::RateLimited);
        }
        if let Some(response) = self.responses.lock().unwrap().pop_front() {
            return Ok(response);
        }
        match &self.default_text {
            Some(text) => Ok(LlmResponse {
                content: text.clone(),
                tool_calls: None,
                usage: None,
            }),
            None => panic!("MockClient: no more chat responses queued"),
        }
    }

    async fn chat_value(
        &self,
        messages: &[ChatMessage],
        schema: &SchemaSpec,
    ) -> Result<serde_json::Value, LlmError> {
        self.value_calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(messages.to_vec());
        if self.fail {
            return Err(LlmError::RateLimited);
        }
        self.values
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| LlmError::StructuredParse {
                schema: schema.name.clone(),
                message: "MockClient: no more structured values queued".into(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replays_in_order_and_counts_calls() {
        let client = MockClient::with_texts(vec!["first", "second"]);
        let a = client.chat(&[ChatMessage::user("1")], None).await.unwrap();
        let b = client.chat(&[ChatMessage::user("2")], None).await.unwrap();
        assert_eq!(a.content, "first");
        assert_eq!(b.content, "second");
        assert_eq!(client.chat_count(), 2);
        assert_eq!(client.requests.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn default_text_answers_when_queue_is_dry() {
        let client = MockClient::with_default_text("always");
        for _ in 0..3 {
            let response = client.chat(&[ChatMessage::user("x")], None).await.unwrap();
            assert_eq!(response.content, "always");
        }
    }

    #[tokio::test]
    async fn exhausted_value_queue_is_a_structured_error() {
        let client = MockClient::with_values(vec![]);
        let spec = SchemaSpec::new("Thing", serde_json::json!({"type": "object"}));
        let err = client
            .chat_value(&[ChatMessage::user("x")], &spec)
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::StructuredParse { .. }));
    }
}
