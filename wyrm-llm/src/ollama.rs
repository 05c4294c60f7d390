//! Client for a local Ollama instance.

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::client::LlmClient;
use crate::error::{LlmError, map_http_status, map_transport_error};
use crate::structured::{SchemaSpec, parse_structured};
use crate::types::{
    ChatMessage, LlmResponse, ModelConfig, Role, ToolCall, ToolDefinition, Usage,
};

/// Default model used when the config does not specify one.
const DEFAULT_MODEL: &str = "llama3.1";

/// Default Ollama server address.
const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Client for the Ollama chat API.
///
/// Ollama has no forced tool choice, so structured output goes through a
/// schema-mandating system message plus the JSON format flag.
pub struct Ollama {
    model: String,
    base_url: String,
    temperature: f64,
    max_tokens: u32,
    client: reqwest::Client,
}

impl Ollama {
    /// Create a client against the default local server.
    #[must_use]
    pub fn new() -> Self {
        Self {
            model: DEFAULT_MODEL.into(),
            base_url: DEFAULT_BASE_URL.into(),
            temperature: 0.7,
            max_tokens: 4096,
            client: reqwest::Client::new(),
        }
    }

    /// Override the default model.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Override the server address.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Build a client from a [`ModelConfig`].
    pub fn from_config(config: &ModelConfig) -> Self {
        let mut client = Self::new();
        if !config.model.is_empty() {
            client.model = config.model.clone();
        }
        if let Some(base_url) = &config.base_url {
            client.base_url = base_url.clone();
        }
        client.temperature = config.temperature;
        client.max_tokens = config.max_tokens;
        client
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.base_url)
    }

    async fn request(&self, body: Value) -> Result<Value, LlmError> {
        tracing::debug!(url = %self.chat_url(), model = %body["model"], "sending chat request");
        let response = self
            .client
            .post(self.chat_url())
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let text = response.text().await.map_err(map_transport_error)?;
        if !status.is_success() {
            return Err(map_http_status(status, &text));
        }
        serde_json::from_str(&text)
            .map_err(|e| LlmError::InvalidResponse(format!("invalid JSON response: {e}")))
    }

    fn build_body(&self, messages: &[ChatMessage], tools: Option<&[ToolDefinition]>) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": to_api_messages(messages),
            "stream": false,
            "options": {
                "temperature": self.temperature,
                "num_predict": self.max_tokens,
            },
        });
        if let Some(tools) = tools {
            body["tools"] = tools.iter().map(tool_to_api).collect();
        }
        body
    }
}

impl Default for Ollama {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmClient for Ollama {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: Option<&[ToolDefinition]>,
    ) -> Result<LlmResponse, LlmError> {
        let body = self.build_body(messages, tools);
        let response = self.request(body).await?;
        Ok(from_api_response(&response))
    }

    async fn chat_value(
        &self,
        messages: &[ChatMessage],
        schema: &SchemaSpec,
    ) -> Result<Value, LlmError> {
        let instruction = format!(
            "You MUST respond with valid JSON matching this exact schema:\n\
             ```json\n{}\n```\n\
             Do NOT include any text outside the JSON object.",
            serde_json::to_string_pretty(&schema.schema).unwrap_or_default()
        );
        let mut augmented = vec![ChatMessage::system(instruction)];
        augmented.extend_from_slice(messages);

        let mut body = self.build_body(&augmented, None);
        body["format"] = Value::String("json".into());

        let response = self.request(body).await?;
        let parsed = from_api_response(&response);
        parse_structured(&parsed.content, schema)
    }
}

/// Convert the uniform message list to Ollama format.
fn to_api_messages(messages: &[ChatMessage]) -> Vec<Value> {
    messages
        .iter()
        .map(|msg| {
            let role = match msg.role {
                Role::System => "system",
                Role::User => "user",
                Role::Assistant => "assistant",
                Role::Tool => "tool",
            };
            let mut entry = json!({"role": role, "content": msg.content});
            if msg.role == Role::Tool {
                if let Some(id) = &msg.tool_call_id {
                    entry["tool_call_id"] = Value::String(id.clone());
                }
            }
            if let Some(calls) = &msg.tool_calls {
                entry["tool_calls"] = calls
                    .iter()
                    .map(|call| {
                        json!({
                            "id": call.id,
                            "type": "function",
                            "function": {"name": call.name, "arguments": call.arguments},
                        })
                    })
                    .collect();
            }
            entry
        })
        .collect()
}

/// Convert an Ollama response body to a unified [`LlmResponse`].
fn from_api_response(response: &Value) -> LlmResponse {
    let message = &response["message"];
    let mut tool_calls = Vec::new();
    if let Some(raw_calls) = message["tool_calls"].as_array() {
        for (index, call) in raw_calls.iter().enumerate() {
            tool_calls.push(ToolCall {
                id: call["id"]
                    .as_str()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("ollama_call_{index}")),
                name: call["function"]["name"].as_str().unwrap_or_default().to_string(),
                arguments: call["function"]["arguments"].clone(),
            });
        }
    }

    let usage = Usage {
        input_tokens: response["prompt_eval_count"].as_u64().unwrap_or(0),
        output_tokens: response["eval_count"].as_u64().unwrap_or(0),
    };

    LlmResponse {
        content: message["content"].as_str().unwrap_or_default().to_string(),
        tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
        usage: Some(usage),
    }
}

/// Convert a [`ToolDefinition`] to Ollama's tool format.
fn tool_to_api(tool: &ToolDefinition) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.parameters,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_url_includes_api_path() {
        let client = Ollama::new().base_url("http://127.0.0.1:9999");
        assert_eq!(client.chat_url(), "http://127.0.0.1:9999/api/chat");
    }

    #[test]
    fn body_carries_options() {
        let client = Ollama::new().model("qwen2.5");
        let body = client.build_body(&[ChatMessage::user("hi")], None);
        assert_eq!(body["model"], "qwen2.5");
        assert_eq!(body["options"]["num_predict"], 4096);
        assert_eq!(body["stream"], false);
    }

    #[test]
    fn response_synthesizes_missing_call_ids() {
        let body = json!({
            "message": {
                "content": "",
                "tool_calls": [
                    {"function": {"name": "act", "arguments": {"instruction": "bt"}}},
                ],
            },
            "prompt_eval_count": 9,
            "eval_count": 4,
        });
        let response = from_api_response(&body);
        let calls = response.tool_calls.unwrap();
        assert_eq!(calls[0].id, "ollama_call_0");
        assert_eq!(calls[0].arguments["instruction"], "bt");
        assert_eq!(response.usage.unwrap().input_tokens, 9);
    }

    #[test]
    fn tool_role_keeps_call_id() {
        let api = to_api_messages(&[ChatMessage::tool("ok", "tc_3")]);
        assert_eq!(api[0]["role"], "tool");
        assert_eq!(api[0]["tool_call_id"], "tc_3");
    }
}
