//! Client for the Anthropic Messages API.

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::client::LlmClient;
use crate::error::{LlmError, map_http_status, map_transport_error};
use crate::structured::{SchemaSpec, extraction_tool, parse_structured};
use crate::types::{
    ChatMessage, LlmResponse, ModelConfig, Role, ToolCall, ToolDefinition, Usage,
};

/// Default model used when the config does not specify one.
const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// Default Anthropic API base URL.
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

/// Anthropic API version header value.
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Client for the Anthropic Messages API.
pub struct Anthropic {
    api_key: String,
    model: String,
    base_url: String,
    temperature: f64,
    max_tokens: u32,
    client: reqwest::Client,
}

impl Anthropic {
    /// Create a client with the given API key and sensible defaults.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
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

    /// Override the API base URL (testing, proxies).
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Build a client from a [`ModelConfig`].
    pub fn from_config(config: &ModelConfig) -> Self {
        let mut client = Self::new(config.api_key.clone().unwrap_or_default());
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

    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.base_url)
    }

    async fn request(&self, body: Value) -> Result<Value, LlmError> {
        tracing::debug!(url = %self.messages_url(), model = %body["model"], "sending completion request");
        let response = self
            .client
            .post(self.messages_url())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
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

    fn build_body(
        &self,
        messages: &[ChatMessage],
        tools: Option<&[ToolDefinition]>,
        tool_choice: Option<Value>,
    ) -> Value {
        let (system, api_messages) = to_api_messages(messages);
        let mut body = json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
            "messages": api_messages,
        });
        if let Some(system) = system {
            body["system"] = Value::String(system);
        }
        if let Some(tools) = tools {
            body["tools"] = tools.iter().map(tool_to_api).collect();
        }
        if let Some(choice) = tool_choice {
            body["tool_choice"] = choice;
        }
        body
    }
}

#[async_trait]
impl LlmClient for Anthropic {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: Option<&[ToolDefinition]>,
    ) -> Result<LlmResponse, LlmError> {
        let body = self.build_body(messages, tools, None);
        let response = self.request(body).await?;
        from_api_response(&response)
    }

    async fn chat_value(
        &self,
        messages: &[ChatMessage],
        schema: &SchemaSpec,
    ) -> Result<Value, LlmError> {
        let tool = extraction_tool(schema);
        let tools = vec![tool.clone()];
        let body = self.build_body(
            messages,
            Some(&tools),
            Some(json!({"type": "tool", "name": tool.name})),
        );
        let response = self.request(body).await?;
        let parsed = from_api_response(&response)?;

        if let Some(calls) = &parsed.tool_calls {
            if let Some(call) = calls.iter().find(|c| c.name == tool.name) {
                return Ok(call.arguments.clone());
            }
        }
        parse_structured(&parsed.content, schema)
    }
}

/// Convert the uniform message list to Anthropic format.
///
/// Returns `(system, messages)` — Anthropic takes the system prompt as a
/// separate top-level field and only supports one, so system messages
/// coalesce. Tool results become user messages holding a `tool_result`
/// block.
fn to_api_messages(messages: &[ChatMessage]) -> (Option<String>, Vec<Value>) {
    let mut system: Option<String> = None;
    let mut api_messages = Vec::new();

    for msg in messages {
        match msg.role {
            Role::System => match &mut system {
                Some(existing) => {
                    existing.push_str("\n\n");
                    existing.push_str(&msg.content);
                }
                None => system = Some(msg.content.clone()),
            },
            Role::Tool => {
                api_messages.push(json!({
                    "role": "user",
                    "content": [{
                        "type": "tool_result",
                        "tool_use_id": msg.tool_call_id,
                        "content": msg.content,
                    }],
                }));
            }
            Role::Assistant if msg.tool_calls.is_some() => {
                let mut blocks = Vec::new();
                if !msg.content.is_empty() {
                    blocks.push(json!({"type": "text", "text": msg.content}));
                }
                for call in msg.tool_calls.as_deref().unwrap_or_default() {
                    blocks.push(json!({
                        "type": "tool_use",
                        "id": call.id,
                        "name": call.name,
                        "input": call.arguments,
                    }));
                }
                api_messages.push(json!({"role": "assistant", "content": blocks}));
            }
            Role::User | Role::Assistant => {
                let role = if msg.role == Role::User { "user" } else { "assistant" };
                api_messages.push(json!({"role": role, "content": msg.content}));
            }
        }
    }

    (system, api_messages)
}

/// Convert an Anthropic response body to a unified [`LlmResponse`].
fn from_api_response(response: &Value) -> Result<LlmResponse, LlmError> {
    let blocks = response["content"]
        .as_array()
        .ok_or_else(|| LlmError::InvalidResponse("missing content array".into()))?;

    let mut text_parts = Vec::new();
    let mut tool_calls = Vec::new();
    for block in blocks {
        match block["type"].as_str() {
            Some("text") => {
                text_parts.push(block["text"].as_str().unwrap_or_default().to_string());
            }
            Some("tool_use") => tool_calls.push(ToolCall {
                id: block["id"].as_str().unwrap_or_default().to_string(),
                name: block["name"].as_str().unwrap_or_default().to_string(),
                arguments: block["input"].clone(),
            }),
            _ => {}
        }
    }

    let usage = response.get("usage").map(|u| Usage {
        input_tokens: u["input_tokens"].as_u64().unwrap_or(0),
        output_tokens: u["output_tokens"].as_u64().unwrap_or(0),
    });

    Ok(LlmResponse {
        content: text_parts.join("\n"),
        tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
        usage,
    })
}

/// Convert a [`ToolDefinition`] to the Anthropic tool format.
fn tool_to_api(tool: &ToolDefinition) -> Value {
    json!({
        "name": tool.name,
        "description": tool.description,
        "input_schema": tool.parameters,
    })
}
