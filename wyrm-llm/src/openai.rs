//! Client for the OpenAI Chat Completions API.

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::client::LlmClient;
use crate::error::{LlmError, map_http_status, map_transport_error};
use crate::structured::{SchemaSpec, extraction_tool, parse_structured};
use crate::types::{
    ChatMessage, LlmResponse, ModelConfig, Role, ToolCall, ToolDefinition, Usage,
};

/// Default model used when the config does not specify one.
const DEFAULT_MODEL: &str = "gpt-4o";

/// Default OpenAI API base URL.
const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// Client for the OpenAI Chat Completions API.
pub struct OpenAi {
    api_key: String,
    model: String,
    base_url: String,
    temperature: f64,
    max_tokens: u32,
    client: reqwest::Client,
}

impl OpenAi {
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

    /// Override the API base URL.
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

    fn completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }

    async fn request(&self, body: Value) -> Result<Value, LlmError> {
        tracing::debug!(url = %self.completions_url(), model = %body["model"], "sending completion request");
        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(&self.api_key)
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
        let mut body = json!({
            "model": self.model,
            "messages": to_api_messages(messages),
            "temperature": self.temperature,
            "max_completion_tokens": self.max_tokens,
        });
        if let Some(tools) = tools {
            body["tools"] = tools.iter().map(tool_to_function).collect();
        }
        if let Some(choice) = tool_choice {
            body["tool_choice"] = choice;
        }
        body
    }
}

#[async_trait]
impl LlmClient for OpenAi {
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
            Some(json!({"type": "function", "function": {"name": tool.name}})),
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

/// Convert the uniform message list to Chat Completions format.
///
/// Tool results use the dedicated `tool` role bound by `tool_call_id`;
/// assistant tool calls render as `tool_calls` entries whose function
/// arguments are JSON-encoded strings.
fn to_api_messages(messages: &[ChatMessage]) -> Vec<Value> {
    messages
        .iter()
        .map(|msg| match msg.role {
            Role::Tool => json!({
                "role": "tool",
                "content": msg.content,
                "tool_call_id": msg.tool_call_id.clone().unwrap_or_default(),
            }),
            Role::Assistant if msg.tool_calls.is_some() => {
                let calls: Vec<Value> = msg
                    .tool_calls
                    .as_deref()
                    .unwrap_or_default()
                    .iter()
                    .map(|call| {
                        json!({
                            "id": call.id,
                            "type": "function",
                            "function": {
                                "name": call.name,
                                "arguments": call.arguments.to_string(),
                            },
                        })
                    })
                    .collect();
                json!({
                    "role": "assistant",
                    "content": msg.content,
                    "tool_calls": calls,
                })
            }
            _ => {
                let role = match msg.role {
                    Role::System => "system",
                    Role::User => "user",
                    _ => "assistant",
                };
                json!({"role": role, "content": msg.content})
            }
        })
        .collect()
}

/// Convert a Chat Completions response body to a unified [`LlmResponse`].
fn from_api_response(response: &Value) -> Result<LlmResponse, LlmError> {
    let message = response["choices"]
        .get(0)
        .map(|choice| &choice["message"])
        .ok_or_else(|| LlmError::InvalidResponse("missing choices".into()))?;

    let mut tool_calls = Vec::new();
    if let Some(raw_calls) = message["tool_calls"].as_array() {
        for call in raw_calls {
            let arguments = call["function"]["arguments"]
                .as_str()
                .map(|s| serde_json::from_str(s).unwrap_or(Value::Null))
                .unwrap_or_else(|| call["function"]["arguments"].clone());
            tool_calls.push(ToolCall {
                id: call["id"].as_str().unwrap_or_default().to_string(),
                name: call["function"]["name"].as_str().unwrap_or_default().to_string(),
                arguments,
            });
        }
    }

    let usage = response.get("usage").map(|u| Usage {
        input_tokens: u["prompt_tokens"].as_u64().unwrap_or(0),
        output_tokens: u["completion_tokens"].as_u64().unwrap_or(0),
    });

    Ok(LlmResponse {
        content: message["content"].as_str().unwrap_or_default().to_string(),
        tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
        usage,
    })
}

/// Convert a [`ToolDefinition`] to the Chat Completions function format.
fn tool_to_function(tool: &ToolDefinition) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.parameters,
        },
    })
}
