//! The [`LlmClient`] trait and provider factory.

use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;

use crate::error::LlmError;
use crate::structured::SchemaSpec;
use crate::types::{ChatMessage, LlmResponse, ModelConfig, ProviderKind, ToolDefinition};

/// Uniform chat surface every provider implements.
///
/// Object-safe so sessions can hold a runtime-selected provider behind
/// `Arc<dyn LlmClient>`; the typed structured call lives on
/// [`LlmClientExt`], which is blanket-implemented.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send messages (and optional tool definitions), returning a unified
    /// response.
    async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: Option<&[ToolDefinition]>,
    ) -> Result<LlmResponse, LlmError>;

    /// Like [`LlmClient::chat`] but coerce the response into a JSON value
    /// matching `schema`.
    async fn chat_value(
        &self,
        messages: &[ChatMessage],
        schema: &SchemaSpec,
    ) -> Result<serde_json::Value, LlmError>;
}

/// Typed structured-output extension over any [`LlmClient`].
pub trait LlmClientExt: LlmClient {
    /// Request a structured response deserialized into `T`.
    ///
    /// The schema is derived from `T` via `schemars`; deserialization is
    /// the validation step, and failures surface as
    /// [`LlmError::StructuredParse`] naming the schema.
    fn chat_structured<T>(
        &self,
        messages: &[ChatMessage],
    ) -> impl std::future::Future<Output = Result<T, LlmError>> + Send
    where
        T: DeserializeOwned + JsonSchema + Send,
    {
        async move {
            let spec = SchemaSpec::of::<T>();
            let value = self.chat_value(messages, &spec).await?;
            serde_json::from_value(value).map_err(|e| LlmError::StructuredParse {
                schema: spec.name.clone(),
                message: e.to_string(),
            })
        }
    }
}

impl<C: LlmClient + ?Sized> LlmClientExt for C {}

/// Build a client for the configured provider.
///
/// Each provider reads its defaults (model, base URL) when the config leaves
/// them unset.
pub fn create_client(config: &ModelConfig) -> Arc<dyn LlmClient> {
    match config.provider {
        ProviderKind::Anthropic => Arc::new(crate::anthropic::Anthropic::from_config(config)),
        ProviderKind::OpenAi => Arc::new(crate::openai::OpenAi::from_config(config)),
        ProviderKind::Ollama => Arc::new(crate::ollama::Ollama::from_config(config)),
    }
}
