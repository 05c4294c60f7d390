//! Uniform model-provider layer for wyrm.
//!
//! Two calls cover every provider: [`LlmClient::chat`] for free-form (and
//! tool-use) conversation and [`LlmClient::chat_value`] for schema-coerced
//! structured output; [`LlmClientExt::chat_structured`] layers a typed
//! surface on top. Providers translate the uniform message list into their
//! own wire formats. [`InstrumentedClient`] wraps any client with start/end
//! event callbacks, and [`AgenticClient`] delegates a whole reason/act loop
//! to an external SDK-managed agent while tool execution stays in-process.

pub mod agentic;
pub mod anthropic;
pub mod client;
pub mod error;
pub mod events;
pub mod ollama;
pub mod openai;
pub mod structured;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

pub use agentic::{AgenticClient, AgenticResult, AgenticToolCall, CliAgent, ToolExecutor,
    create_agentic_client};
pub use anthropic::Anthropic;
pub use client::{LlmClient, LlmClientExt, create_client};
pub use error::LlmError;
pub use events::{InstrumentedClient, LlmEvent, LlmEventCallback, LlmMethod};
pub use ollama::Ollama;
pub use openai::OpenAi;
pub use structured::{SchemaSpec, extraction_tool, parse_structured};
pub use types::{
    ChatMessage, LlmResponse, ModelConfig, ProviderKind, Role, ToolCall, ToolDefinition, Usage,
};

#[cfg(any(test, feature = "test-utils"))]
pub use mock::MockClient;
