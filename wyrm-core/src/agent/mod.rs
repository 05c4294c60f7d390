//! Autonomous agents: the tool-loop handler and the REPL agent.

pub mod handler;
pub mod logger;
pub mod prompts;
pub mod repl;
pub mod strategies;
pub mod tools;

pub use handler::AgentHandler;
pub use logger::ReplLogger;
pub use repl::{ReplAgent, ReplOptions};
pub use strategies::AgentStrategy;
pub use tools::agent_tools;
